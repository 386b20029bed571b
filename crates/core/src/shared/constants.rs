pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

/// Radians of rotation per pixel of horizontal face offset.
pub const DEFAULT_MOVEMENT_FACTOR: f64 = 0.005;

/// Period between two detection cycles.
pub const DEFAULT_DETECTION_PERIOD_MS: u64 = 100;

pub const DEFAULT_RENDER_FPS: u32 = 60;
pub const DEFAULT_RENDER_WIDTH: u32 = 800;
pub const DEFAULT_RENDER_HEIGHT: u32 = 600;

pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// How long session start waits for the camera before giving up on tracking.
pub const DEFAULT_ACQUISITION_TIMEOUT_SECS: u64 = 10;

pub const TANK_OBJECT_NAME: &str = "Tank";
pub const TOWER_OBJECT_NAME: &str = "Tower";

/// Face outline color in camera previews.
pub const FACE_OUTLINE_COLOR: [u8; 3] = [255, 0, 0];
pub const FACE_OUTLINE_THICKNESS: u32 = 2;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Directory name used under the platform config and cache directories.
pub const APP_DIR_NAME: &str = "HeadTank";
