use std::path::{Path, PathBuf};
use std::process;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;

use headtank_core::detection::domain::face_detector::FaceDetector;
use headtank_core::detection::infrastructure::detector_factory::{load_detector, resolve_model};
use headtank_core::rendering::infrastructure::renderer_factory::{
    create_renderer, RendererBackend,
};
use headtank_core::session::session_config::SessionConfig;
use headtank_core::session::session_logger::StdoutSessionLogger;
use headtank_core::session::tracking_session::{
    SessionParts, SessionSummary, SnapshotOutput, TrackingSession, TrackingStatus, VideoOutput,
};
use headtank_core::shared::constants::{IMAGE_EXTENSIONS, YOLO_MODEL_NAME};
use headtank_core::video::domain::video_source::VideoSource;
use headtank_core::video::infrastructure::ffmpeg_source::{
    default_camera_device, CameraSpec, FfmpegSource,
};
use headtank_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;
use headtank_core::video::infrastructure::image_file_source::ImageFileSource;
use headtank_core::video::infrastructure::image_file_writer::ImageFileWriter;

/// Rotate a 3D tank by moving your head in front of a webcam.
#[derive(Parser)]
#[command(name = "headtank")]
struct Cli {
    /// Camera device (e.g. /dev/video0, 0 on macOS, "video=<name>" on Windows).
    #[arg(long, conflicts_with = "input")]
    camera: Option<String>,

    /// Capture format override (v4l2, avfoundation, dshow).
    #[arg(long, requires = "camera")]
    camera_format: Option<String>,

    /// Video or image file to use instead of a camera.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Where to write the rendered scene video.
    #[arg(long)]
    output: PathBuf,

    /// Write camera frames with detected faces outlined to this video.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Save the last rendered frame as an image.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Seconds to run before stopping.
    #[arg(long, default_value = "30")]
    duration: u64,

    /// JSON config file (defaults to the user config dir when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Face detection ONNX model (downloaded on first use when omitted).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Radians of rotation per pixel of horizontal head offset.
    #[arg(long, allow_negative_numbers = true)]
    movement_factor: Option<f64>,

    /// Renderer backend: auto, gpu or cpu.
    #[arg(long)]
    renderer: Option<RendererBackend>,

    /// Rendered video width.
    #[arg(long)]
    width: Option<u32>,

    /// Rendered video height.
    #[arg(long)]
    height: Option<u32>,

    /// Rendered frames per second.
    #[arg(long)]
    render_fps: Option<u32>,

    /// Milliseconds between face detection cycles.
    #[arg(long)]
    detection_period_ms: Option<u64>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    validate(&cli)?;

    let detector = build_detector(&config)?;
    let renderer = create_renderer(config.renderer, config.render_width, config.render_height)?;
    let source = open_source(&cli, &config)?;
    log::info!("Capturing from {}", source.label());

    let parts = SessionParts {
        source,
        detector,
        renderer,
        render_output: VideoOutput {
            writer: Box::new(FfmpegWriter::new()),
            path: cli.output.clone(),
        },
        preview: cli.preview.clone().map(|path| VideoOutput {
            writer: Box::new(FfmpegWriter::new()),
            path,
        }),
        snapshot: cli.snapshot.clone().map(|path| SnapshotOutput {
            writer: Box::new(ImageFileWriter::new()),
            path,
        }),
        logger: Arc::new(Mutex::new(StdoutSessionLogger::new())),
    };

    let mut session = TrackingSession::start(&config, parts)?;
    if let TrackingStatus::Disabled(reason) = session.status() {
        eprintln!("Head tracking unavailable ({reason}); rendering a static scene");
    }

    if session.wait(Duration::from_secs(cli.duration)) {
        log::info!("Input ended before {}s elapsed", cli.duration);
    }
    let summary = session.stop();
    report(&summary, &cli.output);

    if let Some(reason) = summary.render_error {
        return Err(reason.into());
    }
    Ok(())
}

/// Config file values with command-line overrides applied.
fn build_config(cli: &Cli) -> Result<SessionConfig, Box<dyn std::error::Error>> {
    let mut config = SessionConfig::load_or_default(cli.config.as_deref())?;

    if let Some(model) = &cli.model {
        config.model_path = Some(model.clone());
    }
    if let Some(confidence) = cli.confidence {
        config.confidence = confidence;
    }
    if let Some(factor) = cli.movement_factor {
        config.movement_factor = factor;
    }
    if let Some(renderer) = cli.renderer {
        config.renderer = renderer;
    }
    if let Some(width) = cli.width {
        config.render_width = width;
    }
    if let Some(height) = cli.height {
        config.render_height = height;
    }
    if let Some(fps) = cli.render_fps {
        config.render_fps = fps;
    }
    if let Some(period) = cli.detection_period_ms {
        config.detection_period_ms = period;
    }

    config.validate()?;
    Ok(config)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(input) = &cli.input {
        if !input.exists() {
            return Err(format!("Input file not found: {}", input.display()).into());
        }
    }
    if cli.duration == 0 {
        return Err("Duration must be at least 1 second".into());
    }
    if Some(&cli.output) == cli.preview.as_ref() {
        return Err("--output and --preview must be different files".into());
    }
    Ok(())
}

fn build_detector(config: &SessionConfig) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {YOLO_MODEL_NAME}");
    let model_path = resolve_model(
        config.model_path.as_deref(),
        bundled_model_dir().as_deref(),
        Some(Box::new(download_progress)),
    )?;
    eprintln!();
    Ok(load_detector(&model_path, config.confidence)?)
}

/// `assets/` next to the executable, where packaged builds ship the model.
fn bundled_model_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("assets")))
}

fn open_source(
    cli: &Cli,
    config: &SessionConfig,
) -> Result<Box<dyn VideoSource>, Box<dyn std::error::Error>> {
    if let Some(input) = &cli.input {
        if is_image(input) {
            return Ok(Box::new(ImageFileSource::new(input)));
        }
        return Ok(Box::new(FfmpegSource::file(input)));
    }

    let device = match (&cli.camera, default_camera_device()) {
        (Some(device), _) => device.clone(),
        (None, Some(device)) => device.to_string(),
        (None, None) => {
            return Err("No default camera on this platform, pass --camera".into());
        }
    };
    let spec = CameraSpec {
        format: cli.camera_format.clone(),
        size: config.camera_width.zip(config.camera_height),
        framerate: config.camera_framerate,
        ..CameraSpec::new(&device)
    };
    Ok(Box::new(FfmpegSource::camera(spec)))
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn report(summary: &SessionSummary, output: &Path) {
    log::info!(
        "Rendered {} frames to {}",
        summary.frames_rendered,
        output.display()
    );
    match &summary.tracking {
        TrackingStatus::Active => log::info!(
            "Tracked a face in {}/{} detection cycles, final rotation {:.3} rad",
            summary.cycles_with_face,
            summary.cycles,
            summary.final_rotation
        ),
        TrackingStatus::Disabled(reason) => log::info!("Tracking was disabled: {reason}"),
    }
    if summary.detection_errors > 0 {
        log::warn!("{} detection cycles failed", summary.detection_errors);
    }
    if let Some(reason) = &summary.snapshot_error {
        log::warn!("Snapshot not saved: {reason}");
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
