use std::path::{Path, PathBuf};

use crate::detection::domain::face_detector::FaceDetector;
use crate::session::session_error::SessionError;
use crate::shared::constants::{YOLO_MODEL_NAME, YOLO_MODEL_URL};

use super::model_resolver::{self, ModelSource, ProgressFn};
use super::onnx_yolo_detector::OnnxYoloDetector;

/// Locate the face model, downloading it into the cache when needed.
pub fn resolve_model(
    explicit: Option<&Path>,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, SessionError> {
    let source = ModelSource {
        name: YOLO_MODEL_NAME,
        url: YOLO_MODEL_URL,
        explicit,
        bundled_dir,
    };
    model_resolver::resolve(&source, progress).map_err(|e| SessionError::ModelLoad(e.to_string()))
}

/// Load the face detector once. Any failure is fatal to the session.
pub fn load_detector(
    model_path: &Path,
    confidence: f64,
) -> Result<Box<dyn FaceDetector>, SessionError> {
    log::info!("Loading face model {}", model_path.display());
    let detector = OnnxYoloDetector::new(model_path, confidence).map_err(|e| {
        SessionError::ModelLoad(format!("{}: {e}", model_path.display()))
    })?;
    Ok(Box::new(detector))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_explicit_model_is_model_load_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nope.onnx");
        let result = resolve_model(Some(&path), None, None);
        assert!(matches!(result, Err(SessionError::ModelLoad(_))));
    }

    #[test]
    fn test_corrupt_model_is_model_load_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("garbage.onnx");
        std::fs::write(&path, b"not an onnx model").unwrap();
        let result = load_detector(&path, 0.5);
        assert!(matches!(result, Err(SessionError::ModelLoad(_))));
    }
}
