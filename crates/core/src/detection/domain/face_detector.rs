use crate::shared::frame::Frame;
use crate::shared::region::DetectedRegion;

/// Domain interface for face detection.
///
/// Regions come back in the detector's preferred order; callers that act on
/// a single face take the first one. Implementations may keep state between
/// frames, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedRegion>, Box<dyn std::error::Error>>;
}
