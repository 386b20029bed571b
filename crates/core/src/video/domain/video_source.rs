use std::time::Duration;

use crate::shared::frame::Frame;
use crate::shared::stream_metadata::StreamMetadata;

/// A source of decoded frames: a camera device, a video file or a still image.
///
/// The source is fully described at construction, so `open` takes no
/// arguments. A live camera never ends on its own; files end at EOF.
pub trait VideoSource: Send {
    /// Human-readable origin used in logs and errors.
    fn label(&self) -> String;

    /// Opens the underlying device or file and returns its stream properties.
    fn open(&mut self) -> Result<StreamMetadata, Box<dyn std::error::Error>>;

    /// Returns an iterator over frames in capture order.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    /// Minimum spacing the capture loop keeps between frames.
    ///
    /// Devices that block until the next frame is ready need none; files
    /// and still images are replayed at a wall-clock rate.
    fn pacing(&self) -> Option<Duration> {
        None
    }

    /// Releases the device or file handle.
    fn close(&mut self);
}
