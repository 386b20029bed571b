use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::stream_metadata::StreamMetadata;

/// Abstracts video encoding so the session can record rendered and preview
/// frames without depending on a specific codec library.
pub trait VideoWriter: Send {
    fn open(
        &mut self,
        path: &Path,
        metadata: &StreamMetadata,
    ) -> Result<(), Box<dyn std::error::Error>>;

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Flushes buffered packets and finalizes the container.
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}
