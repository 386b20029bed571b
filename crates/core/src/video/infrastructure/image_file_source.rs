use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::shared::frame::Frame;
use crate::shared::stream_metadata::StreamMetadata;
use crate::video::domain::video_source::VideoSource;

/// How often a still image is re-published as a new frame.
const STILL_IMAGE_INTERVAL: Duration = Duration::from_millis(100);

/// Presents a still image as an endless stream of identical frames.
///
/// Useful for exercising the tracking loop without a camera: a photo with a
/// face off-center makes the tank turn steadily.
pub struct ImageFileSource {
    path: PathBuf,
    frame: Option<Frame>,
}

impl ImageFileSource {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            frame: None,
        }
    }
}

impl VideoSource for ImageFileSource {
    fn label(&self) -> String {
        self.path.display().to_string()
    }

    fn open(&mut self) -> Result<StreamMetadata, Box<dyn std::error::Error>> {
        let img = image::open(&self.path)?.to_rgb8();
        let (width, height) = img.dimensions();
        self.frame = Some(Frame::new(img.into_raw(), width, height, 3, 0));

        Ok(StreamMetadata {
            width,
            height,
            fps: 0.0,
            codec: String::new(),
            source: self.label(),
        })
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let Some(frame) = self.frame.clone() else {
            return Box::new(std::iter::once(Err("ImageFileSource: not opened".into())));
        };
        Box::new((0..).map(move |i| Ok(frame.clone().with_index(i))))
    }

    fn pacing(&self) -> Option<Duration> {
        Some(STILL_IMAGE_INTERVAL)
    }

    fn close(&mut self) {
        self.frame = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_image(dir: &Path, width: u32, height: u32) -> PathBuf {
        let path = dir.join("face.png");
        let mut img = image::RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([50, 100, 200]);
        }
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_open_returns_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 100, 80);
        let mut source = ImageFileSource::new(&path);
        let meta = source.open().unwrap();
        assert_eq!((meta.width, meta.height), (100, 80));
        assert_eq!(meta.fps, 0.0);
        assert_eq!(meta.source, path.display().to_string());
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let mut source = ImageFileSource::new(Path::new("/nonexistent/face.png"));
        assert!(source.open().is_err());
    }

    #[test]
    fn test_frames_repeat_with_increasing_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 10, 10);
        let mut source = ImageFileSource::new(&path);
        source.open().unwrap();

        let frames: Vec<Frame> = source.frames().take(3).map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 3);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.index(), i);
            assert_eq!(frame.pixel(0, 0), Some([50, 100, 200]));
        }
    }

    #[test]
    fn test_frames_without_open_returns_error() {
        let mut source = ImageFileSource::new(Path::new("unused.png"));
        assert!(source.frames().next().unwrap().is_err());
    }
}
