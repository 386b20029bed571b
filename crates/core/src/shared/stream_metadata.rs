/// Properties of an opened video stream (camera, file or still image).
#[derive(Clone, Debug, PartialEq)]
pub struct StreamMetadata {
    pub width: u32,
    pub height: u32,
    /// Frames per second; 0 for still images.
    pub fps: f64,
    pub codec: String,
    /// Human-readable origin, e.g. `/dev/video0` or a file path.
    pub source: String,
}

impl StreamMetadata {
    /// Metadata for a stream produced in-process (rendered scene output).
    pub fn rendered(width: u32, height: u32, fps: f64) -> Self {
        Self {
            width,
            height,
            fps,
            codec: String::new(),
            source: "scene".to_string(),
        }
    }

    /// Interval between frames, or `None` when the rate is unknown.
    pub fn frame_interval(&self) -> Option<std::time::Duration> {
        if self.fps.is_finite() && self.fps > 0.0 {
            Some(std::time::Duration::from_secs_f64(1.0 / self.fps))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_rendered_metadata() {
        let meta = StreamMetadata::rendered(800, 600, 60.0);
        assert_eq!(meta.width, 800);
        assert_eq!(meta.height, 600);
        assert_eq!(meta.source, "scene");
    }

    #[test]
    fn test_frame_interval_from_fps() {
        let meta = StreamMetadata::rendered(10, 10, 25.0);
        assert_eq!(meta.frame_interval(), Some(Duration::from_millis(40)));
    }

    #[test]
    fn test_still_image_has_no_interval() {
        let meta = StreamMetadata {
            width: 800,
            height: 600,
            fps: 0.0,
            codec: "png".to_string(),
            source: "face.png".to_string(),
        };
        assert_eq!(meta.frame_interval(), None);
    }
}
