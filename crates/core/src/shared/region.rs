/// An axis-aligned face rectangle in frame-pixel coordinates.
///
/// Produced by a face detector, zero or more per frame. Values are taken
/// as-is: negative or zero sizes are not rejected here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetectedRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl DetectedRegion {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a region from corner coordinates, rounding to whole pixels.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let x = x1.round() as i32;
        let y = y1.round() as i32;
        Self {
            x,
            y,
            width: x2.round() as i32 - x,
            height: y2.round() as i32 - y,
        }
    }

    /// Center point `(x + width/2, y + height/2)`.
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    /// Clamps the rectangle to a `frame_w` x `frame_h` frame.
    pub fn clamped(&self, frame_w: u32, frame_h: u32) -> Self {
        let fw = frame_w as i32;
        let fh = frame_h as i32;
        let x1 = self.x.clamp(0, fw);
        let y1 = self.y.clamp(0, fh);
        let x2 = (self.x + self.width).clamp(0, fw);
        let y2 = (self.y + self.height).clamp(0, fh);
        Self {
            x: x1,
            y: y1,
            width: (x2 - x1).max(0),
            height: (y2 - y1).max(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_center_of_even_region() {
        let (cx, cy) = DetectedRegion::new(100, 40, 50, 20).center();
        assert_relative_eq!(cx, 125.0);
        assert_relative_eq!(cy, 50.0);
    }

    #[test]
    fn test_center_keeps_half_pixels() {
        let (cx, cy) = DetectedRegion::new(0, 0, 3, 5).center();
        assert_relative_eq!(cx, 1.5);
        assert_relative_eq!(cy, 2.5);
    }

    #[test]
    fn test_center_of_negative_size_is_not_rejected() {
        let (cx, _) = DetectedRegion::new(10, 0, -4, 2).center();
        assert_relative_eq!(cx, 8.0);
    }

    #[test]
    fn test_from_corners_rounds() {
        let r = DetectedRegion::from_corners(10.4, 20.6, 60.5, 80.2);
        assert_eq!(r, DetectedRegion::new(10, 21, 51, 59));
    }

    #[rstest]
    #[case::inside(DetectedRegion::new(10, 10, 20, 20), DetectedRegion::new(10, 10, 20, 20))]
    #[case::left_edge(DetectedRegion::new(-10, 10, 20, 20), DetectedRegion::new(0, 10, 10, 20))]
    #[case::bottom_right(DetectedRegion::new(90, 90, 20, 20), DetectedRegion::new(90, 90, 10, 10))]
    #[case::fully_outside(DetectedRegion::new(200, 200, 20, 20), DetectedRegion::new(100, 100, 0, 0))]
    fn test_clamped(#[case] input: DetectedRegion, #[case] expected: DetectedRegion) {
        assert_eq!(input.clamped(100, 100), expected);
    }
}
