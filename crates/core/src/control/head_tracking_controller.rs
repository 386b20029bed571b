//! Maps head movement to an accumulated rotation angle.
//!
//! Each detection cycle the first detected face is compared with the frame
//! center; its horizontal offset, scaled by a movement factor, is added to
//! the running rotation. The controller never touches the scene itself:
//! applying the angle to a renderable object is the caller's job.

use crate::shared::constants::DEFAULT_MOVEMENT_FACTOR;
use crate::shared::region::DetectedRegion;

/// Offset of a face center from the frame center, in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeadOffset {
    pub dx: f64,
    /// Computed for diagnostics only; the rotation mapping is horizontal.
    pub dy: f64,
}

impl HeadOffset {
    /// Offset of `region`'s center from the center of a `frame_width` x
    /// `frame_height` frame. Degenerate frame sizes give a frame center of 0.
    pub fn of(region: &DetectedRegion, frame_width: u32, frame_height: u32) -> Self {
        let (cx, cy) = region.center();
        let fcx = frame_width as f64 / 2.0;
        let fcy = frame_height as f64 / 2.0;
        Self {
            dx: cx - fcx,
            dy: cy - fcy,
        }
    }
}

/// Pure reducer: the rotation after one detection cycle.
///
/// Only `regions[0]` is consulted. An empty slice returns `previous`.
pub fn next_rotation(
    previous: f64,
    regions: &[DetectedRegion],
    frame_width: u32,
    frame_height: u32,
    movement_factor: f64,
) -> f64 {
    match regions.first() {
        Some(region) => {
            previous + HeadOffset::of(region, frame_width, frame_height).dx * movement_factor
        }
        None => previous,
    }
}

/// Accumulates rotation across detection cycles.
///
/// The state is a single unbounded scalar that is never reset for the
/// lifetime of the controller.
#[derive(Clone, Debug)]
pub struct HeadTrackingController {
    movement_factor: f64,
    accumulated_rotation: f64,
}

impl HeadTrackingController {
    pub fn new(movement_factor: f64) -> Self {
        Self {
            movement_factor,
            accumulated_rotation: 0.0,
        }
    }

    /// Applies one detection cycle and returns the new rotation in radians.
    pub fn on_detection_cycle(
        &mut self,
        regions: &[DetectedRegion],
        frame_width: u32,
        frame_height: u32,
    ) -> f64 {
        if let Some(region) = regions.first() {
            let offset = HeadOffset::of(region, frame_width, frame_height);
            log::debug!("Head offset dx={:.1} dy={:.1}", offset.dx, offset.dy);
        }
        self.accumulated_rotation = next_rotation(
            self.accumulated_rotation,
            regions,
            frame_width,
            frame_height,
            self.movement_factor,
        );
        self.accumulated_rotation
    }

    pub fn rotation(&self) -> f64 {
        self.accumulated_rotation
    }

    pub fn movement_factor(&self) -> f64 {
        self.movement_factor
    }
}

impl Default for HeadTrackingController {
    fn default() -> Self {
        Self::new(DEFAULT_MOVEMENT_FACTOR)
    }
}
