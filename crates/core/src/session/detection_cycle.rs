//! One tick of head tracking: sample the stream, detect, update the rotation.

use std::ops::ControlFlow;
use std::sync::PoisonError;
use std::time::Instant;

use crate::control::head_tracking_controller::HeadTrackingController;
use crate::control::shared_rotation::SharedRotation;
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::constants::{FACE_OUTLINE_COLOR, FACE_OUTLINE_THICKNESS};
use crate::shared::frame::Frame;
use crate::shared::region::DetectedRegion;
use crate::shared::stream_metadata::StreamMetadata;
use crate::video::acquisition::LiveStream;
use crate::video::domain::video_writer::VideoWriter;

use super::session_logger::SharedSessionLogger;

/// Owns everything the detection interval touches.
pub struct DetectionCycle {
    stream: LiveStream,
    detector: Box<dyn FaceDetector>,
    controller: HeadTrackingController,
    rotation: SharedRotation,
    preview: Option<Box<dyn VideoWriter>>,
    logger: SharedSessionLogger,
    cycles: usize,
    cycles_with_face: usize,
    detection_errors: usize,
}

impl DetectionCycle {
    pub fn new(
        stream: LiveStream,
        detector: Box<dyn FaceDetector>,
        controller: HeadTrackingController,
        rotation: SharedRotation,
        logger: SharedSessionLogger,
    ) -> Self {
        Self {
            stream,
            detector,
            controller,
            rotation,
            preview: None,
            logger,
            cycles: 0,
            cycles_with_face: 0,
            detection_errors: 0,
        }
    }

    /// Attach an already opened writer that receives annotated camera frames.
    pub fn with_preview(mut self, writer: Box<dyn VideoWriter>) -> Self {
        self.preview = Some(writer);
        self
    }

    /// Runs one cycle. Breaks once the stream has ended.
    pub fn run_once(&mut self) -> ControlFlow<()> {
        if self.stream.is_finished() {
            log::info!("Camera stream ended, head tracking stopped");
            return ControlFlow::Break(());
        }
        let Some(frame) = self.stream.latest_frame() else {
            return ControlFlow::Continue(());
        };
        self.cycles += 1;

        let start = Instant::now();
        let regions = match self.detector.detect(&frame) {
            Ok(regions) => regions,
            Err(e) => {
                self.detection_errors += 1;
                log::warn!("Detection failed on frame {}: {e}", frame.index());
                return ControlFlow::Continue(());
            }
        };
        let detect_ms = start.elapsed().as_secs_f64() * 1000.0;

        if !regions.is_empty() {
            self.cycles_with_face += 1;
        }
        let rotation = self
            .controller
            .on_detection_cycle(&regions, frame.width(), frame.height());
        self.rotation.store(rotation);

        {
            let mut logger = self.logger.lock().unwrap_or_else(PoisonError::into_inner);
            logger.timing("detect", detect_ms);
            logger.metric("faces", regions.len() as f64);
            logger.metric("rotation", rotation);
        }

        self.write_preview(frame, &regions);
        ControlFlow::Continue(())
    }

    fn write_preview(&mut self, mut frame: Frame, regions: &[DetectedRegion]) {
        let Some(writer) = self.preview.as_mut() else {
            return;
        };
        for region in regions {
            frame.stroke_rect(region, FACE_OUTLINE_COLOR, FACE_OUTLINE_THICKNESS);
        }
        if let Err(e) = writer.write(&frame) {
            log::warn!("Preview disabled after write failure: {e}");
            self.close_preview();
        }
    }

    fn close_preview(&mut self) {
        if let Some(mut writer) = self.preview.take() {
            if let Err(e) = writer.close() {
                log::warn!("Failed to finalize preview: {e}");
            }
        }
    }

    /// Stops the stream and finalizes the preview. Idempotent.
    pub fn finish(&mut self) {
        self.stream.stop();
        self.close_preview();
    }

    pub fn stream_metadata(&self) -> Option<&StreamMetadata> {
        self.stream.metadata()
    }

    pub fn cycles(&self) -> usize {
        self.cycles
    }

    pub fn cycles_with_face(&self) -> usize {
        self.cycles_with_face
    }

    pub fn detection_errors(&self) -> usize {
        self.detection_errors
    }

    pub fn rotation(&self) -> f64 {
        self.controller.rotation()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::session::session_logger::{NullSessionLogger, StdoutSessionLogger};
    use crate::video::acquisition::acquire;
    use crate::video::acquisition::tests::ScriptedSource;
    use approx::assert_relative_eq;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Detector returning the same regions for every frame.
    pub(crate) struct FixedDetector(pub Vec<DetectedRegion>);

    impl FaceDetector for FixedDetector {
        fn detect(
            &mut self,
            _frame: &Frame,
        ) -> Result<Vec<DetectedRegion>, Box<dyn std::error::Error>> {
            Ok(self.0.clone())
        }
    }

    pub(crate) struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn detect(
            &mut self,
            _frame: &Frame,
        ) -> Result<Vec<DetectedRegion>, Box<dyn std::error::Error>> {
            Err("inference failed".into())
        }
    }

    /// Writer that keeps every frame in memory.
    #[derive(Clone, Default)]
    pub(crate) struct MemoryWriter {
        pub frames: Arc<Mutex<Vec<Frame>>>,
        pub opened: Arc<Mutex<Option<StreamMetadata>>>,
        pub closed: Arc<AtomicBool>,
        pub fail_open: bool,
        pub fail_writes: bool,
    }

    impl VideoWriter for MemoryWriter {
        fn open(
            &mut self,
            _path: &Path,
            metadata: &StreamMetadata,
        ) -> Result<(), Box<dyn std::error::Error>> {
            if self.fail_open {
                return Err("permission denied".into());
            }
            *self.opened.lock().unwrap() = Some(metadata.clone());
            Ok(())
        }

        fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            if self.fail_writes {
                return Err("disk full".into());
            }
            self.frames.lock().unwrap().push(frame.clone());
            Ok(())
        }

        fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn live_stream(source: ScriptedSource) -> LiveStream {
        acquire(Box::new(source), Duration::from_secs(5)).wait().unwrap()
    }

    fn null_logger() -> SharedSessionLogger {
        Arc::new(Mutex::new(NullSessionLogger))
    }

    fn cycle_with(detector: Box<dyn FaceDetector>, rotation: SharedRotation) -> DetectionCycle {
        DetectionCycle::new(
            live_stream(ScriptedSource::endless()),
            detector,
            HeadTrackingController::default(),
            rotation,
            null_logger(),
        )
    }

    // Scripted frames are 64x48; a 16x16 face at x=40 has dx = 48 - 32 = 16
    fn right_of_center() -> DetectedRegion {
        DetectedRegion::new(40, 10, 16, 16)
    }

    #[test]
    fn test_face_publishes_accumulated_rotation() {
        let rotation = SharedRotation::default();
        let mut cycle = cycle_with(
            Box::new(FixedDetector(vec![right_of_center()])),
            rotation.clone(),
        );

        assert!(cycle.run_once().is_continue());
        assert_relative_eq!(rotation.load(), 0.08);
        assert!(cycle.run_once().is_continue());
        assert_relative_eq!(rotation.load(), 0.16);

        assert_eq!(cycle.cycles(), 2);
        assert_eq!(cycle.cycles_with_face(), 2);
        assert_relative_eq!(cycle.rotation(), 0.16);
        cycle.finish();
    }

    #[test]
    fn test_no_face_leaves_rotation_unchanged() {
        let rotation = SharedRotation::new(0.5);
        let mut cycle = cycle_with(Box::new(FixedDetector(Vec::new())), rotation.clone());

        cycle.run_once();
        cycle.run_once();

        assert_eq!(cycle.cycles(), 2);
        assert_eq!(cycle.cycles_with_face(), 0);
        // The controller starts at zero and publishes its own state
        assert_relative_eq!(rotation.load(), 0.0);
        cycle.finish();
    }

    #[test]
    fn test_detection_error_skips_cycle() {
        let rotation = SharedRotation::new(0.25);
        let mut cycle = cycle_with(Box::new(FailingDetector), rotation.clone());

        assert!(cycle.run_once().is_continue());
        assert_eq!(cycle.detection_errors(), 1);
        assert_eq!(cycle.cycles_with_face(), 0);
        assert_relative_eq!(rotation.load(), 0.25);
        cycle.finish();
    }

    #[test]
    fn test_only_first_region_drives_rotation() {
        let rotation = SharedRotation::default();
        let far_left = DetectedRegion::new(0, 0, 4, 4);
        let mut cycle = cycle_with(
            Box::new(FixedDetector(vec![right_of_center(), far_left])),
            rotation.clone(),
        );

        cycle.run_once();
        assert_relative_eq!(rotation.load(), 0.08);
        cycle.finish();
    }

    #[test]
    fn test_preview_outlines_faces() {
        let writer = MemoryWriter::default();
        let mut cycle = cycle_with(
            Box::new(FixedDetector(vec![right_of_center()])),
            SharedRotation::default(),
        )
        .with_preview(Box::new(writer.clone()));

        cycle.run_once();
        cycle.finish();

        let frames = writer.frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].pixel(40, 10), Some(FACE_OUTLINE_COLOR));
        assert_eq!(frames[0].pixel(41, 20), Some(FACE_OUTLINE_COLOR));
        assert_ne!(frames[0].pixel(48, 18), Some(FACE_OUTLINE_COLOR));
        assert!(writer.closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_preview_write_failure_disables_preview() {
        let writer = MemoryWriter {
            fail_writes: true,
            ..MemoryWriter::default()
        };
        let rotation = SharedRotation::default();
        let mut cycle = cycle_with(
            Box::new(FixedDetector(vec![right_of_center()])),
            rotation.clone(),
        )
        .with_preview(Box::new(writer.clone()));

        cycle.run_once();
        assert!(writer.closed.load(Ordering::SeqCst));
        assert!(cycle.run_once().is_continue());
        assert_relative_eq!(rotation.load(), 0.16);
        cycle.finish();
    }

    #[test]
    fn test_ended_stream_breaks() {
        let stream = live_stream(ScriptedSource::new(2));
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !stream.is_finished() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }

        let mut cycle = DetectionCycle::new(
            stream,
            Box::new(FixedDetector(Vec::new())),
            HeadTrackingController::default(),
            SharedRotation::default(),
            null_logger(),
        );
        assert!(cycle.run_once().is_break());
        assert_eq!(cycle.cycles(), 0);
    }

    #[test]
    fn test_records_timing_and_metrics() {
        let logger = Arc::new(Mutex::new(StdoutSessionLogger::new()));
        let mut cycle = DetectionCycle::new(
            live_stream(ScriptedSource::endless()),
            Box::new(FixedDetector(vec![right_of_center()])),
            HeadTrackingController::default(),
            SharedRotation::default(),
            logger.clone(),
        );

        cycle.run_once();
        cycle.finish();

        let logger = logger.lock().unwrap();
        assert_eq!(logger.timings_for("detect").map(<[f64]>::len), Some(1));
        assert_eq!(logger.metrics_for("faces"), Some(&[1.0][..]));
        assert_eq!(logger.metrics_for("rotation").map(<[f64]>::len), Some(1));
    }
}
