//! Session lifecycle: render loop, stream acquisition and detection loop.
//!
//! Rendering always starts, whatever happens to the camera. Head tracking
//! is layered on top once the stream delivers its first frame; if it never
//! does, the scene keeps rendering at its last rotation.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::control::head_tracking_controller::HeadTrackingController;
use crate::control::shared_rotation::SharedRotation;
use crate::detection::domain::face_detector::FaceDetector;
use crate::rendering::domain::camera::PerspectiveCamera;
use crate::rendering::domain::scene::create_scene;
use crate::rendering::domain::scene_renderer::SceneRenderer;
use crate::shared::stream_metadata::StreamMetadata;
use crate::video::acquisition::acquire;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::domain::video_source::VideoSource;
use crate::video::domain::video_writer::VideoWriter;

use super::detection_cycle::DetectionCycle;
use super::render_loop::RenderLoop;
use super::scheduler::{spawn_interval, IntervalHandle};
use super::session_config::SessionConfig;
use super::session_error::SessionError;
use super::session_logger::SharedSessionLogger;

/// A video sink and where it writes.
pub struct VideoOutput {
    pub writer: Box<dyn VideoWriter>,
    pub path: PathBuf,
}

/// An image sink and where it writes.
pub struct SnapshotOutput {
    pub writer: Box<dyn ImageWriter>,
    pub path: PathBuf,
}

/// Collaborators a session is assembled from.
pub struct SessionParts {
    pub source: Box<dyn VideoSource>,
    /// Already loaded; model failures are reported before a session exists.
    pub detector: Box<dyn FaceDetector>,
    pub renderer: Box<dyn SceneRenderer>,
    pub render_output: VideoOutput,
    /// Camera frames with detected faces outlined.
    pub preview: Option<VideoOutput>,
    /// Last rendered frame, written at stop.
    pub snapshot: Option<SnapshotOutput>,
    pub logger: SharedSessionLogger,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TrackingStatus {
    Active,
    /// The stream could not be acquired; the scene renders without tracking.
    Disabled(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionSummary {
    pub tracking: TrackingStatus,
    pub cycles: usize,
    pub cycles_with_face: usize,
    pub detection_errors: usize,
    pub frames_rendered: usize,
    /// Radians, as last published by the controller.
    pub final_rotation: f64,
    pub render_error: Option<String>,
    pub snapshot_error: Option<String>,
}

/// A running head-tracking session. Dropping it stops it.
pub struct TrackingSession {
    status: TrackingStatus,
    rotation: SharedRotation,
    render: Arc<Mutex<RenderLoop>>,
    render_handle: Option<IntervalHandle>,
    detection: Option<Arc<Mutex<DetectionCycle>>>,
    detection_handle: Option<IntervalHandle>,
    snapshot: Option<SnapshotOutput>,
    logger: SharedSessionLogger,
    summary: Option<SessionSummary>,
}

impl TrackingSession {
    /// Starts rendering, then waits (bounded) for the stream and starts
    /// tracking if it arrives.
    pub fn start(config: &SessionConfig, parts: SessionParts) -> Result<Self, SessionError> {
        config.validate()?;
        let SessionParts {
            source,
            detector,
            renderer,
            render_output,
            preview,
            snapshot,
            logger,
        } = parts;

        let scene = create_scene();
        let target = scene
            .object_by_name(&config.target_object)
            .ok_or_else(|| SessionError::MissingTarget(config.target_object.clone()))?;

        let (width, height) = renderer.size();
        let camera = PerspectiveCamera::for_viewport(width, height);
        let VideoOutput {
            writer: mut render_writer,
            path: render_path,
        } = render_output;
        render_writer
            .open(
                &render_path,
                &StreamMetadata::rendered(width, height, config.render_fps as f64),
            )
            .map_err(|e| SessionError::Output {
                path: render_path.clone(),
                reason: e.to_string(),
            })?;

        let rotation = SharedRotation::default();
        let render = Arc::new(Mutex::new(RenderLoop::new(
            scene,
            camera,
            renderer,
            target,
            rotation.clone(),
            render_writer,
            logger.clone(),
        )));
        let render_handle = {
            let render = render.clone();
            spawn_interval("render", config.render_period(), move || {
                render
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .run_once()
            })
        };
        let render_handle = match render_handle {
            Ok(handle) => handle,
            Err(e) => {
                lock(&render).finish();
                return Err(SessionError::Render(format!(
                    "failed to start render loop: {e}"
                )));
            }
        };
        log::info!(
            "Rendering {width}x{height} at {} fps to {}",
            config.render_fps,
            render_path.display()
        );

        let mut session = Self {
            status: TrackingStatus::Disabled("not started".into()),
            rotation,
            render,
            render_handle: Some(render_handle),
            detection: None,
            detection_handle: None,
            snapshot,
            logger,
            summary: None,
        };

        let pending = acquire(source, config.acquisition_timeout());
        let label = pending.label().to_string();
        let stream = match pending.wait() {
            Ok(stream) => stream,
            Err(e) => {
                log::error!("Head tracking disabled: {e}");
                session.status = TrackingStatus::Disabled(e.to_string());
                return Ok(session);
            }
        };

        let mut cycle = DetectionCycle::new(
            stream,
            detector,
            HeadTrackingController::new(config.movement_factor),
            session.rotation.clone(),
            session.logger.clone(),
        );

        if let Some(VideoOutput { mut writer, path }) = preview {
            let (cam_w, cam_h) = cycle_frame_size(&cycle, config);
            let metadata =
                StreamMetadata::rendered(cam_w, cam_h, 1000.0 / config.detection_period_ms as f64);
            if let Err(e) = writer.open(&path, &metadata) {
                cycle.finish();
                session.stop();
                return Err(SessionError::Output {
                    path,
                    reason: e.to_string(),
                });
            }
            cycle = cycle.with_preview(writer);
        }

        let cycle = Arc::new(Mutex::new(cycle));
        let handle = {
            let cycle = cycle.clone();
            spawn_interval("detection", config.detection_period(), move || {
                cycle
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .run_once()
            })
        };
        match handle {
            Ok(handle) => {
                session.detection = Some(cycle);
                session.detection_handle = Some(handle);
                session.status = TrackingStatus::Active;
                lock(&session.logger).info(&format!(
                    "Head tracking active on {label} every {}ms",
                    config.detection_period_ms
                ));
            }
            Err(e) => {
                lock(&cycle).finish();
                log::error!("Head tracking disabled: failed to start detection loop: {e}");
                session.status =
                    TrackingStatus::Disabled(format!("failed to start detection loop: {e}"));
            }
        }

        Ok(session)
    }

    pub fn status(&self) -> &TrackingStatus {
        &self.status
    }

    /// Latest rotation published by the detection loop, in radians.
    pub fn rotation(&self) -> f64 {
        self.rotation.load()
    }

    /// Rotation currently applied to the driven scene object.
    pub fn target_rotation(&self) -> f32 {
        let render = lock(&self.render);
        render
            .scene()
            .rotation(render.target())
            .map(|r| r.y)
            .unwrap_or_default()
    }

    /// Blocks until tracking ends on its own (e.g. the video file ran out),
    /// or the render loop stops when there is no tracking. Returns false if
    /// `limit` elapsed first.
    pub fn wait(&self, limit: Duration) -> bool {
        match (&self.detection_handle, &self.render_handle) {
            (Some(detection), _) => detection.wait(limit),
            (None, Some(render)) => render.wait(limit),
            (None, None) => true,
        }
    }

    /// Stops both loops, releases the stream and finalizes every output.
    /// Calling it again returns the same summary.
    pub fn stop(&mut self) -> SessionSummary {
        if let Some(summary) = &self.summary {
            return summary.clone();
        }

        if let Some(mut handle) = self.detection_handle.take() {
            handle.cancel();
        }
        if let Some(mut handle) = self.render_handle.take() {
            handle.cancel();
        }

        let (cycles, cycles_with_face, detection_errors, final_rotation) =
            match &self.detection {
                Some(cycle) => {
                    let mut cycle = lock(cycle);
                    cycle.finish();
                    (
                        cycle.cycles(),
                        cycle.cycles_with_face(),
                        cycle.detection_errors(),
                        cycle.rotation(),
                    )
                }
                None => (0, 0, 0, self.rotation.load()),
            };

        let (frames_rendered, render_error, snapshot_error) = {
            let mut render = lock(&self.render);
            render.finish();
            let snapshot_error = self
                .snapshot
                .take()
                .and_then(|snapshot| write_snapshot(&snapshot, render.last_frame()));
            (
                render.frames_rendered(),
                render.error().map(str::to_string),
                snapshot_error,
            )
        };

        lock(&self.logger).summary();

        let summary = SessionSummary {
            tracking: self.status.clone(),
            cycles,
            cycles_with_face,
            detection_errors,
            frames_rendered,
            final_rotation,
            render_error,
            snapshot_error,
        };
        self.summary = Some(summary.clone());
        summary
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Camera frame size for the preview, falling back to the render size when
/// the stream did not report one.
fn cycle_frame_size(cycle: &DetectionCycle, config: &SessionConfig) -> (u32, u32) {
    cycle
        .stream_metadata()
        .map(|m| (m.width, m.height))
        .unwrap_or((config.render_width, config.render_height))
}

/// Returns the failure reason, if any.
fn write_snapshot(
    snapshot: &SnapshotOutput,
    frame: Option<&crate::shared::frame::Frame>,
) -> Option<String> {
    let Some(frame) = frame else {
        log::warn!("No rendered frame to snapshot");
        return Some("no frame was rendered".into());
    };
    match snapshot.writer.write(&snapshot.path, frame) {
        Ok(()) => {
            log::info!("Snapshot written to {}", snapshot.path.display());
            None
        }
        Err(e) => {
            log::error!("Failed to write snapshot {}: {e}", snapshot.path.display());
            Some(e.to_string())
        }
    }
}
