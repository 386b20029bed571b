use std::ops::ControlFlow;
use std::sync::PoisonError;
use std::time::Instant;

use crate::control::shared_rotation::SharedRotation;
use crate::rendering::domain::camera::PerspectiveCamera;
use crate::rendering::domain::scene::{Axis, ObjectHandle, Scene};
use crate::rendering::domain::scene_renderer::SceneRenderer;
use crate::shared::frame::Frame;
use crate::video::domain::video_writer::VideoWriter;

use super::session_logger::SharedSessionLogger;

/// Owns the scene and everything the render interval touches.
///
/// Each tick copies the published rotation onto the target object, renders
/// and writes the frame. The first failure stops the loop for good.
pub struct RenderLoop {
    scene: Scene,
    camera: PerspectiveCamera,
    renderer: Box<dyn SceneRenderer>,
    target: ObjectHandle,
    rotation: SharedRotation,
    sink: Option<Box<dyn VideoWriter>>,
    logger: SharedSessionLogger,
    frames_rendered: usize,
    error: Option<String>,
    last_frame: Option<Frame>,
}

impl RenderLoop {
    /// `sink` must already be open at the renderer's output size.
    pub fn new(
        scene: Scene,
        camera: PerspectiveCamera,
        renderer: Box<dyn SceneRenderer>,
        target: ObjectHandle,
        rotation: SharedRotation,
        sink: Box<dyn VideoWriter>,
        logger: SharedSessionLogger,
    ) -> Self {
        Self {
            scene,
            camera,
            renderer,
            target,
            rotation,
            sink: Some(sink),
            logger,
            frames_rendered: 0,
            error: None,
            last_frame: None,
        }
    }

    pub fn run_once(&mut self) -> ControlFlow<()> {
        if self.error.is_some() {
            return ControlFlow::Break(());
        }
        self.scene
            .set_rotation(self.target, Axis::Y, self.rotation.load());

        let start = Instant::now();
        let frame = match self.renderer.render(&self.scene, &self.camera) {
            Ok(frame) => frame,
            Err(e) => return self.fail(format!("render failed: {e}")),
        };
        let render_ms = start.elapsed().as_secs_f64() * 1000.0;

        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.write(&frame) {
                return self.fail(format!("writing rendered frame failed: {e}"));
            }
        }

        self.frames_rendered += 1;
        self.last_frame = Some(frame);
        self.logger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .timing("render", render_ms);
        ControlFlow::Continue(())
    }

    fn fail(&mut self, reason: String) -> ControlFlow<()> {
        log::error!("Render loop stopped: {reason}");
        self.error = Some(reason);
        ControlFlow::Break(())
    }

    /// Finalizes the output video. A close failure is kept as the loop's
    /// error unless an earlier one exists. Idempotent.
    pub fn finish(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.close() {
                log::error!("Failed to finalize rendered video: {e}");
                if self.error.is_none() {
                    self.error = Some(format!("finalizing rendered video failed: {e}"));
                }
            }
        }
    }

    pub fn frames_rendered(&self) -> usize {
        self.frames_rendered
    }

    /// First failure that stopped the loop, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn target(&self) -> ObjectHandle {
        self.target
    }
}
