use crate::rendering::domain::camera::PerspectiveCamera;
use crate::rendering::domain::scene::Scene;
use crate::shared::frame::Frame;

/// Draws a scene from a camera into an RGB frame of fixed size.
///
/// Objects are unlit: every pixel an object covers gets its flat color,
/// nearest surface wins.
pub trait SceneRenderer: Send {
    fn render(
        &mut self,
        scene: &Scene,
        camera: &PerspectiveCamera,
    ) -> Result<Frame, Box<dyn std::error::Error>>;

    /// Output `(width, height)` in pixels.
    fn size(&self) -> (u32, u32);
}
