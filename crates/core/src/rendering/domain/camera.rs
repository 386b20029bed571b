use glam::{Mat4, Vec3};

/// Pinhole camera looking down -Z from `position`.
///
/// Projects to wgpu clip space (depth in `[0, 1]`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerspectiveCamera {
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
}

impl PerspectiveCamera {
    pub fn new(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov_y,
            aspect,
            near,
            far,
            position: Vec3::ZERO,
        }
    }

    /// The demo camera for a `width` x `height` viewport.
    pub fn for_viewport(width: u32, height: u32) -> Self {
        let aspect = if height == 0 {
            1.0
        } else {
            width as f32 / height as f32
        };
        Self {
            position: Vec3::new(0.0, 0.0, 20.0),
            ..Self::new(75.0, aspect, 0.1, 1000.0)
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::from_translation(-self.position)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_viewport_camera_defaults() {
        let camera = PerspectiveCamera::for_viewport(800, 600);
        assert_relative_eq!(camera.fov_y, 75.0);
        assert_relative_eq!(camera.aspect, 800.0 / 600.0);
        assert_relative_eq!(camera.near, 0.1);
        assert_relative_eq!(camera.far, 1000.0);
        assert_eq!(camera.position, Vec3::new(0.0, 0.0, 20.0));
    }

    #[test]
    fn test_origin_projects_to_screen_center() {
        let camera = PerspectiveCamera::for_viewport(800, 600);
        let ndc = camera.view_projection().project_point3(Vec3::ZERO);
        assert_relative_eq!(ndc.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(ndc.y, 0.0, epsilon = 1e-6);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_farther_points_have_larger_depth() {
        let camera = PerspectiveCamera::for_viewport(800, 600);
        let vp = camera.view_projection();
        let near = vp.project_point3(Vec3::new(0.0, 0.0, 0.0));
        let far = vp.project_point3(Vec3::new(0.0, 0.0, -10.0));
        assert!(far.z > near.z);
    }

    #[test]
    fn test_zero_height_viewport_does_not_divide_by_zero() {
        let camera = PerspectiveCamera::for_viewport(800, 0);
        assert!(camera.aspect.is_finite());
    }
}
