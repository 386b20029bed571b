use glam::{EulerRot, Mat4, Vec3};

use crate::shared::constants::{TANK_OBJECT_NAME, TOWER_OBJECT_NAME};

/// Primitive shapes the renderers know how to tessellate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Geometry {
    /// Axis-aligned box centered on the object origin.
    Box { width: f32, height: f32, depth: f32 },
    /// Y-axis cylinder centered on the object origin.
    Cylinder {
        radius_top: f32,
        radius_bottom: f32,
        height: f32,
        radial_segments: u32,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// A named mesh with an unlit flat color.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneObject {
    pub name: String,
    pub geometry: Geometry,
    pub color: [u8; 3],
    pub position: Vec3,
    /// Euler angles in radians, applied in XYZ order.
    pub rotation: Vec3,
}

impl SceneObject {
    pub fn new(name: &str, geometry: Geometry, color: [u8; 3]) -> Self {
        Self {
            name: name.to_string(),
            geometry,
            color,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Object-to-world transform: rotate about the origin, then translate.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_euler(
                EulerRot::XYZ,
                self.rotation.x,
                self.rotation.y,
                self.rotation.z,
            )
    }
}

/// Index of an object inside its [`Scene`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectHandle(usize);

#[derive(Clone, Debug, Default)]
pub struct Scene {
    objects: Vec<SceneObject>,
    background: [u8; 3],
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: SceneObject) -> ObjectHandle {
        self.objects.push(object);
        ObjectHandle(self.objects.len() - 1)
    }

    /// First object carrying `name`, if any.
    pub fn object_by_name(&self, name: &str) -> Option<ObjectHandle> {
        self.objects
            .iter()
            .position(|o| o.name == name)
            .map(ObjectHandle)
    }

    pub fn object(&self, handle: ObjectHandle) -> Option<&SceneObject> {
        self.objects.get(handle.0)
    }

    /// Set one Euler component of an object's orientation. Unknown handles
    /// are ignored.
    pub fn set_rotation(&mut self, handle: ObjectHandle, axis: Axis, radians: f64) {
        let Some(object) = self.objects.get_mut(handle.0) else {
            return;
        };
        let angle = radians as f32;
        match axis {
            Axis::X => object.rotation.x = angle,
            Axis::Y => object.rotation.y = angle,
            Axis::Z => object.rotation.z = angle,
        }
    }

    pub fn rotation(&self, handle: ObjectHandle) -> Option<Vec3> {
        self.object(handle).map(|o| o.rotation)
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn background(&self) -> [u8; 3] {
        self.background
    }

    pub fn set_background(&mut self, color: [u8; 3]) {
        self.background = color;
    }
}

/// The demo scene: a green tank at the origin and a red tower behind it.
pub fn create_scene() -> Scene {
    let mut scene = Scene::new();
    scene.add(SceneObject::new(
        TANK_OBJECT_NAME,
        Geometry::Box {
            width: 2.0,
            height: 1.0,
            depth: 1.0,
        },
        [0, 255, 0],
    ));
    scene.add(
        SceneObject::new(
            TOWER_OBJECT_NAME,
            Geometry::Cylinder {
                radius_top: 0.5,
                radius_bottom: 0.5,
                height: 3.0,
                radial_segments: 32,
            },
            [255, 0, 0],
        )
        .at(Vec3::new(0.0, 1.5, -10.0)),
    );
    scene
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_demo_scene_contents() {
        let scene = create_scene();
        assert_eq!(scene.objects().len(), 2);

        let tank = scene.object(scene.object_by_name("Tank").unwrap()).unwrap();
        assert_eq!(tank.color, [0, 255, 0]);
        assert_eq!(tank.position, Vec3::ZERO);

        let tower = scene.object(scene.object_by_name("Tower").unwrap()).unwrap();
        assert_eq!(tower.color, [255, 0, 0]);
        assert_eq!(tower.position, Vec3::new(0.0, 1.5, -10.0));
        assert_eq!(scene.background(), [0, 0, 0]);
    }

    #[test]
    fn test_unknown_name_is_none() {
        assert!(create_scene().object_by_name("Turret").is_none());
    }

    #[rstest]
    #[case(Axis::X, Vec3::new(0.7, 0.0, 0.0))]
    #[case(Axis::Y, Vec3::new(0.0, 0.7, 0.0))]
    #[case(Axis::Z, Vec3::new(0.0, 0.0, 0.7))]
    fn test_set_rotation_touches_one_axis(#[case] axis: Axis, #[case] expected: Vec3) {
        let mut scene = create_scene();
        let tank = scene.object_by_name("Tank").unwrap();
        scene.set_rotation(tank, axis, 0.7);
        assert_eq!(scene.rotation(tank).unwrap(), expected);
    }

    #[test]
    fn test_set_rotation_replaces_previous_angle() {
        let mut scene = create_scene();
        let tank = scene.object_by_name("Tank").unwrap();
        scene.set_rotation(tank, Axis::Y, 1.0);
        scene.set_rotation(tank, Axis::Y, -0.25);
        assert_relative_eq!(scene.rotation(tank).unwrap().y, -0.25);
    }

    #[test]
    fn test_model_matrix_rotates_then_translates() {
        let mut object = SceneObject::new(
            "probe",
            Geometry::Box {
                width: 1.0,
                height: 1.0,
                depth: 1.0,
            },
            [0, 0, 0],
        )
        .at(Vec3::new(0.0, 0.0, -5.0));
        object.rotation.y = std::f32::consts::FRAC_PI_2;

        // +X turns into -Z under a quarter turn about Y
        let p = object.model_matrix().transform_point3(Vec3::X);
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(p.z, -6.0, epsilon = 1e-6);
    }
}
