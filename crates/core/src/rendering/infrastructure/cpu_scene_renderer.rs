use glam::{Mat4, Vec3};

use crate::rendering::domain::camera::PerspectiveCamera;
use crate::rendering::domain::geometry::{tessellate, Mesh};
use crate::rendering::domain::scene::{Geometry, Scene};
use crate::rendering::domain::scene_renderer::SceneRenderer;
use crate::shared::frame::Frame;

/// Z-buffered triangle rasterizer used when no GPU adapter exists.
///
/// Samples pixel centers with edge functions; triangles with a vertex
/// outside the near/far range are dropped rather than clipped.
pub struct CpuSceneRenderer {
    width: u32,
    height: u32,
    depth: Vec<f32>,
    meshes: Vec<(Geometry, Mesh)>,
    frame_index: usize,
}

impl CpuSceneRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: vec![f32::INFINITY; width as usize * height as usize],
            meshes: Vec::new(),
            frame_index: 0,
        }
    }

    fn mesh_for(&mut self, slot: usize, geometry: &Geometry) -> &Mesh {
        if slot >= self.meshes.len() {
            self.meshes.push((*geometry, tessellate(geometry)));
        } else if self.meshes[slot].0 != *geometry {
            self.meshes[slot] = (*geometry, tessellate(geometry));
        }
        &self.meshes[slot].1
    }
}

impl SceneRenderer for CpuSceneRenderer {
    fn render(
        &mut self,
        scene: &Scene,
        camera: &PerspectiveCamera,
    ) -> Result<Frame, Box<dyn std::error::Error>> {
        let (width, height) = (self.width, self.height);
        let mut frame = Frame::filled(width, height, scene.background(), self.frame_index);
        self.frame_index += 1;

        let mut depth = std::mem::take(&mut self.depth);
        depth.fill(f32::INFINITY);

        let view_projection = camera.view_projection();
        for (slot, object) in scene.objects().iter().enumerate() {
            let mvp = view_projection * object.model_matrix();
            let mesh = self.mesh_for(slot, &object.geometry);
            let screen: Vec<Option<Vec3>> = mesh
                .positions
                .iter()
                .map(|p| to_screen(&mvp, *p, width, height))
                .collect();

            for tri in mesh.indices.chunks_exact(3) {
                let (Some(a), Some(b), Some(c)) = (
                    screen[tri[0] as usize],
                    screen[tri[1] as usize],
                    screen[tri[2] as usize],
                ) else {
                    continue;
                };
                fill_triangle(&mut frame, &mut depth, [a, b, c], object.color);
            }
        }

        self.depth = depth;
        Ok(frame)
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Object-space point to `(pixel x, pixel y, depth)`, or `None` when it
/// falls outside the depth range.
fn to_screen(mvp: &Mat4, point: Vec3, width: u32, height: u32) -> Option<Vec3> {
    let clip = *mvp * point.extend(1.0);
    if clip.w <= f32::EPSILON {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    if !(0.0..=1.0).contains(&ndc.z) {
        return None;
    }
    Some(Vec3::new(
        (ndc.x * 0.5 + 0.5) * width as f32,
        (0.5 - ndc.y * 0.5) * height as f32,
        ndc.z,
    ))
}

fn edge(a: Vec3, b: Vec3, px: f32, py: f32) -> f32 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

fn fill_triangle(frame: &mut Frame, depth: &mut [f32], [a, b, c]: [Vec3; 3], color: [u8; 3]) {
    let area = edge(a, b, c.x, c.y);
    if area.abs() <= f32::EPSILON {
        return;
    }

    let width = frame.width() as i64;
    let height = frame.height() as i64;
    let min_x = (a.x.min(b.x).min(c.x).floor() as i64).max(0);
    let max_x = (a.x.max(b.x).max(c.x).ceil() as i64).min(width - 1);
    let min_y = (a.y.min(b.y).min(c.y).floor() as i64).max(0);
    let max_y = (a.y.max(b.y).max(c.y).ceil() as i64).min(height - 1);

    let data = frame.data_mut();
    for y in min_y..=max_y {
        let py = y as f32 + 0.5;
        for x in min_x..=max_x {
            let px = x as f32 + 0.5;
            // Dividing by the signed area accepts either winding
            let w0 = edge(b, c, px, py) / area;
            let w1 = edge(c, a, px, py) / area;
            let w2 = edge(a, b, px, py) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }

            let z = w0 * a.z + w1 * b.z + w2 * c.z;
            let i = (y * width + x) as usize;
            if z >= depth[i] {
                continue;
            }
            depth[i] = z;
            data[i * 3..i * 3 + 3].copy_from_slice(&color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::domain::scene::{create_scene, Axis};

    const GREEN: [u8; 3] = [0, 255, 0];
    const RED: [u8; 3] = [255, 0, 0];
    const BLACK: [u8; 3] = [0, 0, 0];

    fn render_demo(rotation: f64) -> Frame {
        let mut scene = create_scene();
        let tank = scene.object_by_name("Tank").unwrap();
        scene.set_rotation(tank, Axis::Y, rotation);
        let camera = PerspectiveCamera::for_viewport(320, 240);
        CpuSceneRenderer::new(320, 240)
            .render(&scene, &camera)
            .unwrap()
    }

    #[test]
    fn test_output_matches_requested_size() {
        let frame = render_demo(0.0);
        assert_eq!((frame.width(), frame.height(), frame.channels()), (320, 240, 3));
    }

    #[test]
    fn test_tank_at_center_background_elsewhere() {
        let frame = render_demo(0.0);
        assert_eq!(frame.pixel(160, 120), Some(GREEN));
        assert_eq!(frame.pixel(5, 5), Some(BLACK));
        assert_eq!(frame.pixel(310, 230), Some(BLACK));
    }

    #[test]
    fn test_tower_visible_above_tank() {
        let frame = render_demo(0.0);
        assert_eq!(frame.pixel(160, 110), Some(RED));
    }

    #[test]
    fn test_quarter_turn_narrows_tank_silhouette() {
        // 2-unit wide side faces the camera at rest, 1-unit side after a quarter turn
        assert_eq!(render_demo(0.0).pixel(166, 120), Some(GREEN));
        assert_eq!(
            render_demo(std::f64::consts::FRAC_PI_2).pixel(166, 120),
            Some(BLACK)
        );
    }

    #[test]
    fn test_nearer_object_wins_depth_test() {
        let frame = render_demo(0.0);
        // tower passes behind the tank's top edge
        assert_eq!(frame.pixel(160, 118), Some(GREEN));
    }

    #[test]
    fn test_frame_indices_increase() {
        let scene = create_scene();
        let camera = PerspectiveCamera::for_viewport(32, 24);
        let mut renderer = CpuSceneRenderer::new(32, 24);
        assert_eq!(renderer.render(&scene, &camera).unwrap().index(), 0);
        assert_eq!(renderer.render(&scene, &camera).unwrap().index(), 1);
        assert_eq!(renderer.size(), (32, 24));
    }

    #[test]
    fn test_empty_scene_is_background() {
        let mut scene = Scene::new();
        scene.set_background([10, 20, 30]);
        let camera = PerspectiveCamera::for_viewport(16, 16);
        let frame = CpuSceneRenderer::new(16, 16).render(&scene, &camera).unwrap();
        assert!(frame.data().chunks_exact(3).all(|p| p == [10, 20, 30]));
    }
}
