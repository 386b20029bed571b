//! Triangle tessellation of scene primitives.

use glam::Vec3;

use super::scene::Geometry;

/// Indexed triangle list in object space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertices of each triangle, in index order.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| {
            [
                self.positions[t[0] as usize],
                self.positions[t[1] as usize],
                self.positions[t[2] as usize],
            ]
        })
    }
}

pub fn tessellate(geometry: &Geometry) -> Mesh {
    match *geometry {
        Geometry::Box {
            width,
            height,
            depth,
        } => box_mesh(width, height, depth),
        Geometry::Cylinder {
            radius_top,
            radius_bottom,
            height,
            radial_segments,
        } => cylinder_mesh(radius_top, radius_bottom, height, radial_segments.max(3)),
    }
}

fn box_mesh(width: f32, height: f32, depth: f32) -> Mesh {
    let (hx, hy, hz) = (width / 2.0, height / 2.0, depth / 2.0);
    let positions = vec![
        Vec3::new(-hx, -hy, hz),
        Vec3::new(hx, -hy, hz),
        Vec3::new(hx, hy, hz),
        Vec3::new(-hx, hy, hz),
        Vec3::new(-hx, -hy, -hz),
        Vec3::new(hx, -hy, -hz),
        Vec3::new(hx, hy, -hz),
        Vec3::new(-hx, hy, -hz),
    ];
    // Counter-clockwise seen from outside
    #[rustfmt::skip]
    let indices = vec![
        0, 1, 2, 0, 2, 3, // +z
        5, 4, 7, 5, 7, 6, // -z
        1, 5, 6, 1, 6, 2, // +x
        4, 0, 3, 4, 3, 7, // -x
        3, 2, 6, 3, 6, 7, // +y
        4, 5, 1, 4, 1, 0, // -y
    ];
    Mesh { positions, indices }
}

fn cylinder_mesh(radius_top: f32, radius_bottom: f32, height: f32, segments: u32) -> Mesh {
    let half = height / 2.0;
    let mut positions = Vec::with_capacity(segments as usize * 2 + 2);

    for i in 0..segments {
        let theta = i as f32 / segments as f32 * std::f32::consts::TAU;
        let (sin, cos) = theta.sin_cos();
        positions.push(Vec3::new(radius_top * sin, half, radius_top * cos));
        positions.push(Vec3::new(radius_bottom * sin, -half, radius_bottom * cos));
    }
    let top_center = positions.len() as u32;
    positions.push(Vec3::new(0.0, half, 0.0));
    let bottom_center = top_center + 1;
    positions.push(Vec3::new(0.0, -half, 0.0));

    let mut indices = Vec::with_capacity(segments as usize * 12);
    for i in 0..segments {
        let top = i * 2;
        let bottom = top + 1;
        let next_top = ((i + 1) % segments) * 2;
        let next_bottom = next_top + 1;

        indices.extend_from_slice(&[top, bottom, next_bottom, top, next_bottom, next_top]);
        indices.extend_from_slice(&[top_center, top, next_top]);
        indices.extend_from_slice(&[bottom_center, next_bottom, bottom]);
    }

    Mesh { positions, indices }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bounds(mesh: &Mesh) -> (Vec3, Vec3) {
        mesh.positions.iter().fold(
            (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
            |(lo, hi), p| (lo.min(*p), hi.max(*p)),
        )
    }

    #[test]
    fn test_box_has_twelve_triangles() {
        let mesh = tessellate(&Geometry::Box {
            width: 2.0,
            height: 1.0,
            depth: 1.0,
        });
        assert_eq!(mesh.positions.len(), 8);
        assert_eq!(mesh.triangle_count(), 12);
    }

    #[test]
    fn test_box_extents_are_centered() {
        let mesh = tessellate(&Geometry::Box {
            width: 2.0,
            height: 1.0,
            depth: 1.0,
        });
        let (lo, hi) = bounds(&mesh);
        assert_eq!(lo, Vec3::new(-1.0, -0.5, -0.5));
        assert_eq!(hi, Vec3::new(1.0, 0.5, 0.5));
    }

    #[test]
    fn test_cylinder_sides_and_caps() {
        let mesh = tessellate(&Geometry::Cylinder {
            radius_top: 0.5,
            radius_bottom: 0.5,
            height: 3.0,
            radial_segments: 32,
        });
        assert_eq!(mesh.positions.len(), 66);
        // two side triangles and one per cap for every segment
        assert_eq!(mesh.triangle_count(), 128);

        let (lo, hi) = bounds(&mesh);
        assert_relative_eq!(lo.y, -1.5);
        assert_relative_eq!(hi.y, 1.5);
        assert_relative_eq!(hi.x, 0.5, epsilon = 1e-3);
    }

    #[test]
    fn test_degenerate_segment_count_is_raised() {
        let mesh = tessellate(&Geometry::Cylinder {
            radius_top: 1.0,
            radius_bottom: 1.0,
            height: 1.0,
            radial_segments: 1,
        });
        assert_eq!(mesh.triangle_count(), 12);
    }

    #[test]
    fn test_indices_in_range() {
        let mesh = tessellate(&Geometry::Cylinder {
            radius_top: 0.2,
            radius_bottom: 0.4,
            height: 2.0,
            radial_segments: 8,
        });
        let count = mesh.positions.len() as u32;
        assert!(mesh.indices.iter().all(|&i| i < count));
        assert_eq!(mesh.triangles().count(), mesh.triangle_count());
    }
}
