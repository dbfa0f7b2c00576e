//! Procedural meshes owned by the environment modes.

use bytemuck::{Pod, Zeroable};
use std::collections::HashSet;
use std::f32::consts::{PI, TAU};

pub const GROUNDED_SKYBOX_RESOLUTION: u32 = 128;
const TORUS_RADIAL_SEGMENTS: u32 = 12;
const TORUS_TUBULAR_SEGMENTS: u32 = 48;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Unique triangle edges as a line list, for wireframe drawing.
    pub fn wire_indices(&self) -> Vec<u32> {
        let mut seen = HashSet::new();
        let mut lines = Vec::new();
        for tri in self.indices.chunks_exact(3) {
            for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                let key = if a < b { (a, b) } else { (b, a) };
                if key.0 != key.1 && seen.insert(key) {
                    lines.push(key.0);
                    lines.push(key.1);
                }
            }
        }
        lines
    }
}

/// Equirect lookup direction for a texture coordinate; the inverse of the
/// `equirect_uv` mapping in the scene shader.
pub fn equirect_direction(u: f32, v: f32) -> [f32; 3] {
    let azimuth = (u - 0.5) * TAU;
    let theta = v * PI;
    let (sin_theta, cos_theta) = theta.sin_cos();
    [azimuth.cos() * sin_theta, cos_theta, azimuth.sin() * sin_theta]
}

/// Sphere of `radius` whose lower hemisphere is squashed onto a floor at
/// `-height`, so a camera near the origin sees a plausible ground plane.
pub fn grounded_skybox(height: f32, radius: f32, resolution: u32) -> MeshData {
    let columns = resolution.max(2) * 2;
    let rows = resolution.max(2);
    let floor_blend = -height * 1.5;

    let mut vertices = Vec::with_capacity(((columns + 1) * (rows + 1)) as usize);
    for row in 0..=rows {
        let v = row as f32 / rows as f32;
        for column in 0..=columns {
            let u = column as f32 / columns as f32;
            let direction = equirect_direction(u, v);
            let mut position = direction.map(|c| c * radius);
            if position[1] < 0.0 {
                let y = position[1];
                let factor = if y < floor_blend {
                    -height / y
                } else {
                    1.0 - y * y / (3.0 * floor_blend * floor_blend)
                };
                position = position.map(|c| c * factor);
            }
            vertices.push(MeshVertex {
                position,
                // Inward facing; the skybox is unlit so this is informational.
                normal: direction.map(|c| -c),
                uv: [u, v],
            });
        }
    }

    let stride = columns + 1;
    let mut indices = Vec::with_capacity((columns * rows * 6) as usize);
    for row in 0..rows {
        for column in 0..columns {
            let a = row * stride + column;
            let b = a + stride;
            let c = b + 1;
            let d = a + 1;
            if row != 0 {
                indices.extend_from_slice(&[a, b, d]);
            }
            if row != rows - 1 {
                indices.extend_from_slice(&[b, c, d]);
            }
        }
    }

    MeshData { vertices, indices }
}

/// Torus in the XY plane around +Z, like the accent ring.
pub fn torus(radius: f32, tube: f32) -> MeshData {
    let radial = TORUS_RADIAL_SEGMENTS;
    let tubular = TORUS_TUBULAR_SEGMENTS;

    let mut vertices = Vec::with_capacity(((radial + 1) * (tubular + 1)) as usize);
    for j in 0..=radial {
        let v = j as f32 / radial as f32 * TAU;
        for i in 0..=tubular {
            let u = i as f32 / tubular as f32 * TAU;
            let ring = radius + tube * v.cos();
            let position = [ring * u.cos(), ring * u.sin(), tube * v.sin()];
            let center = [radius * u.cos(), radius * u.sin(), 0.0];
            let offset = [
                position[0] - center[0],
                position[1] - center[1],
                position[2] - center[2],
            ];
            let length = (offset[0] * offset[0] + offset[1] * offset[1] + offset[2] * offset[2])
                .sqrt()
                .max(1e-6);
            vertices.push(MeshVertex {
                position,
                normal: offset.map(|c| c / length),
                uv: [i as f32 / tubular as f32, j as f32 / radial as f32],
            });
        }
    }

    let stride = tubular + 1;
    let mut indices = Vec::with_capacity((radial * tubular * 6) as usize);
    for j in 1..=radial {
        for i in 1..=tubular {
            let a = stride * j + i - 1;
            let b = stride * (j - 1) + i - 1;
            let c = stride * (j - 1) + i;
            let d = stride * j + i;
            indices.extend_from_slice(&[a, b, d, b, c, d]);
        }
    }

    MeshData { vertices, indices }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grounded_skybox_floor_sits_at_height() {
        let mesh = grounded_skybox(1.0, 10.0, 16);
        let lowest = mesh
            .vertices
            .iter()
            .map(|vertex| vertex.position[1])
            .fold(f32::INFINITY, f32::min);
        assert!((lowest + 1.0).abs() < 1e-4, "lowest vertex at {lowest}");

        let highest = mesh
            .vertices
            .iter()
            .map(|vertex| vertex.position[1])
            .fold(f32::NEG_INFINITY, f32::max);
        assert!((highest - 10.0).abs() < 1e-4);
    }

    #[test]
    fn grounded_skybox_indices_are_in_range() {
        let mesh = grounded_skybox(1.0, 10.0, 8);
        let count = mesh.vertices.len() as u32;
        assert!(!mesh.indices.is_empty());
        assert_eq!(mesh.indices.len() % 3, 0);
        assert!(mesh.indices.iter().all(|index| *index < count));
    }

    #[test]
    fn equirect_direction_poles_and_seam() {
        let up = equirect_direction(0.3, 0.0);
        assert!((up[1] - 1.0).abs() < 1e-6);
        let down = equirect_direction(0.7, 1.0);
        assert!((down[1] + 1.0).abs() < 1e-6);
        let left = equirect_direction(0.0, 0.5);
        let right = equirect_direction(1.0, 0.5);
        for axis in 0..3 {
            assert!((left[axis] - right[axis]).abs() < 1e-5);
        }
    }

    #[test]
    fn torus_extent_matches_radius_and_tube() {
        let mesh = torus(0.1, 0.015);
        let max_xy = mesh
            .vertices
            .iter()
            .map(|vertex| (vertex.position[0].powi(2) + vertex.position[1].powi(2)).sqrt())
            .fold(0.0f32, f32::max);
        let max_z = mesh
            .vertices
            .iter()
            .map(|vertex| vertex.position[2].abs())
            .fold(0.0f32, f32::max);
        assert!((max_xy - 0.115).abs() < 1e-4);
        assert!((max_z - 0.015).abs() < 1e-4);
    }

    #[test]
    fn wire_indices_deduplicate_shared_edges() {
        let mesh = MeshData {
            vertices: vec![
                MeshVertex {
                    position: [0.0; 3],
                    normal: [0.0, 1.0, 0.0],
                    uv: [0.0; 2],
                };
                4
            ],
            indices: vec![0, 1, 2, 2, 1, 3],
        };
        // Two triangles sharing edge 1-2: five unique edges.
        assert_eq!(mesh.wire_indices().len(), 10);
    }
}
