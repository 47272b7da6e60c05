//! Procedural scenes for demos and tests.

use std::f32::consts::PI;

use glam::{Mat4, Vec3};

use super::{Geometry, NodeKind, ObjectId, SceneError, SceneGraph};

const SPHERE_LAT_DIVS: u32 = 32;
const SPHERE_LON_DIVS: u32 = 32;

/// Axis-aligned cube centred on the origin with per-face normals.
pub fn cube(edge: f32) -> Geometry {
    let h = edge * 0.5;
    // (normal, tangent u, tangent v) per face
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];

    let mut positions = Vec::with_capacity(24);
    let mut normals = Vec::with_capacity(24);
    let mut uvs = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let n = Vec3::from(normal);
        let u = Vec3::from(u);
        let v = Vec3::from(v);
        let base = positions.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let p = (n + u * su + v * sv) * h;
            positions.push(p.to_array());
            normals.push(normal);
            uvs.push([(su + 1.0) * 0.5, (sv + 1.0) * 0.5]);
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    Geometry::new(positions, Some(indices))
        .with_normals(normals)
        .with_uvs(uvs)
}

/// Flat square in the XY plane facing +Z.
pub fn quad(edge: f32) -> Geometry {
    let h = edge * 0.5;
    Geometry::new(
        vec![[-h, -h, 0.0], [h, -h, 0.0], [h, h, 0.0], [-h, h, 0.0]],
        Some(vec![0, 1, 2, 0, 2, 3]),
    )
    .with_normals(vec![[0.0, 0.0, 1.0]; 4])
}

pub fn uv_sphere(radius: f32, lat_divs: u32, lon_divs: u32) -> Geometry {
    let lat_divs = lat_divs.max(2);
    let lon_divs = lon_divs.max(3);
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    for lat in 0..=lat_divs {
        let theta = lat as f32 / lat_divs as f32 * PI;
        let (sin_t, cos_t) = theta.sin_cos();
        for lon in 0..=lon_divs {
            let phi = lon as f32 / lon_divs as f32 * 2.0 * PI;
            let (sin_p, cos_p) = phi.sin_cos();
            let n = Vec3::new(sin_t * cos_p, cos_t, sin_t * sin_p);
            positions.push((n * radius).to_array());
            normals.push(n.to_array());
        }
    }

    let stride = lon_divs + 1;
    let mut indices = Vec::new();
    for lat in 0..lat_divs {
        for lon in 0..lon_divs {
            let a = lat * stride + lon;
            let b = a + stride;
            indices.extend_from_slice(&[a, a + 1, b, a + 1, b + 1, b]);
        }
    }

    Geometry::new(positions, Some(indices)).with_normals(normals)
}

/// `grid_size` x `grid_size` unit cubes laid out on the XY plane.
pub fn box_grid(grid_size: u32, spacing: f32) -> Result<SceneGraph, SceneError> {
    let mut graph = SceneGraph::new();
    let group = graph.add_root(
        ObjectId::new("box-grid"),
        "Box grid",
        Mat4::IDENTITY,
        NodeKind::Transform,
    )?;
    for i in 0..grid_size {
        for j in 0..grid_size {
            let position = Vec3::new(
                -(i as f32) * spacing + spacing / 2.0,
                -(j as f32) * spacing + spacing / 2.0,
                0.0,
            );
            graph.add_child(
                group,
                ObjectId::new(format!("box-{i}-{j}")),
                format!("Box {i},{j}"),
                Mat4::from_translation(position),
                NodeKind::Mesh(cube(1.0)),
            )?;
        }
    }
    Ok(graph)
}

pub fn debug_sphere(at: [f32; 3], radius: f32) -> Result<SceneGraph, SceneError> {
    let mut graph = SceneGraph::new();
    graph.add_root(
        ObjectId::new("debug-sphere"),
        "Debug sphere",
        Mat4::from_translation(Vec3::from(at)),
        NodeKind::Mesh(uv_sphere(radius, SPHERE_LAT_DIVS, SPHERE_LON_DIVS)),
    )?;
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::bounds::bounding_info;

    #[test]
    fn cube_is_well_formed() {
        let geometry = cube(2.0);
        assert_eq!(geometry.vertex_count(), 24);
        assert_eq!(geometry.triangle_count(), 12);
        assert_eq!(geometry.defect(), None);
        let info = bounding_info(&geometry, Mat4::IDENTITY);
        assert!((info.size - 12.0f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn sphere_indices_stay_in_range() {
        let geometry = uv_sphere(1.0, 8, 12);
        assert_eq!(geometry.defect(), None);
        assert_eq!(geometry.triangle_count(), (8 * 12 * 2) as usize);
    }

    #[test]
    fn box_grid_has_one_mesh_per_cell() {
        let graph = box_grid(4, 1.2).unwrap();
        assert_eq!(graph.mesh_count(), 16);
        assert_eq!(graph.roots().len(), 1);
    }
}
