//! Baking per-object geometry into world space and concatenating batches.

use glam::{Mat3, Mat4, Vec3};

use super::tier::SizeTier;
use crate::pick::encoding::ObjectIndex;
use crate::scene::Geometry;

/// One vertex of a merged batch. Positions and normals are already in world space.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MergedVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    /// Display tint, RGBA8.
    pub tint: [u8; 4],
    /// Encoded object index, RGBA8 with opaque alpha.
    pub index_color: [u8; 4],
}

/// A cloned source geometry with its transform baked in, ready to be appended to a batch.
#[derive(Debug, Clone)]
pub struct BakedGeometry {
    pub index: ObjectIndex,
    pub vertices: Vec<MergedVertex>,
    pub indices: Vec<u32>,
}

/// Callers filter out geometry with a [`crate::scene::GeometryDefect`] first;
/// indices are trusted to be in range.
pub fn bake(geometry: &Geometry, world: Mat4, index: ObjectIndex, tint: [u8; 4]) -> BakedGeometry {
    let positions: Vec<Vec3> = geometry
        .positions
        .iter()
        .map(|&p| world.transform_point3(Vec3::from(p)))
        .collect();
    let indices = geometry.triangle_indices();

    let normals = match &geometry.normals {
        Some(normals) if normals.len() == positions.len() => {
            transform_normals(normals, world).unwrap_or_else(|| face_normals(&positions, &indices))
        }
        _ => face_normals(&positions, &indices),
    };

    let index_color = index.color().to_rgba();
    let vertices = positions
        .iter()
        .zip(normals)
        .map(|(position, normal)| MergedVertex {
            position: position.to_array(),
            normal: normal.to_array(),
            tint,
            index_color,
        })
        .collect();

    BakedGeometry {
        index,
        vertices,
        indices,
    }
}

/// Applies the inverse-transpose of `world`. `None` when the transform is singular.
fn transform_normals(normals: &[[f32; 3]], world: Mat4) -> Option<Vec<Vec3>> {
    let linear = Mat3::from_mat4(world);
    if linear.determinant().abs() <= f32::EPSILON {
        return None;
    }
    let normal_matrix = linear.inverse().transpose();
    Some(
        normals
            .iter()
            .map(|&n| or_up((normal_matrix * Vec3::from(n)).normalize_or_zero()))
            .collect(),
    )
}

/// Area-weighted vertex normals from world-space triangles.
fn face_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut accum = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let face = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        accum[a] += face;
        accum[b] += face;
        accum[c] += face;
    }
    accum
        .into_iter()
        .map(|n| or_up(n.normalize_or_zero()))
        .collect()
}

fn or_up(n: Vec3) -> Vec3 {
    if n == Vec3::ZERO {
        Vec3::Y
    } else {
        n
    }
}

/// Concatenates baked geometries into one vertex and index buffer, rebasing indices.
pub fn merge(batch: &[BakedGeometry]) -> (Vec<MergedVertex>, Vec<u32>) {
    let vertex_total = batch.iter().map(|baked| baked.vertices.len()).sum();
    let index_total = batch.iter().map(|baked| baked.indices.len()).sum();
    let mut vertices = Vec::with_capacity(vertex_total);
    let mut indices = Vec::with_capacity(index_total);
    for baked in batch {
        let base = vertices.len() as u32;
        vertices.extend_from_slice(&baked.vertices);
        indices.extend(baked.indices.iter().map(|&i| base + i));
    }
    (vertices, indices)
}

/// Hue spread over the tier's population so neighbours in index order look different.
pub fn tint_for(index: ObjectIndex, tier: SizeTier, tier_count: usize) -> [u8; 4] {
    let count = tier_count.max(1) as u32;
    let hue = (index.get() % count) as f32 / count as f32;
    let (saturation, lightness) = tier.tint_saturation_lightness();
    let [r, g, b] = hsl_to_rgb(hue, saturation, lightness);
    [to_u8(r), to_u8(g), to_u8(b), 0xFF]
}

fn to_u8(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> [f32; 3] {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = h.rem_euclid(1.0) * 6.0;
    let x = c * (1.0 - (hp.rem_euclid(2.0) - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    [r + m, g + m, b + m]
}
