//! World-space bounding boxes and the scalar "size" used to bucket meshes.

use glam::{Mat4, Vec3};

use super::Geometry;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Degenerate box containing a single point.
    pub fn point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::point(first), |aabb, p| Self {
            min: aabb.min.min(p),
            max: aabb.max.max(p),
        }))
    }

    /// Box around every vertex after applying `world`. `None` for empty geometry.
    pub fn from_geometry(geometry: &Geometry, world: Mat4) -> Option<Self> {
        Self::from_points(
            geometry
                .positions
                .iter()
                .map(|&p| world.transform_point3(Vec3::from(p))),
        )
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Full side lengths along each axis.
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Length of the min-to-max diagonal.
    pub fn diagonal(&self) -> f32 {
        self.extent().length()
    }
}

/// Center and diagonal length of an object's world-space box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingInfo {
    pub center: Vec3,
    pub size: f32,
}

impl BoundingInfo {
    pub fn from_aabb(aabb: &Aabb) -> Self {
        Self {
            center: aabb.center(),
            size: aabb.diagonal(),
        }
    }
}

/// Bounding metrics of `geometry` placed by `world`.
///
/// Empty geometry yields a zero-size box at the transform's origin.
pub fn bounding_info(geometry: &Geometry, world: Mat4) -> BoundingInfo {
    match Aabb::from_geometry(geometry, world) {
        Some(aabb) => BoundingInfo::from_aabb(&aabb),
        None => BoundingInfo {
            center: world.transform_point3(Vec3::ZERO),
            size: 0.0,
        },
    }
}
