pub mod bounds;
pub mod builders;

use glam::{EulerRot, Mat4, Quat, Vec3};
use std::fmt;

pub use bounds::{Aabb, BoundingInfo};

/// Stable opaque identifier assigned by whoever built the graph (usually the loader).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Index of a node inside its owning [`SceneGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Raw triangle geometry in the node's local space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub uvs: Option<Vec<[f32; 2]>>,
    /// Triangle list indices. `None` means every three consecutive vertices form a triangle.
    pub indices: Option<Vec<u32>>,
}

impl Geometry {
    pub fn new(positions: Vec<[f32; 3]>, indices: Option<Vec<u32>>) -> Self {
        Self {
            positions,
            normals: None,
            uvs: None,
            indices,
        }
    }

    pub fn with_normals(mut self, normals: Vec<[f32; 3]>) -> Self {
        self.normals = Some(normals);
        self
    }

    pub fn with_uvs(mut self, uvs: Vec<[f32; 2]>) -> Self {
        self.uvs = Some(uvs);
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of complete triangles; trailing indices that do not form one are ignored.
    pub fn triangle_count(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len() / 3,
            None => self.positions.len() / 3,
        }
    }

    /// Triangle list indices truncated to whole triangles.
    pub fn triangle_indices(&self) -> Vec<u32> {
        let count = self.triangle_count() * 3;
        match &self.indices {
            Some(indices) => indices[..count].to_vec(),
            None => (0..count as u32).collect(),
        }
    }

    /// Explains why the geometry cannot be merged, or `None` when it can.
    pub fn defect(&self) -> Option<GeometryDefect> {
        if self.positions.is_empty() {
            return Some(GeometryDefect::Empty);
        }
        if self.triangle_count() == 0 {
            return Some(GeometryDefect::NoTriangles);
        }
        if let Some(indices) = &self.indices {
            let vertex_count = self.positions.len();
            if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                return Some(GeometryDefect::IndexOutOfRange {
                    index: bad,
                    vertex_count,
                });
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryDefect {
    Empty,
    NoTriangles,
    IndexOutOfRange { index: u32, vertex_count: usize },
}

impl fmt::Display for GeometryDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("no vertices"),
            Self::NoTriangles => f.write_str("no complete triangle"),
            Self::IndexOutOfRange {
                index,
                vertex_count,
            } => write!(f, "index {index} out of range for {vertex_count} vertices"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Transform,
    Mesh(Geometry),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: ObjectId,
    pub name: String,
    pub local: Mat4,
    pub kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        match &self.kind {
            NodeKind::Mesh(geometry) => Some(geometry),
            NodeKind::Transform => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("parent node {0:?} does not exist")]
    UnknownParent(NodeId),
    #[error("scene graph exceeds {} nodes", u32::MAX)]
    TooManyNodes,
}

/// A node visited during traversal together with its composed world transform.
#[derive(Debug, Clone, Copy)]
pub struct Visit<'a> {
    pub id: NodeId,
    pub node: &'a Node,
    pub world: Mat4,
}

/// Owned scene tree. Nodes live in one arena; parents are referenced by index only.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn add_root(
        &mut self,
        id: ObjectId,
        name: impl Into<String>,
        local: Mat4,
        kind: NodeKind,
    ) -> Result<NodeId, SceneError> {
        let node_id = self.push_node(id, name.into(), local, kind, None)?;
        self.roots.push(node_id);
        Ok(node_id)
    }

    pub fn add_child(
        &mut self,
        parent: NodeId,
        id: ObjectId,
        name: impl Into<String>,
        local: Mat4,
        kind: NodeKind,
    ) -> Result<NodeId, SceneError> {
        if parent.index() >= self.nodes.len() {
            return Err(SceneError::UnknownParent(parent));
        }
        let node_id = self.push_node(id, name.into(), local, kind, Some(parent))?;
        self.nodes[parent.index()].children.push(node_id);
        Ok(node_id)
    }

    fn push_node(
        &mut self,
        id: ObjectId,
        name: String,
        local: Mat4,
        kind: NodeKind,
        parent: Option<NodeId>,
    ) -> Result<NodeId, SceneError> {
        let index = u32::try_from(self.nodes.len()).map_err(|_| SceneError::TooManyNodes)?;
        self.nodes.push(Node {
            id,
            name,
            local,
            kind,
            parent,
            children: Vec::new(),
        });
        Ok(NodeId(index))
    }

    /// Composes the node's local transform with all of its ancestors'.
    pub fn world_transform(&self, id: NodeId) -> Option<Mat4> {
        let mut node = self.node(id)?;
        let mut world = node.local;
        while let Some(parent) = node.parent {
            node = self.node(parent)?;
            world = node.local * world;
        }
        Some(world)
    }

    /// Depth-first pre-order walk in child insertion order.
    pub fn traverse(&self) -> Traverse<'_> {
        let stack = self
            .roots
            .iter()
            .rev()
            .map(|&id| (id, Mat4::IDENTITY))
            .collect();
        Traverse { graph: self, stack }
    }

    /// Mesh nodes in traversal order.
    pub fn meshes(&self) -> impl Iterator<Item = (Visit<'_>, &Geometry)> {
        self.traverse()
            .filter_map(|visit| visit.node.geometry().map(|geometry| (visit, geometry)))
    }

    pub fn mesh_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node.kind, NodeKind::Mesh(_)))
            .count()
    }

    /// World-space bounds of every mesh in the graph.
    pub fn bounds(&self) -> Option<Aabb> {
        self.meshes()
            .filter_map(|(visit, geometry)| Aabb::from_geometry(geometry, visit.world))
            .reduce(|acc, aabb| acc.union(&aabb))
    }
}

pub struct Traverse<'a> {
    graph: &'a SceneGraph,
    stack: Vec<(NodeId, Mat4)>,
}

impl<'a> Iterator for Traverse<'a> {
    type Item = Visit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (id, parent_world) = self.stack.pop()?;
        let node = self.graph.node(id)?;
        let world = parent_world * node.local;
        self.stack
            .extend(node.children.iter().rev().map(|&child| (child, world)));
        Some(Visit { id, node, world })
    }
}

/// Position, rotation (degrees, applied Z * Y * X) and scale into one matrix.
pub fn compose_transform(position: [f32; 3], rotation_deg: [f32; 3], scale: [f32; 3]) -> Mat4 {
    let rotation = Quat::from_euler(
        EulerRot::ZYX,
        rotation_deg[2].to_radians(),
        rotation_deg[1].to_radians(),
        rotation_deg[0].to_radians(),
    );
    Mat4::from_scale_rotation_translation(Vec3::from(scale), rotation, Vec3::from(position))
}
