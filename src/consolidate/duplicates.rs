//! Finds meshes that share identical local-space geometry and could be instanced.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::scene::{Geometry, ObjectId, SceneGraph};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DuplicateGroup {
    pub vertex_count: usize,
    pub sample: ObjectId,
    pub duplicates: Vec<ObjectId>,
}

impl DuplicateGroup {
    /// Sample plus duplicates.
    pub fn member_count(&self) -> usize {
        self.duplicates.len() + 1
    }
}

fn same_geometry(a: &Geometry, b: &Geometry) -> bool {
    a.indices == b.indices
        && a.positions.len() == b.positions.len()
        && a
            .positions
            .iter()
            .zip(&b.positions)
            .all(|(p, q)| p.iter().zip(q).all(|(x, y)| x.to_bits() == y.to_bits()))
}

/// Hash of the position bits and indices. Equal geometry always has equal fingerprints.
fn fingerprint(geometry: &Geometry) -> u64 {
    let mut hasher = DefaultHasher::new();
    geometry.positions.len().hash(&mut hasher);
    for position in &geometry.positions {
        for value in position {
            value.to_bits().hash(&mut hasher);
        }
    }
    geometry.indices.hash(&mut hasher);
    hasher.finish()
}

/// Groups non-empty meshes with bit-identical positions and indices.
///
/// Groups are ordered by vertex count, then by first appearance in traversal order.
pub fn find_duplicate_geometries(graph: &SceneGraph) -> Vec<DuplicateGroup> {
    let mut candidates: Vec<(&Geometry, DuplicateGroup)> = Vec::new();
    let mut by_fingerprint: HashMap<u64, Vec<usize>> = HashMap::new();

    for (visit, geometry) in graph.meshes() {
        if geometry.is_empty() {
            continue;
        }
        let slots = by_fingerprint.entry(fingerprint(geometry)).or_default();
        // Fingerprints can collide; only bit-identical geometry joins a group.
        match slots
            .iter()
            .copied()
            .find(|&slot| same_geometry(candidates[slot].0, geometry))
        {
            Some(slot) => candidates[slot].1.duplicates.push(visit.node.id.clone()),
            None => {
                slots.push(candidates.len());
                candidates.push((
                    geometry,
                    DuplicateGroup {
                        vertex_count: geometry.vertex_count(),
                        sample: visit.node.id.clone(),
                        duplicates: Vec::new(),
                    },
                ));
            }
        }
    }

    let mut groups: Vec<DuplicateGroup> = candidates
        .into_iter()
        .map(|(_, group)| group)
        .filter(|group| !group.duplicates.is_empty())
        .collect();
    groups.sort_by_key(|group| group.vertex_count);

    log::debug!("Found {} duplicate geometry groups", groups.len());
    groups
}
