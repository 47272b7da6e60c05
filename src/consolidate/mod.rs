//! Merges a scene graph into a handful of per-tier batches while keeping every
//! original mesh addressable through an encoded per-vertex object index.

pub mod duplicates;
pub mod lookup;
pub mod merge;
pub mod report;
pub mod tier;

use glam::{Mat4, Vec3};

use crate::pick::encoding::{ObjectIndex, MAX_OBJECT_INDEX};
use crate::scene::bounds::{bounding_info, Aabb, BoundingInfo};
use crate::scene::{Geometry, Node, SceneGraph};

pub use lookup::{LookupTable, ObjectInfo};
pub use merge::MergedVertex;
pub use tier::SizeTier;

/// Source meshes per merged batch before a flush is forced.
pub const DEFAULT_BATCH_CAPACITY: usize = 10_000;

/// wgpu's default `max_buffer_size`.
pub const DEFAULT_MAX_BATCH_BYTES: u64 = 256 << 20;

#[derive(Debug, thiserror::Error)]
pub enum ConsolidateError {
    #[error("{count} indexable meshes exceed the {max} object indices a 24-bit pick color can hold")]
    TooManyObjects { count: usize, max: u32 },
    #[error("batch capacity must be at least one source mesh")]
    InvalidBatchCapacity,
    #[error("batch byte limit must be non-zero")]
    InvalidBatchBytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsolidateOptions {
    pub batch_capacity: usize,
    /// Upper bound on the vertex or index buffer of one merged mesh. A single source mesh
    /// larger than this still gets a batch of its own.
    pub max_batch_bytes: u64,
}

impl Default for ConsolidateOptions {
    fn default() -> Self {
        Self {
            batch_capacity: DEFAULT_BATCH_CAPACITY,
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
        }
    }
}

impl ConsolidateOptions {
    /// Clamps the batch byte limit to a device's `max_buffer_size`.
    pub fn with_buffer_limit(self, max_buffer_size: u64) -> Self {
        Self {
            max_batch_bytes: self.max_batch_bytes.min(max_buffer_size),
            ..self
        }
    }
}

/// One draw call worth of world-space geometry.
#[derive(Debug, Clone)]
pub struct MergedMesh {
    pub tier: SizeTier,
    /// Flush number within the tier.
    pub batch: usize,
    pub vertices: Vec<MergedVertex>,
    pub indices: Vec<u32>,
    /// Object indices merged into this batch, in assignment order.
    pub sources: Vec<ObjectIndex>,
}

impl MergedMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TierStats {
    pub tier: SizeTier,
    pub source_meshes: usize,
    pub merged_meshes: usize,
    pub vertices: usize,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConsolidationStats {
    pub source_meshes: usize,
    pub skipped_meshes: usize,
    pub merged_meshes: usize,
    pub vertices: usize,
    pub triangles: usize,
    pub tiers: Vec<TierStats>,
}

/// Everything the renderer and picker need after consolidation.
#[derive(Debug, Clone, Default)]
pub struct ConsolidatedScene {
    meshes: Vec<MergedMesh>,
    lookup: LookupTable,
    bounds: Option<Aabb>,
    stats: ConsolidationStats,
}

impl ConsolidatedScene {
    pub fn meshes(&self) -> &[MergedMesh] {
        &self.meshes
    }

    pub fn lookup(&self) -> &LookupTable {
        &self.lookup
    }

    /// World-space bounds of all merged geometry.
    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    pub fn stats(&self) -> &ConsolidationStats {
        &self.stats
    }

    pub fn draw_calls(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

struct SourceMesh<'a> {
    node: &'a Node,
    geometry: &'a Geometry,
    world: Mat4,
    bounds: BoundingInfo,
}

/// Consolidates with default options.
pub fn consolidate(graph: &SceneGraph) -> Result<ConsolidatedScene, ConsolidateError> {
    Consolidator::new(ConsolidateOptions::default())?.run(graph)
}

pub struct Consolidator {
    options: ConsolidateOptions,
}

impl Consolidator {
    pub fn new(options: ConsolidateOptions) -> Result<Self, ConsolidateError> {
        if options.batch_capacity == 0 {
            return Err(ConsolidateError::InvalidBatchCapacity);
        }
        if options.max_batch_bytes == 0 {
            return Err(ConsolidateError::InvalidBatchBytes);
        }
        Ok(Self { options })
    }

    pub fn options(&self) -> ConsolidateOptions {
        self.options
    }

    pub fn run(&self, graph: &SceneGraph) -> Result<ConsolidatedScene, ConsolidateError> {
        let (tiers, skipped) = collect_sources(graph);
        let total: usize = tiers.iter().map(Vec::len).sum();
        check_index_capacity(total)?;

        let capacity = self.options.batch_capacity;
        let max_bytes = self.options.max_batch_bytes;
        let mut lookup = LookupTable::with_capacity(total);
        let mut meshes = Vec::new();
        let mut tier_stats = Vec::new();
        let mut next = Some(ObjectIndex::FIRST);

        for tier in SizeTier::ALL {
            let sources = &tiers[tier.slot()];
            if sources.is_empty() {
                continue;
            }
            let first_mesh = meshes.len();
            let mut batch = Vec::with_capacity(capacity.min(sources.len()));
            let mut pending = BatchBytes::default();
            for source in sources {
                let index = next.ok_or(ConsolidateError::TooManyObjects {
                    count: total,
                    max: MAX_OBJECT_INDEX,
                })?;
                next = index.next();

                let tint = merge::tint_for(index, tier, sources.len());
                let baked = merge::bake(source.geometry, source.world, index, tint);
                let bytes = BatchBytes::of(&baked);
                if !batch.is_empty() && pending.add(bytes).exceeds(max_bytes) {
                    meshes.push(flush(tier, meshes.len() - first_mesh, &mut batch));
                    pending = BatchBytes::default();
                }
                pending = pending.add(bytes);
                batch.push(baked);
                lookup.push(ObjectInfo {
                    index,
                    original_id: source.node.id.clone(),
                    name: source.node.name.clone(),
                    tier,
                    bounding_center: source.bounds.center.to_array(),
                    bounding_size: source.bounds.size,
                });

                if batch.len() == capacity {
                    meshes.push(flush(tier, meshes.len() - first_mesh, &mut batch));
                    pending = BatchBytes::default();
                }
            }
            if !batch.is_empty() {
                meshes.push(flush(tier, meshes.len() - first_mesh, &mut batch));
            }

            let produced = &meshes[first_mesh..];
            tier_stats.push(TierStats {
                tier,
                source_meshes: sources.len(),
                merged_meshes: produced.len(),
                vertices: produced.iter().map(|mesh| mesh.vertices.len()).sum(),
            });
            log::debug!(
                "tier {}: {} source meshes -> {} batches",
                tier,
                sources.len(),
                produced.len()
            );
        }

        let bounds = Aabb::from_points(
            meshes
                .iter()
                .flat_map(|mesh| mesh.vertices.iter())
                .map(|vertex| Vec3::from(vertex.position)),
        );
        let stats = ConsolidationStats {
            source_meshes: total,
            skipped_meshes: skipped,
            merged_meshes: meshes.len(),
            vertices: meshes.iter().map(|mesh| mesh.vertices.len()).sum(),
            triangles: meshes.iter().map(MergedMesh::triangle_count).sum(),
            tiers: tier_stats,
        };
        log::info!(
            "Consolidated {} meshes into {} draw calls ({} skipped, {} vertices)",
            stats.source_meshes,
            stats.merged_meshes,
            stats.skipped_meshes,
            stats.vertices
        );

        Ok(ConsolidatedScene {
            meshes,
            lookup,
            bounds,
            stats,
        })
    }
}

/// Mesh nodes grouped per tier in traversal order, plus the number skipped as unusable.
fn collect_sources(graph: &SceneGraph) -> ([Vec<SourceMesh<'_>>; 3], usize) {
    let mut tiers: [Vec<SourceMesh<'_>>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    let mut skipped = 0;
    for (visit, geometry) in graph.meshes() {
        if let Some(defect) = geometry.defect() {
            log::debug!("Skipping mesh '{}': {}", visit.node.id, defect);
            skipped += 1;
            continue;
        }
        let bounds = bounding_info(geometry, visit.world);
        tiers[SizeTier::classify(bounds.size).slot()].push(SourceMesh {
            node: visit.node,
            geometry,
            world: visit.world,
            bounds,
        });
    }
    (tiers, skipped)
}

fn check_index_capacity(count: usize) -> Result<(), ConsolidateError> {
    if count > MAX_OBJECT_INDEX as usize {
        return Err(ConsolidateError::TooManyObjects {
            count,
            max: MAX_OBJECT_INDEX,
        });
    }
    Ok(())
}

fn flush(tier: SizeTier, batch_number: usize, batch: &mut Vec<merge::BakedGeometry>) -> MergedMesh {
    let (vertices, indices) = merge::merge(batch);
    let sources = batch.iter().map(|baked| baked.index).collect();
    batch.clear();
    MergedMesh {
        tier,
        batch: batch_number,
        vertices,
        indices,
        sources,
    }
}

/// GPU buffer sizes a batch will need once merged.
#[derive(Debug, Clone, Copy, Default)]
struct BatchBytes {
    vertex: u64,
    index: u64,
}

impl BatchBytes {
    fn of(baked: &merge::BakedGeometry) -> Self {
        Self {
            vertex: (baked.vertices.len() * std::mem::size_of::<MergedVertex>()) as u64,
            index: (baked.indices.len() * std::mem::size_of::<u32>()) as u64,
        }
    }

    fn add(self, other: Self) -> Self {
        Self {
            vertex: self.vertex + other.vertex,
            index: self.index + other.index,
        }
    }

    fn exceeds(self, limit: u64) -> bool {
        self.vertex > limit || self.index > limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pick::encoding::{decode, IndexColor};
    use crate::scene::builders::cube;
    use crate::scene::{NodeKind, ObjectId};
    use std::collections::HashSet;

    /// Cube whose diagonal equals `size`.
    fn cube_with_diagonal(size: f32) -> Geometry {
        cube(size / 3.0f32.sqrt())
    }

    fn scene_with_sizes(sizes: &[f32]) -> SceneGraph {
        let mut graph = SceneGraph::new();
        let root = graph
            .add_root(ObjectId::new("root"), "root", Mat4::IDENTITY, NodeKind::Transform)
            .unwrap();
        for (i, &size) in sizes.iter().enumerate() {
            graph
                .add_child(
                    root,
                    ObjectId::new(format!("mesh-{i}")),
                    format!("Mesh {i}"),
                    Mat4::from_translation(Vec3::new(i as f32 * 20.0, 0.0, 0.0)),
                    NodeKind::Mesh(cube_with_diagonal(size)),
                )
                .unwrap();
        }
        graph
    }

    #[test]
    fn three_tier_example() {
        let graph = scene_with_sizes(&[0.01, 0.03, 10.0]);
        let scene = consolidate(&graph).unwrap();

        assert_eq!(scene.meshes().len(), 3);
        let tiers: Vec<SizeTier> = scene.meshes().iter().map(|mesh| mesh.tier).collect();
        assert_eq!(tiers, SizeTier::ALL);

        assert_eq!(scene.lookup().len(), 3);
        let ids: Vec<(u32, &str)> = scene
            .lookup()
            .iter()
            .map(|info| (info.index.get(), info.original_id.as_str()))
            .collect();
        assert_eq!(ids, [(1, "mesh-0"), (2, "mesh-1"), (3, "mesh-2")]);
        assert_eq!(scene.lookup().get(ObjectIndex::new(3).unwrap()).unwrap().tier, SizeTier::Large);
    }

    #[test]
    fn empty_and_malformed_meshes_take_no_index() {
        let mut graph = scene_with_sizes(&[1.0]);
        let root = graph.roots()[0];
        graph
            .add_child(root, ObjectId::new("empty"), "empty", Mat4::IDENTITY, NodeKind::Mesh(Geometry::default()))
            .unwrap();
        graph
            .add_child(
                root,
                ObjectId::new("broken"),
                "broken",
                Mat4::IDENTITY,
                NodeKind::Mesh(Geometry::new(vec![[0.0; 3]; 3], Some(vec![0, 1, 9]))),
            )
            .unwrap();
        graph
            .add_child(root, ObjectId::new("last"), "last", Mat4::IDENTITY, NodeKind::Mesh(cube(1.0)))
            .unwrap();

        let scene = consolidate(&graph).unwrap();
        assert_eq!(scene.stats().skipped_meshes, 2);
        assert_eq!(scene.lookup().len(), 2);
        let indices: Vec<u32> = scene.lookup().iter().map(|info| info.index.get()).collect();
        assert_eq!(indices, [1, 2]);
        assert!(scene.lookup().find_by_id(&ObjectId::new("empty")).is_none());
        assert_eq!(scene.lookup().find_by_id(&ObjectId::new("last")).unwrap().index.get(), 2);
    }

    #[test]
    fn indices_are_dense_and_unique() {
        let sizes: Vec<f32> = (0..50).map(|i| [0.01, 0.04, 2.0][i % 3]).collect();
        let scene = consolidate(&scene_with_sizes(&sizes)).unwrap();
        let indices: HashSet<u32> = scene.lookup().iter().map(|info| info.index.get()).collect();
        assert_eq!(indices.len(), 50);
        assert_eq!(indices, (1..=50).collect());
    }

    #[test]
    fn every_mesh_lands_in_exactly_its_tier() {
        let sizes = [0.01, 0.2, 0.03, 5.0, 0.02, 0.049, 0.05];
        let scene = consolidate(&scene_with_sizes(&sizes)).unwrap();

        let mut seen = HashSet::new();
        for mesh in scene.meshes() {
            for &index in &mesh.sources {
                assert!(seen.insert(index), "{index} merged twice");
                let info = scene.lookup().get(index).unwrap();
                assert_eq!(SizeTier::classify(info.bounding_size), mesh.tier);
            }
            // Every vertex carries an index listed as a source of this batch.
            for vertex in &mesh.vertices {
                let raw = decode(IndexColor::from_rgba(vertex.index_color));
                assert!(mesh.sources.iter().any(|index| index.get() == raw));
            }
        }
        assert_eq!(seen.len(), sizes.len());
    }

    #[test]
    fn flushes_at_capacity() {
        let sizes = vec![1.0; 7];
        let consolidator = Consolidator::new(ConsolidateOptions {
            batch_capacity: 3,
            ..ConsolidateOptions::default()
        })
        .unwrap();
        let scene = consolidator.run(&scene_with_sizes(&sizes)).unwrap();
        let counts: Vec<usize> = scene.meshes().iter().map(|mesh| mesh.sources.len()).collect();
        assert_eq!(counts, [3, 3, 1]);
        let batches: Vec<usize> = scene.meshes().iter().map(|mesh| mesh.batch).collect();
        assert_eq!(batches, [0, 1, 2]);
        assert_eq!(scene.stats().tiers[0].merged_meshes, 3);
    }

    #[test]
    fn flushes_before_vertex_buffer_outgrows_the_byte_limit() {
        // 24 vertices of 32 bytes per cube; three cubes fit.
        let options = ConsolidateOptions::default().with_buffer_limit(3 * 24 * 32);
        let scene = Consolidator::new(options)
            .unwrap()
            .run(&scene_with_sizes(&[1.0; 10]))
            .unwrap();
        let counts: Vec<usize> = scene.meshes().iter().map(|mesh| mesh.sources.len()).collect();
        assert_eq!(counts, [3, 3, 3, 1]);
        for mesh in scene.meshes() {
            let bytes = mesh.vertices.len() * std::mem::size_of::<MergedVertex>();
            assert!(bytes as u64 <= options.max_batch_bytes);
        }
        assert_eq!(scene.lookup().len(), 10);
    }

    #[test]
    fn oversized_mesh_gets_its_own_batch() {
        let options = ConsolidateOptions::default().with_buffer_limit(100);
        let scene = Consolidator::new(options)
            .unwrap()
            .run(&scene_with_sizes(&[1.0, 1.0, 1.0]))
            .unwrap();
        let counts: Vec<usize> = scene.meshes().iter().map(|mesh| mesh.sources.len()).collect();
        assert_eq!(counts, [1, 1, 1]);
    }

    #[test]
    fn buffer_limit_only_tightens() {
        let options = ConsolidateOptions::default();
        assert_eq!(options.with_buffer_limit(u64::MAX), options);
        assert_eq!(options.with_buffer_limit(1024).max_batch_bytes, 1024);
    }

    #[test]
    fn single_mesh_tier_still_merges() {
        let scene = consolidate(&scene_with_sizes(&[3.0])).unwrap();
        assert_eq!(scene.meshes().len(), 1);
        let mesh = &scene.meshes()[0];
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.triangle_count(), 12);
    }

    #[test]
    fn world_transform_is_baked() {
        let scene = consolidate(&scene_with_sizes(&[1.0, 1.0])).unwrap();
        let mesh = &scene.meshes()[0];
        let second = &mesh.vertices[24..];
        assert!(second.iter().all(|vertex| vertex.position[0] > 19.0));
        let bounds = scene.bounds().unwrap();
        assert!(bounds.max.x > 20.0);
    }

    #[test]
    fn reconsolidation_is_deterministic() {
        let graph = scene_with_sizes(&[0.01, 1.0, 0.03, 0.02, 7.0]);
        let first = consolidate(&graph).unwrap();
        let second = consolidate(&graph).unwrap();
        assert_eq!(first.lookup(), second.lookup());
        assert_eq!(first.meshes().len(), second.meshes().len());
        for (a, b) in first.meshes().iter().zip(second.meshes()) {
            assert_eq!(a.tier, b.tier);
            assert_eq!(a.vertices, b.vertices);
            assert_eq!(a.indices, b.indices);
        }
    }

    #[test]
    fn empty_graph_consolidates_to_nothing() {
        let scene = consolidate(&SceneGraph::new()).unwrap();
        assert!(scene.is_empty());
        assert!(scene.lookup().is_empty());
        assert!(scene.bounds().is_none());
    }

    #[test]
    fn rejects_zero_capacity_and_overflow() {
        assert!(matches!(
            Consolidator::new(ConsolidateOptions {
                batch_capacity: 0,
                ..ConsolidateOptions::default()
            }),
            Err(ConsolidateError::InvalidBatchCapacity)
        ));
        assert!(matches!(
            Consolidator::new(ConsolidateOptions::default().with_buffer_limit(0)),
            Err(ConsolidateError::InvalidBatchBytes)
        ));
        assert!(check_index_capacity(MAX_OBJECT_INDEX as usize).is_ok());
        assert!(matches!(
            check_index_capacity(MAX_OBJECT_INDEX as usize + 1),
            Err(ConsolidateError::TooManyObjects { .. })
        ));
    }
}
