//! glTF/GLB import into a [`SceneGraph`], plus a background loader for the viewer.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use glam::Mat4;

use crate::scene::{Geometry, NodeId, NodeKind, ObjectId, SceneError, SceneGraph};

#[derive(Debug)]
pub struct LoadedAsset {
    pub name: String,
    pub path: Option<PathBuf>,
    pub graph: SceneGraph,
    /// Primitives dropped because they are not triangle lists or have no positions.
    pub skipped_primitives: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to import glTF at {path}: {source}")]
    Import {
        path: String,
        #[source]
        source: gltf::Error,
    },
    #[error("failed to build scene graph: {0}")]
    Scene(#[from] SceneError),
    #[error("asset loader thread failed: {0}")]
    Loader(String),
}

/// Imports a glTF or GLB file, resolving external and embedded buffers.
pub fn load_scene_graph(path: &Path) -> Result<LoadedAsset, AssetError> {
    let (document, buffers, _images) = gltf::import(path).map_err(|source| AssetError::Import {
        path: path.display().to_string(),
        source,
    })?;
    let name = path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("gltf")
        .to_string();
    let mut asset = build_asset(name, &document, &buffers)?;
    asset.path = Some(path.to_path_buf());
    Ok(asset)
}

/// Imports glTF JSON or GLB bytes; buffers must be embedded.
pub fn parse_scene_graph(name: &str, bytes: &[u8]) -> Result<LoadedAsset, AssetError> {
    let (document, buffers, _images) =
        gltf::import_slice(bytes).map_err(|source| AssetError::Import {
            path: name.to_string(),
            source,
        })?;
    build_asset(name.to_string(), &document, &buffers)
}

fn build_asset(
    name: String,
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
) -> Result<LoadedAsset, AssetError> {
    let mut graph = SceneGraph::new();
    let mut skipped_primitives = 0;

    let Some(scene) = document
        .default_scene()
        .or_else(|| document.scenes().next())
    else {
        log::warn!("'{}' has no scenes", name);
        return Ok(LoadedAsset {
            name,
            path: None,
            graph,
            skipped_primitives,
        });
    };

    // Siblings are pushed in reverse so they are created, and therefore ordered, as in the file.
    let mut stack: Vec<(gltf::Node<'_>, Option<NodeId>)> =
        scene.nodes().map(|node| (node, None)).collect();
    stack.reverse();
    while let Some((node, parent)) = stack.pop() {
        let local = Mat4::from_cols_array_2d(&node.transform().matrix());
        let label = node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node {}", node.index()));

        let mut primitives = Vec::new();
        if let Some(mesh) = node.mesh() {
            for primitive in mesh.primitives() {
                match read_primitive(&primitive, buffers) {
                    Some(geometry) => primitives.push((primitive.index(), geometry)),
                    None => skipped_primitives += 1,
                }
            }
        }

        let id = ObjectId::new(format!("node{}", node.index()));
        let single = primitives.len() == 1;
        let kind = if single {
            primitives
                .pop()
                .map_or(NodeKind::Transform, |(_, geometry)| NodeKind::Mesh(geometry))
        } else {
            NodeKind::Transform
        };
        let node_id = match parent {
            Some(parent) => graph.add_child(parent, id, label.clone(), local, kind)?,
            None => graph.add_root(id, label.clone(), local, kind)?,
        };

        for (primitive_index, geometry) in primitives {
            graph.add_child(
                node_id,
                ObjectId::new(format!("node{}/prim{}", node.index(), primitive_index)),
                format!("{label} #{primitive_index}"),
                Mat4::IDENTITY,
                NodeKind::Mesh(geometry),
            )?;
        }

        let first_child = stack.len();
        stack.extend(node.children().map(|child| (child, Some(node_id))));
        stack[first_child..].reverse();
    }

    log::info!(
        "Loaded '{}': {} nodes, {} meshes ({} primitives skipped)",
        name,
        graph.len(),
        graph.mesh_count(),
        skipped_primitives
    );
    Ok(LoadedAsset {
        name,
        path: None,
        graph,
        skipped_primitives,
    })
}

fn read_primitive(
    primitive: &gltf::Primitive<'_>,
    buffers: &[gltf::buffer::Data],
) -> Option<Geometry> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        log::debug!("Skipping primitive with mode {:?}", primitive.mode());
        return None;
    }
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    let indices = reader
        .read_indices()
        .map(|indices| indices.into_u32().collect());

    let mut geometry = Geometry::new(positions, indices);
    if let Some(normals) = reader.read_normals() {
        geometry = geometry.with_normals(normals.collect());
    }
    if let Some(uvs) = reader.read_tex_coords(0) {
        geometry = geometry.with_uvs(uvs.into_f32().collect());
    }
    Some(geometry)
}

type LoadMessage = (u64, Result<LoadedAsset, AssetError>);

/// Loads assets on a worker thread; only the most recent request is delivered.
pub struct AssetLoader {
    tx: Sender<LoadMessage>,
    rx: Receiver<LoadMessage>,
    generation: u64,
    in_flight: Option<PathBuf>,
}

impl Default for AssetLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetLoader {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            generation: 0,
            in_flight: None,
        }
    }

    /// Starts loading `path`, superseding any load still in flight.
    pub fn spawn(&mut self, path: PathBuf) -> Result<(), AssetError> {
        self.generation += 1;
        let generation = self.generation;
        let tx = self.tx.clone();
        let worker_path = path.clone();
        std::thread::Builder::new()
            .name("asset-loader".into())
            .spawn(move || {
                let result = load_scene_graph(&worker_path);
                // The receiver is gone once the viewer shuts down.
                let _ = tx.send((generation, result));
            })
            .map_err(|err| AssetError::Loader(err.to_string()))?;
        log::info!("Loading {}", path.display());
        self.in_flight = Some(path);
        Ok(())
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Returns the result of the latest request once it is ready. Stale results are dropped.
    pub fn poll(&mut self) -> Option<Result<LoadedAsset, AssetError>> {
        loop {
            match self.rx.try_recv() {
                Ok((generation, result)) if generation == self.generation => {
                    self.in_flight = None;
                    return Some(result);
                }
                Ok((generation, _)) => {
                    log::debug!("Dropping superseded load #{generation}");
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidate::consolidate;

    /// One triangle (0,0,0) (1,0,0) (0,1,0) as three little-endian f32 vec3s.
    const TRIANGLE_BUFFER: &str = "AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAA";

    fn sample_gltf() -> String {
        format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [
    {{ "name": "root", "translation": [0.0, 0.0, 5.0], "children": [1, 2] }},
    {{ "name": "single", "mesh": 0 }},
    {{ "name": "multi", "mesh": 1 }}
  ],
  "meshes": [
    {{ "primitives": [{{ "attributes": {{ "POSITION": 0 }} }}] }},
    {{ "primitives": [
      {{ "attributes": {{ "POSITION": 0 }} }},
      {{ "attributes": {{ "POSITION": 0 }}, "mode": 1 }},
      {{ "attributes": {{ "POSITION": 0 }} }}
    ] }}
  ],
  "accessors": [{{
    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
    "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
  }}],
  "bufferViews": [{{ "buffer": 0, "byteLength": 36 }}],
  "buffers": [{{
    "byteLength": 36,
    "uri": "data:application/octet-stream;base64,{TRIANGLE_BUFFER}"
  }}]
}}"#
        )
    }

    #[test]
    fn builds_graph_in_document_order() {
        let asset = parse_scene_graph("sample.gltf", sample_gltf().as_bytes()).unwrap();
        assert_eq!(asset.skipped_primitives, 1);

        let ids: Vec<&str> = asset
            .graph
            .traverse()
            .map(|visit| visit.node.id.as_str())
            .collect();
        assert_eq!(ids, ["node0", "node1", "node2", "node2/prim0", "node2/prim2"]);
        assert_eq!(asset.graph.mesh_count(), 3);

        let (visit, geometry) = asset.graph.meshes().next().unwrap();
        assert_eq!(visit.node.name, "single");
        assert_eq!(geometry.vertex_count(), 3);
        assert_eq!(visit.world.transform_point3(glam::Vec3::X).z, 5.0);
    }

    #[test]
    fn imported_graph_consolidates() {
        let asset = parse_scene_graph("sample.gltf", sample_gltf().as_bytes()).unwrap();
        let scene = consolidate(&asset.graph).unwrap();
        assert_eq!(scene.lookup().len(), 3);
        assert_eq!(scene.stats().triangles, 3);
    }

    #[test]
    fn missing_file_is_import_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_scene_graph(&dir.path().join("absent.glb")).unwrap_err();
        assert!(matches!(err, AssetError::Import { .. }));
    }

    #[test]
    fn background_loader_reports_latest_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.gltf");
        std::fs::write(&path, sample_gltf()).unwrap();

        let mut loader = AssetLoader::new();
        loader.spawn(dir.path().join("absent.gltf")).unwrap();
        loader.spawn(path).unwrap();
        assert!(loader.is_loading());

        let result = loop {
            if let Some(result) = loader.poll() {
                break result;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        };
        let asset = result.unwrap();
        assert_eq!(asset.name, "sample.gltf");
        assert!(asset.path.is_some());
        assert!(!loader.is_loading());
    }
}
