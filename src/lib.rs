//! Scene consolidation and color-coded GPU picking.
//!
//! A [`scene::SceneGraph`] of many small meshes is merged by [`consolidate`] into a few
//! per-tier batches whose vertices carry an encoded object index. [`pick`] reads that index
//! back from a one-pixel render and resolves it to the original object, and [`render`]
//! drives both passes on wgpu.

pub mod assets;
pub mod consolidate;
pub mod pick;
pub mod render;
pub mod scene;
