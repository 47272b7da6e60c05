//! scenepick - consolidating viewer for large glTF scenes.
//!
//! Without `--headless` this opens a window: drop a glTF/GLB file on it, click to pick an
//! object, drag to orbit and scroll to zoom. With `--headless` it consolidates the input,
//! logs the batch statistics and optionally writes a JSON report.

mod app;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;

use app::{DemoScene, InitialScene, ViewerConfig};
use scenepick::assets::load_scene_graph;
use scenepick::consolidate::duplicates::find_duplicate_geometries;
use scenepick::consolidate::report::{save_report_to_file, ConsolidationReport};
use scenepick::consolidate::{ConsolidateOptions, Consolidator, DEFAULT_BATCH_CAPACITY};
use scenepick::scene::SceneGraph;

#[derive(Parser, Debug)]
#[command(about = "Consolidate glTF scenes into a few draw calls and pick objects by color", version)]
struct Args {
    /// glTF or GLB file to open
    asset: Option<PathBuf>,

    /// Built-in scene to open instead of a file
    #[arg(long, value_enum, conflicts_with = "asset")]
    demo: Option<DemoScene>,

    /// Source meshes per merged batch
    #[arg(long, default_value_t = DEFAULT_BATCH_CAPACITY)]
    batch_capacity: usize,

    /// Consolidate without opening a window
    #[arg(long)]
    headless: bool,

    /// Write a JSON consolidation report (headless only)
    #[arg(long, requires = "headless")]
    report: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    let options = ConsolidateOptions {
        batch_capacity: args.batch_capacity,
        ..ConsolidateOptions::default()
    };

    if args.headless {
        return run_headless(&args, options);
    }

    let initial = match (args.asset, args.demo) {
        (Some(path), _) => Some(InitialScene::Asset(path)),
        (None, Some(demo)) => Some(InitialScene::Demo(demo)),
        (None, None) => None,
    };
    app::run(ViewerConfig {
        initial,
        consolidate: options,
        ..ViewerConfig::default()
    })
}

fn run_headless(args: &Args, options: ConsolidateOptions) -> Result<()> {
    let (name, graph) = load_input(args.asset.as_deref(), args.demo)?;
    let consolidator = Consolidator::new(options).context("invalid consolidation options")?;
    let scene = consolidator
        .run(&graph)
        .with_context(|| format!("consolidating '{name}'"))?;
    let stats = scene.stats();
    log::info!(
        "'{}': {} meshes -> {} draw calls ({} vertices, {} triangles, {} skipped)",
        name,
        stats.source_meshes,
        stats.merged_meshes,
        stats.vertices,
        stats.triangles,
        stats.skipped_meshes
    );
    for tier in &stats.tiers {
        log::info!(
            "  {:>5}: {} meshes in {} batches, {} vertices",
            tier.tier,
            tier.source_meshes,
            tier.merged_meshes,
            tier.vertices
        );
    }
    let Some(path) = &args.report else {
        return Ok(());
    };
    let duplicates = find_duplicate_geometries(&graph);
    if !duplicates.is_empty() {
        let reusable: usize = duplicates.iter().map(|group| group.duplicates.len()).sum();
        log::info!(
            "  {} duplicate geometry groups ({} meshes could be instanced)",
            duplicates.len(),
            reusable
        );
    }
    let report = ConsolidationReport::new(name, &scene, duplicates);
    save_report_to_file(&report, path)
        .with_context(|| format!("writing report to {}", path.display()))?;
    log::info!("Report written to {}", path.display());
    Ok(())
}

fn load_input(asset: Option<&Path>, demo: Option<DemoScene>) -> Result<(String, SceneGraph)> {
    match (asset, demo) {
        (Some(path), _) => {
            let asset = load_scene_graph(path)?;
            Ok((asset.name, asset.graph))
        }
        (None, Some(demo)) => Ok((demo.label().to_string(), demo.build()?)),
        (None, None) => bail!("--headless needs an asset path or --demo"),
    }
}
