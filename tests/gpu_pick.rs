use glam::{Mat4, Vec3};

use scenepick::consolidate::{consolidate, ConsolidateOptions, Consolidator};
use scenepick::pick::{PickTarget, PickingEngine, RowOrder};
use scenepick::render::{capture_gpu_errors, Camera, GpuContext, GpuPickTarget, SceneBuffers};
use scenepick::scene::builders::{box_grid, quad};
use scenepick::scene::{NodeKind, ObjectId, SceneGraph};

const SIZE: u32 = 64;

/// Three unit quads facing the camera: left, right and above center.
fn three_quads() -> SceneGraph {
    let mut graph = SceneGraph::new();
    for (id, at) in [
        ("left", Vec3::new(-1.0, 0.0, 0.0)),
        ("right", Vec3::new(1.0, 0.0, 0.0)),
        ("top", Vec3::new(0.0, 1.2, 0.0)),
    ] {
        graph
            .add_root(
                ObjectId::new(id),
                id,
                Mat4::from_translation(at),
                NodeKind::Mesh(quad(1.0)),
            )
            .unwrap();
    }
    graph
}

fn camera() -> Camera {
    Camera {
        eye: Vec3::new(0.0, 0.0, 5.0),
        target: Vec3::ZERO,
        aspect: 1.0,
        near: 0.1,
        far: 100.0,
        ..Camera::default()
    }
}

fn setup() -> Option<(GpuContext, GpuPickTarget)> {
    let context = match GpuContext::headless() {
        Ok(context) => context,
        Err(err) => {
            eprintln!("skipping GPU pick test: {err}");
            return None;
        }
    };
    let target = GpuPickTarget::new(context.device.clone(), context.queue.clone(), SIZE, SIZE)
        .expect("pick target");
    Some((context, target))
}

#[test]
fn picks_objects_through_the_gpu() {
    let Some((context, target)) = setup() else {
        return;
    };
    assert_eq!(target.row_order(), RowOrder::TopDown);

    let scene = consolidate(&three_quads()).unwrap();
    assert_eq!(scene.draw_calls(), 1);
    let buffers = SceneBuffers::upload(&context.device, &context.queue, &scene).unwrap();
    let view_proj = camera().view_proj();
    let mut engine = PickingEngine::with_target(target);

    let hit = engine
        .pick(&buffers, scene.lookup(), view_proj, 16.0, 32.0)
        .expect("left quad");
    assert_eq!(hit.info.original_id.as_str(), "left");

    let hit = engine
        .pick(&buffers, scene.lookup(), view_proj, 48.0, 32.0)
        .expect("right quad");
    assert_eq!(hit.info.original_id.as_str(), "right");
    assert_eq!(engine.selection().selected(), Some(hit.index));

    // Upper half of the window must land on the upper quad.
    let hit = engine
        .pick(&buffers, scene.lookup(), view_proj, 32.0, 16.0)
        .expect("top quad");
    assert_eq!(hit.info.original_id.as_str(), "top");
}

#[test]
fn background_pixel_clears_selection() {
    let Some((context, target)) = setup() else {
        return;
    };
    let scene = consolidate(&three_quads()).unwrap();
    let buffers = SceneBuffers::upload(&context.device, &context.queue, &scene).unwrap();
    let view_proj = camera().view_proj();
    let mut engine = PickingEngine::with_target(target);

    assert!(engine
        .pick(&buffers, scene.lookup(), view_proj, 16.0, 32.0)
        .is_some());
    assert!(engine
        .pick(&buffers, scene.lookup(), view_proj, 32.0, 56.0)
        .is_none());
    assert_eq!(engine.selection().selected(), None);

    // Outside the target entirely.
    assert!(engine
        .pick(&buffers, scene.lookup(), view_proj, 200.0, 10.0)
        .is_none());
}

#[test]
fn resized_target_still_picks() {
    let Some((context, mut target)) = setup() else {
        return;
    };
    target.resize(128, 128).unwrap();
    assert_eq!(target.extent(), (128, 128));

    let scene = consolidate(&three_quads()).unwrap();
    let buffers = SceneBuffers::upload(&context.device, &context.queue, &scene).unwrap();
    let mut engine = PickingEngine::with_target(target);
    let hit = engine
        .pick(&buffers, scene.lookup(), camera().view_proj(), 96.0, 64.0)
        .expect("right quad");
    assert_eq!(hit.info.original_id.as_str(), "right");
}

/// A small quad one unit in front of a larger one, covering its right edge.
fn overlapping_quads(near_first: bool) -> SceneGraph {
    let far = ("far", Vec3::new(0.0, 0.0, 0.0), 2.0);
    let near = ("near", Vec3::new(0.5, 0.0, 1.0), 1.0);
    let order = if near_first { [near, far] } else { [far, near] };
    let mut graph = SceneGraph::new();
    for (id, at, size) in order {
        graph
            .add_root(
                ObjectId::new(id),
                id,
                Mat4::from_translation(at),
                NodeKind::Mesh(quad(size)),
            )
            .unwrap();
    }
    graph
}

#[test]
fn nearest_surface_wins_where_objects_overlap() {
    let Some((context, target)) = setup() else {
        return;
    };
    let view_proj = camera().view_proj();
    let mut engine = PickingEngine::with_target(target);

    for near_first in [false, true] {
        let scene = consolidate(&overlapping_quads(near_first)).unwrap();
        let buffers = SceneBuffers::upload(&context.device, &context.queue, &scene).unwrap();

        let hit = engine
            .pick(&buffers, scene.lookup(), view_proj, 42.0, 32.0)
            .expect("overlap");
        assert_eq!(hit.info.original_id.as_str(), "near", "near_first={near_first}");

        let hit = engine
            .pick(&buffers, scene.lookup(), view_proj, 24.0, 32.0)
            .expect("exposed far quad");
        assert_eq!(hit.info.original_id.as_str(), "far", "near_first={near_first}");
    }
}

#[test]
fn device_accepts_adapter_sized_buffers() {
    let Some((context, _)) = setup() else {
        return;
    };
    let limit = context.max_buffer_size();
    assert_eq!(limit, context.adapter.limits().max_buffer_size);

    // Oversized allocations surface as errors instead of aborting.
    if let Some(size) = limit.checked_add(4) {
        let result = capture_gpu_errors(&context.device, || {
            context.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("oversized"),
                size,
                usage: wgpu::BufferUsages::VERTEX,
                mapped_at_creation: false,
            })
        });
        assert!(result.is_err());
    }
}

#[test]
fn batches_split_to_fit_the_buffer_limit_upload() {
    let Some((context, _)) = setup() else {
        return;
    };
    // Four 24-vertex cubes of 32-byte vertices per buffer.
    let options = ConsolidateOptions::default().with_buffer_limit(4 * 24 * 32);
    let graph = box_grid(3, 1.5).unwrap();
    let scene = Consolidator::new(options).unwrap().run(&graph).unwrap();
    assert!(scene.draw_calls() > 1);

    let buffers = SceneBuffers::upload(&context.device, &context.queue, &scene).unwrap();
    assert_eq!(buffers.len(), scene.draw_calls());
}
