pub mod camera;
pub mod gpu;
pub mod pick_target;
pub mod shaders;

pub use camera::{Camera, CameraController};
pub use gpu::GpuContext;
pub use pick_target::GpuPickTarget;

use std::borrow::Cow;

use pollster::FutureExt;
use wgpu::util::DeviceExt;

use crate::consolidate::{ConsolidatedScene, LookupTable, MergedMesh, MergedVertex, ObjectInfo};
use crate::pick::{PickHit, PickingEngine, SelectionState};
use shaders::{SceneUniforms, SCENE_SHADER};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.1,
    g: 0.1,
    b: 0.2,
    a: 1.0,
};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("no compatible GPU adapter found")]
    NoAdapter,
    #[error("failed to request GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("failed to create window surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("surface reports no supported formats for this adapter")]
    UnsupportedSurface,
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("failed to upload scene buffers: {0}")]
    Upload(String),
}

/// Runs `f` under validation and out-of-memory error scopes, turning a captured error into
/// `Err` instead of leaving it to the device's uncaptured-error handler.
pub fn capture_gpu_errors<R>(
    device: &wgpu::Device,
    f: impl FnOnce() -> R,
) -> Result<R, wgpu::Error> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let value = f();
    let out_of_memory = device.pop_error_scope().block_on();
    let validation = device.pop_error_scope().block_on();
    match out_of_memory.or(validation) {
        Some(err) => Err(err),
        None => Ok(value),
    }
}

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32x3,
    2 => Unorm8x4,
    3 => Unorm8x4,
];

/// Layout of [`MergedVertex`] as seen by both programs.
pub fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<MergedVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
    }
}

/// Uniform buffer, its layout and bind group for one pass.
pub(crate) fn create_uniforms(
    device: &wgpu::Device,
    label: &str,
) -> (wgpu::Buffer, wgpu::BindGroupLayout, wgpu::BindGroup) {
    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(&format!("{label}-uniform-layout")),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(
                    std::mem::size_of::<SceneUniforms>() as u64
                ),
            },
            count: None,
        }],
    });
    let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{label}-uniform-buffer")),
        contents: bytemuck::cast_slice(&[SceneUniforms::new(glam::Mat4::IDENTITY, 0, true)]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(&format!("{label}-uniform-bind-group")),
        layout: &layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
    });
    (buffer, layout, bind_group)
}

/// Depth-tested triangle pipeline over [`MergedVertex`] buffers. Back faces are kept.
pub(crate) fn create_scene_pipeline(
    device: &wgpu::Device,
    label: &str,
    bind_group_layout: &wgpu::BindGroupLayout,
    vs_entry: &str,
    fs_entry: &str,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("scene-shader"),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(SCENE_SHADER)),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: vs_entry,
            buffers: &[vertex_layout()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: fs_entry,
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            cull_mode: None,
            ..wgpu::PrimitiveState::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("display-depth"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn check_buffer_sizes(meshes: &[MergedMesh], limit: u64) -> Result<(), RenderError> {
    for mesh in meshes {
        let bytes = std::mem::size_of_val(mesh.vertices.as_slice())
            .max(std::mem::size_of_val(mesh.indices.as_slice())) as u64;
        if bytes > limit {
            return Err(RenderError::Upload(format!(
                "{} batch {} needs a {} byte buffer, device limit is {}",
                mesh.tier, mesh.batch, bytes, limit
            )));
        }
    }
    Ok(())
}

/// Unmapped buffer filled through the queue, so an invalid buffer is reported through the
/// error scopes instead of failing a mapping.
fn create_filled_buffer(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    contents: &[u8],
    usage: wgpu::BufferUsages,
) -> wgpu::Buffer {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: contents.len() as u64,
        usage: usage | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    queue.write_buffer(&buffer, 0, contents);
    buffer
}

struct BatchBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

/// GPU copies of every merged mesh; shared by the display and pick passes.
#[derive(Default)]
pub struct SceneBuffers {
    batches: Vec<BatchBuffers>,
}

impl SceneBuffers {
    /// Uploads every merged mesh. A batch over the device's `max_buffer_size`, or any
    /// error the device reports while creating the buffers, comes back as
    /// [`RenderError::Upload`].
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        scene: &ConsolidatedScene,
    ) -> Result<Self, RenderError> {
        check_buffer_sizes(scene.meshes(), device.limits().max_buffer_size)?;
        capture_gpu_errors(device, || Self::create(device, queue, scene))
            .map_err(|err| RenderError::Upload(err.to_string()))
    }

    fn create(device: &wgpu::Device, queue: &wgpu::Queue, scene: &ConsolidatedScene) -> Self {
        let batches = scene
            .meshes()
            .iter()
            .map(|mesh| {
                let label = format!("{}-{}", mesh.tier, mesh.batch);
                BatchBuffers {
                    vertex: create_filled_buffer(
                        device,
                        queue,
                        &format!("{label}-vertices"),
                        bytemuck::cast_slice(&mesh.vertices),
                        wgpu::BufferUsages::VERTEX,
                    ),
                    index: create_filled_buffer(
                        device,
                        queue,
                        &format!("{label}-indices"),
                        bytemuck::cast_slice(&mesh.indices),
                        wgpu::BufferUsages::INDEX,
                    ),
                    index_count: mesh.indices.len() as u32,
                }
            })
            .collect();
        Self { batches }
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// One indexed draw per merged mesh with whatever pipeline is bound.
    pub fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        for batch in &self.batches {
            pass.set_vertex_buffer(0, batch.vertex.slice(..));
            pass.set_index_buffer(batch.index.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..batch.index_count, 0, 0..1);
        }
    }
}

/// A consolidated scene together with its uploaded buffers.
pub struct InstalledScene {
    pub scene: ConsolidatedScene,
    pub buffers: SceneBuffers,
}

/// Windowed display renderer plus the picking engine that shares its device.
pub struct Renderer {
    context: GpuContext,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
    pipeline: wgpu::RenderPipeline,
    uniforms: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    picking: PickingEngine<GpuPickTarget>,
    scene: Option<InstalledScene>,
    tint_enabled: bool,
}

impl Renderer {
    pub fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(target)?;
        let context = GpuContext::for_surface(instance, &surface)?;

        let caps = surface.get_capabilities(&context.adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or(RenderError::UnsupportedSurface)?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Opaque);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&context.device, &config);

        let device = &context.device;
        let depth_view = create_depth_view(device, config.width, config.height);
        let (uniforms, layout, bind_group) = create_uniforms(device, "display");
        let pipeline = create_scene_pipeline(
            device,
            "display-pipeline",
            &layout,
            "vs_display",
            "fs_display",
            format,
        );
        let picking = PickingEngine::new(GpuPickTarget::new(
            context.device.clone(),
            context.queue.clone(),
            config.width,
            config.height,
        ));
        log::info!(
            "Renderer initialized ({}x{}, {:?})",
            config.width,
            config.height,
            format
        );

        Ok(Self {
            context,
            surface,
            config,
            depth_view,
            pipeline,
            uniforms,
            bind_group,
            picking,
            scene: None,
            tint_enabled: true,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn max_buffer_size(&self) -> u64 {
        self.context.max_buffer_size()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.context.device, &self.config);
        self.depth_view = create_depth_view(&self.context.device, width, height);

        if let Some(target) = self.picking.target_mut() {
            if let Err(err) = target.resize(width, height) {
                self.picking.set_target(Err(err));
            }
        } else {
            self.picking.set_target(GpuPickTarget::new(
                self.context.device.clone(),
                self.context.queue.clone(),
                width,
                height,
            ));
        }
    }

    /// Uploads `scene`, then swaps it in. The previous scene is dropped after the swap.
    pub fn install_scene(&mut self, scene: ConsolidatedScene) -> Result<(), RenderError> {
        let buffers = SceneBuffers::upload(&self.context.device, &self.context.queue, &scene)?;

        let draw_calls = buffers.len();
        let previous = self.scene.replace(InstalledScene { scene, buffers });
        self.picking.selection_mut().clear();
        drop(previous);
        log::info!("Installed scene with {} draw calls", draw_calls);
        Ok(())
    }

    pub fn clear_scene(&mut self) {
        if self.scene.take().is_some() {
            log::info!("Scene cleared");
        }
        self.picking.selection_mut().clear();
    }

    pub fn scene(&self) -> Option<&ConsolidatedScene> {
        self.scene.as_ref().map(|installed| &installed.scene)
    }

    pub fn draw_calls(&self) -> usize {
        self.scene
            .as_ref()
            .map_or(0, |installed| installed.buffers.len())
    }

    /// Queues a pick for the next frame. Returns false when one is already pending.
    pub fn request_pick(&mut self, screen_x: f32, screen_y: f32) -> bool {
        self.picking.request_pick(screen_x, screen_y)
    }

    pub fn has_pending_pick(&self) -> bool {
        self.picking.has_pending_pick()
    }

    pub fn selection(&self) -> SelectionState {
        self.picking.selection()
    }

    pub fn selected_object(&self) -> Option<&ObjectInfo> {
        let index = self.picking.selection().selected()?;
        self.scene()?.lookup().get(index)
    }

    pub fn clear_selection(&mut self) {
        self.picking.selection_mut().clear();
    }

    pub fn take_pick_hit(&mut self) -> Option<PickHit> {
        self.picking.take_hit()
    }

    pub fn take_redraw_request(&mut self) -> bool {
        self.picking.take_redraw_request()
    }

    pub fn tint_enabled(&self) -> bool {
        self.tint_enabled
    }

    pub fn set_tint_enabled(&mut self, enabled: bool) {
        self.tint_enabled = enabled;
    }

    /// Runs a pending pick, then draws the display pass and presents.
    pub fn render_frame(&mut self, camera: &Camera) -> Result<(), RenderError> {
        let view_proj = camera.view_proj();
        if self.picking.has_pending_pick() {
            match &self.scene {
                Some(installed) => {
                    self.picking.process_pending(
                        &installed.buffers,
                        installed.scene.lookup(),
                        view_proj,
                    );
                }
                None => {
                    self.picking.process_pending(
                        &SceneBuffers::default(),
                        &LookupTable::default(),
                        view_proj,
                    );
                }
            }
        }

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.context.device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface timeout, skipping frame");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let uniforms = SceneUniforms::new(
            view_proj,
            self.picking.selection().selected_raw(),
            self.tint_enabled,
        );
        self.context
            .queue
            .write_buffer(&self.uniforms, 0, bytemuck::cast_slice(&[uniforms]));

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("display-encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("display-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if let Some(installed) = &self.scene {
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, &self.bind_group, &[]);
                installed.buffers.draw(&mut pass);
            }
        }
        self.context.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidate::consolidate;
    use crate::scene::builders::{box_grid, quad};
    use crate::scene::{NodeKind, ObjectId, SceneGraph};
    use glam::{Mat4, Vec3};

    const SIZE: u32 = 64;
    const ROW_BYTES: u32 = SIZE * 4;

    /// Draws `scene` with the display program into an offscreen target and returns RGBA8
    /// rows of `ROW_BYTES`.
    fn render_display(
        context: &GpuContext,
        scene: &ConsolidatedScene,
        view_proj: Mat4,
        selected_index: u32,
    ) -> Vec<u8> {
        let device = &context.device;
        let format = wgpu::TextureFormat::Rgba8Unorm;
        let (uniforms, layout, bind_group) = create_uniforms(device, "display-test");
        let pipeline = create_scene_pipeline(
            device,
            "display-test",
            &layout,
            "vs_display",
            "fs_display",
            format,
        );
        let extent = wgpu::Extent3d {
            width: SIZE,
            height: SIZE,
            depth_or_array_layers: 1,
        };
        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("display-test-color"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = create_depth_view(device, SIZE, SIZE);
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("display-test-readback"),
            size: (ROW_BYTES * SIZE) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let buffers = SceneBuffers::upload(device, &context.queue, scene).unwrap();
        context.queue.write_buffer(
            &uniforms,
            0,
            bytemuck::cast_slice(&[SceneUniforms::new(view_proj, selected_index, false)]),
        );

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("display-test"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("display-test"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            buffers.draw(&mut pass);
        }
        encoder.copy_texture_to_buffer(
            color.as_image_copy(),
            wgpu::ImageCopyBuffer {
                buffer: &readback,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(ROW_BYTES),
                    rows_per_image: Some(SIZE),
                },
            },
            extent,
        );
        context.queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        rx.recv().unwrap().unwrap();
        let pixels = slice.get_mapped_range().to_vec();
        readback.unmap();
        pixels
    }

    fn pixel(pixels: &[u8], x: u32, y: u32) -> [u8; 4] {
        let at = (y * ROW_BYTES + x * 4) as usize;
        [pixels[at], pixels[at + 1], pixels[at + 2], pixels[at + 3]]
    }

    fn is_highlight(rgba: [u8; 4]) -> bool {
        shaders::HIGHLIGHT_COLOR
            .iter()
            .zip(rgba)
            .all(|(&expected, actual)| ((expected * 255.0).round() - actual as f32).abs() <= 1.0)
    }

    /// Quads with object indices 1, 2 and 3 left to right; their index colors differ only
    /// in the lowest byte.
    fn adjacent_quads() -> ConsolidatedScene {
        let mut graph = SceneGraph::new();
        for (i, x) in [-1.2, 0.0, 1.2].into_iter().enumerate() {
            graph
                .add_root(
                    ObjectId::new(format!("quad-{i}")),
                    "quad",
                    Mat4::from_translation(Vec3::new(x, 0.0, 0.0)),
                    NodeKind::Mesh(quad(1.0)),
                )
                .unwrap();
        }
        consolidate(&graph).unwrap()
    }

    #[test]
    fn display_pass_highlights_only_the_selected_index() {
        let Ok(context) = GpuContext::headless() else {
            eprintln!("skipping display shading test: no adapter");
            return;
        };
        let scene = adjacent_quads();
        let indices: Vec<u32> = scene.lookup().iter().map(|info| info.index.get()).collect();
        assert_eq!(indices, [1, 2, 3]);
        let camera = Camera {
            eye: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            aspect: 1.0,
            near: 0.1,
            far: 100.0,
            ..Camera::default()
        };
        let centers = [(15, 32), (32, 32), (48, 32)];
        let highlighted = |selected: u32| -> Vec<bool> {
            let pixels = render_display(&context, &scene, camera.view_proj(), selected);
            centers
                .iter()
                .map(|&(x, y)| is_highlight(pixel(&pixels, x, y)))
                .collect()
        };

        assert_eq!(highlighted(2), [false, true, false]);
        assert_eq!(highlighted(1), [true, false, false]);
        assert_eq!(highlighted(3), [false, false, true]);
        assert_eq!(highlighted(0), [false, false, false]);

        // Unselected objects are still drawn, lit grey.
        let pixels = render_display(&context, &scene, camera.view_proj(), 0);
        let [r, g, b, _] = pixel(&pixels, 15, 32);
        assert!(r > 0 && r == g && g == b);
    }

    #[test]
    fn vertex_layout_matches_merged_vertex() {
        let layout = vertex_layout();
        assert_eq!(layout.array_stride, 32);
        let offsets: Vec<u64> = layout.attributes.iter().map(|attr| attr.offset).collect();
        assert_eq!(offsets, [0, 12, 24, 28]);
        assert_eq!(layout.attributes[3].format, wgpu::VertexFormat::Unorm8x4);
    }

    #[test]
    fn batches_over_the_buffer_limit_are_rejected_before_upload() {
        let scene = consolidate(&box_grid(2, 1.5).unwrap()).unwrap();
        let vertex_bytes = (4 * 24 * 32) as u64;
        assert!(check_buffer_sizes(scene.meshes(), vertex_bytes).is_ok());
        assert!(matches!(
            check_buffer_sizes(scene.meshes(), vertex_bytes - 1),
            Err(RenderError::Upload(_))
        ));
    }
}
