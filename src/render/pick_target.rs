//! Offscreen index target for the pick pass.

use std::sync::Arc;

use glam::Mat4;

use super::shaders::SceneUniforms;
use super::{capture_gpu_errors, create_scene_pipeline, create_uniforms, SceneBuffers, DEPTH_FORMAT};
use crate::pick::encoding::IndexColor;
use crate::pick::{PickError, PickTarget, RowOrder};

/// Unorm keeps the encoded bytes exact; an sRGB target would re-encode them.
pub const PICK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

struct PickTextures {
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
}

pub struct GpuPickTarget {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::RenderPipeline,
    uniforms: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    textures: PickTextures,
    readback: wgpu::Buffer,
    width: u32,
    height: u32,
}

impl GpuPickTarget {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        width: u32,
        height: u32,
    ) -> Result<Self, PickError> {
        if width == 0 || height == 0 {
            return Err(PickError::ZeroExtent);
        }
        let (pipeline, uniforms, bind_group, textures, readback) = capture_gpu_errors(&device, || {
            let (uniforms, layout, bind_group) = create_uniforms(&device, "pick");
            let pipeline = create_scene_pipeline(
                &device,
                "pick-pipeline",
                &layout,
                "vs_pick",
                "fs_pick",
                PICK_FORMAT,
            );
            let textures = create_textures(&device, width, height);
            let readback = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("pick-readback"),
                size: wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            });
            (pipeline, uniforms, bind_group, textures, readback)
        })
        .map_err(allocation_error)?;
        log::info!("Pick target initialized ({}x{})", width, height);

        Ok(Self {
            device,
            queue,
            pipeline,
            uniforms,
            bind_group,
            textures,
            readback,
            width,
            height,
        })
    }

    /// Reallocates the textures for a new viewport size.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), PickError> {
        if width == 0 || height == 0 {
            return Err(PickError::ZeroExtent);
        }
        if width == self.width && height == self.height {
            return Ok(());
        }
        let textures = capture_gpu_errors(&self.device, || {
            create_textures(&self.device, width, height)
        })
        .map_err(allocation_error)?;

        self.textures = textures;
        self.width = width;
        self.height = height;
        log::debug!("Pick target resized to {}x{}", width, height);
        Ok(())
    }

    fn read_pixel(&self) -> Result<IndexColor, PickError> {
        let slice = self.readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(PickError::Readback(err.to_string())),
            Err(err) => return Err(PickError::Readback(err.to_string())),
        }
        let rgba = {
            let data = slice.get_mapped_range();
            [data[0], data[1], data[2], data[3]]
        };
        self.readback.unmap();
        Ok(IndexColor::from_rgba(rgba))
    }
}

impl PickTarget for GpuPickTarget {
    type Scene = SceneBuffers;

    fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn row_order(&self) -> RowOrder {
        RowOrder::TopDown
    }

    fn render_and_read(
        &mut self,
        scene: &SceneBuffers,
        view_proj: Mat4,
        x: u32,
        y: u32,
    ) -> Result<IndexColor, PickError> {
        let uniforms = SceneUniforms::new(view_proj, 0, false);
        self.queue
            .write_buffer(&self.uniforms, 0, bytemuck::cast_slice(&[uniforms]));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("pick-encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("pick-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.textures.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.textures.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            // Only the pixel under the pointer is ever read.
            pass.set_scissor_rect(x, y, 1, 1);
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            scene.draw(&mut pass);
        }

        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.textures.color,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &self.readback,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT),
                    rows_per_image: Some(1),
                },
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        self.read_pixel()
    }
}

fn create_textures(device: &wgpu::Device, width: u32, height: u32) -> PickTextures {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let color = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("pick-color"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: PICK_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let depth = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("pick-depth"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    PickTextures {
        color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
        depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
        color,
    }
}

fn allocation_error(err: wgpu::Error) -> PickError {
    PickError::Allocation(err.to_string())
}
