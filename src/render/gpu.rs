use std::sync::Arc;

use pollster::FutureExt;

use super::RenderError;

/// Adapter, device and queue shared by the display renderer and the pick target.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
}

impl GpuContext {
    /// Context without a surface, for offscreen picking and tests.
    pub fn headless() -> Result<Self, RenderError> {
        let instance = wgpu::Instance::default();
        Self::with_instance(instance, None)
    }

    /// Context whose adapter can present to `surface`.
    pub fn for_surface(
        instance: wgpu::Instance,
        surface: &wgpu::Surface<'_>,
    ) -> Result<Self, RenderError> {
        Self::with_instance(instance, Some(surface))
    }

    /// Largest buffer the device accepts, the ceiling for one merged batch.
    pub fn max_buffer_size(&self) -> u64 {
        self.device.limits().max_buffer_size
    }

    fn with_instance(
        instance: wgpu::Instance,
        surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self, RenderError> {
        let adapter = request_adapter(&instance, surface)?;
        let info = adapter.get_info();
        log::info!(
            "Using adapter '{}' ({:?}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("scenepick-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: device_limits(&adapter.limits()),
                },
                None,
            )
            .block_on()?;

        Ok(Self {
            instance,
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }
}

/// Downlevel defaults, but with the adapter's own texture and buffer size limits so large
/// merged batches can be uploaded.
fn device_limits(adapter: &wgpu::Limits) -> wgpu::Limits {
    wgpu::Limits {
        max_buffer_size: adapter.max_buffer_size,
        max_storage_buffer_binding_size: adapter.max_storage_buffer_binding_size,
        ..wgpu::Limits::downlevel_defaults().using_resolution(adapter.clone())
    }
}

/// High performance first, then low power, then the software fallback adapter.
fn request_adapter(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'_>>,
) -> Result<wgpu::Adapter, RenderError> {
    let attempts = [
        (wgpu::PowerPreference::HighPerformance, false),
        (wgpu::PowerPreference::LowPower, false),
        (wgpu::PowerPreference::None, true),
    ];
    for (power_preference, force_fallback_adapter) in attempts {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                force_fallback_adapter,
                compatible_surface: surface,
            })
            .block_on();
        if let Some(adapter) = adapter {
            return Ok(adapter);
        }
        log::debug!(
            "No adapter for {:?} (fallback: {})",
            power_preference,
            force_fallback_adapter
        );
    }
    Err(RenderError::NoAdapter)
}
