use super::pipeline::CanvasPipelines;
use crate::error::ContextError;

/// Device, queue and the canvas pipelines built against them. One context
/// is shared by every surface of a host.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub(crate) pipelines: CanvasPipelines,
}

impl GpuContext {
    pub fn new() -> Result<Self, ContextError> {
        pollster::block_on(Self::init_async())
    }

    async fn init_async() -> Result<Self, ContextError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::METAL | wgpu::Backends::VULKAN | wgpu::Backends::DX12,
            ..Default::default()
        });

        // Headless machines often only expose a software adapter.
        let mut adapter = None;
        for force_fallback_adapter in [false, true] {
            adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter,
                })
                .await;
            if adapter.is_some() {
                break;
            }
        }
        let adapter = adapter.ok_or(ContextError::NoAdapter)?;

        log::info!("Using GPU: {}", adapter.get_info().name);
        log::info!("Backend: {:?}", adapter.get_info().backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("rave_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    ..Default::default()
                },
                None,
            )
            .await?;

        let pipelines = CanvasPipelines::new(&device);
        Ok(Self {
            device,
            queue,
            pipelines,
        })
    }

    /// Largest surface side the device accepts.
    pub fn max_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}

/// One device for the whole test binary; `None` where no adapter exists.
#[cfg(test)]
pub(crate) fn test_gpu() -> Option<std::sync::Arc<GpuContext>> {
    use std::sync::{Arc, OnceLock};

    static GPU: OnceLock<Option<Arc<GpuContext>>> = OnceLock::new();
    GPU.get_or_init(|| match GpuContext::new() {
        Ok(gpu) => Some(Arc::new(gpu)),
        Err(e) => {
            eprintln!("skipping GPU test: {e}");
            None
        }
    })
    .clone()
}
