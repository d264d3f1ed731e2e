use std::mem::size_of;

use anyhow::{anyhow, Context};
use tracing::info;
use wgpu::{Adapter, Device, Features, Instance, PowerPreference, Queue, RequestAdapterOptions};

use super::param::{DrawParam, StepParam};

#[derive(Debug)]
pub struct WgpuContext {
    pub instance: Instance,
    pub adapter: Adapter,
    pub device: Device,
    pub queue: Queue,
}

impl WgpuContext {
    pub async fn new() -> anyhow::Result<Self> {
        let instance = wgpu::Instance::default();

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                ..Default::default()
            })
            .await
            .ok_or(anyhow!("no adapter available"))?;

        info!("Adapter selected: {:?}", adapter.get_info());

        let push_constant_size = adapter.limits().max_push_constant_size as usize;
        let required = size_of::<StepParam>().max(size_of::<DrawParam>());
        if push_constant_size < required {
            return Err(anyhow!(
                "adapter offers {push_constant_size} bytes of push constants, {required} required"
            ));
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("particle field device"),
                    required_limits: adapter.limits(),
                    required_features: adapter.features() | Features::PUSH_CONSTANTS,
                },
                None,
            )
            .await
            .context("failed to request device")?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }
}
