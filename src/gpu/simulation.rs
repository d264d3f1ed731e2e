use std::{mem::size_of, sync::mpsc};

use anyhow::{anyhow, Context};
use bytemuck::cast_slice;
use tracing::{debug, info};
use wgpu::{
    include_wgsl,
    util::{BufferInitDescriptor, DeviceExt},
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingType, Buffer, BufferAddress, BufferBindingType, BufferDescriptor,
    BufferUsages, CommandEncoderDescriptor, ComputePassDescriptor, ComputePipeline,
    ComputePipelineDescriptor, MapMode, PipelineLayoutDescriptor, PushConstantRange, ShaderStages,
};

use super::{
    context::WgpuContext,
    param::{GpuAttribute, GpuParticle, StepParam},
};
use crate::{
    config::{validate_params, FieldConfig},
    error::ConfigError,
    field::SimParams,
    simulation::{FrameInput, InputResolver},
    store::ParticleStore,
    swap::SwapController,
};

const WORKGROUP_SIZE: u32 = 64;

/// GPU counterpart of [`crate::simulation::Simulation`].
///
/// `bind_groups[i]` reads `buffers[i]` and writes the other one, so a frame
/// only has to pick the bind group of the current generation.
#[derive(Debug)]
pub struct GpuSimulation {
    buffers: [Buffer; 2],
    attribute_buffer: Buffer,
    initial: Vec<GpuParticle>,

    bind_groups: [BindGroup; 2],
    pipeline: ComputePipeline,

    params: SimParams,
    resolver: InputResolver,
    swap: SwapController,
    count: u32,
    frame: u64,
}

impl GpuSimulation {
    pub fn new(ctx: &WgpuContext, config: &FieldConfig) -> anyhow::Result<Self> {
        let params = config.validate()?;
        let store = ParticleStore::new(
            config.grid_width,
            config.grid_height,
            params.bounds,
            config.seed,
        );
        Self::from_store(ctx, &store, params, config.idle_decay)
    }

    /// Uploads the current generation and static attributes of `store`.
    pub fn from_store(
        ctx: &WgpuContext,
        store: &ParticleStore,
        params: SimParams,
        idle_decay: f32,
    ) -> anyhow::Result<Self> {
        validate_params(&params)?;
        if store.is_empty() {
            return Err(ConfigError::EmptyStore.into());
        }
        let count = u32::try_from(store.len())?;
        let device = &ctx.device;

        // data
        let view = store.current();
        let initial = view
            .position
            .iter()
            .zip(view.velocity)
            .map(|(&pos, &vel)| GpuParticle::new(pos, vel))
            .collect::<Vec<_>>();
        let attributes = view
            .static_alpha
            .iter()
            .zip(view.inv_mass)
            .map(|(&alpha, &inv_mass)| GpuAttribute { alpha, inv_mass })
            .collect::<Vec<_>>();

        let usage = BufferUsages::STORAGE
            | BufferUsages::VERTEX
            | BufferUsages::COPY_SRC
            | BufferUsages::COPY_DST;
        let buffers = ["particles_buffer_0", "particles_buffer_1"].map(|label| {
            device.create_buffer_init(&BufferInitDescriptor {
                label: Some(label),
                contents: cast_slice(&initial),
                usage,
            })
        });

        let attribute_buffer = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("attribute_buffer"),
            contents: cast_slice(&attributes),
            usage: BufferUsages::VERTEX,
        });

        let storage_entry = |binding, read_only| BindGroupLayoutEntry {
            binding,
            visibility: ShaderStages::COMPUTE,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("step_bind_group_layout"),
            entries: &[storage_entry(0, true), storage_entry(1, false)],
        });

        let bind_groups = [0, 1].map(|read| {
            device.create_bind_group(&BindGroupDescriptor {
                label: Some("step_bind_group"),
                layout: &bind_group_layout,
                entries: &[
                    BindGroupEntry {
                        binding: 0,
                        resource: buffers[read].as_entire_binding(),
                    },
                    BindGroupEntry {
                        binding: 1,
                        resource: buffers[1 - read].as_entire_binding(),
                    },
                ],
            })
        });

        // pipeline
        let shader = device.create_shader_module(include_wgsl!("../../shaders/simulate.wgsl"));

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("step layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[PushConstantRange {
                stages: ShaderStages::COMPUTE,
                range: 0..size_of::<StepParam>() as u32,
            }],
        });

        let pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("step pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "cs_main",
            compilation_options: Default::default(),
        });

        info!("uploaded {count} particles");

        Ok(Self {
            buffers,
            attribute_buffer,
            initial,

            bind_groups,
            pipeline,

            params,
            resolver: InputResolver::new(idle_decay),
            swap: SwapController::default(),
            count,
            frame: 0,
        })
    }

    /// Dispatches one step and swaps once it is submitted.
    pub fn step(&mut self, ctx: &WgpuContext, input: &FrameInput) {
        let points = self.resolver.resolve(input, &mut self.params);
        let param = [StepParam::new(&self.params, points, self.count)];

        // dimensions
        let groups = self.count.div_ceil(WORKGROUP_SIZE);
        let max = ctx.device.limits().max_compute_workgroups_per_dimension;
        let x = groups.min(max);
        let y = groups.div_ceil(x);

        let mut encoder = ctx
            .device
            .create_command_encoder(&CommandEncoderDescriptor { label: None });

        {
            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("step compute pass"),
                timestamp_writes: None,
            });

            pass.set_pipeline(&self.pipeline);
            pass.set_push_constants(0, cast_slice(&param));
            pass.set_bind_group(0, &self.bind_groups[self.swap.current()], &[]);
            pass.dispatch_workgroups(x, y, 1);
        }

        ctx.queue.submit(Some(encoder.finish()));

        self.swap.swap();
        self.frame += 1;
    }

    /// Buffer holding the generation exposed for drawing.
    pub fn current_buffer(&self) -> &Buffer {
        &self.buffers[self.swap.current()]
    }

    pub fn attribute_buffer(&self) -> &Buffer {
        &self.attribute_buffer
    }

    /// Copies the current generation back, blocking until the GPU is done.
    pub fn read_current(&self, ctx: &WgpuContext) -> anyhow::Result<Vec<GpuParticle>> {
        let size = (size_of::<GpuParticle>() * self.count as usize) as BufferAddress;
        let staging = ctx.device.create_buffer(&BufferDescriptor {
            label: Some("particles_staging_buffer"),
            size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = ctx
            .device
            .create_command_encoder(&CommandEncoderDescriptor { label: None });
        encoder.copy_buffer_to_buffer(self.current_buffer(), 0, &staging, 0, size);
        ctx.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        ctx.device.poll(wgpu::MaintainBase::Wait).panic_on_timeout();
        rx.try_recv()
            .map_err(|_| anyhow!("staging buffer was not mapped after waiting"))?
            .context("failed to map staging buffer")?;

        let view = slice.get_mapped_range();
        let particles = cast_slice::<u8, GpuParticle>(&view).to_vec();
        drop(view);
        staging.unmap();
        Ok(particles)
    }

    /// Back to the initial lattice at rest.
    pub fn reset(&mut self, ctx: &WgpuContext) {
        for buffer in &self.buffers {
            ctx.queue.write_buffer(buffer, 0, cast_slice(&self.initial));
        }
        self.swap.reset();
        self.frame = 0;
        debug!("gpu field reset");
    }

    pub fn particle_count(&self) -> u32 {
        self.count
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn set_params(&mut self, params: SimParams) -> anyhow::Result<()> {
        validate_params(&params)?;
        self.params = params;
        Ok(())
    }
}
