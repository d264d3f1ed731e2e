use std::mem::size_of;

use bytemuck::cast_slice;
use wgpu::{
    include_wgsl, vertex_attr_array, BlendComponent, BlendFactor, BlendOperation, BlendState, Color,
    ColorTargetState, ColorWrites, CommandEncoderDescriptor, LoadOp, Operations,
    PipelineLayoutDescriptor, PushConstantRange, RenderPassColorAttachment, RenderPassDescriptor,
    RenderPipeline, ShaderStages, StoreOp, TextureFormat, TextureView, VertexBufferLayout,
    VertexStepMode,
};

use super::{
    context::WgpuContext,
    param::{DrawParam, GpuAttribute, GpuParticle},
    simulation::GpuSimulation,
};
use crate::render::RenderStyle;

/// Draws every particle of the current generation as an additive point
/// sprite, one instance per particle.
#[derive(Debug)]
pub struct PointRenderer {
    pub style: RenderStyle,
    pipeline: RenderPipeline,
}

impl PointRenderer {
    pub fn new(ctx: &WgpuContext, format: TextureFormat, style: RenderStyle) -> Self {
        let device = &ctx.device;

        let shader = device.create_shader_module(include_wgsl!("../../shaders/render.wgsl"));

        let particle_layout = VertexBufferLayout {
            array_stride: size_of::<GpuParticle>() as wgpu::BufferAddress,
            step_mode: VertexStepMode::Instance,
            attributes: &vertex_attr_array![0 => Float32x4, 1 => Float32x4],
        };
        let attribute_layout = VertexBufferLayout {
            array_stride: size_of::<GpuAttribute>() as wgpu::BufferAddress,
            step_mode: VertexStepMode::Instance,
            attributes: &vertex_attr_array![2 => Float32x2],
        };

        let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("render layout"),
            bind_group_layouts: &[],
            push_constant_ranges: &[PushConstantRange {
                stages: ShaderStages::VERTEX,
                range: 0..size_of::<DrawParam>() as u32,
            }],
        });

        // overlapping particles brighten each other
        let additive = BlendState {
            color: BlendComponent {
                src_factor: BlendFactor::SrcAlpha,
                dst_factor: BlendFactor::One,
                operation: BlendOperation::Add,
            },
            alpha: BlendComponent::OVER,
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("render pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[particle_layout, attribute_layout],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                compilation_options: Default::default(),
                targets: &[Some(ColorTargetState {
                    format,
                    blend: Some(additive),
                    write_mask: ColorWrites::COLOR,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self { style, pipeline }
    }

    /// Clears `view` and draws the current generation of `sim` onto it,
    /// mapping `bounds` onto `viewport` pixels.
    pub fn render(
        &self,
        ctx: &WgpuContext,
        view: &TextureView,
        sim: &GpuSimulation,
        bounds: [f32; 2],
        viewport: [f32; 2],
    ) {
        let param = [DrawParam::new(bounds, viewport, &self.style)];

        let mut encoder = ctx
            .device
            .create_command_encoder(&CommandEncoderDescriptor { label: None });

        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: None,
                color_attachments: &[Some(RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(Color::BLACK),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            rpass.set_pipeline(&self.pipeline);
            rpass.set_push_constants(ShaderStages::VERTEX, 0, cast_slice(&param));
            rpass.set_vertex_buffer(0, sim.current_buffer().slice(..));
            rpass.set_vertex_buffer(1, sim.attribute_buffer().slice(..));

            rpass.draw(0..6, 0..sim.particle_count());
        }

        ctx.queue.submit(Some(encoder.finish()));
    }
}

#[cfg(test)]
mod tests {
    use cgmath::vec3;
    use wgpu::{
        BufferDescriptor, BufferUsages, Extent3d, ImageCopyBuffer, ImageDataLayout, MapMode,
        TextureDescriptor, TextureDimension, TextureUsages, TextureViewDescriptor,
    };

    use super::*;
    use crate::{
        field::{BoundaryPolicy, Falloff, SimParams},
        store::ParticleStore,
    };

    #[tokio::test]
    async fn draws_particles_onto_black() {
        let ctx = match WgpuContext::new().await {
            Ok(ctx) => ctx,
            Err(err) => {
                eprintln!("skipping gpu test: {err:#}");
                return;
            }
        };

        // 64 pixels wide, row pitch is exactly 256 bytes
        let size = 64;
        let store = ParticleStore::from_positions(vec![vec3(32.0, 32.0, 0.0)], 0);
        let params = SimParams {
            force_scale: 0.0,
            radius: 0.0,
            magnitude_scale: 1.0,
            velocity_damping: 1.0,
            bounds: vec3(64.0, 64.0, 0.0),
            falloff: Falloff::Linear,
            boundary: BoundaryPolicy::Clamp,
        };
        let sim = GpuSimulation::from_store(&ctx, &store, params, 1.0).unwrap();

        let format = TextureFormat::Rgba8Unorm;
        let texture = ctx.device.create_texture(&TextureDescriptor {
            label: Some("target"),
            size: Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format,
            usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&TextureViewDescriptor::default());

        let style = RenderStyle {
            base_size: 8.0,
            ..Default::default()
        };
        let renderer = PointRenderer::new(&ctx, format, style);
        renderer.render(&ctx, &view, &sim, [64.0, 64.0], [size as f32, size as f32]);

        let readback = ctx.device.create_buffer(&BufferDescriptor {
            label: Some("readback"),
            size: (size * size * 4) as u64,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = ctx
            .device
            .create_command_encoder(&CommandEncoderDescriptor { label: None });
        encoder.copy_texture_to_buffer(
            texture.as_image_copy(),
            ImageCopyBuffer {
                buffer: &readback,
                layout: ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(size * 4),
                    rows_per_image: None,
                },
            },
            Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
        );
        ctx.queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        slice.map_async(MapMode::Read, |_| {});
        ctx.device.poll(wgpu::MaintainBase::Wait).panic_on_timeout();
        let pixels = slice.get_mapped_range();

        let at = |x: u32, y: u32| {
            let idx = ((y * size + x) * 4) as usize;
            &pixels[idx..idx + 3]
        };
        assert_eq!(at(0, 0), &[0, 0, 0]);
        assert!(at(32, 32).iter().any(|&c| c > 0));
    }
}
