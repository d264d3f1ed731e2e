use std::sync::Arc;

use anyhow::{anyhow, Context};
use particle_field::{
    gpu::{GpuSimulation, PointRenderer, WgpuContext},
    render::RenderStyle,
};
use wgpu::{Device, PresentMode, Surface, SurfaceConfiguration, TextureViewDescriptor};
use winit::{dpi::PhysicalSize, window::Window};

#[derive(Debug)]
pub struct Viewport {
    pub window: Arc<Window>,
    pub surface: Surface<'static>,
    pub config: SurfaceConfiguration,
    pub renderer: PointRenderer,
}

impl Viewport {
    pub fn new(window: Arc<Window>, ctx: &WgpuContext, style: RenderStyle) -> anyhow::Result<Self> {
        let surface = ctx
            .instance
            .create_surface(window.clone())
            .context("failed to create render surface")?;
        let size = window.inner_size();
        let mut config = surface
            .get_default_config(&ctx.adapter, size.width.max(1), size.height.max(1))
            .ok_or(anyhow!("failed to get default surface config"))?;
        config.present_mode = PresentMode::AutoVsync;

        surface.configure(&ctx.device, &config);

        let renderer = PointRenderer::new(ctx, config.format, style);

        Ok(Self {
            window,
            surface,
            config,
            renderer,
        })
    }

    pub fn resize(&mut self, device: &Device, size: PhysicalSize<u32>) {
        self.config.width = size.width.max(1);
        self.config.height = size.height.max(1);

        self.surface.configure(device, &self.config);
    }

    pub fn render(&self, ctx: &WgpuContext, sim: &GpuSimulation) -> anyhow::Result<()> {
        let frame = self
            .surface
            .get_current_texture()
            .context("failed to get next swapchain texture")?;
        let view = frame.texture.create_view(&TextureViewDescriptor::default());

        let bounds = sim.params().bounds;
        self.renderer.render(
            ctx,
            &view,
            sim,
            [bounds.x, bounds.y],
            [self.config.width as f32, self.config.height as f32],
        );
        frame.present();

        Ok(())
    }
}
