use std::{sync::Arc, time::Instant};

use particle_field::{
    config::FieldConfig,
    field::BoundaryPolicy,
    gpu::{GpuSimulation, WgpuContext},
    input::{InputAdapter, PointerButton, PointerInput},
};
use tracing::{error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{Key, NamedKey},
    window::{WindowAttributes, WindowId},
};

use self::viewport::Viewport;

pub mod viewport;

const RADIUS_STEP: f32 = 10.0;

#[derive(Debug)]
pub struct App {
    pub ctx: WgpuContext,
    pub config: FieldConfig,
    pub sim: GpuSimulation,
    pub input: PointerInput,

    pub paused: bool,
    pub paused_pending_step: u64,

    pub viewport: Option<Viewport>,

    pub last_report: Instant,
    pub frame_count: u64,
}

impl App {
    pub fn new(ctx: WgpuContext, config: FieldConfig, sim: GpuSimulation) -> Self {
        let bounds = sim.params().bounds.truncate();
        Self {
            input: PointerInput::new(bounds, config.force_strength),
            ctx,
            config,
            sim,

            paused: false,
            paused_pending_step: 0,

            viewport: None,

            last_report: Instant::now(),
            frame_count: 0,
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(viewport) = self.viewport.as_ref() else {
            return;
        };

        let should_tick = !self.paused || self.paused_pending_step > 0;
        self.paused_pending_step = self.paused_pending_step.saturating_sub(1);

        if should_tick {
            let input = self.input.produce();
            self.sim.step(&self.ctx, &input);
        }
        if let Err(err) = viewport.render(&self.ctx, &self.sim) {
            error!("{err:#}");
            event_loop.exit();
            return;
        }

        self.frame_count += 1;
        let elapsed = self.last_report.elapsed().as_secs_f64();
        if elapsed >= 1.0 {
            info!(
                "fps: {:.2}, frame: {}, force scale: {:.3}",
                self.frame_count as f64 / elapsed,
                self.sim.frame_count(),
                self.sim.params().force_scale,
            );
            self.frame_count = 0;
            self.last_report = Instant::now();
        }

        viewport.window.request_redraw();
    }

    fn adjust_radius(&mut self, delta: f32) {
        let mut params = *self.sim.params();
        params.radius = (params.radius + delta).max(0.0);
        match self.sim.set_params(params) {
            Ok(()) => info!("radius: {}", params.radius),
            Err(err) => warn!("{err:#}"),
        }
    }

    fn toggle_boundary(&mut self) {
        let mut params = *self.sim.params();
        params.boundary = match params.boundary {
            BoundaryPolicy::Clamp => BoundaryPolicy::Reflect,
            BoundaryPolicy::Reflect => BoundaryPolicy::Clamp,
        };
        match self.sim.set_params(params) {
            Ok(()) => info!("boundary: {:?}", params.boundary),
            Err(err) => warn!("{err:#}"),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let bounds = self.sim.params().bounds;
        let attributes = WindowAttributes::default()
            .with_title("particle field")
            .with_inner_size(PhysicalSize::new(bounds.x.max(1.0) as u32, bounds.y.max(1.0) as u32));

        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                error!("failed to create window: {err}");
                event_loop.exit();
                return;
            }
        };

        match Viewport::new(window.clone(), &self.ctx, self.config.style) {
            Ok(viewport) => {
                self.viewport = Some(viewport);
                window.request_redraw();
            }
            Err(err) => {
                error!("failed to create viewport: {err:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                info!("WindowEvent::CloseRequested");
                self.viewport = None;
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(viewport) = self.viewport.as_mut() {
                    viewport.resize(&self.ctx.device, new_size);
                    viewport.window.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(viewport) = self.viewport.as_ref() {
                    let size = viewport.window.inner_size();
                    let bounds = self.sim.params().bounds;
                    self.input.move_to(
                        position.x as f32 / size.width.max(1) as f32 * bounds.x,
                        position.y as f32 / size.height.max(1) as f32 * bounds.y,
                    );
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let button = match button {
                    MouseButton::Left => PointerButton::Primary,
                    MouseButton::Right => PointerButton::Secondary,
                    _ => return,
                };
                if state.is_pressed() {
                    self.input.press(button);
                } else {
                    self.input.release();
                }
            }
            WindowEvent::KeyboardInput {
                event: keyboard_event,
                ..
            } if keyboard_event.state == ElementState::Released => {
                match keyboard_event.logical_key {
                    Key::Character(key) => match key.as_str() {
                        "r" => {
                            info!("reset");
                            self.sim.reset(&self.ctx);
                        }
                        "b" => self.toggle_boundary(),
                        _ => {}
                    },
                    Key::Named(key) => match key {
                        NamedKey::ArrowUp => self.adjust_radius(RADIUS_STEP),
                        NamedKey::ArrowDown => self.adjust_radius(-RADIUS_STEP),
                        NamedKey::ArrowRight => {
                            if self.paused {
                                info!("adding pending step");
                                self.paused_pending_step += 1;
                            }
                        }
                        NamedKey::Space => {
                            self.paused = !self.paused;
                            if !self.paused {
                                self.paused_pending_step = 0;
                            }
                            info!("paused: {}", self.paused);
                        }
                        _ => {}
                    },
                    _ => {}
                }
            }
            _ => {}
        }
    }
}
