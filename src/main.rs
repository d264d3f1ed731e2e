#![warn(missing_debug_implementations)]

use std::{
    env::args,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

use anyhow::Context;
use cgmath::InnerSpace;
use particle_field::{
    config::FieldConfig,
    gpu::{GpuSimulation, WgpuContext},
    input::OrbitInput,
    simulation::Simulation,
};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;
use winit::event_loop::{ControlFlow, EventLoop};

use crate::app::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run().await
}

mod app;

async fn run() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = FieldConfig::from_env().context("invalid configuration")?;

    match args().nth(1).as_deref() {
        Some("headless") => {
            let max_frames = args()
                .nth(2)
                .map(|it| it.parse::<u64>())
                .transpose()
                .context("frame count must be a number")?;
            headless(config, max_frames).await
        }
        _ => windowed(config).await,
    }
}

async fn windowed(config: FieldConfig) -> anyhow::Result<()> {
    let ctx = WgpuContext::new()
        .await
        .context("failed to initialize wgpu context")?;
    let sim = GpuSimulation::new(&ctx, &config).context("failed to create gpu simulation")?;

    let mut app = App::new(ctx, config, sim);

    let event_loop = EventLoop::new().context("failed to initialize event loop")?;
    event_loop.set_control_flow(ControlFlow::Wait);
    event_loop
        .run_app(&mut app)
        .context("failed to run event loop")?;

    Ok(())
}

/// Steps the CPU field under scripted input until ctrl-c or `max_frames`.
async fn headless(config: FieldConfig, max_frames: Option<u64>) -> anyhow::Result<()> {
    let mut sim = Simulation::new(&config).context("failed to create simulation")?;
    let mut input = OrbitInput::new(sim.domain_bounds(), config.force_strength, 240);

    let shutdown = Arc::new(AtomicBool::new(false));
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for ctrl-c: {err}");
                return;
            }
            info!("shutting down");
            shutdown.store(true, Ordering::Release);
        }
    });

    let (sim, frames, elapsed) = tokio::task::spawn_blocking(move || {
        let start = Instant::now();
        let frames = sim.run(&mut input, &shutdown, max_frames)?;
        anyhow::Ok((sim, frames, start.elapsed()))
    })
    .await
    .context("simulation thread panicked")??;

    info!(
        "{frames} frames of {} particles in {:.2?}, {:.2} fps",
        sim.particle_count(),
        elapsed,
        frames as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
    );

    let view = sim.current_generation();
    let moving = view.velocity.iter().filter(|v| v.magnitude() > 1e-3).count();
    info!("{moving} of {} particles still moving", view.len());

    Ok(())
}
