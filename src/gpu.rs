//! The same double-buffered field on the GPU: a compute pass ping-pongs
//! between two storage buffers and an instanced draw reads the current one.

pub mod context;
pub mod param;
pub mod renderer;
pub mod simulation;

pub use context::WgpuContext;
pub use renderer::PointRenderer;
pub use simulation::GpuSimulation;
