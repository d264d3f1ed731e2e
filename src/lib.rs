//! A field of particles pushed around by a few radial force points.
//!
//! Every frame the [`simulation::Simulation`] takes one [`simulation::FrameInput`]
//! from an [`input::InputAdapter`], steps the whole field from one generation
//! into the other and exposes the result for drawing. The [`gpu`] module runs
//! the same frame on `wgpu`.

#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod field;
pub mod gpu;
pub mod input;
pub mod render;
pub mod simulation;
pub mod stepper;
pub mod store;
pub mod swap;
