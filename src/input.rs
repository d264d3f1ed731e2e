//! Sources of per-frame force input.
//!
//! Every source implements [`InputAdapter`]; the simulation loop never knows
//! which one drives it. Sensor acquisition itself happens elsewhere, the
//! adapters here are fed already sampled cursors or depth frames.

use cgmath::{vec2, Vector2};
use tracing::warn;

use crate::{config::ForceMode, field::ForcePoint, simulation::FrameInput};

pub trait InputAdapter {
    fn produce(&mut self) -> FrameInput;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    /// Attracts while held.
    Primary,
    /// Repels while held.
    Secondary,
}

/// Mouse style input: one force point that exists while a button is held.
///
/// The point stays where it was released so that the decaying force keeps
/// acting there.
#[derive(Debug, Clone)]
pub struct PointerInput {
    cursor: Vector2<f32>,
    point: ForcePoint,
    mode: ForceMode,
    strength: f32,
    pressed: bool,
}

impl PointerInput {
    pub fn new(bounds: Vector2<f32>, strength: f32) -> Self {
        let center = bounds * 0.5;
        Self {
            cursor: center,
            point: ForcePoint::new(center.x, center.y),
            mode: ForceMode::Attract,
            strength,
            pressed: false,
        }
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.cursor = vec2(x, y);
        if self.pressed {
            self.point = ForcePoint::new(x, y);
        }
    }

    pub fn press(&mut self, button: PointerButton) {
        self.mode = match button {
            PointerButton::Primary => ForceMode::Attract,
            PointerButton::Secondary => ForceMode::Repel,
        };
        self.pressed = true;
        self.point = ForcePoint::new(self.cursor.x, self.cursor.y);
    }

    pub fn release(&mut self) {
        self.pressed = false;
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }
}

impl InputAdapter for PointerInput {
    fn produce(&mut self) -> FrameInput {
        FrameInput {
            force_points: vec![self.point],
            force_scale: self.mode.signed(self.strength),
            idle: !self.pressed,
        }
    }
}

/// Sub-rectangle of a sensor image mapped linearly onto the domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveRegion {
    pub min: Vector2<f32>,
    pub max: Vector2<f32>,
}

impl Default for ActiveRegion {
    /// 640x480 depth image minus a 20 pixel margin.
    fn default() -> Self {
        Self {
            min: vec2(20.0, 20.0),
            max: vec2(620.0, 460.0),
        }
    }
}

impl ActiveRegion {
    /// Not clamped: points outside the region land outside the domain and
    /// are dropped by the simulation if out of reach.
    pub fn remap(&self, x: f32, y: f32, bounds: Vector2<f32>) -> ForcePoint {
        let lmap = |v: f32, min: f32, max: f32, bound: f32| (v - min) / (max - min) * bound;
        ForcePoint::new(
            lmap(x, self.min.x, self.max.x, bounds.x),
            lmap(y, self.min.y, self.max.y, bounds.y),
        )
    }
}

/// Hand cursor position in sensor image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorSample {
    pub x: f32,
    pub y: f32,
}

/// Tracked hand cursors, one force point per visible hand.
///
/// Idle while no hand is visible; a click gesture flips attract and repel.
#[derive(Debug, Clone)]
pub struct TrackedCursorInput {
    region: ActiveRegion,
    bounds: Vector2<f32>,
    strength: f32,
    mode: ForceMode,
    points: Vec<ForcePoint>,
}

impl TrackedCursorInput {
    pub fn new(region: ActiveRegion, bounds: Vector2<f32>, strength: f32) -> Self {
        Self {
            region,
            bounds,
            strength,
            mode: ForceMode::Attract,
            points: Vec::new(),
        }
    }

    /// Feeds the cursors seen in the latest sensor frame.
    pub fn update(&mut self, cursors: &[CursorSample], clicked: bool) {
        self.points.clear();
        self.points.extend(
            cursors
                .iter()
                .map(|it| self.region.remap(it.x, it.y, self.bounds)),
        );
        if clicked && !self.points.is_empty() {
            self.mode = self.mode.toggled();
        }
    }

    pub fn mode(&self) -> ForceMode {
        self.mode
    }
}

impl InputAdapter for TrackedCursorInput {
    fn produce(&mut self) -> FrameInput {
        FrameInput {
            force_points: self.points.clone(),
            force_scale: self.mode.signed(self.strength),
            idle: self.points.is_empty(),
        }
    }
}

/// Row-major depth image in millimetres, 0 meaning no reading.
#[derive(Debug, Clone, Copy)]
pub struct DepthFrame<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u16],
}

/// The nearest valid depth pixel becomes the single force point.
#[derive(Debug, Clone)]
pub struct NearestDepthInput {
    region: ActiveRegion,
    bounds: Vector2<f32>,
    strength: f32,
    mode: ForceMode,
    depth_range: (u16, u16),
    nearest: Option<ForcePoint>,
}

impl NearestDepthInput {
    pub fn new(
        region: ActiveRegion,
        bounds: Vector2<f32>,
        strength: f32,
        mode: ForceMode,
        depth_range: (u16, u16),
    ) -> Self {
        Self {
            region,
            bounds,
            strength,
            mode,
            depth_range,
            nearest: None,
        }
    }

    pub fn update(&mut self, frame: DepthFrame<'_>) {
        if frame.width.checked_mul(frame.height) != Some(frame.data.len()) {
            warn!(
                "ignoring depth frame of {} samples, expected {}x{}",
                frame.data.len(),
                frame.width,
                frame.height
            );
            self.nearest = None;
            return;
        }

        let (min, max) = self.depth_range;
        self.nearest = frame
            .data
            .iter()
            .enumerate()
            .filter(|&(_, &depth)| depth != 0 && (min..=max).contains(&depth))
            .min_by_key(|&(_, &depth)| depth)
            .map(|(idx, _)| {
                let x = (idx % frame.width) as f32;
                let y = (idx / frame.width) as f32;
                self.region.remap(x, y, self.bounds)
            });
    }

    pub fn nearest(&self) -> Option<ForcePoint> {
        self.nearest
    }
}

impl InputAdapter for NearestDepthInput {
    fn produce(&mut self) -> FrameInput {
        FrameInput {
            force_points: self.nearest.into_iter().collect(),
            force_scale: self.mode.signed(self.strength),
            idle: self.nearest.is_none(),
        }
    }
}

/// Scripted input for unattended runs: one point circling the domain center,
/// flipping between attract and repel every `half_period` frames.
#[derive(Debug, Clone)]
pub struct OrbitInput {
    center: Vector2<f32>,
    orbit_radius: f32,
    angular_step: f32,
    strength: f32,
    mode: ForceMode,
    half_period: u64,
    frame: u64,
}

impl OrbitInput {
    pub fn new(bounds: Vector2<f32>, strength: f32, half_period: u64) -> Self {
        Self {
            center: bounds * 0.5,
            orbit_radius: bounds.x.min(bounds.y) * 0.25,
            angular_step: 0.02,
            strength,
            mode: ForceMode::Attract,
            half_period: half_period.max(1),
            frame: 0,
        }
    }

    pub fn point(&self) -> ForcePoint {
        let angle = self.frame as f32 * self.angular_step;
        ForcePoint::new(
            self.center.x + self.orbit_radius * angle.cos(),
            self.center.y + self.orbit_radius * angle.sin(),
        )
    }
}

impl InputAdapter for OrbitInput {
    fn produce(&mut self) -> FrameInput {
        let input = FrameInput::active(vec![self.point()], self.mode.signed(self.strength));
        self.frame += 1;
        if self.frame % self.half_period == 0 {
            self.mode = self.mode.toggled();
        }
        input
    }
}
