//! Radial force field evaluated independently for every particle.

use cgmath::{vec3, InnerSpace, Vector3, Zero};

/// Upper bound on simultaneously active force points, two cursors at most.
pub const MAX_FORCE_POINTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForcePoint {
    pub position: Vector3<f32>,
}

impl ForcePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self::new3(x, y, 0.0)
    }

    pub fn new3(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: vec3(x, y, z),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.x.is_finite() && self.position.y.is_finite() && self.position.z.is_finite()
    }
}

/// Kernel scaling a force point's contribution by distance.
///
/// Every kernel is 1 at distance 0, non-increasing, and exactly 0 from
/// `radius` on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Falloff {
    #[default]
    Linear,
    /// Smoothstep of the linear kernel, flat at both ends.
    Smooth,
}

impl Falloff {
    pub fn weight(self, dist: f32, radius: f32) -> f32 {
        if radius <= 0.0 {
            return 0.0;
        }
        let t = (1.0 - dist / radius).clamp(0.0, 1.0);
        match self {
            Falloff::Linear => t,
            Falloff::Smooth => t * t * (3.0 - 2.0 * t),
        }
    }

    pub(crate) fn gpu_id(self) -> u32 {
        match self {
            Falloff::Linear => 0,
            Falloff::Smooth => 1,
        }
    }
}

/// What happens to a particle that leaves the domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BoundaryPolicy {
    /// Position is clamped onto the wall, velocity untouched.
    #[default]
    Clamp,
    /// Position is mirrored back across the wall and the velocity component
    /// normal to it flips sign.
    Reflect,
}

impl BoundaryPolicy {
    pub(crate) fn gpu_id(self) -> u32 {
        match self {
            BoundaryPolicy::Clamp => 0,
            BoundaryPolicy::Reflect => 1,
        }
    }
}

/// Parameters read (never written) by a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimParams {
    /// Positive attracts, negative repels.
    pub force_scale: f32,
    pub radius: f32,
    pub magnitude_scale: f32,
    /// Multiplicative velocity decay per step, in `(0, 1]`.
    pub velocity_damping: f32,
    pub bounds: Vector3<f32>,
    pub falloff: Falloff,
    pub boundary: BoundaryPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleState {
    pub position: Vector3<f32>,
    pub velocity: Vector3<f32>,
}

/// The force field of a single frame.
#[derive(Debug, Clone, Copy)]
pub struct ForceField<'a> {
    pub params: &'a SimParams,
    pub points: &'a [ForcePoint],
}

impl<'a> ForceField<'a> {
    pub fn new(params: &'a SimParams, points: &'a [ForcePoint]) -> Self {
        Self { params, points }
    }

    /// Summed (not averaged) contribution of every force point at `position`.
    pub fn force_at(&self, position: Vector3<f32>) -> Vector3<f32> {
        let SimParams {
            force_scale,
            radius,
            magnitude_scale,
            falloff,
            ..
        } = *self.params;

        if radius <= 0.0 {
            return Vector3::zero();
        }

        self.points.iter().fold(Vector3::zero(), |force, point| {
            let d = point.position - position;
            let dist = d.magnitude();
            // direction undefined on top of the point
            if dist <= 0.0 {
                return force;
            }
            force + d / dist * (falloff.weight(dist, radius) * force_scale * magnitude_scale)
        })
    }

    /// Integrates one particle by one step.
    pub fn advance(&self, position: Vector3<f32>, velocity: Vector3<f32>) -> ParticleState {
        let velocity = (velocity + self.force_at(position)) * self.params.velocity_damping;
        let position = position + velocity;
        self.confine(ParticleState { position, velocity })
    }

    fn confine(&self, state: ParticleState) -> ParticleState {
        let ParticleState {
            mut position,
            mut velocity,
        } = state;
        let bounds = self.params.bounds;

        for axis in 0..3 {
            let (p, v) = match self.params.boundary {
                BoundaryPolicy::Clamp => (position[axis].clamp(0.0, bounds[axis]), velocity[axis]),
                BoundaryPolicy::Reflect => reflect(position[axis], velocity[axis], bounds[axis]),
            };
            position[axis] = p;
            velocity[axis] = v;
        }

        ParticleState { position, velocity }
    }
}

fn reflect(p: f32, v: f32, bound: f32) -> (f32, f32) {
    if p < 0.0 {
        ((-p).clamp(0.0, bound), -v)
    } else if p > bound {
        ((2.0 * bound - p).clamp(0.0, bound), -v)
    } else {
        (p, v)
    }
}
