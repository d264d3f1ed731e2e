use std::sync::atomic::{AtomicBool, Ordering};

use cgmath::{Vector2, Vector3};
use tracing::{debug, trace, warn};

use crate::{
    config::{validate_params, FieldConfig},
    error::{ConfigError, SimulationError},
    field::{ForcePoint, SimParams, MAX_FORCE_POINTS},
    input::InputAdapter,
    stepper::{StepState, Stepper},
    store::{Generation, GenerationView, ParticleStore},
};

/// What an input adapter hands over every frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameInput {
    pub force_points: Vec<ForcePoint>,
    /// Signed; positive attracts.
    pub force_scale: f32,
    /// When set, the running force scale decays instead of following
    /// `force_scale`.
    pub idle: bool,
}

impl FrameInput {
    pub fn idle() -> Self {
        Self {
            idle: true,
            ..Default::default()
        }
    }

    pub fn active(force_points: Vec<ForcePoint>, force_scale: f32) -> Self {
        Self {
            force_points,
            force_scale,
            idle: false,
        }
    }
}

/// Turns raw frame input into the sanitized points and force scale a step
/// consumes. Shared by the CPU and GPU backends.
#[derive(Debug, Clone)]
pub struct InputResolver {
    idle_decay: f32,
    points: Vec<ForcePoint>,
}

impl InputResolver {
    pub fn new(idle_decay: f32) -> Self {
        Self {
            idle_decay,
            points: Vec::with_capacity(MAX_FORCE_POINTS),
        }
    }

    /// Updates `params.force_scale` for this frame and returns the force
    /// points that survive sanitization.
    pub fn resolve(&mut self, input: &FrameInput, params: &mut SimParams) -> &[ForcePoint] {
        if input.idle {
            params.force_scale *= self.idle_decay;
        } else if input.force_scale.is_finite() {
            params.force_scale = input.force_scale;
        } else {
            warn!("ignoring non-finite force scale {}", input.force_scale);
        }

        self.points.clear();
        for point in &input.force_points {
            if !point.is_finite() {
                warn!("dropping malformed force point {:?}", point.position);
                continue;
            }
            if !within_reach(point, params) {
                trace!("force point {:?} out of reach", point.position);
                continue;
            }
            if self.points.len() == MAX_FORCE_POINTS {
                warn!(
                    "dropping force points beyond the first {MAX_FORCE_POINTS}, got {}",
                    input.force_points.len()
                );
                break;
            }
            self.points.push(*point);
        }

        &self.points
    }
}

/// A point farther than `radius` from the domain cannot touch any particle.
fn within_reach(point: &ForcePoint, params: &SimParams) -> bool {
    (0..3).all(|axis| {
        let p = point.position[axis];
        p >= -params.radius && p <= params.bounds[axis] + params.radius
    })
}

/// The CPU particle field: store, stepper and swap driven frame by frame.
#[derive(Debug)]
pub struct Simulation {
    store: ParticleStore,
    params: SimParams,
    resolver: InputResolver,
    stepper: Stepper,
    frame: u64,
}

impl Simulation {
    pub fn new(config: &FieldConfig) -> Result<Self, ConfigError> {
        let params = config.validate()?;
        let store = ParticleStore::new(
            config.grid_width,
            config.grid_height,
            params.bounds,
            config.seed,
        );
        Self::with_store(store, params, config.idle_decay)
    }

    /// Simulation over an already seeded store.
    pub fn with_store(
        store: ParticleStore,
        params: SimParams,
        idle_decay: f32,
    ) -> Result<Self, ConfigError> {
        if store.is_empty() {
            return Err(ConfigError::EmptyStore);
        }
        validate_params(&params)?;
        if !(0.0..=1.0).contains(&idle_decay) {
            return Err(ConfigError::IdleDecay(idle_decay));
        }

        Ok(Self {
            store,
            params,
            resolver: InputResolver::new(idle_decay),
            stepper: Stepper::default(),
            frame: 0,
        })
    }

    /// Steps the field once and exposes the result.
    ///
    /// On error nothing was written and the swap is skipped, the previous
    /// generation stays current.
    pub fn frame(&mut self, input: &FrameInput) -> Result<(), SimulationError> {
        let points = self.resolver.resolve(input, &mut self.params);
        let (read, write) = self.store.split();
        self.stepper.step(read, write, points, &self.params)?;

        self.store.swap();
        self.stepper.finish();
        self.frame += 1;
        trace!(
            "frame {} done, force scale {}, {} force points",
            self.frame,
            self.params.force_scale,
            points.len()
        );

        Ok(())
    }

    /// Pulls input from `adapter` until `shutdown` is raised or `max_frames`
    /// frames ran. Returns the number of frames stepped.
    pub fn run(
        &mut self,
        adapter: &mut dyn InputAdapter,
        shutdown: &AtomicBool,
        max_frames: Option<u64>,
    ) -> Result<u64, SimulationError> {
        let mut count = 0;
        while !shutdown.load(Ordering::Acquire) && max_frames.map_or(true, |max| count < max) {
            let input = adapter.produce();
            self.frame(&input)?;
            count += 1;
        }
        debug!("stopped after {count} frames");
        Ok(count)
    }

    pub fn current_generation(&self) -> GenerationView<'_> {
        self.store.current()
    }

    pub fn particle_count(&self) -> usize {
        self.store.len()
    }

    pub fn domain_bounds(&self) -> Vector2<f32> {
        self.params.bounds.truncate()
    }

    pub fn bounds(&self) -> Vector3<f32> {
        self.params.bounds
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Replaces the parameters between frames.
    pub fn set_params(&mut self, params: SimParams) -> Result<(), ConfigError> {
        validate_params(&params)?;
        self.params = params;
        Ok(())
    }

    pub fn force_scale(&self) -> f32 {
        self.params.force_scale
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    pub fn step_state(&self) -> StepState {
        self.stepper.state()
    }

    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    /// The current generation, for seeding state before the first frame.
    pub fn current_mut(&mut self) -> &mut Generation {
        self.store.current_mut()
    }

    pub fn reset(&mut self) {
        self.store.reset();
        self.frame = 0;
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{vec3, InnerSpace};

    use super::*;
    use crate::field::{BoundaryPolicy, Falloff};

    fn params() -> SimParams {
        SimParams {
            force_scale: 1.0,
            radius: 50.0,
            magnitude_scale: 1.0,
            velocity_damping: 0.9,
            bounds: vec3(100.0, 100.0, 0.0),
            falloff: Falloff::Linear,
            boundary: BoundaryPolicy::Clamp,
        }
    }

    #[test]
    fn idle_decays_force_scale() {
        let mut resolver = InputResolver::new(0.5);
        let mut params = params();
        resolver.resolve(&FrameInput::idle(), &mut params);
        resolver.resolve(&FrameInput::idle(), &mut params);
        assert_eq!(params.force_scale, 0.25);

        resolver.resolve(&FrameInput::active(vec![], -0.75), &mut params);
        assert_eq!(params.force_scale, -0.75);
    }

    #[test]
    fn drops_malformed_points() {
        let mut resolver = InputResolver::new(1.0);
        let mut params = params();
        let input = FrameInput::active(
            vec![
                ForcePoint::new(f32::NAN, 10.0),
                ForcePoint::new(10.0, f32::INFINITY),
                ForcePoint::new(20.0, 20.0),
            ],
            1.0,
        );
        assert_eq!(resolver.resolve(&input, &mut params), &[ForcePoint::new(20.0, 20.0)]);
    }

    #[test]
    fn drops_points_out_of_reach() {
        let mut resolver = InputResolver::new(1.0);
        let mut params = params();
        let input = FrameInput::active(
            vec![
                ForcePoint::new(-60.0, 10.0),
                ForcePoint::new(140.0, 10.0),
                ForcePoint::new(10.0, 10.0),
            ],
            1.0,
        );
        assert_eq!(
            resolver.resolve(&input, &mut params),
            &[ForcePoint::new(140.0, 10.0), ForcePoint::new(10.0, 10.0)]
        );
    }

    #[test]
    fn keeps_at_most_two_points() {
        let mut resolver = InputResolver::new(1.0);
        let mut params = params();
        let input = FrameInput::active(vec![ForcePoint::new(10.0, 10.0); 5], 1.0);
        assert_eq!(resolver.resolve(&input, &mut params).len(), MAX_FORCE_POINTS);
    }

    #[test]
    fn non_finite_scale_keeps_previous() {
        let mut resolver = InputResolver::new(1.0);
        let mut params = params();
        resolver.resolve(&FrameInput::active(vec![], f32::NAN), &mut params);
        assert_eq!(params.force_scale, 1.0);
    }

    #[test]
    fn frame_swaps_generations() {
        let store = ParticleStore::from_positions(vec![vec3(40.0, 50.0, 0.0)], 0);
        let mut sim = Simulation::with_store(store, params(), 1.0).unwrap();
        let input = FrameInput::active(vec![ForcePoint::new(50.0, 50.0)], 1.0);

        sim.frame(&input).unwrap();
        assert_eq!(sim.store().swap_controller().current(), 1);
        assert_eq!(sim.step_state(), StepState::Idle);
        assert_eq!(sim.frame_count(), 1);
        let first = sim.current_generation().velocity[0];
        assert!(first.x > 0.0);

        sim.frame(&input).unwrap();
        assert_eq!(sim.store().swap_controller().current(), 0);
        assert!(sim.current_generation().velocity[0].magnitude() > first.magnitude());
    }

    #[test]
    fn nan_input_never_reaches_particles() {
        let store = ParticleStore::from_positions(vec![vec3(40.0, 50.0, 0.0); 16], 0);
        let mut sim = Simulation::with_store(store, params(), 1.0).unwrap();
        let input = FrameInput::active(vec![ForcePoint::new(f32::NAN, f32::NAN)], f32::NAN);

        for _ in 0..10 {
            sim.frame(&input).unwrap();
        }
        let view = sim.current_generation();
        assert!(view
            .position
            .iter()
            .chain(view.velocity)
            .all(|v| v.x.is_finite() && v.y.is_finite()));
    }

    #[test]
    fn rejects_invalid_params() {
        let store = ParticleStore::from_positions(vec![vec3(0.0, 0.0, 0.0)], 0);
        let bad = SimParams {
            velocity_damping: 1.5,
            ..params()
        };
        assert!(Simulation::with_store(store.clone(), bad, 1.0).is_err());
        assert!(Simulation::with_store(store.clone(), params(), 2.0).is_err());

        let mut sim = Simulation::with_store(store, params(), 1.0).unwrap();
        assert!(sim.set_params(bad).is_err());
        assert_eq!(sim.params(), &params());
    }

    #[test]
    fn rejects_empty_store() {
        let store = ParticleStore::from_positions(vec![], 0);
        assert_eq!(
            Simulation::with_store(store, params(), 1.0).unwrap_err(),
            ConfigError::EmptyStore
        );
    }

    #[test]
    fn run_stops_on_shutdown_or_frame_limit() {
        struct Still;
        impl InputAdapter for Still {
            fn produce(&mut self) -> FrameInput {
                FrameInput::idle()
            }
        }

        let mut sim = Simulation::new(&FieldConfig {
            grid_width: 4,
            grid_height: 4,
            ..Default::default()
        })
        .unwrap();

        let shutdown = AtomicBool::new(false);
        assert_eq!(sim.run(&mut Still, &shutdown, Some(3)).unwrap(), 3);
        assert_eq!(sim.frame_count(), 3);

        shutdown.store(true, Ordering::Release);
        assert_eq!(sim.run(&mut Still, &shutdown, None).unwrap(), 0);
    }
}
