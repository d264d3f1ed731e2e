use cgmath::{vec3, Vector3, Zero};
use itertools::Itertools as _;
use rand::{rngs::SmallRng, Rng as _, SeedableRng};
use tracing::info;

use crate::{error::SimulationError, swap::SwapController};

/// One complete position/velocity snapshot of the field.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub position: Vec<Vector3<f32>>,
    pub velocity: Vec<Vector3<f32>>,
}

impl Generation {
    pub fn len(&self) -> usize {
        self.position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }

    pub(crate) fn check_len(&self, expected: usize) -> Result<(), SimulationError> {
        for found in [self.position.len(), self.velocity.len()] {
            if found != expected {
                return Err(SimulationError::GenerationMismatch { expected, found });
            }
        }
        Ok(())
    }
}

/// Per-particle attributes drawn once at creation and shared by both
/// generations.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticAttributes {
    pub alpha: Vec<f32>,
    pub inv_mass: Vec<f32>,
}

impl StaticAttributes {
    pub fn generate(count: usize, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let (alpha, inv_mass) = (0..count)
            .map(|_| (rng.gen_range(0.25_f32..1.0), rng.gen::<f32>()))
            .unzip();
        Self { alpha, inv_mass }
    }
}

/// Read-only view of the generation currently exposed for drawing.
#[derive(Debug, Clone, Copy)]
pub struct GenerationView<'a> {
    pub position: &'a [Vector3<f32>],
    pub velocity: &'a [Vector3<f32>],
    pub static_alpha: &'a [f32],
    pub inv_mass: &'a [f32],
}

impl GenerationView<'_> {
    pub fn len(&self) -> usize {
        self.position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }

    pub fn check_len(&self, expected: usize) -> Result<(), SimulationError> {
        for found in [
            self.position.len(),
            self.velocity.len(),
            self.static_alpha.len(),
            self.inv_mass.len(),
        ] {
            if found != expected {
                return Err(SimulationError::GenerationMismatch { expected, found });
            }
        }
        Ok(())
    }
}

/// Regular lattice spanning `[0, bounds)` on x and y, at z = 0.
pub fn lattice(width: u32, height: u32, bounds: Vector3<f32>) -> Vec<Vector3<f32>> {
    (0..width)
        .cartesian_product(0..height)
        .map(|(x, y)| {
            vec3(
                x as f32 * bounds.x / width as f32,
                y as f32 * bounds.y / height as f32,
                0.0,
            )
        })
        .collect()
}

/// Owns both generations and the static attributes of a fixed-size field.
#[derive(Debug, Clone)]
pub struct ParticleStore {
    generations: [Generation; 2],
    statics: StaticAttributes,
    swap: SwapController,
    initial: Vec<Vector3<f32>>,
}

impl ParticleStore {
    pub fn new(width: u32, height: u32, bounds: Vector3<f32>, seed: u64) -> Self {
        let store = Self::from_positions(lattice(width, height, bounds), seed);
        info!("generated {} particles", store.len());
        store
    }

    /// Store seeded with explicit positions and zero velocity.
    pub fn from_positions(positions: Vec<Vector3<f32>>, seed: u64) -> Self {
        let count = positions.len();
        let generation = Generation {
            position: positions.clone(),
            velocity: vec![Vector3::zero(); count],
        };

        Self {
            generations: [generation.clone(), generation],
            statics: StaticAttributes::generate(count, seed),
            swap: SwapController::default(),
            initial: positions,
        }
    }

    pub fn len(&self) -> usize {
        self.statics.alpha.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn statics(&self) -> &StaticAttributes {
        &self.statics
    }

    pub fn swap_controller(&self) -> SwapController {
        self.swap
    }

    pub fn current(&self) -> GenerationView<'_> {
        let generation = &self.generations[self.swap.current()];
        GenerationView {
            position: &generation.position,
            velocity: &generation.velocity,
            static_alpha: &self.statics.alpha,
            inv_mass: &self.statics.inv_mass,
        }
    }

    /// Mutable access to the current generation, for seeding state before a
    /// run starts.
    pub fn current_mut(&mut self) -> &mut Generation {
        &mut self.generations[self.swap.current()]
    }

    /// Splits into the generation to read and the one to write this frame.
    pub fn split(&mut self) -> (&Generation, &mut Generation) {
        let [a, b] = &mut self.generations;
        match self.swap.current() {
            0 => (&*a, b),
            _ => (&*b, a),
        }
    }

    pub fn swap(&mut self) {
        self.swap.swap();
    }

    /// Back to the initial lattice at rest, static attributes kept.
    pub fn reset(&mut self) {
        for generation in &mut self.generations {
            generation.position.copy_from_slice(&self.initial);
            generation.velocity.fill(Vector3::zero());
        }
        self.swap.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lattice_covers_domain() {
        let points = lattice(4, 2, vec3(100.0, 50.0, 0.0));
        assert_eq!(points.len(), 8);
        assert_eq!(points[0], vec3(0.0, 0.0, 0.0));
        assert_eq!(points[1], vec3(0.0, 25.0, 0.0));
        assert_eq!(points[7], vec3(75.0, 25.0, 0.0));
        assert!(points.iter().all(|p| p.x < 100.0 && p.y < 50.0));
    }

    #[test]
    fn statics_are_seeded_and_in_range() {
        let a = StaticAttributes::generate(1000, 3);
        let b = StaticAttributes::generate(1000, 3);
        assert_eq!(a, b);
        assert!(a.alpha.iter().all(|it| (0.25..1.0).contains(it)));
        assert!(a.inv_mass.iter().all(|it| (0.0..1.0).contains(it)));
        assert_ne!(a, StaticAttributes::generate(1000, 4));
    }

    #[test]
    fn new_store_is_at_rest() {
        let store = ParticleStore::new(8, 8, vec3(80.0, 80.0, 0.0), 0);
        let view = store.current();
        assert_eq!(view.len(), 64);
        view.check_len(64).unwrap();
        assert!(view.velocity.iter().all(|v| v.is_zero()));
    }

    #[test]
    fn split_follows_swap() {
        let mut store = ParticleStore::new(2, 2, vec3(10.0, 10.0, 0.0), 0);
        {
            let (_, write) = store.split();
            write.velocity[0] = vec3(1.0, 0.0, 0.0);
        }
        assert!(store.current().velocity[0].is_zero());

        store.swap();
        assert_eq!(store.current().velocity[0], vec3(1.0, 0.0, 0.0));

        let (read, _) = store.split();
        assert_eq!(read.velocity[0], vec3(1.0, 0.0, 0.0));
    }

    #[test]
    fn reset_restores_lattice() {
        let mut store = ParticleStore::new(2, 2, vec3(10.0, 10.0, 0.0), 0);
        let initial = store.current().position.to_vec();
        let alpha = store.statics().alpha.clone();

        store.current_mut().position[3] = vec3(1.0, 1.0, 0.0);
        store.current_mut().velocity[3] = vec3(1.0, 1.0, 0.0);
        store.swap();
        store.reset();

        assert_eq!(store.swap_controller().current(), 0);
        assert_eq!(store.current().position, &initial[..]);
        assert!(store.current().velocity.iter().all(|v| v.is_zero()));
        assert_eq!(store.statics().alpha, alpha);
    }

    #[test]
    fn mismatched_generation_is_reported() {
        let generation = Generation {
            position: vec![Vector3::zero(); 3],
            velocity: vec![Vector3::zero(); 2],
        };
        assert_eq!(
            generation.check_len(3),
            Err(SimulationError::GenerationMismatch {
                expected: 3,
                found: 2
            })
        );
    }
}
