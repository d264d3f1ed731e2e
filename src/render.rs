use cgmath::{vec2, InnerSpace, Vector2, Vector3};
use rayon::iter::{
    IndexedParallelIterator as _, IntoParallelIterator as _, ParallelIterator as _,
};

use crate::{error::SimulationError, store::GenerationView};

/// Look of the drawn particles, shared with the GPU render shader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStyle {
    /// Point size of a resting particle with `inv_mass == 1`.
    pub base_size: f32,
    /// Speed at which the color is fully hot.
    pub speed_reference: f32,
    /// Alpha of a resting particle relative to its static alpha.
    pub min_alpha: f32,
    pub cool: [f32; 3],
    pub hot: [f32; 3],
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            base_size: 2.0,
            speed_reference: 8.0,
            min_alpha: 0.35,
            cool: [0.15, 0.45, 1.0],
            hot: [1.0, 0.85, 0.6],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawPoint {
    /// Viewport coordinates.
    pub position: Vector2<f32>,
    pub size: f32,
    pub color: [f32; 4],
}

/// Maps the current generation into drawable points. Never mutates state.
#[derive(Debug, Clone)]
pub struct Renderer {
    /// Particles every rendered view must hold.
    pub particle_count: usize,
    pub bounds: Vector2<f32>,
    pub viewport: Vector2<f32>,
    pub style: RenderStyle,
}

impl Renderer {
    pub fn new(
        particle_count: usize,
        bounds: Vector2<f32>,
        viewport: Vector2<f32>,
        style: RenderStyle,
    ) -> Self {
        Self {
            particle_count,
            bounds,
            viewport,
            style,
        }
    }

    pub fn resize(&mut self, viewport: Vector2<f32>) {
        self.viewport = viewport;
    }

    pub fn to_viewport(&self, position: Vector3<f32>) -> Vector2<f32> {
        let scale = |v: f32, bound: f32, size: f32| {
            if bound > 0.0 {
                v / bound * size
            } else {
                0.0
            }
        };
        vec2(
            scale(position.x, self.bounds.x, self.viewport.x),
            scale(position.y, self.bounds.y, self.viewport.y),
        )
    }

    pub fn point(
        &self,
        position: Vector3<f32>,
        velocity: Vector3<f32>,
        alpha: f32,
        inv_mass: f32,
    ) -> DrawPoint {
        let RenderStyle {
            base_size,
            speed_reference,
            min_alpha,
            cool,
            hot,
        } = self.style;

        let heat = if speed_reference > 0.0 {
            (velocity.magnitude() / speed_reference).min(1.0)
        } else {
            1.0
        };
        let mix = |a: f32, b: f32| a * (1.0 - heat) + b * heat;

        DrawPoint {
            position: self.to_viewport(position),
            size: base_size * (1.0 + heat) * (0.5 + 0.5 * inv_mass),
            color: [
                mix(cool[0], hot[0]),
                mix(cool[1], hot[1]),
                mix(cool[2], hot[2]),
                alpha * (min_alpha + (1.0 - min_alpha) * heat),
            ],
        }
    }

    /// Fills `out` with one point per particle, in particle order.
    pub fn render_into(
        &self,
        view: &GenerationView<'_>,
        out: &mut Vec<DrawPoint>,
    ) -> Result<(), SimulationError> {
        view.check_len(self.particle_count)?;

        (0..view.len())
            .into_par_iter()
            .map(|idx| {
                self.point(
                    view.position[idx],
                    view.velocity[idx],
                    view.static_alpha[idx],
                    view.inv_mass[idx],
                )
            })
            .collect_into_vec(out);
        Ok(())
    }

    pub fn render(&self, view: &GenerationView<'_>) -> Result<Vec<DrawPoint>, SimulationError> {
        let mut out = Vec::with_capacity(view.len());
        self.render_into(view, &mut out)?;
        Ok(out)
    }
}
