use bytemuck::{NoUninit, Pod, Zeroable};
use cgmath::Vector3;

use crate::{
    field::{ForcePoint, SimParams, MAX_FORCE_POINTS},
    render::RenderStyle,
};

/// One particle of a generation buffer, laid out like the shader's
/// `Particle` (two `vec4<f32>`, `w` unused).
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct GpuParticle {
    pub pos: [f32; 4],
    pub velocity: [f32; 4],
}

impl GpuParticle {
    pub fn new(pos: Vector3<f32>, velocity: Vector3<f32>) -> Self {
        Self {
            pos: pos.extend(0.0).into(),
            velocity: velocity.extend(0.0).into(),
        }
    }

    pub fn position(&self) -> Vector3<f32> {
        Vector3::new(self.pos[0], self.pos[1], self.pos[2])
    }

    pub fn velocity(&self) -> Vector3<f32> {
        Vector3::new(self.velocity[0], self.velocity[1], self.velocity[2])
    }
}

/// Static per-particle attributes, shared by both generations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct GpuAttribute {
    pub alpha: f32,
    pub inv_mass: f32,
}

/// Compute push constants, mirrors `Param` in `simulate.wgsl`.
#[derive(Debug, Clone, Copy, Default, PartialEq, NoUninit)]
#[repr(C)]
pub struct StepParam {
    pub force_points: [[f32; 4]; MAX_FORCE_POINTS],
    pub bounds: [f32; 4],
    pub point_count: u32,
    pub force_scale: f32,
    pub radius: f32,
    pub magnitude_scale: f32,
    pub velocity_damping: f32,
    pub falloff: u32,
    pub boundary: u32,
    pub particle_count: u32,
}

impl StepParam {
    pub fn new(params: &SimParams, points: &[ForcePoint], particle_count: u32) -> Self {
        let mut force_points = [[0.0; 4]; MAX_FORCE_POINTS];
        for (slot, point) in force_points.iter_mut().zip(points) {
            *slot = point.position.extend(0.0).into();
        }

        Self {
            force_points,
            bounds: params.bounds.extend(0.0).into(),
            point_count: points.len().min(MAX_FORCE_POINTS) as u32,
            force_scale: params.force_scale,
            radius: params.radius,
            magnitude_scale: params.magnitude_scale,
            velocity_damping: params.velocity_damping,
            falloff: params.falloff.gpu_id(),
            boundary: params.boundary.gpu_id(),
            particle_count,
        }
    }
}

/// Render push constants, mirrors `Param` in `render.wgsl`.
#[derive(Debug, Clone, Copy, Default, PartialEq, NoUninit)]
#[repr(C)]
pub struct DrawParam {
    pub bounds: [f32; 2],
    pub viewport: [f32; 2],
    /// `w` is the minimum alpha.
    pub cool: [f32; 4],
    /// `w` is the reference speed.
    pub hot: [f32; 4],
    pub base_size: f32,
    pub _padding: [f32; 3],
}

impl DrawParam {
    pub fn new(bounds: [f32; 2], viewport: [f32; 2], style: &RenderStyle) -> Self {
        let [cr, cg, cb] = style.cool;
        let [hr, hg, hb] = style.hot;
        Self {
            bounds,
            viewport,
            cool: [cr, cg, cb, style.min_alpha],
            hot: [hr, hg, hb, style.speed_reference],
            base_size: style.base_size,
            _padding: [0.0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use std::mem::size_of;

    use cgmath::vec3;

    use super::*;
    use crate::field::{BoundaryPolicy, Falloff};

    #[test]
    fn layouts_match_shaders() {
        assert_eq!(size_of::<GpuParticle>(), 32);
        assert_eq!(size_of::<GpuAttribute>(), 8);
        assert_eq!(size_of::<StepParam>(), 80);
        assert_eq!(size_of::<DrawParam>(), 64);
    }

    #[test]
    fn step_param_packs_points() {
        let params = SimParams {
            force_scale: -0.5,
            radius: 10.0,
            magnitude_scale: 2.0,
            velocity_damping: 0.9,
            bounds: vec3(100.0, 50.0, 0.0),
            falloff: Falloff::Smooth,
            boundary: BoundaryPolicy::Reflect,
        };
        let param = StepParam::new(&params, &[ForcePoint::new(1.0, 2.0)], 42);
        assert_eq!(param.point_count, 1);
        assert_eq!(param.force_points, [[1.0, 2.0, 0.0, 0.0], [0.0; 4]]);
        assert_eq!(param.bounds, [100.0, 50.0, 0.0, 0.0]);
        assert_eq!((param.falloff, param.boundary), (1, 1));
        assert_eq!(param.particle_count, 42);
    }
}
