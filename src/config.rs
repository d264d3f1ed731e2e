//! Startup configuration of a particle field.
//!
//! Defaults reproduce the installation setup: a 1280x720 lattice over a
//! 1280x720 domain. Every field can be overridden from the environment
//! (`PARTICLE_FIELD_*`), typically through a `.env` file.

use cgmath::Vector3;
use tracing::debug;

use crate::{
    error::ConfigError,
    field::{BoundaryPolicy, Falloff, SimParams},
    render::RenderStyle,
};

pub const FORCE_STRENGTH: f32 = 0.75;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ForceMode {
    #[default]
    Attract,
    Repel,
}

impl ForceMode {
    pub fn signed(self, strength: f32) -> f32 {
        match self {
            ForceMode::Attract => strength.abs(),
            ForceMode::Repel => -strength.abs(),
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ForceMode::Attract => ForceMode::Repel,
            ForceMode::Repel => ForceMode::Attract,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldConfig {
    pub grid_width: u32,
    pub grid_height: u32,
    /// Domain extent; `z == 0` is a flat field.
    pub bounds: [f32; 3],
    pub radius: f32,
    pub magnitude_scale: f32,
    pub velocity_damping: f32,
    /// Factor applied to the force scale once per idle frame.
    pub idle_decay: f32,
    pub force_strength: f32,
    pub initial_mode: ForceMode,
    pub falloff: Falloff,
    pub boundary: BoundaryPolicy,
    pub seed: u64,
    pub style: RenderStyle,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            grid_width: 1280,
            grid_height: 720,
            bounds: [1280.0, 720.0, 0.0],
            radius: 200.0,
            magnitude_scale: 2.5,
            velocity_damping: 0.975,
            idle_decay: 0.98,
            force_strength: FORCE_STRENGTH,
            initial_mode: ForceMode::Attract,
            falloff: Falloff::Linear,
            boundary: BoundaryPolicy::Clamp,
            seed: 0,
            style: RenderStyle::default(),
        }
    }
}

impl FieldConfig {
    /// Default configuration overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
            value.trim().parse().map_err(|_| ConfigError::Env {
                key,
                value: value.to_owned(),
            })
        }

        fn dims(key: &'static str, value: &str) -> Result<Vec<f32>, ConfigError> {
            value.split('x').map(|it| parse(key, it)).collect()
        }

        if let Some(value) = lookup("PARTICLE_FIELD_GRID") {
            let parts = value
                .split('x')
                .map(|it| parse::<u32>("PARTICLE_FIELD_GRID", it))
                .collect::<Result<Vec<_>, _>>()?;
            let [width, height] = parts[..] else {
                return Err(ConfigError::Env {
                    key: "PARTICLE_FIELD_GRID",
                    value,
                });
            };
            self.grid_width = width;
            self.grid_height = height;
        }
        if let Some(value) = lookup("PARTICLE_FIELD_BOUNDS") {
            self.bounds = match dims("PARTICLE_FIELD_BOUNDS", &value)?[..] {
                [x, y] => [x, y, 0.0],
                [x, y, z] => [x, y, z],
                _ => {
                    return Err(ConfigError::Env {
                        key: "PARTICLE_FIELD_BOUNDS",
                        value,
                    })
                }
            };
        }
        if let Some(value) = lookup("PARTICLE_FIELD_RADIUS") {
            self.radius = parse("PARTICLE_FIELD_RADIUS", &value)?;
        }
        if let Some(value) = lookup("PARTICLE_FIELD_MAGNITUDE") {
            self.magnitude_scale = parse("PARTICLE_FIELD_MAGNITUDE", &value)?;
        }
        if let Some(value) = lookup("PARTICLE_FIELD_DAMPING") {
            self.velocity_damping = parse("PARTICLE_FIELD_DAMPING", &value)?;
        }
        if let Some(value) = lookup("PARTICLE_FIELD_IDLE_DECAY") {
            self.idle_decay = parse("PARTICLE_FIELD_IDLE_DECAY", &value)?;
        }
        if let Some(value) = lookup("PARTICLE_FIELD_FORCE") {
            self.force_strength = parse("PARTICLE_FIELD_FORCE", &value)?;
        }
        if let Some(value) = lookup("PARTICLE_FIELD_SEED") {
            self.seed = parse("PARTICLE_FIELD_SEED", &value)?;
        }
        if let Some(value) = lookup("PARTICLE_FIELD_POINT_SIZE") {
            self.style.base_size = parse("PARTICLE_FIELD_POINT_SIZE", &value)?;
        }
        if let Some(value) = lookup("PARTICLE_FIELD_MODE") {
            self.initial_mode = match value.trim().to_ascii_lowercase().as_str() {
                "attract" => ForceMode::Attract,
                "repel" => ForceMode::Repel,
                _ => {
                    return Err(ConfigError::Env {
                        key: "PARTICLE_FIELD_MODE",
                        value,
                    })
                }
            };
        }
        if let Some(value) = lookup("PARTICLE_FIELD_FALLOFF") {
            self.falloff = match value.trim().to_ascii_lowercase().as_str() {
                "linear" => Falloff::Linear,
                "smooth" => Falloff::Smooth,
                _ => {
                    return Err(ConfigError::Env {
                        key: "PARTICLE_FIELD_FALLOFF",
                        value,
                    })
                }
            };
        }
        if let Some(value) = lookup("PARTICLE_FIELD_BOUNDARY") {
            self.boundary = match value.trim().to_ascii_lowercase().as_str() {
                "clamp" => BoundaryPolicy::Clamp,
                "reflect" => BoundaryPolicy::Reflect,
                _ => {
                    return Err(ConfigError::Env {
                        key: "PARTICLE_FIELD_BOUNDARY",
                        value,
                    })
                }
            };
        }

        debug!("field config: {self:?}");
        Ok(self)
    }

    pub fn particle_count(&self) -> usize {
        self.grid_width as usize * self.grid_height as usize
    }

    /// Checks every invariant and derives the initial step parameters.
    pub fn validate(&self) -> Result<SimParams, ConfigError> {
        let Self {
            grid_width: width,
            grid_height: height,
            ..
        } = *self;

        if width == 0 || height == 0 {
            return Err(ConfigError::EmptyGrid { width, height });
        }
        if u32::try_from(self.particle_count()).is_err() {
            return Err(ConfigError::TooManyParticles { width, height });
        }
        let params = SimParams {
            force_scale: self.initial_mode.signed(self.force_strength),
            radius: self.radius,
            magnitude_scale: self.magnitude_scale,
            velocity_damping: self.velocity_damping,
            bounds: Vector3::from(self.bounds),
            falloff: self.falloff,
            boundary: self.boundary,
        };
        validate_params(&params)?;
        if !(0.0..=1.0).contains(&self.idle_decay) {
            return Err(ConfigError::IdleDecay(self.idle_decay));
        }

        Ok(params)
    }
}

/// Invariants of parameters that may also change between frames.
pub fn validate_params(params: &SimParams) -> Result<(), ConfigError> {
    let bounds: [f32; 3] = params.bounds.into();
    if bounds.iter().any(|it| !it.is_finite() || *it < 0.0) {
        return Err(ConfigError::DomainBounds(bounds));
    }
    if !(params.velocity_damping > 0.0 && params.velocity_damping <= 1.0) {
        return Err(ConfigError::VelocityDamping(params.velocity_damping));
    }
    for (name, value) in [
        ("force_scale", params.force_scale),
        ("radius", params.radius),
        ("magnitude_scale", params.magnitude_scale),
    ] {
        if !value.is_finite() {
            return Err(ConfigError::NonFinite { name, value });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let vars: HashMap<_, _> = vars.iter().map(|&(k, v)| (k, v.to_owned())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn default_is_valid() {
        let config = FieldConfig::default();
        let params = config.validate().unwrap();
        assert_eq!(config.particle_count(), 1280 * 720);
        assert_eq!(params.force_scale, FORCE_STRENGTH);
    }

    #[test]
    fn rejects_empty_grid() {
        let config = FieldConfig {
            grid_width: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::EmptyGrid {
                width: 0,
                height: 720
            })
        );
    }

    #[test]
    fn rejects_damping_out_of_range() {
        for damping in [0.0, -0.5, 1.01, f32::NAN] {
            let config = FieldConfig {
                velocity_damping: damping,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(ConfigError::VelocityDamping(_))));
        }
        let config = FieldConfig {
            velocity_damping: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_negative_bounds() {
        let config = FieldConfig {
            bounds: [100.0, -1.0, 0.0],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::DomainBounds(_))));
    }

    #[test]
    fn rejects_non_finite_radius() {
        let config = FieldConfig {
            radius: f32::INFINITY,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonFinite { name: "radius", .. })
        ));
    }

    #[test]
    fn repel_mode_flips_initial_sign() {
        let config = FieldConfig {
            initial_mode: ForceMode::Repel,
            ..Default::default()
        };
        assert_eq!(config.validate().unwrap().force_scale, -FORCE_STRENGTH);
    }

    #[test]
    fn env_overrides() {
        let config = FieldConfig::default()
            .with_overrides(lookup(&[
                ("PARTICLE_FIELD_GRID", "64x32"),
                ("PARTICLE_FIELD_BOUNDS", "640x320"),
                ("PARTICLE_FIELD_RADIUS", "12.5"),
                ("PARTICLE_FIELD_MODE", "Repel"),
                ("PARTICLE_FIELD_BOUNDARY", "reflect"),
                ("PARTICLE_FIELD_FALLOFF", "smooth"),
                ("PARTICLE_FIELD_SEED", "7"),
                ("PARTICLE_FIELD_POINT_SIZE", "3.5"),
            ]))
            .unwrap();

        assert_eq!((config.grid_width, config.grid_height), (64, 32));
        assert_eq!(config.bounds, [640.0, 320.0, 0.0]);
        assert_eq!(config.radius, 12.5);
        assert_eq!(config.initial_mode, ForceMode::Repel);
        assert_eq!(config.boundary, BoundaryPolicy::Reflect);
        assert_eq!(config.falloff, Falloff::Smooth);
        assert_eq!(config.seed, 7);
        assert_eq!(config.style.base_size, 3.5);
    }

    #[test]
    fn env_rejects_garbage() {
        let err = FieldConfig::default()
            .with_overrides(lookup(&[("PARTICLE_FIELD_GRID", "64")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Env {
                key: "PARTICLE_FIELD_GRID",
                value: "64".to_owned()
            }
        );

        let err = FieldConfig::default()
            .with_overrides(lookup(&[("PARTICLE_FIELD_DAMPING", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { key: "PARTICLE_FIELD_DAMPING", .. }));
    }
}
