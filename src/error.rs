use thiserror::Error;

/// Rejected configuration. Raised before any buffer is allocated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("particle grid must not be empty, got {width}x{height}")]
    EmptyGrid { width: u32, height: u32 },
    #[error("particle grid {width}x{height} exceeds u32::MAX particles")]
    TooManyParticles { width: u32, height: u32 },
    #[error("particle store must hold at least one particle")]
    EmptyStore,
    #[error("velocity damping must be in (0, 1], got {0}")]
    VelocityDamping(f32),
    #[error("idle decay must be in [0, 1], got {0}")]
    IdleDecay(f32),
    #[error("domain bounds must be finite and non-negative, got {0:?}")]
    DomainBounds([f32; 3]),
    #[error("parameter `{name}` must be finite, got {value}")]
    NonFinite { name: &'static str, value: f32 },
    #[error("failed to parse env var `{key}` = {value:?}")]
    Env { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    /// A generation or attribute array does not hold exactly `expected`
    /// particles. Only a construction bug can cause this.
    #[error("generation size mismatch, expected {expected} particles, found {found}")]
    GenerationMismatch { expected: usize, found: usize },
}
