//! Error types for model construction, scene loading and time stepping.
//!
//! Two distinct families:
//! - [`ValidationError`]: malformed builder input or a violated model invariant
//! - [`NumericalError`]: a linear system the implicit solvers cannot factor
//!
//! [`SimError`] wraps both together with I/O and YAML failures for the
//! scene-loading path.

use thiserror::Error;

/// Rejected builder input or model invariant violation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{what} of particle {index} must have 3 components, got {len}")]
    VectorLength {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("batched particle input has mismatched lengths: {what} has {len}, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        len: usize,
        expected: usize,
    },

    #[error("model has no particles")]
    NoParticles,

    #[error("particle {index} mass ({mass}) is too small")]
    MassTooSmall { index: usize, mass: f64 },

    #[error("particle {index} drag ({drag}) must be a non-negative number")]
    NegativeDrag { index: usize, drag: f64 },

    #[error("spring {spring} particle index ({index}) is out of range (count: {count})")]
    SpringIndexOutOfRange {
        spring: usize,
        index: usize,
        count: usize,
    },

    #[error("spring {spring} fails (stiffness >= 0) and (damping >= 0): ke={stiffness}, kd={damping}")]
    SpringCoefficients {
        spring: usize,
        stiffness: f64,
        damping: f64,
    },

    #[error("spring {spring} rest length ({rest_length}) must be a non-negative number")]
    NegativeRestLength { spring: usize, rest_length: f64 },

    #[error("gravitational pair {pair} particle index ({index}) is out of range (count: {count})")]
    GravitationalIndexOutOfRange {
        pair: usize,
        index: usize,
        count: usize,
    },

    #[error("gravitational pair {pair} constant ({g}) must be a non-negative number")]
    NegativeGravitationalConstant { pair: usize, g: f64 },

    #[error("{what} {index}: particle_ids must be two index numbers, got {len}")]
    ParticleIds {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("timestep ({dt}) must be positive and finite")]
    Timestep { dt: f64 },

    #[error("max_iterations ({max_iterations}) must be at least 1")]
    MaxIterations { max_iterations: usize },

    #[error("tolerance ({tolerance}) must be a non-negative number")]
    Tolerance { tolerance: f64 },

    #[error("probe is invalid: {reason}")]
    Probe { reason: String },
}

/// Failure inside an implicit solve.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NumericalError {
    #[error("system matrix ({dim}x{dim}) is singular and cannot be factored")]
    SingularSystem { dim: usize },

    #[error("system matrix ({dim}x{dim}) contains non-finite entries")]
    NonFiniteSystem { dim: usize },

    #[error("linear solve produced a non-finite solution (system is ill-conditioned)")]
    NonFiniteSolution,
}

/// Umbrella error for loading and running a scene.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Numerical(#[from] NumericalError),

    #[error("failed to read scene: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse scene: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
