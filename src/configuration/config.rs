//! Configuration types for loading simulation scenes from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! scene. A scene consists of:
//!
//! - [`SolverConfig`]        – integrator type, timestep and global fields (gravity, wind)
//! - [`ParticleConfig`]      – initial state of each particle
//! - [`SpringConfig`]        – springs between particle pairs
//! - [`GravitationalConfig`] – pairwise gravitational attraction
//! - [`ProbeConfig`]         – optional recording of one particle coordinate
//! - [`SceneConfig`]         – top-level wrapper used to load a scene from YAML
//!
//! # YAML format
//! A hanging two-particle chain matching these types:
//!
//! ```yaml
//! solver:
//!   type: implicit_euler    # explicit_euler | symplectic_euler | midpoint
//!                           # | linearized_implicit | implicit_euler
//!   timestep: 0.01
//!   gravity: -9.81          # optional, along up_axis
//!   up_axis: z              # optional
//!
//! particles:
//!   - pos: [0.0, 0.0, 2.0]
//!     mass: 1.0
//!     fixed: true
//!   - pos: [0.5, 0.0, 2.0]
//!     vel: [0.0, 0.0, 0.0]
//!     mass: 0.5
//!     drag: 0.05
//!
//! springs:
//!   - particle_ids: [0, 1]
//!     stiffness: 200.0
//!     damping: 0.5          # optional
//!     rest_length: 0.5      # optional, inferred from the initial positions
//!
//! plot:
//!   particle_id: 1
//!   dof: 2
//!   y_range: [0.0, 3.0]
//! ```
//!
//! The scene is turned into a model and solver by
//! [`Scenario::build_scenario`](crate::simulation::scenario::Scenario::build_scenario),
//! which is where the model invariants are checked.

use serde::Deserialize;

use crate::simulation::integrator::IntegratorKind;
use crate::simulation::model::Axis;

fn default_gravity() -> f64 {
    -9.81
}

/// Constant wind applied to every active particle
#[derive(Deserialize, Debug, Clone)]
pub struct WindConfig {
    pub direction: Vec<f64>, // normalized at load time
    pub strength: f64,
}

/// Integrator selection and global fields
#[derive(Deserialize, Debug, Clone)]
pub struct SolverConfig {
    #[serde(rename = "type")]
    pub kind: IntegratorKind, // which integrator advances the scene
    pub timestep: f64, // default step size
    #[serde(default = "default_gravity")]
    pub gravity: f64, // scalar gravity along up_axis
    #[serde(default)]
    pub up_axis: Axis,
    pub max_iterations: Option<usize>, // implicit_euler only
    pub tolerance: Option<f64>,        // implicit_euler only
    pub wind: Option<WindConfig>,
}

/// Initial state of one particle
#[derive(Deserialize, Debug, Clone)]
pub struct ParticleConfig {
    pub pos: Vec<f64>,         // initial position
    pub vel: Option<Vec<f64>>, // initial velocity, zero when absent
    pub mass: f64,
    pub radius: Option<f64>, // visualization only
    pub drag: Option<f64>,   // linear drag coefficient
    #[serde(default)]
    pub fixed: bool, // true -> particle is a fixed anchor
}

#[derive(Deserialize, Debug, Clone)]
pub struct SpringConfig {
    pub particle_ids: Vec<usize>, // exactly two entries
    pub stiffness: f64,
    pub damping: Option<f64>,
    pub rest_length: Option<f64>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct GravitationalConfig {
    pub particle_ids: Vec<usize>, // exactly two entries
    #[serde(rename = "G")]
    pub g: f64,
}

/// Coordinate `dof` of particle `particle_id`, expected within `y_range`
#[derive(Deserialize, Debug, Clone)]
pub struct ProbeConfig {
    pub particle_id: usize,
    pub dof: usize,
    pub y_range: [f64; 2],
}

/// Top-level scene configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone)]
pub struct SceneConfig {
    pub solver: SolverConfig,
    #[serde(default)]
    pub particles: Vec<ParticleConfig>,
    #[serde(default)]
    pub springs: Vec<SpringConfig>,
    #[serde(default)]
    pub gravitational: Vec<GravitationalConfig>,
    pub plot: Option<ProbeConfig>,
}

impl SceneConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(s)
    }
}
