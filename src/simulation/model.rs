//! Immutable description of a particle system
//!
//! A [`Model`] is produced once by [`ModelBuilder::finalize`](super::builder::ModelBuilder::finalize)
//! and never mutated afterwards. It stores everything that does not change during a run:
//! - per-particle mass, inverse mass, radius, drag and flags
//! - the initial positions and velocities (copied into every new [`State`])
//! - spring topology and coefficients
//! - gravitational pair topology and constants
//! - the uniform gravity vector
//!
//! Per-entity data lives in parallel arrays indexed by particle / spring / pair id.

use serde::Deserialize;

use super::states::{NVec3, State};

/// Bit flags controlling how a particle is simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticleFlags(u32);

impl ParticleFlags {
    /// Particle is dynamic. Cleared means kinematic / fixed anchor.
    pub const ACTIVE: ParticleFlags = ParticleFlags(1 << 0);

    /// No flags set (a fixed particle).
    pub const fn empty() -> Self {
        ParticleFlags(0)
    }

    pub const fn contains(self, other: ParticleFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for ParticleFlags {
    fn default() -> Self {
        ParticleFlags::ACTIVE
    }
}

/// World up axis. Uniform gravity acts along it.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Axis {
    #[serde(rename = "x", alias = "X")]
    X,
    #[serde(rename = "y", alias = "Y")]
    Y,
    #[serde(rename = "z", alias = "Z")]
    #[default]
    Z,
}

impl Axis {
    /// Unit vector along the axis
    pub fn to_vector(self) -> NVec3 {
        match self {
            Axis::X => NVec3::x(),
            Axis::Y => NVec3::y(),
            Axis::Z => NVec3::z(),
        }
    }
}

/// Finalized, read-only particle/spring/gravitational model.
#[derive(Debug, Clone)]
pub struct Model {
    pub(crate) gravity: NVec3, // up_axis * gravity scalar
    pub(crate) up_axis: Axis,

    pub(crate) particle_q: Vec<NVec3>,  // positions at t = 0
    pub(crate) particle_qd: Vec<NVec3>, // velocities at t = 0 (zero for fixed particles)
    pub(crate) particle_mass: Vec<f64>,
    pub(crate) particle_inv_mass: Vec<f64>,
    pub(crate) particle_radius: Vec<f64>, // visualization only
    pub(crate) particle_flags: Vec<ParticleFlags>,
    pub(crate) particle_drag: Vec<f64>,

    pub(crate) spring_indices: Vec<[usize; 2]>,
    pub(crate) spring_rest_length: Vec<f64>,
    pub(crate) spring_stiffness: Vec<f64>,
    pub(crate) spring_damping: Vec<f64>,

    pub(crate) gravitational_pairs: Vec<[usize; 2]>,
    pub(crate) gravitational_constant: Vec<f64>,
}

impl Model {
    /// Create a fresh [`State`] holding a copy of the initial positions and
    /// velocities and a zeroed force buffer.
    pub fn state(&self) -> State {
        State {
            particle_q: self.particle_q.clone(),
            particle_qd: self.particle_qd.clone(),
            particle_f: vec![NVec3::zeros(); self.particle_count()],
        }
    }

    pub fn particle_count(&self) -> usize {
        self.particle_q.len()
    }

    pub fn spring_count(&self) -> usize {
        self.spring_rest_length.len()
    }

    pub fn gravitational_count(&self) -> usize {
        self.gravitational_constant.len()
    }

    /// Number of scalar degrees of freedom (3 per particle)
    pub fn dof_count(&self) -> usize {
        3 * self.particle_count()
    }

    /// Whether particle `i` is dynamic
    #[inline]
    pub fn is_active(&self, i: usize) -> bool {
        self.particle_flags[i].contains(ParticleFlags::ACTIVE)
    }

    pub fn gravity(&self) -> NVec3 {
        self.gravity
    }

    pub fn up_axis(&self) -> Axis {
        self.up_axis
    }

    pub fn particle_q(&self) -> &[NVec3] {
        &self.particle_q
    }

    pub fn particle_qd(&self) -> &[NVec3] {
        &self.particle_qd
    }

    pub fn particle_mass(&self) -> &[f64] {
        &self.particle_mass
    }

    pub fn particle_inv_mass(&self) -> &[f64] {
        &self.particle_inv_mass
    }

    pub fn particle_radius(&self) -> &[f64] {
        &self.particle_radius
    }

    pub fn particle_flags(&self) -> &[ParticleFlags] {
        &self.particle_flags
    }

    pub fn particle_drag(&self) -> &[f64] {
        &self.particle_drag
    }

    pub fn spring_indices(&self) -> &[[usize; 2]] {
        &self.spring_indices
    }

    pub fn spring_rest_length(&self) -> &[f64] {
        &self.spring_rest_length
    }

    pub fn spring_stiffness(&self) -> &[f64] {
        &self.spring_stiffness
    }

    pub fn spring_damping(&self) -> &[f64] {
        &self.spring_damping
    }

    pub fn gravitational_pairs(&self) -> &[[usize; 2]] {
        &self.gravitational_pairs
    }

    pub fn gravitational_constant(&self) -> &[f64] {
        &self.gravitational_constant
    }
}
