//! Staging area for assembling a [`Model`]
//!
//! The builder accumulates particles, springs and gravitational pairs in plain
//! growable lists. Input shape is checked as entities are added; the model
//! invariants are checked once, in [`ModelBuilder::finalize`], which consumes
//! the builder and returns an immutable [`Model`].

use std::ops::Range;

use crate::error::ValidationError;
use super::model::{Axis, Model, ParticleFlags};
use super::states::NVec3;

/// Smallest mass accepted by `finalize`
pub const MIN_PARTICLE_MASS: f64 = 1e-8;

/// Marker for "infer the rest length from the initial configuration"
const INFER_REST_LENGTH: f64 = -1.0;

#[derive(Debug, Clone)]
pub struct ModelBuilder {
    pub default_particle_radius: f64,

    up_axis: Axis,
    gravity: f64, // scalar along up_axis

    // particles
    particle_q: Vec<NVec3>,
    particle_qd: Vec<NVec3>,
    particle_mass: Vec<f64>,
    particle_radius: Vec<f64>,
    particle_flags: Vec<ParticleFlags>,
    particle_drag: Vec<f64>,

    // springs
    spring_indices: Vec<[usize; 2]>,
    spring_rest_length: Vec<f64>,
    spring_stiffness: Vec<f64>,
    spring_damping: Vec<f64>,

    // gravitational
    gravitational_pairs: Vec<[usize; 2]>,
    gravitational_constant: Vec<f64>,
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new(Axis::Z, -9.81)
    }
}

impl ModelBuilder {
    /// Create an empty builder. The model's gravity vector will be
    /// `up_axis.to_vector() * gravity`.
    pub fn new(up_axis: Axis, gravity: f64) -> Self {
        Self {
            default_particle_radius: 0.1,
            up_axis,
            gravity,
            particle_q: Vec::new(),
            particle_qd: Vec::new(),
            particle_mass: Vec::new(),
            particle_radius: Vec::new(),
            particle_flags: Vec::new(),
            particle_drag: Vec::new(),
            spring_indices: Vec::new(),
            spring_rest_length: Vec::new(),
            spring_stiffness: Vec::new(),
            spring_damping: Vec::new(),
            gravitational_pairs: Vec::new(),
            gravitational_constant: Vec::new(),
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

    /// Add a single particle and return its index.
    ///
    /// `radius` defaults to [`default_particle_radius`](Self::default_particle_radius),
    /// `drag` to zero and `flags` to [`ParticleFlags::ACTIVE`].
    pub fn add_particle(
        &mut self,
        pos: impl AsRef<[f64]>,
        vel: impl AsRef<[f64]>,
        mass: f64,
        radius: Option<f64>,
        drag: Option<f64>,
        flags: Option<ParticleFlags>,
    ) -> Result<usize, ValidationError> {
        let index = self.particle_count();
        let q = to_vec3("pos", index, pos.as_ref())?;
        let qd = to_vec3("vel", index, vel.as_ref())?;

        self.particle_q.push(q);
        self.particle_qd.push(qd);
        self.particle_mass.push(mass);
        self.particle_radius.push(radius.unwrap_or(self.default_particle_radius));
        self.particle_drag.push(drag.unwrap_or(0.0));
        self.particle_flags.push(flags.unwrap_or_default());
        Ok(index)
    }

    /// Add a batch of particles and return the range of their indices.
    ///
    /// All input is checked before anything is appended, so a failed call
    /// leaves the builder unchanged.
    pub fn add_particles<P, V>(
        &mut self,
        pos: &[P],
        vel: &[V],
        mass: &[f64],
        radius: Option<&[f64]>,
        drag: Option<&[f64]>,
        flags: Option<&[ParticleFlags]>,
    ) -> Result<Range<usize>, ValidationError>
    where
        P: AsRef<[f64]>,
        V: AsRef<[f64]>,
    {
        let n = pos.len();
        check_len("vel", vel.len(), n)?;
        check_len("mass", mass.len(), n)?;
        if let Some(r) = radius {
            check_len("radius", r.len(), n)?;
        }
        if let Some(d) = drag {
            check_len("drag", d.len(), n)?;
        }
        if let Some(f) = flags {
            check_len("flags", f.len(), n)?;
        }

        let start = self.particle_count();
        let mut qs = Vec::with_capacity(n);
        let mut qds = Vec::with_capacity(n);
        for (k, (p, v)) in pos.iter().zip(vel).enumerate() {
            qs.push(to_vec3("pos", start + k, p.as_ref())?);
            qds.push(to_vec3("vel", start + k, v.as_ref())?);
        }

        self.particle_q.extend(qs);
        self.particle_qd.extend(qds);
        self.particle_mass.extend_from_slice(mass);
        match radius {
            Some(r) => self.particle_radius.extend_from_slice(r),
            None => self
                .particle_radius
                .extend(std::iter::repeat(self.default_particle_radius).take(n)),
        }
        match drag {
            Some(d) => self.particle_drag.extend_from_slice(d),
            None => self.particle_drag.extend(std::iter::repeat(0.0).take(n)),
        }
        match flags {
            Some(f) => self.particle_flags.extend_from_slice(f),
            None => self
                .particle_flags
                .extend(std::iter::repeat(ParticleFlags::ACTIVE).take(n)),
        }
        Ok(start..start + n)
    }

    /// Add a spring between particles `i` and `j` and return its index.
    ///
    /// `damping` defaults to zero. A `None` rest length is inferred at
    /// finalize time from the distance between the two initial positions.
    pub fn add_spring(
        &mut self,
        i: usize,
        j: usize,
        stiffness: f64,
        damping: Option<f64>,
        rest_length: Option<f64>,
    ) -> Result<usize, ValidationError> {
        let spring = self.spring_count();
        let rest = match rest_length {
            // also rejects NaN
            Some(r) if !(r >= 0.0) => {
                return Err(ValidationError::NegativeRestLength {
                    spring,
                    rest_length: r,
                })
            }
            Some(r) => r,
            None => INFER_REST_LENGTH,
        };

        self.spring_indices.push([i, j]);
        self.spring_stiffness.push(stiffness);
        self.spring_damping.push(damping.unwrap_or(0.0));
        self.spring_rest_length.push(rest);
        Ok(spring)
    }

    /// Add an inverse-square attraction between particles `i` and `j`.
    pub fn add_gravitational(&mut self, i: usize, j: usize, g: f64) -> usize {
        self.gravitational_pairs.push([i, j]);
        self.gravitational_constant.push(g);
        self.gravitational_count() - 1
    }

    /// Validate everything and produce the simulation-ready [`Model`].
    ///
    /// Checks run in a fixed order and the first violation is returned:
    /// particle count, particle mass and drag, spring indices, spring
    /// coefficients, gravitational indices, gravitational constants. NaN
    /// fails every check. Fixed particles get
    /// their velocity forced to zero.
    pub fn finalize(self) -> Result<Model, ValidationError> {
        let count = self.particle_count();
        if count == 0 {
            return Err(ValidationError::NoParticles);
        }

        // ---------------------
        // particles
        for (index, &mass) in self.particle_mass.iter().enumerate() {
            // also rejects NaN
            if !(mass >= MIN_PARTICLE_MASS) {
                return Err(ValidationError::MassTooSmall { index, mass });
            }
        }
        for (index, &drag) in self.particle_drag.iter().enumerate() {
            if !(drag >= 0.0) {
                return Err(ValidationError::NegativeDrag { index, drag });
            }
        }
        let particle_inv_mass = self.particle_mass.iter().map(|m| m.recip()).collect();

        let mut particle_qd = self.particle_qd;
        for (qd, flags) in particle_qd.iter_mut().zip(&self.particle_flags) {
            if !flags.contains(ParticleFlags::ACTIVE) {
                *qd = NVec3::zeros();
            }
        }

        // ---------------------
        // springs
        for (spring, pair) in self.spring_indices.iter().enumerate() {
            for &index in pair {
                if index >= count {
                    return Err(ValidationError::SpringIndexOutOfRange { spring, index, count });
                }
            }
        }
        for (spring, (&stiffness, &damping)) in
            self.spring_stiffness.iter().zip(&self.spring_damping).enumerate()
        {
            if !(stiffness >= 0.0 && damping >= 0.0) {
                return Err(ValidationError::SpringCoefficients {
                    spring,
                    stiffness,
                    damping,
                });
            }
        }
        let spring_rest_length = self
            .spring_rest_length
            .iter()
            .zip(&self.spring_indices)
            .map(|(&rest, &[i, j])| {
                if rest < 0.0 {
                    (self.particle_q[i] - self.particle_q[j]).norm()
                } else {
                    rest
                }
            })
            .collect();

        // ---------------------
        // gravitational
        for (pair, ids) in self.gravitational_pairs.iter().enumerate() {
            for &index in ids {
                if index >= count {
                    return Err(ValidationError::GravitationalIndexOutOfRange { pair, index, count });
                }
            }
        }
        for (pair, &g) in self.gravitational_constant.iter().enumerate() {
            if !(g >= 0.0) {
                return Err(ValidationError::NegativeGravitationalConstant { pair, g });
            }
        }

        Ok(Model {
            gravity: self.up_axis.to_vector() * self.gravity,
            up_axis: self.up_axis,
            particle_q: self.particle_q,
            particle_qd,
            particle_mass: self.particle_mass,
            particle_inv_mass,
            particle_radius: self.particle_radius,
            particle_flags: self.particle_flags,
            particle_drag: self.particle_drag,
            spring_indices: self.spring_indices,
            spring_rest_length,
            spring_stiffness: self.spring_stiffness,
            spring_damping: self.spring_damping,
            gravitational_pairs: self.gravitational_pairs,
            gravitational_constant: self.gravitational_constant,
        })
    }
}

fn to_vec3(what: &'static str, index: usize, v: &[f64]) -> Result<NVec3, ValidationError> {
    match v {
        [x, y, z] => Ok(NVec3::new(*x, *y, *z)),
        _ => Err(ValidationError::VectorLength {
            what,
            index,
            len: v.len(),
        }),
    }
}

fn check_len(what: &'static str, len: usize, expected: usize) -> Result<(), ValidationError> {
    if len != expected {
        return Err(ValidationError::LengthMismatch { what, len, expected });
    }
    Ok(())
}
