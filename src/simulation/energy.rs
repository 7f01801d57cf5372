//! Energy and momentum diagnostics
//!
//! Used to judge integrator behaviour (energy drift) and for the run summary.
//! Potentials match the force laws in [`super::forces`]:
//! - springs: `1/2 ke (|d| - l0)^2`
//! - gravitational pairs: `-G m_i m_j / |d|`
//! - uniform gravity: `-m g . x`
//!
//! Fixed particles carry no kinetic energy and no uniform-gravity potential.
//! Drag and wind are non-conservative and have no potential.

use super::forces::MIN_SEPARATION;
use super::model::Model;
use super::states::{NVec3, State};

/// `sum 1/2 m_i |v_i|^2` over active particles
pub fn kinetic_energy(model: &Model, state: &State) -> f64 {
    (0..model.particle_count())
        .filter(|&i| model.is_active(i))
        .map(|i| 0.5 * model.particle_mass[i] * state.particle_qd[i].norm_squared())
        .sum()
}

/// Elastic energy stored in all springs
pub fn spring_potential_energy(model: &Model, state: &State) -> f64 {
    model
        .spring_indices
        .iter()
        .enumerate()
        .map(|(s, &[i, j])| {
            let stretch = (state.particle_q[i] - state.particle_q[j]).norm() - model.spring_rest_length[s];
            0.5 * model.spring_stiffness[s] * stretch * stretch
        })
        .sum()
}

/// Potential of all gravitational pairs (coincident pairs contribute nothing)
pub fn gravitational_potential_energy(model: &Model, state: &State) -> f64 {
    model
        .gravitational_pairs
        .iter()
        .enumerate()
        .map(|(g, &[i, j])| {
            let n = (state.particle_q[i] - state.particle_q[j]).norm();
            if n <= MIN_SEPARATION {
                return 0.0;
            }
            -model.gravitational_constant[g] * model.particle_mass[i] * model.particle_mass[j] / n
        })
        .sum()
}

/// Potential of the uniform gravity field, zero at the origin
pub fn uniform_gravity_potential_energy(model: &Model, state: &State) -> f64 {
    (0..model.particle_count())
        .filter(|&i| model.is_active(i))
        .map(|i| -model.particle_mass[i] * model.gravity.dot(&state.particle_q[i]))
        .sum()
}

pub fn potential_energy(model: &Model, state: &State) -> f64 {
    spring_potential_energy(model, state)
        + gravitational_potential_energy(model, state)
        + uniform_gravity_potential_energy(model, state)
}

/// Kinetic + potential energy
pub fn total_energy(model: &Model, state: &State) -> f64 {
    kinetic_energy(model, state) + potential_energy(model, state)
}

/// `sum m_i v_i` over active particles
pub fn linear_momentum(model: &Model, state: &State) -> NVec3 {
    (0..model.particle_count())
        .filter(|&i| model.is_active(i))
        .fold(NVec3::zeros(), |p, i| p + model.particle_mass[i] * state.particle_qd[i])
}
