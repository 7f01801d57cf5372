//! Force contributors and their Jacobians
//!
//! Every term implements [`ForceTerm`] and is collected into a [`ForceSet`].
//! Terms read positions/velocities from a [`State`] and *add* into
//! `state.particle_f`; they never clear it, so calling a term twice doubles
//! its contribution. Clearing is the caller's job.
//!
//! Flag handling is the same for every term: pairwise quantities are always
//! computed from both endpoints, but a particle whose ACTIVE flag is unset never
//! receives a force. The Jacobians follow the same rule, so the row block of a
//! fixed particle stays zero while its column block still carries the
//! coupling felt by an active partner.
//!
//! Jacobian methods compute `A += scale * dF/dq` (positions) or
//! `A += scale * dF/dqd` (velocities).

use log::warn;

use super::jacobian::SystemMatrix;
use super::model::Model;
use super::states::{NMat3, NVec3, State};

/// Separations at or below this are treated as coincident particles
pub const MIN_SEPARATION: f64 = 1e-10;

/// Trait for force sources operating on a [`Model`] / [`State`] pair
pub trait ForceTerm {
    fn name(&self) -> &'static str;

    /// Accumulate this term's forces into `state.particle_f`
    fn eval_forces(&self, model: &Model, state: &mut State);

    /// `a += scale * dF/dq`. Default: force does not depend on position.
    fn eval_pos_jacobians(&self, _model: &Model, _state: &State, _a: &mut dyn SystemMatrix, _scale: f64) {}

    /// `a += scale * dF/dqd`. Default: force does not depend on velocity.
    fn eval_vel_jacobians(&self, _model: &Model, _state: &State, _a: &mut dyn SystemMatrix, _scale: f64) {}
}

/// Collection of force terms (springs, gravity, drag, etc)
/// Contributions of all terms are summed into `particle_f`
pub struct ForceSet {
    terms: Vec<Box<dyn ForceTerm + Send + Sync>>,
}

impl Default for ForceSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl ForceSet {
    /// Create an empty force set
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    /// Springs, gravitational pairs, drag and uniform gravity
    pub fn standard() -> Self {
        Self::new()
            .with(SpringForce)
            .with(GravitationalForce)
            .with(DragForce)
            .with(UniformGravity)
    }

    /// Add a force term
    pub fn with(mut self, term: impl ForceTerm + Send + Sync + 'static) -> Self {
        self.terms.push(Box::new(term));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.terms.iter().map(|t| t.name()).collect()
    }

    /// Accumulate every term into `state.particle_f` (no clearing)
    pub fn eval_forces(&self, model: &Model, state: &mut State) {
        for term in &self.terms {
            term.eval_forces(model, state);
        }
    }

    pub fn eval_pos_jacobians(&self, model: &Model, state: &State, a: &mut dyn SystemMatrix, scale: f64) {
        for term in &self.terms {
            term.eval_pos_jacobians(model, state, a, scale);
        }
    }

    pub fn eval_vel_jacobians(&self, model: &Model, state: &State, a: &mut dyn SystemMatrix, scale: f64) {
        for term in &self.terms {
            term.eval_vel_jacobians(model, state, a, scale);
        }
    }
}

/// Add the four blocks of a pair interaction whose force on `i` has
/// derivative `k` with respect to `x_i - x_j`. Rows of fixed particles stay zero.
fn add_pair_blocks(model: &Model, a: &mut dyn SystemMatrix, i: usize, j: usize, k: &NMat3) {
    let neg = -*k;
    if model.is_active(i) {
        a.add_block(i, i, k);
        a.add_block(i, j, &neg);
    }
    if model.is_active(j) {
        a.add_block(j, i, &neg);
        a.add_block(j, j, k);
    }
}

// =========================================================================================
// Springs
// =========================================================================================

/// Damped linear springs
///
/// With `d = x_i - x_j`, `n = |d|`, `u = d / n` and `v = v_i - v_j` the force on `i` is
/// `(ke * (l0 - n) - kd * (v . u)) * u`; `j` receives the negation.
/// Coincident endpoints (`n <= MIN_SEPARATION`) only get the damping term `-kd * v`.
pub struct SpringForce;

impl ForceTerm for SpringForce {
    fn name(&self) -> &'static str {
        "spring"
    }

    fn eval_forces(&self, model: &Model, state: &mut State) {
        let State { particle_q: q, particle_qd: qd, particle_f: f } = state;

        for (s, &[i, j]) in model.spring_indices.iter().enumerate() {
            let d = q[i] - q[j];
            let n = d.norm();
            let v = qd[i] - qd[j];
            let kd = model.spring_damping[s];

            let f_tot = if n > MIN_SEPARATION {
                let u = d / n;
                let elastic = model.spring_stiffness[s] * (model.spring_rest_length[s] - n);
                let damping = kd * v.dot(&u);
                (elastic - damping) * u
            } else {
                -kd * v
            };

            if model.is_active(i) {
                f[i] += f_tot;
            }
            if model.is_active(j) {
                f[j] -= f_tot;
            }
        }
    }

    fn eval_pos_jacobians(&self, model: &Model, state: &State, a: &mut dyn SystemMatrix, scale: f64) {
        for (s, &[i, j]) in model.spring_indices.iter().enumerate() {
            let d = state.particle_q[i] - state.particle_q[j];
            let n = d.norm();
            // damping-only branch has no position dependence
            if n <= MIN_SEPARATION {
                continue;
            }
            let u = d / n;
            let v = state.particle_qd[i] - state.particle_qd[j];
            let uu = u * u.transpose();
            let p = NMat3::identity() - uu;

            let ke = model.spring_stiffness[s];
            let kd = model.spring_damping[s];
            let l0 = model.spring_rest_length[s];

            // elastic: rank-1 part along u plus isotropic part in the orthogonal plane
            let k_elastic = -ke * (uu + (1.0 - l0 / n) * p);
            // damping: derivative through u
            let k_damping = -(kd / n) * (u * (v.transpose() * p) + v.dot(&u) * p);

            add_pair_blocks(model, a, i, j, &(scale * (k_elastic + k_damping)));
        }
    }

    fn eval_vel_jacobians(&self, model: &Model, state: &State, a: &mut dyn SystemMatrix, scale: f64) {
        for (s, &[i, j]) in model.spring_indices.iter().enumerate() {
            let kd = model.spring_damping[s];
            if kd == 0.0 {
                continue;
            }
            let d = state.particle_q[i] - state.particle_q[j];
            let n = d.norm();
            let k = if n > MIN_SEPARATION {
                let u = d / n;
                -kd * (u * u.transpose())
            } else {
                -kd * NMat3::identity()
            };
            add_pair_blocks(model, a, i, j, &(scale * k));
        }
    }
}

// =========================================================================================
// Gravitational pairs
// =========================================================================================

/// Pairwise inverse-square attraction `F_i = -G m_i m_j d / |d|^3`, `d = x_i - x_j`.
/// Skipped entirely for coincident particles.
pub struct GravitationalForce;

impl ForceTerm for GravitationalForce {
    fn name(&self) -> &'static str {
        "gravitational"
    }

    fn eval_forces(&self, model: &Model, state: &mut State) {
        let State { particle_q: q, particle_f: f, .. } = state;

        for (g, &[i, j]) in model.gravitational_pairs.iter().enumerate() {
            let d = q[i] - q[j];
            let n = d.norm();
            if n <= MIN_SEPARATION {
                continue;
            }
            let c = model.gravitational_constant[g] * model.particle_mass[i] * model.particle_mass[j];
            let f_g = d * (c / (n * n * n));

            // i is pulled toward j, j toward i
            if model.is_active(i) {
                f[i] -= f_g;
            }
            if model.is_active(j) {
                f[j] += f_g;
            }
        }
    }

    fn eval_pos_jacobians(&self, model: &Model, state: &State, a: &mut dyn SystemMatrix, scale: f64) {
        for (g, &[i, j]) in model.gravitational_pairs.iter().enumerate() {
            let d = state.particle_q[i] - state.particle_q[j];
            let n = d.norm();
            if n <= MIN_SEPARATION {
                continue;
            }
            let u = d / n;
            let c = model.gravitational_constant[g] * model.particle_mass[i] * model.particle_mass[j];
            // d/dd of -c d / n^3 = -c / n^3 (I - 3 u u^T)
            let k = -(c / (n * n * n)) * (NMat3::identity() - 3.0 * (u * u.transpose()));
            add_pair_blocks(model, a, i, j, &(scale * k));
        }
    }
}

// =========================================================================================
// Drag
// =========================================================================================

/// Linear viscous drag `F_i = -beta_i v_i`
pub struct DragForce;

impl ForceTerm for DragForce {
    fn name(&self) -> &'static str {
        "drag"
    }

    fn eval_forces(&self, model: &Model, state: &mut State) {
        for (i, &beta) in model.particle_drag.iter().enumerate() {
            if beta > 0.0 && model.is_active(i) {
                let v = state.particle_qd[i];
                state.particle_f[i] -= beta * v;
            }
        }
    }

    fn eval_vel_jacobians(&self, model: &Model, _state: &State, a: &mut dyn SystemMatrix, scale: f64) {
        for (i, &beta) in model.particle_drag.iter().enumerate() {
            if beta > 0.0 && model.is_active(i) {
                a.add_block(i, i, &(NMat3::identity() * (-scale * beta)));
            }
        }
    }
}

// =========================================================================================
// Uniform fields
// =========================================================================================

/// `F_i = m_i * g` with `g` the model's gravity vector
pub struct UniformGravity;

impl ForceTerm for UniformGravity {
    fn name(&self) -> &'static str {
        "uniform_gravity"
    }

    fn eval_forces(&self, model: &Model, state: &mut State) {
        let g = model.gravity;
        for (i, &m) in model.particle_mass.iter().enumerate() {
            if model.is_active(i) {
                state.particle_f[i] += m * g;
            }
        }
    }
}

/// Constant wind: `strength * unit(direction)` on every active particle
pub struct WindForce {
    force: Option<NVec3>, // None when the direction is degenerate
}

impl WindForce {
    pub fn new(direction: NVec3, strength: f64) -> Self {
        let norm = direction.norm();
        if norm < 1e-8 {
            warn!("wind direction has near-zero norm; wind is disabled");
            return Self { force: None };
        }
        Self {
            force: Some(direction * (strength / norm)),
        }
    }

    pub fn force(&self) -> Option<NVec3> {
        self.force
    }
}

impl ForceTerm for WindForce {
    fn name(&self) -> &'static str {
        "wind"
    }

    fn eval_forces(&self, model: &Model, state: &mut State) {
        let Some(w) = self.force else {
            return;
        };
        for (i, f) in state.particle_f.iter_mut().enumerate() {
            if model.is_active(i) {
                *f += w;
            }
        }
    }
}
