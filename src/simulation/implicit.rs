//! Implicit integrators: linearized backward Euler and backward Euler with
//! Newton iterations.
//!
//! Both solve systems of the form
//!
//! `A dv = b`, `A = M - dt^2 dF/dx - dt dF/dv`
//!
//! where `M` is block diagonal (`m_i I` for active particles). The rows and
//! columns of fixed particles are replaced by the identity and their
//! right-hand side is zeroed, which pins their velocity change to zero.
//! A matrix that cannot be factored is reported as a [`NumericalError`].

use std::sync::Arc;

use log::debug;
use nalgebra::DVector;

use crate::error::NumericalError;
use super::integrator::{hold_fixed, Integrator, IntegratorKind, SolverCore};
use super::jacobian::{DenseSystem, SystemMatrix};
use super::model::Model;
use super::states::{NVec3, State};

/// Default Newton iteration cap
pub const DEFAULT_MAX_ITERATIONS: usize = 5;
/// Default Newton stopping threshold on |dv|
pub const DEFAULT_TOLERANCE: f64 = 1e-4;

/// Stack per-particle vectors into one 3N vector
pub(crate) fn flatten(v: &[NVec3]) -> DVector<f64> {
    DVector::from_iterator(3 * v.len(), v.iter().flat_map(|x| x.iter().copied()))
}

#[inline]
fn block(x: &DVector<f64>, i: usize) -> NVec3 {
    NVec3::new(x[3 * i], x[3 * i + 1], x[3 * i + 2])
}

/// Mass diagonal, fixed-dof list and the system matrix shared by both solvers
struct ImplicitSystem<M: SystemMatrix> {
    matrix: M,
    mass_diag: DVector<f64>, // m_i for active particles, 1 for fixed ones
    fixed_dofs: Vec<usize>,
}

impl<M: SystemMatrix> ImplicitSystem<M> {
    fn new(model: &Model, matrix: M) -> Self {
        let n = model.particle_count();
        let mut mass_diag = DVector::zeros(model.dof_count());
        let mut fixed_dofs = Vec::new();
        for i in 0..n {
            let m = if model.is_active(i) {
                model.particle_mass[i]
            } else {
                fixed_dofs.extend(3 * i..3 * i + 3);
                1.0
            };
            mass_diag.rows_mut(3 * i, 3).fill(m);
        }
        Self {
            matrix,
            mass_diag,
            fixed_dofs,
        }
    }

    /// `A = M - dt^2 dF/dx - dt dF/dv` at `state`, fixed dofs pinned
    fn assemble(&mut self, core: &SolverCore, state: &State, dt: f64) {
        self.matrix.set_zero();
        self.matrix.add_diagonal(&self.mass_diag);
        core.forces.eval_pos_jacobians(&core.model, state, &mut self.matrix, -dt * dt);
        core.forces.eval_vel_jacobians(&core.model, state, &mut self.matrix, -dt);
        for &dof in &self.fixed_dofs {
            self.matrix.pin_dof(dof);
        }
    }

    /// Zero the fixed rows of a right-hand side (or residual)
    fn pin_rhs(&self, rhs: &mut DVector<f64>) {
        for &dof in &self.fixed_dofs {
            rhs[dof] = 0.0;
        }
    }

    fn solve(&self, mut rhs: DVector<f64>) -> Result<DVector<f64>, NumericalError> {
        self.pin_rhs(&mut rhs);
        self.matrix.solve(&rhs)
    }
}

// =========================================================================================
// Linearized implicit Euler
// =========================================================================================

/// One linear solve per step:
/// 1. advance positions only, `x* = x_n + dt v_n`
/// 2. evaluate forces and Jacobians at `(x*, v_n)`
/// 3. solve `A dv = dt F(x*, v_n)`
/// 4. `v_n+1 = v_n + dv`, `x_n+1 = x_n + dt v_n+1`
pub struct LinearizedImplicit<M: SystemMatrix = DenseSystem> {
    core: SolverCore,
    system: ImplicitSystem<M>,
}

impl LinearizedImplicit {
    pub fn new(model: Arc<Model>, dt: f64) -> Self {
        let matrix = DenseSystem::new(model.particle_count());
        Self::with_matrix(model, dt, matrix)
    }
}

impl<M: SystemMatrix> LinearizedImplicit<M> {
    /// Use a caller-provided matrix storage (must be sized 3N x 3N)
    pub fn with_matrix(model: Arc<Model>, dt: f64, matrix: M) -> Self {
        let system = ImplicitSystem::new(&model, matrix);
        Self {
            core: SolverCore::new(model, dt),
            system,
        }
    }
}

impl<M: SystemMatrix> Integrator for LinearizedImplicit<M> {
    fn kind(&self) -> IntegratorKind {
        IntegratorKind::LinearizedImplicit
    }

    fn core(&self) -> &SolverCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SolverCore {
        &mut self.core
    }

    fn step(&mut self, state_in: &State, state_out: &mut State, dt: Option<f64>) -> Result<(), NumericalError> {
        let dt = self.core.resolve_dt(dt);
        let n = self.core.model.particle_count();

        // 1. x* = x_n + dt v_n
        state_out.copy_kinematics_from(state_in);
        for i in 0..n {
            if self.core.model.is_active(i) {
                state_out.particle_q[i] = state_in.particle_q[i] + dt * state_in.particle_qd[i];
            }
        }

        // 2. F(x*, v_n), dF/dx, dF/dv
        self.core.eval_forces(state_out);
        self.system.assemble(&self.core, state_out, dt);

        // 3. A dv = dt F
        let rhs = flatten(&state_out.particle_f) * dt;
        let dv = self.system.solve(rhs)?;

        // 4. velocity then position
        let model = &*self.core.model;
        for i in 0..n {
            if !model.is_active(i) {
                hold_fixed(i, state_in, state_out);
                continue;
            }
            let v = state_in.particle_qd[i] + block(&dv, i);
            state_out.particle_qd[i] = v;
            state_out.particle_q[i] = state_in.particle_q[i] + dt * v;
        }

        self.core.ts += dt;
        Ok(())
    }
}

// =========================================================================================
// Implicit Euler (Newton)
// =========================================================================================

/// Backward Euler. Finds `v` with
///
/// `R(v) = M (v - v_n) - dt F(x_n + dt v, v) = 0`
///
/// by Newton iterations `A dv = -R`, `v += dv`, stopping once `|dv| < tolerance`
/// or after `max_iterations`. An unconverged iterate is accepted as is; the
/// `last_*` accessors report how the most recent step ended.
pub struct ImplicitEuler<M: SystemMatrix = DenseSystem> {
    core: SolverCore,
    system: ImplicitSystem<M>,
    max_iterations: usize,
    tolerance: f64,

    last_iterations: usize,
    last_update_norm: f64,
    last_residual_norm: f64,
}

impl ImplicitEuler {
    pub fn new(model: Arc<Model>, dt: f64) -> Self {
        let matrix = DenseSystem::new(model.particle_count());
        Self::with_matrix(model, dt, matrix)
    }
}

impl<M: SystemMatrix> ImplicitEuler<M> {
    /// Use a caller-provided matrix storage (must be sized 3N x 3N)
    pub fn with_matrix(model: Arc<Model>, dt: f64, matrix: M) -> Self {
        let system = ImplicitSystem::new(&model, matrix);
        Self {
            core: SolverCore::new(model, dt),
            system,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            last_iterations: 0,
            last_update_norm: 0.0,
            last_residual_norm: 0.0,
        }
    }

    /// Set the Newton iteration cap (at least 1)
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Set the stopping threshold on the update norm
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Newton iterations used by the last step
    pub fn last_iterations(&self) -> usize {
        self.last_iterations
    }

    /// |dv| of the last Newton update
    pub fn last_update_norm(&self) -> f64 {
        self.last_update_norm
    }

    /// |R| at the velocity the last step returned
    pub fn last_residual_norm(&self) -> f64 {
        self.last_residual_norm
    }

    /// Whether the last step stopped on the tolerance rather than the cap
    pub fn last_converged(&self) -> bool {
        self.last_update_norm < self.tolerance
    }

    /// Set `state_out` to `x_n + dt v`, evaluate forces there and return the
    /// pinned residual `R = M (v - v_n) - dt F`
    fn residual(
        &self,
        v: &DVector<f64>,
        v_n: &DVector<f64>,
        state_in: &State,
        state_out: &mut State,
        dt: f64,
    ) -> DVector<f64> {
        self.apply_velocity(v, state_in, state_out, dt);
        self.core.eval_forces(state_out);
        let mut residual = self.system.mass_diag.component_mul(&(v - v_n)) - flatten(&state_out.particle_f) * dt;
        self.system.pin_rhs(&mut residual);
        residual
    }

    /// Write `x_n + dt v` and `v` into `state_out` (fixed particles held)
    fn apply_velocity(&self, v: &DVector<f64>, state_in: &State, state_out: &mut State, dt: f64) {
        let model = &*self.core.model;
        for i in 0..model.particle_count() {
            if !model.is_active(i) {
                hold_fixed(i, state_in, state_out);
                continue;
            }
            let vi = block(v, i);
            state_out.particle_qd[i] = vi;
            state_out.particle_q[i] = state_in.particle_q[i] + dt * vi;
        }
    }
}

impl<M: SystemMatrix> Integrator for ImplicitEuler<M> {
    fn kind(&self) -> IntegratorKind {
        IntegratorKind::ImplicitEuler
    }

    fn core(&self) -> &SolverCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SolverCore {
        &mut self.core
    }

    fn step(&mut self, state_in: &State, state_out: &mut State, dt: Option<f64>) -> Result<(), NumericalError> {
        let dt = self.core.resolve_dt(dt);

        let v_n = flatten(&state_in.particle_qd);
        let mut v = v_n.clone();
        state_out.copy_kinematics_from(state_in);

        self.last_iterations = 0;
        self.last_update_norm = f64::INFINITY;
        self.last_residual_norm = f64::INFINITY;

        for it in 0..self.max_iterations {
            let residual = self.residual(&v, &v_n, state_in, state_out, dt);
            self.last_residual_norm = residual.norm();

            self.system.assemble(&self.core, state_out, dt);
            let dv = self.system.solve(-residual)?;
            v += &dv;

            self.last_iterations = it + 1;
            self.last_update_norm = dv.norm();
            if self.last_update_norm < self.tolerance {
                break;
            }
        }

        // leave forces and |R| consistent with the returned velocity
        self.last_residual_norm = self.residual(&v, &v_n, state_in, state_out, dt).norm();
        if !self.last_converged() {
            debug!(
                "implicit euler: no convergence after {} iterations (|dv| = {:e}, |R| = {:e})",
                self.last_iterations, self.last_update_norm, self.last_residual_norm
            );
        }
        self.core.ts += dt;
        Ok(())
    }
}
