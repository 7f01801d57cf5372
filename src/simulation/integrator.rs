//! Fixed-step time integrators
//!
//! All integrators share the [`Integrator`] contract:
//! - `step(state_in, state_out, dt)` reads `state_in` and writes the advanced
//!   positions/velocities into `state_out` (`state_in` is never modified)
//! - `dt = None` falls back to the solver's default step
//! - fixed particles leave every step with unchanged position and zero velocity
//! - `ts()` is the simulated time accumulated over all successful steps
//!
//! Forces are evaluated into `state_out.particle_f`, which holds the last
//! evaluated forces once a step returns.
//!
//! The family is closed: [`Solver`] is a tagged union over the five schemes.
//! The explicit ones live here, the implicit ones in [`super::implicit`].

use std::sync::Arc;

use serde::Deserialize;

use crate::error::NumericalError;
use super::forces::ForceSet;
use super::implicit::{ImplicitEuler, LinearizedImplicit};
use super::model::Model;
use super::states::{NVec3, State};

/// Which integrator to run
/// `type: "explicit_euler"`, `"symplectic_euler"`, `"midpoint"`,
/// `"linearized_implicit"` or `"implicit_euler"`
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegratorKind {
    #[serde(rename = "explicit_euler")] // forward Euler, position uses the old velocity
    ExplicitEuler,

    #[serde(rename = "symplectic_euler")] // velocity first, position uses the new velocity
    SymplecticEuler,

    #[serde(rename = "midpoint")] // second-order, two force evaluations
    Midpoint,

    #[serde(rename = "linearized_implicit")] // one linear solve per step
    LinearizedImplicit,

    #[serde(rename = "implicit_euler")] // backward Euler with Newton iterations
    ImplicitEuler,
}

impl IntegratorKind {
    pub const ALL: [IntegratorKind; 5] = [
        IntegratorKind::ExplicitEuler,
        IntegratorKind::SymplecticEuler,
        IntegratorKind::Midpoint,
        IntegratorKind::LinearizedImplicit,
        IntegratorKind::ImplicitEuler,
    ];

    pub fn name(self) -> &'static str {
        match self {
            IntegratorKind::ExplicitEuler => "explicit_euler",
            IntegratorKind::SymplecticEuler => "symplectic_euler",
            IntegratorKind::Midpoint => "midpoint",
            IntegratorKind::LinearizedImplicit => "linearized_implicit",
            IntegratorKind::ImplicitEuler => "implicit_euler",
        }
    }
}

/// Step contract shared by every integrator
pub trait Integrator {
    fn kind(&self) -> IntegratorKind;

    fn core(&self) -> &SolverCore;

    fn core_mut(&mut self) -> &mut SolverCore;

    /// Advance `state_in` by `dt` (or the default step) into `state_out`
    fn step(&mut self, state_in: &State, state_out: &mut State, dt: Option<f64>) -> Result<(), NumericalError>;

    /// Simulated time accumulated so far
    fn ts(&self) -> f64 {
        self.core().ts
    }

    /// Default step size
    fn dt(&self) -> f64 {
        self.core().dt
    }

    fn model(&self) -> &Model {
        &self.core().model
    }

    /// Replace the force terms (e.g. to add wind)
    fn set_forces(&mut self, forces: ForceSet) {
        self.core_mut().forces = forces;
    }
}

/// State shared by all integrators: the model, its force terms and the clock
pub struct SolverCore {
    pub(crate) model: Arc<Model>,
    pub(crate) forces: ForceSet,
    pub(crate) dt: f64, // default step
    pub(crate) ts: f64, // accumulated simulated time
}

impl SolverCore {
    pub fn new(model: Arc<Model>, dt: f64) -> Self {
        Self {
            model,
            forces: ForceSet::standard(),
            dt,
            ts: 0.0,
        }
    }

    pub fn forces(&self) -> &ForceSet {
        &self.forces
    }

    #[inline]
    pub(crate) fn resolve_dt(&self, dt: Option<f64>) -> f64 {
        dt.unwrap_or(self.dt)
    }

    /// Clear `state.particle_f` and accumulate every force term into it
    pub(crate) fn eval_forces(&self, state: &mut State) {
        state.clear_forces();
        self.forces.eval_forces(&self.model, state);
    }
}

/// Copy-through for a fixed particle: same position, zero velocity
#[inline]
pub(crate) fn hold_fixed(i: usize, state_in: &State, state_out: &mut State) {
    state_out.particle_q[i] = state_in.particle_q[i];
    state_out.particle_qd[i] = NVec3::zeros();
}

// =========================================================================================
// Explicit family
// =========================================================================================

/// `v' = v + dt F(x, v) / m`, `x' = x + dt v`
pub struct ExplicitEuler {
    core: SolverCore,
}

impl ExplicitEuler {
    pub fn new(model: Arc<Model>, dt: f64) -> Self {
        Self {
            core: SolverCore::new(model, dt),
        }
    }
}

impl Integrator for ExplicitEuler {
    fn kind(&self) -> IntegratorKind {
        IntegratorKind::ExplicitEuler
    }

    fn core(&self) -> &SolverCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SolverCore {
        &mut self.core
    }

    fn step(&mut self, state_in: &State, state_out: &mut State, dt: Option<f64>) -> Result<(), NumericalError> {
        let dt = self.core.resolve_dt(dt);
        let model = &*self.core.model;

        // F(x_n, v_n) into the output buffer
        state_out.copy_kinematics_from(state_in);
        self.core.eval_forces(state_out);

        for i in 0..model.particle_count() {
            if !model.is_active(i) {
                hold_fixed(i, state_in, state_out);
                continue;
            }
            let inv_m = model.particle_inv_mass[i];
            // x_n+1 = x_n + dt v_n
            state_out.particle_q[i] = state_in.particle_q[i] + dt * state_in.particle_qd[i];
            // v_n+1 = v_n + dt a_n
            state_out.particle_qd[i] = state_in.particle_qd[i] + (dt * inv_m) * state_out.particle_f[i];
        }

        self.core.ts += dt;
        Ok(())
    }
}

/// `v' = v + dt F(x, v) / m`, `x' = x + dt v'`
pub struct SymplecticEuler {
    core: SolverCore,
}

impl SymplecticEuler {
    pub fn new(model: Arc<Model>, dt: f64) -> Self {
        Self {
            core: SolverCore::new(model, dt),
        }
    }
}

impl Integrator for SymplecticEuler {
    fn kind(&self) -> IntegratorKind {
        IntegratorKind::SymplecticEuler
    }

    fn core(&self) -> &SolverCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SolverCore {
        &mut self.core
    }

    fn step(&mut self, state_in: &State, state_out: &mut State, dt: Option<f64>) -> Result<(), NumericalError> {
        let dt = self.core.resolve_dt(dt);
        let model = &*self.core.model;

        state_out.copy_kinematics_from(state_in);
        self.core.eval_forces(state_out);

        for i in 0..model.particle_count() {
            if !model.is_active(i) {
                hold_fixed(i, state_in, state_out);
                continue;
            }
            let inv_m = model.particle_inv_mass[i];
            // Kick: v_n+1 = v_n + dt a_n
            let v = state_in.particle_qd[i] + (dt * inv_m) * state_out.particle_f[i];
            // Drift with the new velocity: x_n+1 = x_n + dt v_n+1
            state_out.particle_qd[i] = v;
            state_out.particle_q[i] = state_in.particle_q[i] + dt * v;
        }

        self.core.ts += dt;
        Ok(())
    }
}

/// Explicit midpoint: half step with F(x_n, v_n), full step with the
/// force and velocity found at the midpoint
pub struct Midpoint {
    core: SolverCore,
}

impl Midpoint {
    pub fn new(model: Arc<Model>, dt: f64) -> Self {
        Self {
            core: SolverCore::new(model, dt),
        }
    }
}

impl Integrator for Midpoint {
    fn kind(&self) -> IntegratorKind {
        IntegratorKind::Midpoint
    }

    fn core(&self) -> &SolverCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SolverCore {
        &mut self.core
    }

    fn step(&mut self, state_in: &State, state_out: &mut State, dt: Option<f64>) -> Result<(), NumericalError> {
        let dt = self.core.resolve_dt(dt);
        let half_dt = 0.5 * dt;
        let model = &*self.core.model;
        let n = model.particle_count();

        // a_n from (x_n, v_n)
        state_out.copy_kinematics_from(state_in);
        self.core.eval_forces(state_out);

        // state_out becomes the midpoint state
        for i in 0..n {
            if !model.is_active(i) {
                hold_fixed(i, state_in, state_out);
                continue;
            }
            let inv_m = model.particle_inv_mass[i];
            state_out.particle_q[i] = state_in.particle_q[i] + half_dt * state_in.particle_qd[i];
            state_out.particle_qd[i] = state_in.particle_qd[i] + (half_dt * inv_m) * state_out.particle_f[i];
        }

        // a_mid from (x_mid, v_mid)
        self.core.eval_forces(state_out);

        for i in 0..n {
            if !model.is_active(i) {
                continue;
            }
            let inv_m = model.particle_inv_mass[i];
            let v_mid = state_out.particle_qd[i];
            state_out.particle_q[i] = state_in.particle_q[i] + dt * v_mid;
            state_out.particle_qd[i] = state_in.particle_qd[i] + (dt * inv_m) * state_out.particle_f[i];
        }

        self.core.ts += dt;
        Ok(())
    }
}

// =========================================================================================
// Closed set of integrators
// =========================================================================================

/// One of the five integrators, selected at runtime
pub enum Solver {
    ExplicitEuler(ExplicitEuler),
    SymplecticEuler(SymplecticEuler),
    Midpoint(Midpoint),
    LinearizedImplicit(LinearizedImplicit),
    ImplicitEuler(ImplicitEuler),
}

impl Solver {
    /// Build the integrator `kind` with default settings
    pub fn new(kind: IntegratorKind, model: Arc<Model>, dt: f64) -> Self {
        match kind {
            IntegratorKind::ExplicitEuler => Solver::ExplicitEuler(ExplicitEuler::new(model, dt)),
            IntegratorKind::SymplecticEuler => Solver::SymplecticEuler(SymplecticEuler::new(model, dt)),
            IntegratorKind::Midpoint => Solver::Midpoint(Midpoint::new(model, dt)),
            IntegratorKind::LinearizedImplicit => Solver::LinearizedImplicit(LinearizedImplicit::new(model, dt)),
            IntegratorKind::ImplicitEuler => Solver::ImplicitEuler(ImplicitEuler::new(model, dt)),
        }
    }

    fn inner(&self) -> &dyn Integrator {
        match self {
            Solver::ExplicitEuler(s) => s,
            Solver::SymplecticEuler(s) => s,
            Solver::Midpoint(s) => s,
            Solver::LinearizedImplicit(s) => s,
            Solver::ImplicitEuler(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Integrator {
        match self {
            Solver::ExplicitEuler(s) => s,
            Solver::SymplecticEuler(s) => s,
            Solver::Midpoint(s) => s,
            Solver::LinearizedImplicit(s) => s,
            Solver::ImplicitEuler(s) => s,
        }
    }
}

impl Integrator for Solver {
    fn kind(&self) -> IntegratorKind {
        self.inner().kind()
    }

    fn core(&self) -> &SolverCore {
        self.inner().core()
    }

    fn core_mut(&mut self) -> &mut SolverCore {
        self.inner_mut().core_mut()
    }

    fn step(&mut self, state_in: &State, state_out: &mut State, dt: Option<f64>) -> Result<(), NumericalError> {
        self.inner_mut().step(state_in, state_out, dt)
    }
}
