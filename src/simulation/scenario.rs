//! Build fully-initialized simulation scenarios from configuration
//!
//! Takes a `SceneConfig` (YAML-facing) and produces a runtime bundle
//! (`Scenario`) containing:
//! - the finalized model (`Model`)
//! - the selected integrator (`Solver`) with its force terms
//! - two state buffers used alternately as step input and output
//! - an optional probe on one particle coordinate
//!
//! `Scenario` is also the double-buffered driver: `step()` advances one solver
//! step and swaps the buffers, `advance_to(t)` keeps stepping until the solver
//! clock reaches `t` (one call per render tick).

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

use crate::configuration::config::{ProbeConfig, SceneConfig};
use crate::error::{NumericalError, SimError, ValidationError};
use super::builder::ModelBuilder;
use super::energy;
use super::forces::{ForceSet, WindForce};
use super::implicit::ImplicitEuler;
use super::integrator::{Integrator, IntegratorKind, Solver};
use super::model::{Model, ParticleFlags};
use super::states::{NVec3, State};

/// Coordinate `dof` of particle `particle_id`, with the range it is expected in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Probe {
    pub particle_id: usize,
    pub dof: usize,
    pub y_range: [f64; 2],
}

impl Probe {
    fn from_config(cfg: &ProbeConfig, model: &Model) -> Result<Self, ValidationError> {
        if cfg.particle_id >= model.particle_count() {
            return Err(ValidationError::Probe {
                reason: format!("particle id {} is out of range", cfg.particle_id),
            });
        }
        if cfg.dof > 2 {
            return Err(ValidationError::Probe {
                reason: format!("dof {} is out of range, must be 0, 1, or 2", cfg.dof),
            });
        }
        let [lo, hi] = cfg.y_range;
        if !(lo < hi) {
            return Err(ValidationError::Probe {
                reason: format!("y_range [{lo}, {hi}] is not valid"),
            });
        }
        Ok(Self {
            particle_id: cfg.particle_id,
            dof: cfg.dof,
            y_range: cfg.y_range,
        })
    }
}

/// Runtime bundle: model, solver and the two state buffers
pub struct Scenario {
    pub model: Arc<Model>,
    pub solver: Solver,
    pub probe: Option<Probe>,
    state_0: State, // current state
    state_1: State, // receives the next step
}

impl Scenario {
    pub fn new(model: Arc<Model>, solver: Solver) -> Self {
        let state_0 = model.state();
        let state_1 = model.state();
        Self {
            model,
            solver,
            probe: None,
            state_0,
            state_1,
        }
    }

    /// Read a YAML scene from `path`
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let cfg: SceneConfig = serde_yaml::from_reader(reader)?;
        Self::build_scenario(cfg)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, SimError> {
        let cfg = SceneConfig::from_yaml_str(s)?;
        Self::build_scenario(cfg)
    }

    pub fn build_scenario(cfg: SceneConfig) -> Result<Self, SimError> {
        let s_cfg = &cfg.solver;
        if !(s_cfg.timestep > 0.0 && s_cfg.timestep.is_finite()) {
            return Err(ValidationError::Timestep { dt: s_cfg.timestep }.into());
        }
        if let Some(max_iterations) = s_cfg.max_iterations.filter(|&its| its == 0) {
            return Err(ValidationError::MaxIterations { max_iterations }.into());
        }
        if let Some(tolerance) = s_cfg.tolerance.filter(|tol| !(*tol >= 0.0)) {
            return Err(ValidationError::Tolerance { tolerance }.into());
        }

        let mut builder = ModelBuilder::new(s_cfg.up_axis, s_cfg.gravity);

        // Particles: fixed -> flags cleared, missing velocity -> zero
        for p in &cfg.particles {
            let vel = p.vel.clone().unwrap_or_else(|| vec![0.0; 3]);
            let flags = if p.fixed {
                ParticleFlags::empty()
            } else {
                ParticleFlags::ACTIVE
            };
            builder.add_particle(&p.pos, &vel, p.mass, p.radius, p.drag, Some(flags))?;
        }

        for (index, s) in cfg.springs.iter().enumerate() {
            let [i, j] = pair_ids("spring", index, &s.particle_ids)?;
            builder.add_spring(i, j, s.stiffness, s.damping, s.rest_length)?;
        }

        for (index, g) in cfg.gravitational.iter().enumerate() {
            let [i, j] = pair_ids("gravitational pair", index, &g.particle_ids)?;
            builder.add_gravitational(i, j, g.g);
        }

        let model = Arc::new(builder.finalize()?);
        info!(
            "loaded scene: {} particles, {} springs, {} gravitational pairs, solver {}",
            model.particle_count(),
            model.spring_count(),
            model.gravitational_count(),
            s_cfg.kind.name()
        );

        let mut solver = match s_cfg.kind {
            IntegratorKind::ImplicitEuler => {
                let mut implicit = ImplicitEuler::new(model.clone(), s_cfg.timestep);
                if let Some(its) = s_cfg.max_iterations {
                    implicit = implicit.with_max_iterations(its);
                }
                if let Some(tol) = s_cfg.tolerance {
                    implicit = implicit.with_tolerance(tol);
                }
                Solver::ImplicitEuler(implicit)
            }
            kind => Solver::new(kind, model.clone(), s_cfg.timestep),
        };

        if let Some(wind) = &s_cfg.wind {
            let direction = match wind.direction.as_slice() {
                [x, y, z] => NVec3::new(*x, *y, *z),
                other => {
                    return Err(ValidationError::VectorLength {
                        what: "wind direction",
                        index: 0,
                        len: other.len(),
                    }
                    .into())
                }
            };
            solver.set_forces(ForceSet::standard().with(WindForce::new(direction, wind.strength)));
        }

        let probe = cfg
            .plot
            .as_ref()
            .map(|p| Probe::from_config(p, &model))
            .transpose()?;

        let mut scenario = Self::new(model, solver);
        scenario.probe = probe;
        Ok(scenario)
    }

    /// Current state (positions/velocities for display)
    pub fn state(&self) -> &State {
        &self.state_0
    }

    /// Simulated time
    pub fn time(&self) -> f64 {
        self.solver.ts()
    }

    /// Advance one solver step and swap buffers
    pub fn step(&mut self) -> Result<(), NumericalError> {
        self.solver.step(&self.state_0, &mut self.state_1, None)?;
        std::mem::swap(&mut self.state_0, &mut self.state_1);
        Ok(())
    }

    /// Step until the solver clock reaches `t`. Returns the number of steps taken.
    ///
    /// A non-finite `t` could never be reached and takes no steps.
    pub fn advance_to(&mut self, t: f64) -> Result<usize, NumericalError> {
        if !t.is_finite() {
            warn!("advance_to: target time {} is not finite, not stepping", t);
            return Ok(0);
        }
        if !(self.solver.dt() > 0.0) {
            return Ok(0);
        }
        let mut steps = 0;
        while self.solver.ts() < t {
            self.step()?;
            steps += 1;
        }
        Ok(steps)
    }

    /// Value of the probed coordinate in the current state
    pub fn probe_value(&self) -> Option<f64> {
        self.probe
            .map(|p| self.state_0.particle_q[p.particle_id][p.dof])
    }

    pub fn total_energy(&self) -> f64 {
        energy::total_energy(&self.model, &self.state_0)
    }
}

fn pair_ids(what: &'static str, index: usize, ids: &[usize]) -> Result<[usize; 2], ValidationError> {
    match ids {
        [i, j] => Ok([*i, *j]),
        _ => Err(ValidationError::ParticleIds {
            what,
            index,
            len: ids.len(),
        }),
    }
}
