pub mod simulation;
pub mod configuration;
pub mod benchmark;
pub mod error;

pub use simulation::states::{State, NVec3, NMat3};
pub use simulation::model::{Model, ParticleFlags, Axis};
pub use simulation::builder::ModelBuilder;
pub use simulation::forces::{ForceTerm, ForceSet, SpringForce, GravitationalForce, DragForce, UniformGravity, WindForce};
pub use simulation::jacobian::{SystemMatrix, DenseSystem};
pub use simulation::integrator::{Integrator, IntegratorKind, Solver, ExplicitEuler, SymplecticEuler, Midpoint};
pub use simulation::implicit::{LinearizedImplicit, ImplicitEuler};
pub use simulation::scenario::{Scenario, Probe};

pub use configuration::config::{SceneConfig, SolverConfig, ParticleConfig, SpringConfig, GravitationalConfig, ProbeConfig, WindConfig};

pub use error::{ValidationError, NumericalError, SimError};

pub use benchmark::benchmark::{bench_solvers, make_cloth_model};
