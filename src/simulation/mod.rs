pub mod states;
pub mod model;
pub mod builder;
pub mod forces;
pub mod jacobian;
pub mod integrator;
pub mod implicit;
pub mod energy;
pub mod scenario;
