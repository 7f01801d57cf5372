//! Mutable per-step particle buffers.
//!
//! A [`State`] holds positions `particle_q`, velocities `particle_qd` and the
//! force accumulator `particle_f`, one `NVec3` per particle. States are created
//! from a [`Model`](super::model::Model) via `model.state()` and used in pairs
//! by the driver: one is read (`state_in`), the other written (`state_out`),
//! and the two swap roles every tick.

use nalgebra::{Matrix3, Vector3};
pub type NVec3 = Vector3<f64>;
pub type NMat3 = Matrix3<f64>;

#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub particle_q: Vec<NVec3>,  // positions
    pub particle_qd: Vec<NVec3>, // velocities
    pub particle_f: Vec<NVec3>,  // accumulated forces
}

impl State {
    pub fn particle_count(&self) -> usize {
        self.particle_q.len()
    }

    /// Zero the force accumulator. Force terms only ever add into it.
    pub fn clear_forces(&mut self) {
        for f in self.particle_f.iter_mut() {
            *f = NVec3::zeros();
        }
    }

    /// Copy positions and velocities from `other`, leaving forces untouched.
    pub fn copy_kinematics_from(&mut self, other: &State) {
        self.particle_q.copy_from_slice(&other.particle_q);
        self.particle_qd.copy_from_slice(&other.particle_qd);
    }
}
