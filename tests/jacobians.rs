use nalgebra::DMatrix;
use springsim::{
    Axis, DenseSystem, DragForce, ForceSet, ForceTerm, GravitationalForce, Model, ModelBuilder, NVec3,
    ParticleFlags, SpringForce, State,
};

const EPS: f64 = 1e-6;
const TOL: f64 = 1e-5;

fn only(term: impl ForceTerm + Send + Sync + 'static) -> ForceSet {
    ForceSet::new().with(term)
}

fn flat_forces(forces: &ForceSet, model: &Model, state: &State) -> Vec<f64> {
    let mut s = state.clone();
    s.clear_forces();
    forces.eval_forces(model, &mut s);
    s.particle_f.iter().flat_map(|f| f.iter().copied()).collect()
}

/// Central differences of the force vector. `velocity` selects qd instead of q.
fn finite_difference(forces: &ForceSet, model: &Model, state: &State, velocity: bool) -> DMatrix<f64> {
    let n = 3 * model.particle_count();
    let mut jac = DMatrix::zeros(n, n);

    for col in 0..n {
        let (p, c) = (col / 3, col % 3);
        let mut plus = state.clone();
        let mut minus = state.clone();
        if velocity {
            plus.particle_qd[p][c] += EPS;
            minus.particle_qd[p][c] -= EPS;
        } else {
            plus.particle_q[p][c] += EPS;
            minus.particle_q[p][c] -= EPS;
        }
        let fp = flat_forces(forces, model, &plus);
        let fm = flat_forces(forces, model, &minus);
        for row in 0..n {
            jac[(row, col)] = (fp[row] - fm[row]) / (2.0 * EPS);
        }
    }
    jac
}

fn analytic(forces: &ForceSet, model: &Model, state: &State, velocity: bool) -> DMatrix<f64> {
    let mut a = DenseSystem::new(model.particle_count());
    if velocity {
        forces.eval_vel_jacobians(model, state, &mut a, 1.0);
    } else {
        forces.eval_pos_jacobians(model, state, &mut a, 1.0);
    }
    a.matrix().clone()
}

fn assert_jacobian_matches(forces: &ForceSet, model: &Model, state: &State, velocity: bool) {
    let expected = finite_difference(forces, model, state, velocity);
    let actual = analytic(forces, model, state, velocity);
    let diff = (&actual - &expected).abs().max();
    assert!(
        diff < TOL,
        "Jacobian mismatch (max |diff| = {:e})\nanalytic: {}\nfinite difference: {}",
        diff,
        actual,
        expected
    );
}

fn spring_model(ke: f64, kd: f64, first_fixed: bool) -> Model {
    let mut b = ModelBuilder::new(Axis::Z, 0.0);
    let flags = if first_fixed { ParticleFlags::empty() } else { ParticleFlags::ACTIVE };
    b.add_particle([0.1, 0.2, 0.3], [0.3, -0.5, 0.2], 1.0, None, None, Some(flags)).unwrap();
    b.add_particle([1.0, -0.4, 0.9], [-0.2, 0.4, 0.1], 1.5, None, None, None).unwrap();
    b.add_particle([0.4, 1.1, -0.2], [0.0, 0.1, -0.6], 0.7, None, None, None).unwrap();
    b.add_spring(0, 1, ke, Some(kd), Some(0.8)).unwrap();
    b.add_spring(1, 2, ke, Some(kd), Some(1.6)).unwrap();
    b.add_spring(2, 0, ke, Some(kd), None).unwrap();
    b.finalize().unwrap()
}

fn gravity_model(first_fixed: bool) -> Model {
    let mut b = ModelBuilder::new(Axis::Z, 0.0);
    let flags = if first_fixed { ParticleFlags::empty() } else { ParticleFlags::ACTIVE };
    b.add_particle([0.0, 0.0, 0.0], [0.0; 3], 5.0, None, None, Some(flags)).unwrap();
    b.add_particle([1.0, 0.2, 1.2], [0.0; 3], 1.0, None, None, None).unwrap();
    b.add_particle([-0.7, 0.9, 0.3], [0.0; 3], 2.0, None, None, None).unwrap();
    b.add_gravitational(0, 1, 0.8);
    b.add_gravitational(0, 2, 0.8);
    b.add_gravitational(1, 2, 0.3);
    b.finalize().unwrap()
}

// ==================================================================================
// Springs
// ==================================================================================

#[test]
fn spring_position_jacobian_elastic() {
    let model = spring_model(20.0, 0.0, false);
    assert_jacobian_matches(&only(SpringForce), &model, &model.state(), false);
}

#[test]
fn spring_position_jacobian_damping_only() {
    let model = spring_model(0.0, 1.5, false);
    assert_jacobian_matches(&only(SpringForce), &model, &model.state(), false);
}

#[test]
fn spring_position_jacobian_full() {
    let model = spring_model(20.0, 1.5, false);
    assert_jacobian_matches(&only(SpringForce), &model, &model.state(), false);
}

#[test]
fn spring_position_jacobian_fixed_endpoint() {
    let model = spring_model(20.0, 1.5, true);
    let state = model.state();
    assert_jacobian_matches(&only(SpringForce), &model, &state, false);

    // the fixed particle's rows are empty, its columns are not
    let a = analytic(&only(SpringForce), &model, &state, false);
    assert!(a.rows(0, 3).iter().all(|&x| x == 0.0));
    assert!(a.columns(0, 3).iter().any(|&x| x != 0.0));
}

#[test]
fn spring_position_jacobian_symmetric_without_damping() {
    let model = spring_model(20.0, 0.0, false);
    let a = analytic(&only(SpringForce), &model, &model.state(), false);
    assert!((&a - a.transpose()).abs().max() < 1e-12);
}

#[test]
fn spring_velocity_jacobian() {
    let model = spring_model(20.0, 1.5, false);
    assert_jacobian_matches(&only(SpringForce), &model, &model.state(), true);

    let model = spring_model(20.0, 1.5, true);
    assert_jacobian_matches(&only(SpringForce), &model, &model.state(), true);
}

#[test]
fn spring_velocity_jacobian_coincident() {
    let mut b = ModelBuilder::new(Axis::Z, 0.0);
    b.add_particle([0.5; 3], [1.0, 0.0, 0.0], 1.0, None, None, None).unwrap();
    b.add_particle([0.5; 3], [0.0, 1.0, 0.0], 1.0, None, None, None).unwrap();
    b.add_spring(0, 1, 10.0, Some(2.0), Some(1.0)).unwrap();
    let model = b.finalize().unwrap();

    let state = model.state();
    assert_jacobian_matches(&only(SpringForce), &model, &state, true);

    let a = analytic(&only(SpringForce), &model, &state, true);
    assert_eq!(a[(0, 0)], -2.0);
    assert_eq!(a[(0, 3)], 2.0);
    assert_eq!(a[(0, 1)], 0.0);
}

#[test]
fn jacobians_scale_and_accumulate() {
    let model = spring_model(20.0, 1.5, false);
    let state = model.state();
    let once = analytic(&only(SpringForce), &model, &state, false);

    let mut a = DenseSystem::new(model.particle_count());
    SpringForce.eval_pos_jacobians(&model, &state, &mut a, 0.5);
    SpringForce.eval_pos_jacobians(&model, &state, &mut a, -2.0);
    assert!((a.matrix() - once * -1.5).abs().max() < 1e-9);
}

// ==================================================================================
// Gravitational pairs
// ==================================================================================

#[test]
fn gravitational_position_jacobian() {
    let model = gravity_model(false);
    assert_jacobian_matches(&only(GravitationalForce), &model, &model.state(), false);
}

#[test]
fn gravitational_position_jacobian_fixed_source() {
    let model = gravity_model(true);
    let state = model.state();
    assert_jacobian_matches(&only(GravitationalForce), &model, &state, false);

    let a = analytic(&only(GravitationalForce), &model, &state, false);
    assert!(a.rows(0, 3).iter().all(|&x| x == 0.0));
}

#[test]
fn gravitational_has_no_velocity_jacobian() {
    let model = gravity_model(false);
    let a = analytic(&only(GravitationalForce), &model, &model.state(), true);
    assert!(a.iter().all(|&x| x == 0.0));
}

// ==================================================================================
// Drag and the full force set
// ==================================================================================

#[test]
fn drag_velocity_jacobian() {
    let mut b = ModelBuilder::new(Axis::Z, 0.0);
    b.add_particle([0.0; 3], [1.0, 2.0, 3.0], 1.0, None, Some(0.4), None).unwrap();
    b.add_particle([1.0, 0.0, 0.0], [0.0; 3], 1.0, None, Some(0.4), Some(ParticleFlags::empty()))
        .unwrap();
    let model = b.finalize().unwrap();
    let state = model.state();

    assert_jacobian_matches(&only(DragForce), &model, &state, true);
    let a = analytic(&only(DragForce), &model, &state, true);
    assert_eq!(a[(2, 2)], -0.4);
    assert_eq!(a[(3, 3)], 0.0);
}

#[test]
fn force_set_jacobians() {
    let mut b = ModelBuilder::new(Axis::Y, -9.81);
    b.add_particle([0.0, 0.0, 0.0], [0.0; 3], 2.0, None, None, Some(ParticleFlags::empty())).unwrap();
    b.add_particle([0.6, -0.3, 0.1], [0.2, -0.1, 0.4], 0.5, None, Some(0.2), None).unwrap();
    b.add_particle([1.1, -0.9, -0.3], [-0.3, 0.0, 0.2], 0.8, None, Some(0.1), None).unwrap();
    b.add_spring(0, 1, 40.0, Some(0.8), None).unwrap();
    b.add_spring(1, 2, 25.0, Some(0.3), Some(0.5)).unwrap();
    b.add_gravitational(0, 2, 1.2);
    let model = b.finalize().unwrap();

    let mut state = model.state();
    // move off the rest configuration
    state.particle_q[1] += NVec3::new(0.05, 0.1, -0.02);

    let forces = ForceSet::standard();
    assert_jacobian_matches(&forces, &model, &state, false);
    assert_jacobian_matches(&forces, &model, &state, true);
}
