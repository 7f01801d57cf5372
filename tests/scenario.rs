use std::path::PathBuf;

use springsim::{
    make_cloth_model, Axis, Integrator, IntegratorKind, NVec3, Probe, Scenario, SceneConfig, SimError, Solver,
    ValidationError,
};

const CHAIN: &str = r#"
solver:
  type: implicit_euler
  timestep: 0.01
  up_axis: y
  gravity: -9.81
  max_iterations: 3
  tolerance: 1.0e-6

particles:
  - pos: [0.0, 2.0, 0.0]
    mass: 1.0
    fixed: true
  - pos: [0.5, 2.0, 0.0]
    vel: [0.0, 0.0, 0.0]
    mass: 0.5
    drag: 0.05
  - pos: [1.0, 2.0, 0.0]
    mass: 0.5
    radius: 0.02

springs:
  - particle_ids: [0, 1]
    stiffness: 200.0
    damping: 0.5
  - particle_ids: [1, 2]
    stiffness: 200.0
    rest_length: 0.4

gravitational:
  - particle_ids: [0, 2]
    G: 0.01

plot:
  particle_id: 2
  dof: 1
  y_range: [0.0, 3.0]
"#;

fn scenarios_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios")
}

fn minimal(solver: &str, body: &str) -> String {
    format!("solver:\n  type: {solver}\n  timestep: 0.01\n{body}")
}

// ==================================================================================
// Loading
// ==================================================================================

#[test]
fn config_deserializes() {
    let cfg = SceneConfig::from_yaml_str(CHAIN).unwrap();
    assert_eq!(cfg.solver.kind, IntegratorKind::ImplicitEuler);
    assert_eq!(cfg.solver.up_axis, Axis::Y);
    assert_eq!(cfg.solver.max_iterations, Some(3));
    assert_eq!(cfg.particles.len(), 3);
    assert!(cfg.particles[0].fixed);
    assert!(!cfg.particles[2].fixed);
    assert_eq!(cfg.particles[2].vel, None);
    assert_eq!(cfg.springs[0].damping, Some(0.5));
    assert_eq!(cfg.springs[1].rest_length, Some(0.4));
    assert_eq!(cfg.gravitational[0].g, 0.01);
}

#[test]
fn config_defaults() {
    let cfg = SceneConfig::from_yaml_str(&minimal("midpoint", "particles:\n  - pos: [0, 0, 0]\n    mass: 1.0\n"))
        .unwrap();
    assert_eq!(cfg.solver.gravity, -9.81);
    assert_eq!(cfg.solver.up_axis, Axis::Z);
    assert!(cfg.solver.wind.is_none());
    assert!(cfg.springs.is_empty());
    assert!(cfg.gravitational.is_empty());
    assert!(cfg.plot.is_none());
}

#[test]
fn scenario_from_yaml() {
    let scenario = Scenario::from_yaml_str(CHAIN).unwrap();
    let model = &scenario.model;

    assert_eq!(model.particle_count(), 3);
    assert_eq!(model.spring_count(), 2);
    assert_eq!(model.gravitational_count(), 1);
    assert!(!model.is_active(0));
    assert_eq!(model.gravity(), NVec3::new(0.0, -9.81, 0.0));
    assert_eq!(model.particle_radius()[2], 0.02);
    assert_eq!(model.particle_drag()[1], 0.05);
    assert!((model.spring_rest_length()[0] - 0.5).abs() < 1e-12);
    assert_eq!(model.spring_rest_length()[1], 0.4);

    assert_eq!(scenario.solver.kind(), IntegratorKind::ImplicitEuler);
    match &scenario.solver {
        Solver::ImplicitEuler(s) => {
            assert_eq!(s.max_iterations(), 3);
            assert_eq!(s.tolerance(), 1e-6);
        }
        _ => panic!("expected implicit euler"),
    }

    assert_eq!(
        scenario.probe,
        Some(Probe { particle_id: 2, dof: 1, y_range: [0.0, 3.0] })
    );
    assert_eq!(scenario.probe_value(), Some(2.0));
    assert_eq!(scenario.time(), 0.0);
}

#[test]
fn unknown_solver_type_fails() {
    let yaml = minimal("runge_kutta", "particles:\n  - pos: [0, 0, 0]\n    mass: 1.0\n");
    assert!(matches!(Scenario::from_yaml_str(&yaml), Err(SimError::Yaml(_))));
}

#[test]
fn bad_particle_ids_fail() {
    let yaml = minimal(
        "explicit_euler",
        "particles:\n  - pos: [0, 0, 0]\n    mass: 1.0\n  - pos: [1, 0, 0]\n    mass: 1.0\nsprings:\n  - particle_ids: [0, 1, 1]\n    stiffness: 1.0\n",
    );
    match Scenario::from_yaml_str(&yaml) {
        Err(SimError::Validation(ValidationError::ParticleIds { index, len, .. })) => {
            assert_eq!(index, 0);
            assert_eq!(len, 3);
        }
        other => panic!("expected particle id error, got {:?}", other.err()),
    }
}

#[test]
fn model_errors_surface_as_validation() {
    let yaml = minimal("explicit_euler", "particles:\n  - pos: [0, 0, 0]\n    mass: 0.0\n");
    assert!(matches!(
        Scenario::from_yaml_str(&yaml),
        Err(SimError::Validation(ValidationError::MassTooSmall { index: 0, .. }))
    ));

    let yaml = minimal("explicit_euler", "particles: []\n");
    assert!(matches!(
        Scenario::from_yaml_str(&yaml),
        Err(SimError::Validation(ValidationError::NoParticles))
    ));

    let yaml = minimal("explicit_euler", "particles:\n  - pos: [0, 0]\n    mass: 1.0\n");
    assert!(matches!(
        Scenario::from_yaml_str(&yaml),
        Err(SimError::Validation(ValidationError::VectorLength { what: "pos", .. }))
    ));
}

#[test]
fn bad_timestep_fails() {
    let yaml = "solver:\n  type: midpoint\n  timestep: 0.0\nparticles:\n  - pos: [0, 0, 0]\n    mass: 1.0\n";
    assert!(matches!(
        Scenario::from_yaml_str(yaml),
        Err(SimError::Validation(ValidationError::Timestep { .. }))
    ));
}

#[test]
fn bad_newton_settings_fail() {
    let particles = "particles:\n  - pos: [0, 0, 0]\n    mass: 1.0\n";

    let yaml = minimal("implicit_euler", &format!("  max_iterations: 0\n{particles}"));
    assert!(matches!(
        Scenario::from_yaml_str(&yaml),
        Err(SimError::Validation(ValidationError::MaxIterations { max_iterations: 0 }))
    ));

    let yaml = minimal("implicit_euler", &format!("  tolerance: -1.0e-6\n{particles}"));
    assert!(matches!(
        Scenario::from_yaml_str(&yaml),
        Err(SimError::Validation(ValidationError::Tolerance { .. }))
    ));

    let yaml = minimal("implicit_euler", &format!("  tolerance: .nan\n{particles}"));
    assert!(matches!(
        Scenario::from_yaml_str(&yaml),
        Err(SimError::Validation(ValidationError::Tolerance { .. }))
    ));

    let yaml = minimal("implicit_euler", &format!("  max_iterations: 1\n  tolerance: 0.0\n{particles}"));
    assert!(Scenario::from_yaml_str(&yaml).is_ok());
}

#[test]
fn bad_probe_fails() {
    let particles = "particles:\n  - pos: [0, 0, 0]\n    mass: 1.0\n";
    for plot in [
        "plot:\n  particle_id: 3\n  dof: 0\n  y_range: [0, 1]\n",
        "plot:\n  particle_id: 0\n  dof: 3\n  y_range: [0, 1]\n",
        "plot:\n  particle_id: 0\n  dof: 0\n  y_range: [1, 0]\n",
    ] {
        let yaml = minimal("midpoint", &format!("{particles}{plot}"));
        assert!(
            matches!(
                Scenario::from_yaml_str(&yaml),
                Err(SimError::Validation(ValidationError::Probe { .. }))
            ),
            "probe should be rejected: {plot}"
        );
    }
}

#[test]
fn wind_is_added_to_forces() {
    let yaml = minimal(
        "symplectic_euler",
        "  gravity: 0.0\n  wind:\n    direction: [2.0, 0.0, 0.0]\n    strength: 0.5\nparticles:\n  - pos: [0, 0, 0]\n    mass: 1.0\n",
    );
    let mut scenario = Scenario::from_yaml_str(&yaml).unwrap();
    assert_eq!(
        scenario.solver.core().forces().names(),
        vec!["spring", "gravitational", "drag", "uniform_gravity", "wind"]
    );

    scenario.step().unwrap();
    // v = dt * 0.5
    assert!((scenario.state().particle_qd[0].x - 0.005).abs() < 1e-12);
}

#[test]
fn missing_file_is_io_error() {
    let path = scenarios_dir().join("does_not_exist.yaml");
    assert!(matches!(Scenario::from_path(path), Err(SimError::Io(_))));
}

// ==================================================================================
// Driving
// ==================================================================================

#[test]
fn advance_to_catches_up() {
    let mut scenario = Scenario::from_yaml_str(CHAIN).unwrap();
    let steps = scenario.advance_to(0.1).unwrap();
    assert!((10..=11).contains(&steps), "took {} steps", steps);
    assert!(scenario.time() >= 0.1);

    // already there: nothing to do
    assert_eq!(scenario.advance_to(0.05).unwrap(), 0);

    // the chain sags under gravity, the anchor stays
    assert!(scenario.probe_value().unwrap() < 2.0);
    assert_eq!(scenario.state().particle_q[0], NVec3::new(0.0, 2.0, 0.0));
    // the model keeps the initial configuration
    assert_eq!(scenario.model.particle_q()[2], NVec3::new(1.0, 2.0, 0.0));
}

#[test]
fn advance_to_unreachable_time_takes_no_steps() {
    let mut scenario = Scenario::from_yaml_str(CHAIN).unwrap();
    for t in [f64::INFINITY, f64::NAN, f64::NEG_INFINITY] {
        assert_eq!(scenario.advance_to(t).unwrap(), 0, "stepped towards {}", t);
    }
    assert_eq!(scenario.time(), 0.0);
    assert_eq!(scenario.state().particle_q[2], NVec3::new(1.0, 2.0, 0.0));

    // still drivable afterwards
    assert!(scenario.advance_to(0.02).unwrap() > 0);
}

#[test]
fn bundled_scenarios_run() {
    for name in ["spring_pair.yaml", "hanging_chain.yaml", "binary_orbit.yaml", "windy_cloth.yaml"] {
        let mut scenario = Scenario::from_path(scenarios_dir().join(name))
            .unwrap_or_else(|e| panic!("{name} failed to load: {e}"));
        scenario
            .advance_to(0.5)
            .unwrap_or_else(|e| panic!("{name} failed to run: {e}"));
        assert!(scenario.total_energy().is_finite(), "{name} produced a non-finite energy");
        assert!(scenario.probe.is_none() || scenario.probe_value().unwrap().is_finite());
    }
}

#[test]
fn orbit_keeps_its_radius() {
    let mut scenario = Scenario::from_path(scenarios_dir().join("binary_orbit.yaml")).unwrap();
    scenario.advance_to(2.0).unwrap();
    let r = scenario.state().particle_q[1].norm();
    assert!((r - 1.0).abs() < 0.01, "orbit radius drifted to {}", r);
}

// ==================================================================================
// Cloth
// ==================================================================================

#[test]
fn cloth_layout() {
    let model = make_cloth_model(3, 4, 0.005).unwrap();
    assert_eq!(model.particle_count(), 12);
    // 3 rows of 3 springs plus 2 gaps of 4 springs
    assert_eq!(model.spring_count(), 17);

    let fixed: Vec<usize> = (0..12).filter(|&i| !model.is_active(i)).collect();
    assert_eq!(fixed, vec![0, 3, 4, 7, 8, 11]);
    assert!((model.spring_rest_length()[0] - 0.005).abs() < 1e-12);
    assert_eq!(model.particle_q()[5], NVec3::new(0.005, 0.005, 4.0));
}
