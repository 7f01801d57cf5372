use std::sync::Arc;
use std::time::Instant;

use crate::error::ValidationError;
use crate::simulation::builder::ModelBuilder;
use crate::simulation::integrator::{Integrator, IntegratorKind, Solver};
use crate::simulation::model::{Model, ParticleFlags};

/// Build a `rows x cols` cloth of particles in the plane z = 4.
///
/// Particles are `spacing` apart, the first and last particle of every row are
/// fixed, springs along a row are stiff (3500, damping 1.8) and springs
/// between rows are soft (300, damping 0.1). Rest lengths are inferred.
pub fn make_cloth_model(rows: usize, cols: usize, spacing: f64) -> Result<Model, ValidationError> {
    let n = rows * cols;
    let mut pos = Vec::with_capacity(n);
    let mut flags = Vec::with_capacity(n);

    for i in 0..rows {
        for j in 0..cols {
            pos.push([i as f64 * spacing, j as f64 * spacing, 4.0]);
            // pin both ends of each row
            if j == 0 || j + 1 == cols {
                flags.push(ParticleFlags::empty());
            } else {
                flags.push(ParticleFlags::ACTIVE);
            }
        }
    }

    let mut builder = ModelBuilder::default();
    builder.add_particles(
        &pos,
        &vec![[0.0; 3]; n],
        &vec![0.1; n],
        Some(vec![0.01; n].as_slice()),
        None,
        Some(flags.as_slice()),
    )?;

    for i in 0..rows {
        for j in 0..cols {
            let idx = i * cols + j;
            if j > 0 {
                builder.add_spring(idx - 1, idx, 3500.0, Some(1.8), None)?;
            }
            if i > 0 {
                builder.add_spring(idx - cols, idx, 300.0, Some(0.1), None)?;
            }
        }
    }

    builder.finalize()
}

/// Time one step of every integrator on cloths of increasing size
/// Paste output directly into excel to graph
pub fn bench_solvers() -> Result<(), anyhow::Error> {
    let sizes = [(4, 8), (6, 12), (8, 16), (10, 20), (14, 28)];
    let dt = 0.0005;

    println!("particles,solver,ms");

    for (rows, cols) in sizes {
        let model = Arc::new(make_cloth_model(rows, cols, 0.005)?);
        // Dense implicit solves get expensive quickly, average fewer steps
        let steps = if model.particle_count() <= 128 { 10 } else { 2 };

        for kind in IntegratorKind::ALL {
            let mut solver = Solver::new(kind, model.clone(), dt);
            let mut state_0 = model.state();
            let mut state_1 = model.state();

            // Warm-up
            solver.step(&state_0, &mut state_1, None)?;
            std::mem::swap(&mut state_0, &mut state_1);

            let t0 = Instant::now();
            for _ in 0..steps {
                solver.step(&state_0, &mut state_1, None)?;
                std::mem::swap(&mut state_0, &mut state_1);
            }
            let ms = t0.elapsed().as_secs_f64() * 1000.0 / steps as f64;

            println!("{},{},{:.6}", model.particle_count(), kind.name(), ms);
        }
    }

    Ok(())
}
