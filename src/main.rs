use springsim::{bench_solvers, Integrator, Scenario};

use anyhow::{ensure, Context, Result};
use clap::Parser;
use log::info;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Headless particle/spring simulation runner")]
struct Args {
    /// Scene file; bare names are also looked up in `scenarios/`
    #[arg(default_value = "spring_pair.yaml")]
    file_name: String,

    /// Simulated time to run for
    #[arg(long, default_value_t = 5.0)]
    t_end: f64,

    /// Render ticks per simulated second
    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    /// Print `t,value` rows for the scene's probe every tick
    #[arg(long)]
    probe: bool,

    /// Run the solver benchmark instead of a scene
    #[arg(long)]
    bench: bool,
}

// resolve here to keep main clean
fn scene_path(file_name: &str) -> PathBuf {
    let direct = PathBuf::from(file_name);
    if direct.exists() {
        return direct;
    }
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(file_name)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    ensure!(args.fps.is_finite() && args.fps > 0.0, "--fps must be a positive number, got {}", args.fps);
    ensure!(args.t_end.is_finite(), "--t-end must be a finite number, got {}", args.t_end);

    if args.bench {
        return bench_solvers();
    }

    let path = scene_path(&args.file_name);
    let mut scenario = Scenario::from_path(&path)
        .with_context(|| format!("failed to load scene {}", path.display()))?;

    let e0 = scenario.total_energy();
    let dt_render = 1.0 / args.fps;
    let mut ts = 0.0;

    if args.probe && scenario.probe.is_some() {
        println!("t,value");
    }

    // Same loop as an interactive viewer: step the solver until it catches up
    // with the render clock, then report
    while ts < args.t_end {
        ts += dt_render;
        scenario.advance_to(ts).context("simulation step failed")?;

        if args.probe {
            if let Some(value) = scenario.probe_value() {
                println!("{:.6},{:.6}", scenario.time(), value);
            }
        }
    }

    let e1 = scenario.total_energy();
    info!("finished at t = {:.4}s, energy {:.6} -> {:.6}", scenario.solver.ts(), e0, e1);

    println!("t = {:.6}", scenario.time());
    println!("energy: initial = {:.6}, final = {:.6}", e0, e1);
    for (i, q) in scenario.state().particle_q.iter().enumerate() {
        println!("particle {i:4}: [{:10.5}, {:10.5}, {:10.5}]", q.x, q.y, q.z);
    }

    Ok(())
}
