//! CLI test driver: loads initial conditions, runs the solver for a fixed
//! number of steps, and dumps trajectory/energy output. Not part of the
//! library's public API; the core exposes a library API only.

use std::{fs::File, path::PathBuf, process::ExitCode};

use gravsim::{
    energy,
    io::{self, write_energy_log_header, write_energy_log_row, write_trajectory_frame, write_trajectory_header},
    quad::Quad,
    solver::{ForceEngine, Solver, SolverConfig},
    vector::Vec2,
};

struct Args {
    input: PathBuf,
    trajectory_out: PathBuf,
    energy_out: Option<PathBuf>,
    steps: usize,
    time_step: f64,
    theta: f64,
}

fn parse_args() -> Args {
    let mut input = PathBuf::from("bodies.txt");
    let mut trajectory_out = PathBuf::from("trajectory.csv");
    let mut energy_out = None;
    let mut steps = 1000usize;
    let mut time_step = 1e-3;
    let mut theta = 0.5;

    let mut it = std::env::args().skip(1);
    while let Some(flag) = it.next() {
        match flag.as_str() {
            "--input" => input = PathBuf::from(it.next().expect("--input needs a path")),
            "--trajectory-out" => {
                trajectory_out = PathBuf::from(it.next().expect("--trajectory-out needs a path"))
            }
            "--energy-out" => energy_out = it.next().map(PathBuf::from),
            "--steps" => steps = it.next().and_then(|s| s.parse().ok()).unwrap_or(steps),
            "--time-step" => time_step = it.next().and_then(|s| s.parse().ok()).unwrap_or(time_step),
            "--theta" => theta = it.next().and_then(|s| s.parse().ok()).unwrap_or(theta),
            other => log::warn!("ignoring unrecognized argument '{other}'"),
        }
    }

    Args {
        input,
        trajectory_out,
        energy_out,
        steps,
        time_step,
        theta,
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = parse_args();

    let bodies = match io::load_initial_conditions(&args.input) {
        Ok(b) => b,
        Err(e) => {
            log::error!("failed to load initial conditions: {e}");
            return ExitCode::from(1);
        }
    };

    let universe = Quad::new(Vec2::new(-1e4, -1e4), 2e4);
    let config = SolverConfig {
        universe,
        time_step: args.time_step,
        engine: ForceEngine::BarnesHut {
            theta: args.theta,
            max_depth: 24,
            max_leaves: 1,
        },
        g: 1.0,
        collisions_enabled: true,
        energy_tracking: args.energy_out.is_some(),
    };
    let mut solver = Solver::new(config, bodies);

    let Ok(mut trajectory_file) = File::create(&args.trajectory_out) else {
        log::error!("failed to create trajectory output file");
        return ExitCode::from(1);
    };
    if write_trajectory_header(&mut trajectory_file).is_err() {
        return ExitCode::from(2);
    }

    let mut energy_file = match &args.energy_out {
        Some(path) => match File::create(path) {
            Ok(f) => Some(f),
            Err(_) => {
                log::error!("failed to create energy output file");
                return ExitCode::from(1);
            }
        },
        None => None,
    };
    if let Some(f) = energy_file.as_mut() {
        if write_energy_log_header(f).is_err() {
            return ExitCode::from(2);
        }
    }

    for step in 0..args.steps {
        if let Err(e) = solver.step() {
            log::error!("solver step {step} failed: {e}");
            return ExitCode::from(3);
        }
        if write_trajectory_frame(&mut trajectory_file, step, &solver.bodies).is_err() {
            return ExitCode::from(2);
        }
        if let Some(f) = energy_file.as_mut() {
            let total = energy::total_energy(&solver.bodies, solver.config.g);
            if write_energy_log_row(f, step, total).is_err() {
                return ExitCode::from(2);
            }
        }
    }

    ExitCode::SUCCESS
}
