use gravbench::{run, run_benchmark, BenchmarkGrid, Scenario, ScenarioConfig};
use gravbench::{Args, SimulationConfig};
use gravbench::{SnapshotPolicy, SnapshotSink, UniverseWriter};

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use rayon::ThreadPoolBuilder;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

// load here to keep main clean
fn load_scenario_from_yaml(path: &Path) -> Result<ScenarioConfig> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = BufReader::new(file);
    let scenario_cfg: ScenarioConfig =
        serde_yaml::from_reader(reader).with_context(|| format!("parsing {}", path.display()))?;
    Ok(scenario_cfg)
}

fn simulate(cfg: &SimulationConfig) -> Result<()> {
    let mut scenario = match &cfg.scenario {
        Some(path) => Scenario::from_scenario_config(load_scenario_from_yaml(path)?, cfg)?,
        None => Scenario::from_config(cfg),
    };

    println!("= N-Body simulation =");
    println!("Execution type: {}", scenario.strategy.label());
    println!("Number of threads: {}", cfg.threads);
    println!("Total time steps: {}", scenario.parameters.t_end);
    println!("Time step: {}", scenario.parameters.h0);
    println!("Particle count: {}", scenario.system.particles.len());
    println!(
        "Universe size: {} x {}",
        scenario.universe.size_x, scenario.universe.size_y
    );
    println!();

    let pool = ThreadPoolBuilder::new()
        .num_threads(cfg.threads)
        .build()
        .context("building worker pool")?;

    let mut sink = UniverseWriter::new(".", cfg.save_png, cfg.save_csv);
    let policy = SnapshotPolicy {
        enabled: cfg.save_png && cfg.save_intermediate,
        every: cfg.save_every,
    };

    if cfg.save_png {
        if let Err(err) = sink.emit(&scenario.system.particles, scenario.universe, "init") {
            eprintln!("initial snapshot failed: {err:#}");
        }
    }

    let before = Instant::now();
    run(
        &mut scenario.system,
        scenario.strategy,
        &scenario.parameters,
        scenario.universe,
        &pool,
        &policy,
        &mut sink,
    )?;
    let elapsed_ms = before.elapsed().as_secs_f64() * 1000.0;

    println!("Simulation finished in {elapsed_ms:.3} ms");

    if cfg.save_png {
        let label = format!("{}_final", scenario.strategy.label());
        if let Err(err) = sink.emit(&scenario.system.particles, scenario.universe, &label) {
            eprintln!("final snapshot failed: {err:#}");
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    let cfg = match args.into_config() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(1);
        }
    };

    let outcome = if cfg.benchmark {
        run_benchmark(&cfg, &BenchmarkGrid::default()).map(|_| ())
    } else {
        simulate(&cfg)
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}
