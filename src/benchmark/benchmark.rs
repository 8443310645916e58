//! Benchmark harness sweeping the strategy and parallelism grid
//!
//! For every thread count and particle count in the grid, every solver
//! strategy runs the same seeded universe several times; the averaged
//! wall-clock time becomes one CSV row. Rows are buffered and written in
//! one shot at the end so a long sweep that dies early leaves no torn
//! file.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use rayon::ThreadPoolBuilder;

use crate::configuration::config::SimulationConfig;
use crate::simulation::engine::{self, Strategy};
use crate::simulation::params::Parameters;
use crate::simulation::scenario::random_particles;
use crate::simulation::states::{System, Universe};
use crate::visualization::snapshot::{DiscardSink, SnapshotPolicy};

/// Sweep bounds. Particle counts grow geometrically from the initial
/// count by the multiplier up to the maximum.
pub struct BenchmarkGrid {
    pub init_thread_count: usize,
    pub max_thread_count: usize,
    pub init_particle_count: usize,
    pub particle_count_multiplier: usize,
    pub max_particle_count: usize,
    pub repeat_count: usize,
}

impl Default for BenchmarkGrid {
    fn default() -> Self {
        Self {
            init_thread_count: 1,
            max_thread_count: 4,
            init_particle_count: 10,
            particle_count_multiplier: 10,
            max_particle_count: 10_000,
            repeat_count: 4,
        }
    }
}

/// Run the full sweep and write the per-trial CSV. Returns the path of
/// the written file.
pub fn run_benchmark(cfg: &SimulationConfig, grid: &BenchmarkGrid) -> Result<PathBuf> {
    let universe = Universe::new(cfg.universe_size_x, cfg.universe_size_y);
    let parameters = Parameters {
        t_end: cfg.total_time_steps,
        h0: cfg.time_step,
        theta: cfg.theta,
        seed: cfg.seed,
    };

    let mut rows = String::new();
    rows.push_str(
        "execution_time,execution_type,thread_count,particle_count,total_timesteps,timestep,repeat_count\n",
    );

    println!("----- Benchmark N-Body simulation -----");

    for thread_count in grid.init_thread_count..=grid.max_thread_count {
        let pool = ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .build()
            .context("building worker pool")?;

        let mut particle_count = grid.init_particle_count;
        while particle_count <= grid.max_particle_count {
            // One seeded universe shared by every trial of this cell
            let template = random_particles(particle_count, universe, parameters.seed);

            for strategy in Strategy::ALL {
                let mut total_ms = 0.0f64;

                for _ in 0..grid.repeat_count {
                    let mut system = System::new(template.clone());

                    let before = Instant::now();
                    engine::run(
                        &mut system,
                        strategy,
                        &parameters,
                        universe,
                        &pool,
                        &SnapshotPolicy::disabled(),
                        &mut DiscardSink,
                    )?;
                    total_ms += before.elapsed().as_secs_f64() * 1000.0;

                    print!(".");
                    let _ = std::io::stdout().flush();
                }

                let average_ms = total_ms / grid.repeat_count as f64;
                writeln!(
                    rows,
                    "{},{},{},{},{},{},{}",
                    average_ms,
                    strategy.label(),
                    thread_count,
                    particle_count,
                    parameters.t_end,
                    parameters.h0,
                    grid.repeat_count,
                )?;
            }

            particle_count *= grid.particle_count_multiplier;
        }
    }
    println!();

    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let path = PathBuf::from(format!("benchmark_{stamp}.csv"));

    std::fs::write(&path, rows).with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote results to {}", path.display());

    Ok(path)
}
