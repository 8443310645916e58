//! Command-line and scenario-file configuration
//!
//! Two surfaces feed a run:
//!
//! - the clap argument set below, validated once before any simulation
//!   work (a violation prints one message and the process exits 1), and
//! - optional YAML scenario files with explicit bodies, deserialized via
//!   `serde` into [`ScenarioConfig`].
//!
//! # YAML format
//! ```yaml
//! universe:
//!   size_x: 1000.0
//!   size_y: 1000.0
//!
//! parameters:
//!   t_end: 10.0       # total simulated duration
//!   h0: 0.1           # fixed step size
//!   theta: 0.5        # optional, Barnes-Hut opening criterion
//!   seed: 42          # optional
//!
//! bodies:
//!   - x: [480.0, 500.0]
//!     v: [0.0, 0.02]
//!     m: 1.0e9
//!   - x: [520.0, 500.0]
//!     v: [0.0, -0.02]
//!     m: 1.0e9
//! ```

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use serde::Deserialize;

use crate::simulation::engine::Strategy;
use crate::simulation::params::Parameters;

#[derive(Parser, Debug)]
#[command(
    name = "gravbench",
    about = "2D N-body gravity simulator comparing direct and Barnes-Hut solvers"
)]
pub struct Args {
    /// Number of bodies (10 to 1000000)
    #[arg(long = "particles", default_value_t = 300)]
    pub particle_count: usize,

    /// Total simulated duration
    #[arg(long = "totaltimesteps", default_value_t = 10.0)]
    pub total_time_steps: f32,

    /// Integration step size
    #[arg(long = "timestep", default_value_t = 0.1)]
    pub time_step: f32,

    /// Worker threads in the pool (1 to 100)
    #[arg(long, default_value_t = 4)]
    pub threads: usize,

    /// Universe width (10 to 5000)
    #[arg(long = "universe-size-x", default_value_t = 1000.0)]
    pub universe_size_x: f32,

    /// Universe height (10 to 5000)
    #[arg(long = "universe-size-y", default_value_t = 1000.0)]
    pub universe_size_y: f32,

    /// Solver: direct_serial, direct_parallel, barnes_hut_serial or
    /// barnes_hut_parallel
    #[arg(long, default_value = "direct_parallel")]
    pub execution: String,

    /// Barnes-Hut opening criterion
    #[arg(long, default_value_t = Parameters::DEFAULT_THETA)]
    pub theta: f32,

    /// Seed for the random universe
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Save initial and final universe PNGs
    #[arg(long)]
    pub save_png: bool,

    /// Also save intermediate snapshots during the run
    #[arg(long)]
    pub save_intermediate: bool,

    /// Steps between intermediate snapshots
    #[arg(long, default_value_t = 10)]
    pub save_every: u32,

    /// Also dump each snapshot as CSV
    #[arg(long)]
    pub save_csv: bool,

    /// Run the benchmark sweep instead of a single simulation
    #[arg(long)]
    pub benchmark: bool,

    /// Run the canned eight-body Barnes-Hut demo
    #[arg(long)]
    pub sample: bool,

    /// Load bodies and parameters from a YAML scenario file
    #[arg(long)]
    pub scenario: Option<PathBuf>,
}

impl Args {
    /// Range-check every option and produce the runtime configuration.
    /// Checks mirror the accepted ranges of the benchmark surface; the
    /// first violation wins and nothing gets clamped.
    pub fn into_config(self) -> Result<SimulationConfig> {
        if !(10..=1_000_000).contains(&self.particle_count) {
            bail!("--particles must be between 10 and 1000000");
        }
        if !(self.total_time_steps > 0.0 && self.total_time_steps <= 1_000_000.0) {
            bail!("--totaltimesteps must be greater than 0 and at most 1000000");
        }
        if !(self.time_step >= 0.001 && self.time_step <= 10_000.0) {
            bail!("--timestep must be between 0.001 and 10000");
        }
        if self.time_step > self.total_time_steps {
            bail!("--timestep must not exceed --totaltimesteps");
        }
        if !(1..=100).contains(&self.threads) {
            bail!("--threads must be between 1 and 100");
        }
        if !(10.0..=5000.0).contains(&self.universe_size_x) {
            bail!("--universe-size-x must be between 10 and 5000");
        }
        if !(10.0..=5000.0).contains(&self.universe_size_y) {
            bail!("--universe-size-y must be between 10 and 5000");
        }
        if self.save_every == 0 {
            bail!("--save-every must be at least 1");
        }
        if !(self.theta >= 0.0 && self.theta.is_finite()) {
            bail!("--theta must be a non-negative number");
        }

        let strategy: Strategy = self.execution.parse()?;

        Ok(SimulationConfig {
            particle_count: self.particle_count,
            total_time_steps: self.total_time_steps,
            time_step: self.time_step,
            threads: self.threads,
            universe_size_x: self.universe_size_x,
            universe_size_y: self.universe_size_y,
            strategy,
            theta: self.theta,
            seed: self.seed,
            save_png: self.save_png,
            save_intermediate: self.save_intermediate,
            save_every: self.save_every,
            save_csv: self.save_csv,
            benchmark: self.benchmark,
            sample: self.sample,
            scenario: self.scenario,
        })
    }
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub particle_count: usize,
    pub total_time_steps: f32,
    pub time_step: f32,
    pub threads: usize,
    pub universe_size_x: f32,
    pub universe_size_y: f32,
    pub strategy: Strategy,
    pub theta: f32,
    pub seed: u64,
    pub save_png: bool,
    pub save_intermediate: bool,
    pub save_every: u32,
    pub save_csv: bool,
    pub benchmark: bool,
    pub sample: bool,
    pub scenario: Option<PathBuf>,
}

/// Numerical parameters of a YAML scenario.
#[derive(Deserialize, Debug, Clone)]
pub struct ParametersConfig {
    pub t_end: f32,         // total simulated duration
    pub h0: f32,            // fixed step size
    pub theta: Option<f32>, // opening criterion, defaults when absent
    pub seed: Option<u64>,
}

/// Universe rectangle of a YAML scenario.
#[derive(Deserialize, Debug)]
pub struct UniverseConfig {
    pub size_x: f32,
    pub size_y: f32,
}

/// One body's initial state.
#[derive(Deserialize, Debug)]
pub struct BodyConfig {
    pub x: Vec<f32>, // position, 2 components
    pub v: Vec<f32>, // velocity, 2 components
    pub m: f32,      // mass
}

/// Top-level scenario file.
#[derive(Deserialize, Debug)]
pub struct ScenarioConfig {
    pub universe: UniverseConfig,
    pub parameters: ParametersConfig,
    pub bodies: Vec<BodyConfig>,
}
