//! Initial conditions and runtime scenario assembly
//!
//! Produces the runtime bundle (`Scenario`) a run needs, either from the
//! validated CLI configuration (random universe or the canned demo
//! pattern) or from a YAML scenario file with explicit bodies.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::configuration::config::{ScenarioConfig, SimulationConfig};
use crate::simulation::engine::Strategy;
use crate::simulation::params::Parameters;
use crate::simulation::states::{NVec2, Particle, System, Universe};

/// Mass band for randomly seeded particles.
const MASS_MIN: f32 = 1.0e8;
const MASS_MAX: f32 = 1.0e9;

/// A fully-initialized run: strategy, numerical parameters, domain and
/// the system state at t = 0.
pub struct Scenario {
    pub strategy: Strategy,
    pub parameters: Parameters,
    pub universe: Universe,
    pub system: System,
}

impl Scenario {
    /// Random universe (or the canned sample) from the CLI configuration.
    pub fn from_config(cfg: &SimulationConfig) -> Self {
        let (particles, universe) = if cfg.sample {
            barnes_hut_sample()
        } else {
            let universe = Universe::new(cfg.universe_size_x, cfg.universe_size_y);
            (
                random_particles(cfg.particle_count, universe, cfg.seed),
                universe,
            )
        };

        Self {
            strategy: cfg.strategy,
            parameters: Parameters {
                t_end: cfg.total_time_steps,
                h0: cfg.time_step,
                theta: cfg.theta,
                seed: cfg.seed,
            },
            universe,
            system: System::new(particles),
        }
    }

    /// Explicit bodies from a YAML scenario file. Strategy and theta still
    /// come from the CLI configuration. File contents are held to the same
    /// configuration contract as the CLI options: any violation is reported
    /// here, before any simulation work.
    pub fn from_scenario_config(file: ScenarioConfig, cfg: &SimulationConfig) -> Result<Self> {
        if !(10.0..=5000.0).contains(&file.universe.size_x) {
            bail!("universe size_x must be between 10 and 5000");
        }
        if !(10.0..=5000.0).contains(&file.universe.size_y) {
            bail!("universe size_y must be between 10 and 5000");
        }
        let universe = Universe::new(file.universe.size_x, file.universe.size_y);

        let mut particles = Vec::with_capacity(file.bodies.len());
        for (i, body) in file.bodies.iter().enumerate() {
            if body.x.len() != 2 || body.v.len() != 2 {
                bail!("body {i}: x and v must both have exactly 2 components");
            }
            if !(body.m > 0.0) {
                bail!("body {i}: mass must be positive, got {}", body.m);
            }
            if !(body.x[0] >= 0.0 && body.x[0] < universe.size_x)
                || !(body.x[1] >= 0.0 && body.x[1] < universe.size_y)
            {
                bail!(
                    "body {i}: position [{}, {}] lies outside the universe {} x {}",
                    body.x[0],
                    body.x[1],
                    universe.size_x,
                    universe.size_y
                );
            }
            particles.push(Particle::new(
                NVec2::new(body.x[0], body.x[1]),
                NVec2::new(body.v[0], body.v[1]),
                body.m,
            ));
        }

        Ok(Self {
            strategy: cfg.strategy,
            parameters: Parameters {
                t_end: file.parameters.t_end,
                h0: file.parameters.h0,
                theta: file.parameters.theta.unwrap_or(Parameters::DEFAULT_THETA),
                seed: file.parameters.seed.unwrap_or(cfg.seed),
            },
            universe,
            system: System::new(particles),
        })
    }
}

/// Uniformly seeded universe: positions anywhere in the rectangle,
/// velocities at rest, masses drawn from a fixed positive band. The same
/// seed reproduces the same universe.
pub fn random_particles(count: usize, universe: Universe, seed: u64) -> Vec<Particle> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            Particle::new(
                NVec2::new(
                    rng.gen_range(0.0..universe.size_x),
                    rng.gen_range(0.0..universe.size_y),
                ),
                NVec2::zeros(),
                rng.gen_range(MASS_MIN..MASS_MAX),
            )
        })
        .collect()
}

/// The fixed eight-body pattern of the Barnes–Hut demo: two clusters in a
/// 100 x 100 universe, at rest, with a heavier body anchoring each.
pub fn barnes_hut_sample() -> (Vec<Particle>, Universe) {
    let universe = Universe::new(100.0, 100.0);
    let body = |x: f32, y: f32, m: f32| Particle::new(NVec2::new(x, y), NVec2::zeros(), m);

    let particles = vec![
        body(12.0, 14.0, 8.0e8),
        body(18.0, 20.0, 3.0e8),
        body(25.0, 12.0, 2.5e8),
        body(16.0, 30.0, 4.0e8),
        body(70.0, 68.0, 9.0e8),
        body(78.0, 74.0, 3.5e8),
        body(64.0, 80.0, 2.0e8),
        body(82.0, 62.0, 4.5e8),
    ];

    (particles, universe)
}
