//! Solver strategy selection and the time-step driver
//!
//! The four strategies are one capability (advance the particle array by
//! one step) over a set known at build time, so they are a plain enum
//! dispatched here rather than a trait object.

use std::str::FromStr;

use anyhow::{bail, Result};
use rayon::ThreadPool;

use crate::simulation::forces;
use crate::simulation::integrator;
use crate::simulation::params::Parameters;
use crate::simulation::states::{Particle, System, Universe};
use crate::visualization::snapshot::{SnapshotPolicy, SnapshotSink};

/// The closed set of solver strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    DirectSerial,
    DirectParallel,
    BarnesHutSerial,
    BarnesHutParallel,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::DirectSerial,
        Strategy::DirectParallel,
        Strategy::BarnesHutSerial,
        Strategy::BarnesHutParallel,
    ];

    /// Name used in benchmark rows, snapshot labels and on the CLI.
    pub fn label(&self) -> &'static str {
        match self {
            Strategy::DirectSerial => "direct_serial",
            Strategy::DirectParallel => "direct_parallel",
            Strategy::BarnesHutSerial => "barnes_hut_serial",
            Strategy::BarnesHutParallel => "barnes_hut_parallel",
        }
    }

    /// Advance the particle array by one `params.h0`.
    ///
    /// The force phase completes for every particle (implicit barrier of
    /// the parallel-for) before any position moves, and when `step`
    /// returns positions and velocities are at t + dt with accelerations
    /// cleared.
    pub fn step(
        &self,
        particles: &mut [Particle],
        params: &Parameters,
        universe: Universe,
        pool: &ThreadPool,
    ) {
        match self {
            Strategy::DirectSerial => {
                forces::direct_serial(particles);
                integrator::advance_serial(particles, params.h0, universe);
            }
            Strategy::DirectParallel => {
                forces::direct_parallel(particles, pool);
                integrator::advance_parallel(particles, params.h0, universe, pool);
            }
            Strategy::BarnesHutSerial => {
                forces::barnes_hut_serial(particles, universe, params.theta);
                integrator::advance_serial(particles, params.h0, universe);
            }
            Strategy::BarnesHutParallel => {
                forces::barnes_hut_parallel(particles, universe, params.theta, pool);
                integrator::advance_parallel(particles, params.h0, universe, pool);
            }
        }
    }
}

impl FromStr for Strategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "direct_serial" => Ok(Strategy::DirectSerial),
            "direct_parallel" => Ok(Strategy::DirectParallel),
            "barnes_hut_serial" => Ok(Strategy::BarnesHutSerial),
            "barnes_hut_parallel" => Ok(Strategy::BarnesHutParallel),
            other => bail!(
                "unknown execution type '{other}' (expected one of: direct_serial, \
                 direct_parallel, barnes_hut_serial, barnes_hut_parallel)"
            ),
        }
    }
}

/// Step the system from its current time to `params.t_end`.
///
/// Snapshots are emitted from this thread only, after the step's barrier,
/// on the configured cadence; a failing sink is reported and the run goes
/// on. A particle going non-finite ends the run with an error, leaving
/// whatever artifacts already exist on disk intact.
pub fn run(
    system: &mut System,
    strategy: Strategy,
    params: &Parameters,
    universe: Universe,
    pool: &ThreadPool,
    snapshots: &SnapshotPolicy,
    sink: &mut dyn SnapshotSink,
) -> Result<()> {
    if system.particles.is_empty() {
        // Nothing to integrate and nothing to snapshot
        system.t = params.t_end;
        return Ok(());
    }

    let mut snapshot_counter: u32 = 0;

    while system.t < params.t_end {
        strategy.step(&mut system.particles, params, universe, pool);
        system.t += params.h0;

        if let Some(p) = system.particles.iter().find(|p| !p.is_finite()) {
            bail!(
                "particle state became non-finite at t = {}: {:?}",
                system.t,
                p
            );
        }

        snapshot_counter += 1;
        if snapshots.enabled && snapshot_counter >= snapshots.every {
            snapshot_counter = 0;
            let label = format!("{}_timestep_{}", strategy.label(), system.t);
            if let Err(err) = sink.emit(&system.particles, universe, &label) {
                eprintln!("snapshot at t = {} failed: {err:#}", system.t);
            }
        }
    }

    Ok(())
}
