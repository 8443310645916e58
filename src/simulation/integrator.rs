//! Advance phase of each time step
//!
//! Runs strictly after the force-phase barrier: every particle picks up
//! its accumulated acceleration, drifts, and wraps around the torus.
//! Each worker writes only its own slice, so the parallel form needs no
//! synchronization beyond the implicit barrier of the parallel-for.

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::simulation::states::{Particle, Universe};

/// Advance every particle by one step, in order, on the calling thread.
pub fn advance_serial(particles: &mut [Particle], dt: f32, universe: Universe) {
    for p in particles.iter_mut() {
        p.advance(dt, universe);
    }
}

/// Advance every particle by one step with the range fanned out over the
/// pool. Returns only after all workers are done.
pub fn advance_parallel(particles: &mut [Particle], dt: f32, universe: Universe, pool: &ThreadPool) {
    pool.install(|| {
        particles.par_iter_mut().for_each(|p| p.advance(dt, universe));
    });
}
