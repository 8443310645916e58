//! Force-phase kernels for the four solver strategies
//!
//! Each kernel fills in `Particle::a` for the whole array and nothing
//! else; positions and velocities move later, in the advance phase, once
//! every acceleration is in. The parallel kernels read positions and
//! masses from an immutable snapshot taken before the fan-out, so every
//! worker writes only the particles of its own stripe.

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::simulation::barnes_hut::{QuadTree, TreeParticle};
use crate::simulation::states::{NVec2, Particle, Universe};

/// Minimum number of particles a worker takes per splitting step.
const GRAIN: usize = 64;

/// All-pairs gravity, upper-triangular.
///
/// Each unordered pair (i, j) with i < j is evaluated once and applied to
/// both sides with opposite signs, halving the force computations. Safe
/// only serially: the j-side write lands anywhere in the array.
pub fn direct_serial(particles: &mut [Particle]) {
    for i in 0..particles.len() {
        let (head, tail) = particles.split_at_mut(i + 1);
        let pi = &mut head[i];
        for pj in tail.iter_mut() {
            pi.add_acceleration_pairwise(pj);
        }
    }
}

/// All-pairs gravity with the particle range fanned out over the pool.
///
/// The pairwise trick is dropped here: each worker iterates j over all N
/// against the snapshot and accumulates only into its own particles, so
/// no two workers ever write the same slot.
pub fn direct_parallel(particles: &mut [Particle], pool: &ThreadPool) {
    let sources: Vec<(NVec2, f32)> = particles.iter().map(|p| (p.x, p.m)).collect();

    pool.install(|| {
        particles
            .par_iter_mut()
            .enumerate()
            .with_min_len(GRAIN)
            .for_each(|(i, p)| {
                for (j, &(x, m)) in sources.iter().enumerate() {
                    if j != i {
                        p.add_acceleration(x, m);
                    }
                }
            });
    });
}

/// Barnes–Hut force phase, fully serial.
pub fn barnes_hut_serial(particles: &mut [Particle], universe: Universe, theta: f32) {
    let payloads: Vec<TreeParticle> = particles.iter().map(TreeParticle::from).collect();
    let tree = QuadTree::build(&payloads, universe);

    for (i, p) in particles.iter_mut().enumerate() {
        tree.apply_acceleration(p, i, &payloads, theta);
    }
}

/// Barnes–Hut force phase with the payload copy and the query fanned out
/// over the pool.
///
/// Insertion stays on one thread: a locked tree build costs more than the
/// traversal win. Once built the tree is immutable, so the query phase
/// reads it from every worker without synchronization.
pub fn barnes_hut_parallel(
    particles: &mut [Particle],
    universe: Universe,
    theta: f32,
    pool: &ThreadPool,
) {
    let payloads: Vec<TreeParticle> = pool.install(|| {
        particles
            .par_iter()
            .with_min_len(GRAIN)
            .map(TreeParticle::from)
            .collect()
    });

    let tree = QuadTree::build(&payloads, universe);

    pool.install(|| {
        particles
            .par_iter_mut()
            .enumerate()
            .with_min_len(GRAIN)
            .for_each(|(i, p)| {
                tree.apply_acceleration(p, i, &payloads, theta);
            });
    });
}
