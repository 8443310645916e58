//! Core state types for the N-body simulation.
//!
//! Defines the particle state every solver strategy operates on, the
//! toroidal universe the particles live in, and the physical constants.
//! All state is single precision.

use nalgebra::Vector2;
pub type NVec2 = Vector2<f32>;

/// Gravitational constant.
pub const G: f32 = 6.674e-11;

/// Softening length. Added (squared) to separations so close encounters
/// stay bounded instead of blowing up when two particles coincide.
pub const SOFTENING: f32 = 1.0;

/// Softening squared, the form the force kernels consume.
pub const EPS2: f32 = SOFTENING * SOFTENING;

/// A point mass.
///
/// The acceleration field `a` is an accumulator: the force phase of a step
/// sums contributions into it, and [`Particle::advance`] consumes and
/// clears it. Outside a step it is zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub x: NVec2, // position
    pub v: NVec2, // velocity
    pub a: NVec2, // acceleration accumulated during the force phase
    pub m: f32,   // mass, > 0
}

impl Particle {
    pub fn new(x: NVec2, v: NVec2, m: f32) -> Self {
        debug_assert!(m > 0.0, "particle mass must be positive");
        Self {
            x,
            v,
            a: NVec2::zeros(),
            m,
        }
    }

    /// Accumulate the pull of a point mass `m` at `x` into this particle.
    ///
    /// Plummer softening: a += G * m * r / (|r|^2 + eps^2)^(3/2), which
    /// stays finite for any separation including zero.
    pub fn add_acceleration(&mut self, x: NVec2, m: f32) {
        // r points from this particle toward the source, so the
        // contribution is attractive along +r
        let r = x - self.x;
        let d2 = r.norm_squared() + EPS2;
        let inv_r = d2.sqrt().recip();
        let inv_r3 = inv_r * inv_r * inv_r;
        self.a += G * m * inv_r3 * r;
    }

    /// Symmetric form for the upper-triangular direct loop.
    ///
    /// One distance evaluation updates both sides with equal and opposite
    /// pulls scaled by the respective masses, so the caller can iterate j
    /// from i + 1 instead of over all j.
    pub fn add_acceleration_pairwise(&mut self, other: &mut Particle) {
        let r = other.x - self.x;
        let d2 = r.norm_squared() + EPS2;
        let inv_r = d2.sqrt().recip();
        let inv_r3 = inv_r * inv_r * inv_r;
        let coef = G * inv_r3;
        self.a += coef * other.m * r;
        other.a -= coef * self.m * r;
    }

    /// Symplectic-Euler update: kick the velocity from the accumulated
    /// acceleration, drift the position from the updated velocity, wrap
    /// both coordinates back into the universe, clear the accumulator.
    pub fn advance(&mut self, dt: f32, universe: Universe) {
        self.v += self.a * dt;
        self.x += self.v * dt;
        self.x.x = wrap(self.x.x, universe.size_x);
        self.x.y = wrap(self.x.y, universe.size_y);
        self.a = NVec2::zeros();
    }

    /// True when position and velocity are both finite.
    pub fn is_finite(&self) -> bool {
        self.x.x.is_finite() && self.x.y.is_finite() && self.v.x.is_finite() && self.v.y.is_finite()
    }
}

/// Wrap a coordinate into [0, size).
fn wrap(value: f32, size: f32) -> f32 {
    let wrapped = value.rem_euclid(size);
    // rem_euclid of a tiny negative value can round up to exactly `size`
    if wrapped >= size {
        0.0
    } else {
        wrapped
    }
}

/// The simulation domain: a rectangle [0, size_x) x [0, size_y) with
/// toroidal wrap-around at the edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Universe {
    pub size_x: f32,
    pub size_y: f32,
}

impl Universe {
    pub fn new(size_x: f32, size_y: f32) -> Self {
        Self { size_x, size_y }
    }
}

/// The full mutable state of a run: the particle array and the current
/// simulated time.
#[derive(Debug, Clone)]
pub struct System {
    pub particles: Vec<Particle>,
    pub t: f32,
}

impl System {
    pub fn new(particles: Vec<Particle>) -> Self {
        Self { particles, t: 0.0 }
    }

    /// Total mass of the system.
    pub fn total_mass(&self) -> f32 {
        self.particles.iter().map(|p| p.m).sum()
    }

    /// Total momentum of the system.
    pub fn total_momentum(&self) -> NVec2 {
        self.particles
            .iter()
            .fold(NVec2::zeros(), |acc, p| acc + p.v * p.m)
    }
}
