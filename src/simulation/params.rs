//! Numerical parameters for a run
//!
//! `Parameters` holds the runtime knobs of the integration loop. The
//! gravitational constant and the softening length are compile-time
//! constants in `states`.

#[derive(Debug, Clone)]
pub struct Parameters {
    pub t_end: f32, // total simulated duration
    pub h0: f32,    // fixed step size
    pub theta: f32, // Barnes-Hut opening criterion
    pub seed: u64,  // seed for random universes
}

impl Parameters {
    /// Default opening criterion for Barnes-Hut.
    pub const DEFAULT_THETA: f32 = 0.5;
}
