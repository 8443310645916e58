pub mod simulation;
pub mod configuration;
pub mod visualization;
pub mod benchmark;

pub use simulation::states::{Particle, System, Universe, NVec2, EPS2, G, SOFTENING};
pub use simulation::params::Parameters;
pub use simulation::engine::{run, Strategy};
pub use simulation::forces::{barnes_hut_parallel, barnes_hut_serial, direct_parallel, direct_serial};
pub use simulation::barnes_hut::{QuadNode, QuadTree, TreeParticle};
pub use simulation::scenario::{barnes_hut_sample, random_particles, Scenario};

pub use configuration::config::{Args, BodyConfig, ParametersConfig, ScenarioConfig, SimulationConfig, UniverseConfig};

pub use visualization::snapshot::{DiscardSink, SnapshotPolicy, SnapshotSink, UniverseWriter};

pub use benchmark::benchmark::{run_benchmark, BenchmarkGrid};
