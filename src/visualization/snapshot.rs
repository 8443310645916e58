//! Snapshot emission: PNG rasters and CSV dumps of the universe
//!
//! The driver hands a sink the particle array and a label after a step's
//! barrier; the sink decides what, if anything, lands on disk. Failures
//! surface as errors for the driver to report, they never abort a run.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{ImageBuffer, Rgb};

use crate::simulation::states::{Particle, Universe};

/// When and how often the driver emits intermediate snapshots.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotPolicy {
    pub enabled: bool,
    pub every: u32, // steps between snapshots
}

impl SnapshotPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            every: u32::MAX,
        }
    }
}

/// Destination of snapshots. The label encodes strategy and simulated
/// time; the sink owns naming and format beyond that.
pub trait SnapshotSink {
    fn emit(&mut self, particles: &[Particle], universe: Universe, label: &str) -> Result<()>;
}

/// Sink that drops every snapshot. Used by the benchmark harness so
/// timing loops never touch the filesystem.
pub struct DiscardSink;

impl SnapshotSink for DiscardSink {
    fn emit(&mut self, _particles: &[Particle], _universe: Universe, _label: &str) -> Result<()> {
        Ok(())
    }
}

/// Writes `universe_<label>.png` and optionally `universe_<label>.csv`
/// into one output directory.
pub struct UniverseWriter {
    dir: PathBuf,
    png: bool,
    csv: bool,
}

impl UniverseWriter {
    pub fn new(dir: impl Into<PathBuf>, png: bool, csv: bool) -> Self {
        Self {
            dir: dir.into(),
            png,
            csv,
        }
    }
}

impl SnapshotSink for UniverseWriter {
    fn emit(&mut self, particles: &[Particle], universe: Universe, label: &str) -> Result<()> {
        if self.png {
            let path = self.dir.join(format!("universe_{label}.png"));
            universe_to_png(particles, universe, &path)?;
        }
        if self.csv {
            let path = self.dir.join(format!("universe_{label}.csv"));
            universe_to_csv(particles, &path)?;
        }
        Ok(())
    }
}

/// Rasterize the universe: black canvas at one pixel per length unit,
/// one white pixel per particle.
pub fn universe_to_png(particles: &[Particle], universe: Universe, path: &Path) -> Result<()> {
    let width = (universe.size_x.ceil() as u32).max(1);
    let height = (universe.size_y.ceil() as u32).max(1);

    let mut img = ImageBuffer::from_pixel(width, height, Rgb([0u8, 0, 0]));
    for p in particles {
        let px = (p.x.x as u32).min(width - 1);
        let py = (p.x.y as u32).min(height - 1);
        img.put_pixel(px, py, Rgb([255, 255, 255]));
    }

    img.save(path)
        .with_context(|| format!("writing {}", path.display()))
}

/// Dump the universe as CSV, one row per particle.
pub fn universe_to_csv(particles: &[Particle], path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "x,y,vx,vy,m")?;
    for p in particles {
        writeln!(out, "{},{},{},{},{}", p.x.x, p.x.y, p.v.x, p.v.y, p.m)?;
    }
    out.flush()?;
    Ok(())
}
