//! Concrete random streams.
//!
//! Seeded streams use ChaCha8 so that a lattice built from a given seed is
//! identical on every platform.

use crate::error::EnvError;
use crate::stream::{RandomStream, StreamHandle};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};

/// Always yields the same value.
#[derive(Debug, Clone, Copy)]
pub struct ConstantStream(pub f64);

impl RandomStream for ConstantStream {
    fn sample(&mut self) -> f64 {
        self.0
    }
}

/// Cycles through a fixed list of samples.
///
/// Two replay streams built from the same list produce the same sequence,
/// which is what deterministic-replay checks need.
#[derive(Debug, Clone)]
pub struct ReplayStream {
    samples: Vec<f64>,
    cursor: usize,
}

impl ReplayStream {
    /// Creates a replay stream. Fails on an empty list.
    pub fn new(samples: Vec<f64>) -> Result<Self, EnvError> {
        if samples.is_empty() {
            return Err(EnvError::EmptyReplay);
        }
        Ok(Self { samples, cursor: 0 })
    }

    /// Number of samples drawn so far.
    pub fn drawn(&self) -> usize {
        self.cursor
    }
}

impl RandomStream for ReplayStream {
    fn sample(&mut self) -> f64 {
        let value = self.samples[self.cursor % self.samples.len()];
        self.cursor += 1;
        value
    }
}

/// Uniform samples on `[low, high)`.
#[derive(Debug, Clone)]
pub struct UniformStream {
    rng: ChaCha8Rng,
    dist: Uniform<f64>,
}

impl UniformStream {
    /// Creates a seeded uniform stream.
    pub fn new(seed: u64, low: f64, high: f64) -> Result<Self, EnvError> {
        if !(low < high) || !low.is_finite() || !high.is_finite() {
            return Err(EnvError::distribution(format!(
                "uniform range [{}, {}) is empty or not finite",
                low, high
            )));
        }
        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            dist: Uniform::new(low, high),
        })
    }
}

impl RandomStream for UniformStream {
    fn sample(&mut self) -> f64 {
        self.dist.sample(&mut self.rng)
    }
}

/// Gaussian samples.
#[derive(Debug, Clone)]
pub struct NormalStream {
    rng: ChaCha8Rng,
    dist: Normal<f64>,
}

impl NormalStream {
    /// Creates a seeded normal stream.
    pub fn new(seed: u64, mean: f64, std_dev: f64) -> Result<Self, EnvError> {
        // rand_distr only rejects a non-finite sigma, not a negative one.
        if !(std_dev >= 0.0) || !std_dev.is_finite() || !mean.is_finite() {
            return Err(EnvError::distribution(format!(
                "normal({}, {}) needs a finite mean and a finite non-negative sigma",
                mean, std_dev
            )));
        }
        let dist = Normal::new(mean, std_dev).map_err(EnvError::distribution)?;
        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            dist,
        })
    }
}

impl RandomStream for NormalStream {
    fn sample(&mut self) -> f64 {
        self.dist.sample(&mut self.rng)
    }
}

/// Configuration-level description of a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamSpec {
    Constant { value: f64 },
    Uniform { low: f64, high: f64 },
    Normal { mean: f64, std_dev: f64 },
    Replay { samples: Vec<f64> },
}

impl StreamSpec {
    /// Builds a shared stream. `seed` is ignored by unseeded kinds.
    pub fn build(&self, seed: u64) -> Result<StreamHandle, EnvError> {
        Ok(match self {
            StreamSpec::Constant { value } => StreamHandle::new(ConstantStream(*value)),
            StreamSpec::Uniform { low, high } => {
                StreamHandle::new(UniformStream::new(seed, *low, *high)?)
            }
            StreamSpec::Normal { mean, std_dev } => {
                StreamHandle::new(NormalStream::new(seed, *mean, *std_dev)?)
            }
            StreamSpec::Replay { samples } => {
                StreamHandle::new(ReplayStream::new(samples.clone())?)
            }
        })
    }
}
