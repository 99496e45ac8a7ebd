//! Error types for the jjnet environment layer.

use thiserror::Error;

/// Errors raised while building random streams.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Distribution parameters were rejected
    #[error("Invalid distribution: {0}")]
    InvalidDistribution(String),

    /// A replay stream needs at least one sample to cycle through
    #[error("Replay stream requires at least one sample")]
    EmptyReplay,
}

impl EnvError {
    /// Creates a distribution error.
    pub fn distribution(msg: impl std::fmt::Display) -> Self {
        Self::InvalidDistribution(msg.to_string())
    }
}
