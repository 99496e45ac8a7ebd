//! Error types for the run harness.

use jjnet_core::{CoreError, TagExprError, TraceError};
use jjnet_env::EnvError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),

    #[error("Tag expression error: {0}")]
    TagExpr(#[from] TagExprError),

    #[error("Stream error: {0}")]
    Env(#[from] EnvError),

    /// Run bounds rejected before anything is touched
    #[error("Invalid schedule: start={start}, end={end}, dt={dt}")]
    InvalidSchedule { start: f64, end: f64, dt: f64 },

    #[error("A run is already in progress")]
    AlreadyRunning,

    #[error("No run in progress")]
    NotRunning,

    /// Step notifications must not go back in time
    #[error("Step time {time} precedes previous step {previous}")]
    TimeWentBackwards { previous: f64, time: f64 },

    /// The solver kept rejecting the same step
    #[error("Solver rejected {rejections} consecutive steps at t={time}")]
    Stalled { time: f64, rejections: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for harness operations
pub type SimResult<T> = Result<T, SimError>;
