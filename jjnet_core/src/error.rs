//! Error types for the jjnet core.

use crate::lattice::Axis;
use crate::tagged::ValueKind;
use std::path::PathBuf;
use thiserror::Error;

/// Failures reading a typed property.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropertyError {
    /// No property under this key
    #[error("Property not found: {key}")]
    NotFound { key: String },

    /// Property exists but holds another kind of value
    #[error("Property {key} is {found}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: ValueKind,
        found: ValueKind,
    },
}

/// Malformed tag expressions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TagExprError {
    #[error("Unexpected token '{found}' at position {position}")]
    UnexpectedToken { position: usize, found: String },

    #[error("Unexpected end of tag expression")]
    UnexpectedEnd,

    #[error("Invalid character '{ch}' at position {position}")]
    InvalidCharacter { position: usize, ch: char },
}

/// Strategy configuration rejected at construction time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Fewer random streams than the strategy consumes
    #[error("{strategy} requires {required} random streams, got {supplied}")]
    MissingStreams {
        strategy: &'static str,
        required: usize,
        supplied: usize,
    },

    /// Lattice dimension below 1
    #[error("Grid size along {axis} must be at least 1, got {size}")]
    InvalidDimension { axis: Axis, size: usize },
}

/// Failures while building a lattice.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LatticeError {
    /// The network already holds entities
    #[error("Network already populated ({contacts} contacts, {circuits} circuits)")]
    AlreadyPopulated { contacts: usize, circuits: usize },

    /// A face referenced a contact slot that was never filled
    #[error("No {axis} contact recorded at ({x}, {y}, {z})")]
    MissingContact {
        axis: Axis,
        x: usize,
        y: usize,
        z: usize,
    },
}

/// Tracer output failures.
#[derive(Debug, Error)]
pub enum TraceError {
    /// Output file could not be created
    #[error("Cannot open trace file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Write to an already open file failed
    #[error("Write to {path} failed: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Property(#[from] PropertyError),
}

/// Umbrella error for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Property error: {0}")]
    Property(#[from] PropertyError),

    #[error("Tag expression error: {0}")]
    TagExpr(#[from] TagExprError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Lattice error: {0}")]
    Lattice(#[from] LatticeError),

    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
