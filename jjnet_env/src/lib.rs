//! jjnet Environment Layer
//!
//! Populators and perturbators never own their randomness. They are handed
//! shared **random streams**, each of which produces one sample per call and
//! nothing else. This crate defines that capability and a few seeded
//! implementations so that a whole lattice can be replayed from one seed.
//!
//! # Example
//!
//! ```ignore
//! use jjnet_env::{StreamHandle, UniformStream};
//!
//! let beta = StreamHandle::new(UniformStream::new(42, 0.9, 1.1)?);
//! let shared = beta.clone(); // same underlying stream
//! let a = beta.sample();
//! let b = shared.sample();   // continues the same sequence
//! ```

mod error;
mod seeded;
mod stream;

pub use error::EnvError;
pub use seeded::{ConstantStream, NormalStream, ReplayStream, StreamSpec, UniformStream};
pub use stream::{RandomStream, StreamHandle};
