//! jjnet Simulation Harness
//!
//! Drives a lattice network through its run lifecycle:
//!
//! ```text
//! SimConfig ──► Grid3d::populate ──► RunContext
//!                                    ├─ perturbators  (before_run)
//!                                    ├─ Solver        (advance, per step)
//!                                    └─ tracers       (before_run / after_step / after_run)
//! ```
//!
//! The numerical integrator is supplied by the caller through the `Solver`
//! trait. Everything else (topology, random parameter streams, perturbation,
//! trace output) is configured from a single serde document.
//!
//! # Usage
//!
//! ```ignore
//! use jjnet_sim::SimConfig;
//!
//! let config = SimConfig::from_file("run.json")?;
//! let (mut ctx, _summary) = config.build_context()?;
//! let s = config.schedule;
//! let report = ctx.run(&mut my_solver, s.start, s.end, s.dt)?;
//! ```

pub mod config;
mod error;
mod exporter;
pub mod run;

pub use config::{ContactStreams, SimConfig, StaticConfig, TracerConfig};
pub use error::{SimError, SimResult};
pub use exporter::{BoundaryCounts, CircuitRecord, ContactRecord, TopologyExport};
pub use run::{RunContext, RunReport, RunSchedule, Solver, StepOutcome};
