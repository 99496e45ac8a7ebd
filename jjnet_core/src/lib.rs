//! jjnet Core - Josephson Junction Network Topology
//!
//! The entity model and construction framework for networks of weak links
//! wired into flux loops:
//! 1. **Model**: tagged contacts and circuits owned by a `Network` behind
//!    permanent indices, selected with tag expressions
//! 2. **Populator**: `Grid3d` builds a regular 3-D lattice with a uniform
//!    loop orientation and boundary classification
//! 3. **Perturbators**: randomize pre-run contact state
//! 4. **Tracers**: observe the network before, during and after a run
//!
//! Time integration is not part of this crate; a solver mutates contact
//! phase/voltage and circuit flux between tracer notifications.

pub mod circuit;
pub mod contact;
pub mod error;
pub mod flux_section;
pub mod index_tracer;
pub mod lattice;
pub mod network;
pub mod perturbator;
pub mod tag_expr;
pub mod tagged;
pub mod tracer;

// Re-export key types for convenience
pub use circuit::{Circuit, ContactRef};
pub use contact::Contact;
pub use error::{ConfigError, CoreError, CoreResult, LatticeError, PropertyError, TagExprError, TraceError};
pub use flux_section::{FluxSection, FluxSectionParams, SectionTable};
pub use index_tracer::{FluxWorker, IndexTracer, PhaseWorker, TraceWorker, VoltageWorker};
pub use lattice::{Axis, Grid3d, GridSize, Populate, PopulateSummary};
pub use network::Network;
pub use perturbator::{Perturb, Perturbator, StaticParams, StaticPerturbator};
pub use tag_expr::TagExpr;
pub use tagged::{PropertyKind, PropertyValue, Tagged, TaggedEntity, ValueKind};
pub use tracer::{Trace, Tracer};
