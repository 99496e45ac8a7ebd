//! Observation of network state across a run.
//!
//! Tracers are notified at three points, always from the thread driving the
//! solver and always in registration order:
//! 1. `before_run` once, before the first step
//! 2. `after_step` after every accepted step
//! 3. `after_run` once, when the run completes

use crate::error::TraceError;
use crate::flux_section::FluxSection;
use crate::index_tracer::{FluxWorker, IndexTracer, PhaseWorker, VoltageWorker};
use crate::network::Network;

/// Lifecycle hooks. The defaults do nothing.
pub trait Trace {
    fn before_run(
        &mut self,
        _network: &Network,
        _start_time: f64,
        _end_time: f64,
        _dt: f64,
    ) -> Result<(), TraceError> {
        Ok(())
    }

    fn after_step(&mut self, _network: &Network, _time: f64) -> Result<(), TraceError> {
        Ok(())
    }

    fn after_run(&mut self, _network: &Network) -> Result<(), TraceError> {
        Ok(())
    }

    /// Copies the configuration without any open outputs.
    fn duplicate(&self) -> Tracer;
}

/// The available tracers.
#[derive(Debug, Default)]
pub enum Tracer {
    #[default]
    Null,
    /// Per-contact voltage traces
    Voltage(IndexTracer<VoltageWorker>),
    /// Per-contact phase traces
    Phase(IndexTracer<PhaseWorker>),
    /// Per-circuit flux traces
    Flux(IndexTracer<FluxWorker>),
    /// Flux map of one lattice plane, written at run end
    FluxSection(FluxSection),
}

impl Tracer {
    pub fn name(&self) -> &'static str {
        match self {
            Tracer::Null => "null",
            Tracer::Voltage(_) => "voltage",
            Tracer::Phase(_) => "phase",
            Tracer::Flux(_) => "flux",
            Tracer::FluxSection(_) => "flux_section",
        }
    }
}

impl Trace for Tracer {
    fn before_run(
        &mut self,
        network: &Network,
        start_time: f64,
        end_time: f64,
        dt: f64,
    ) -> Result<(), TraceError> {
        match self {
            Tracer::Null => Ok(()),
            Tracer::Voltage(t) => t.before_run(network, start_time, end_time, dt),
            Tracer::Phase(t) => t.before_run(network, start_time, end_time, dt),
            Tracer::Flux(t) => t.before_run(network, start_time, end_time, dt),
            Tracer::FluxSection(t) => t.before_run(network, start_time, end_time, dt),
        }
    }

    fn after_step(&mut self, network: &Network, time: f64) -> Result<(), TraceError> {
        match self {
            Tracer::Null => Ok(()),
            Tracer::Voltage(t) => t.after_step(network, time),
            Tracer::Phase(t) => t.after_step(network, time),
            Tracer::Flux(t) => t.after_step(network, time),
            Tracer::FluxSection(t) => t.after_step(network, time),
        }
    }

    fn after_run(&mut self, network: &Network) -> Result<(), TraceError> {
        match self {
            Tracer::Null => Ok(()),
            Tracer::Voltage(t) => t.after_run(network),
            Tracer::Phase(t) => t.after_run(network),
            Tracer::Flux(t) => t.after_run(network),
            Tracer::FluxSection(t) => t.after_run(network),
        }
    }

    fn duplicate(&self) -> Tracer {
        match self {
            Tracer::Null => Tracer::Null,
            Tracer::Voltage(t) => t.duplicate(),
            Tracer::Phase(t) => t.duplicate(),
            Tracer::Flux(t) => t.duplicate(),
            Tracer::FluxSection(t) => t.duplicate(),
        }
    }
}

impl From<IndexTracer<VoltageWorker>> for Tracer {
    fn from(t: IndexTracer<VoltageWorker>) -> Self {
        Tracer::Voltage(t)
    }
}

impl From<IndexTracer<PhaseWorker>> for Tracer {
    fn from(t: IndexTracer<PhaseWorker>) -> Self {
        Tracer::Phase(t)
    }
}

impl From<IndexTracer<FluxWorker>> for Tracer {
    fn from(t: IndexTracer<FluxWorker>) -> Self {
        Tracer::Flux(t)
    }
}

impl From<FluxSection> for Tracer {
    fn from(t: FluxSection) -> Self {
        Tracer::FluxSection(t)
    }
}
