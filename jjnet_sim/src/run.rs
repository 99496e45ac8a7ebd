//! Run lifecycle driver.
//!
//! A `RunContext` owns the network together with the perturbators and
//! tracers registered against it. One run walks the hooks in a fixed order:
//!
//! ```text
//! begin_run    perturbators (registration order), then tracers' before_run
//! loop         solver.advance -> accepted? -> tracers' after_step
//! finish_run   tracers' after_run
//! ```
//!
//! The solver is the only thing that moves time. Rejected steps are retried
//! at the same time and are never shown to tracers. A run that fails part
//! way is still closed: every tracer gets `after_run` before the error is
//! returned.

use crate::error::{SimError, SimResult};
use jjnet_core::{Network, Perturb, Perturbator, Populate, PopulateSummary, Trace, Tracer};
use jjnet_core::{CoreError, LatticeError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Result of a single solver step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step was taken; time moves to `time + dt`
    Accepted,
    /// The step was discarded; time stays put
    Rejected,
}

/// The external time integrator.
pub trait Solver {
    /// Attempts one step of length `dt` starting at `time`.
    fn advance(&mut self, network: &mut Network, time: f64, dt: f64) -> StepOutcome;
}

/// Bounds of one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSchedule {
    pub start: f64,
    pub end: f64,
    pub dt: f64,
}

impl Default for RunSchedule {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: 10.0,
            dt: 0.01,
        }
    }
}

impl RunSchedule {
    pub fn new(start: f64, end: f64, dt: f64) -> Self {
        Self { start, end, dt }
    }

    pub fn validate(&self) -> SimResult<()> {
        let valid = self.start.is_finite()
            && self.end.is_finite()
            && self.dt.is_finite()
            && self.dt > 0.0
            && self.end >= self.start;
        if valid {
            Ok(())
        } else {
            Err(SimError::InvalidSchedule {
                start: self.start,
                end: self.end,
                dt: self.dt,
            })
        }
    }

    /// Number of accepted steps needed to cover the interval.
    pub fn step_count(&self) -> u64 {
        if self.end <= self.start {
            return 0;
        }
        let steps = (self.end - self.start) / self.dt;
        let rounded = steps.round();
        // Absorb rounding noise so an exact multiple never gets a zero-length tail step.
        let count = if (steps - rounded).abs() <= 1e-9 * rounded.max(1.0) {
            rounded as u64
        } else {
            steps.ceil() as u64
        };
        count.max(1)
    }

    /// Time reached after `k` accepted steps. The last step lands on `end`.
    fn time_after(&self, k: u64) -> f64 {
        if k >= self.step_count() {
            self.end
        } else {
            (self.start + k as f64 * self.dt).min(self.end)
        }
    }
}

/// Summary of a completed `RunContext::run`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub accepted_steps: u64,
    pub rejected_steps: u64,
    pub final_time: f64,
}

#[derive(Debug, Clone, Copy)]
struct ActiveRun {
    schedule: RunSchedule,
    last_time: f64,
}

/// Owner of a network and its pre-run and observation strategies.
#[derive(Debug)]
pub struct RunContext {
    network: Network,
    perturbators: Vec<Perturbator>,
    tracers: Vec<Tracer>,
    active: Option<ActiveRun>,
    /// Consecutive rejections tolerated before `run` gives up
    max_rejections: u32,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub const DEFAULT_MAX_REJECTIONS: u32 = 1000;

    pub fn new() -> Self {
        Self::with_network(Network::new())
    }

    /// Wraps an already built network.
    pub fn with_network(network: Network) -> Self {
        Self {
            network,
            perturbators: Vec::new(),
            tracers: Vec::new(),
            active: None,
            max_rejections: Self::DEFAULT_MAX_REJECTIONS,
        }
    }

    pub fn with_max_rejections(mut self, max_rejections: u32) -> Self {
        self.max_rejections = max_rejections;
        self
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    pub fn into_network(self) -> Network {
        self.network
    }

    pub fn perturbators(&self) -> &[Perturbator] {
        &self.perturbators
    }

    pub fn tracers(&self) -> &[Tracer] {
        &self.tracers
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Builds topology into the owned network. Only an empty network can
    /// be populated.
    pub fn populate(&mut self, populator: &dyn Populate) -> SimResult<PopulateSummary> {
        if !self.network.is_empty() {
            return Err(SimError::Core(CoreError::Lattice(LatticeError::AlreadyPopulated {
                contacts: self.network.contact_count(),
                circuits: self.network.circuit_count(),
            })));
        }
        Ok(populator.populate(&mut self.network)?)
    }

    /// Registers a perturbator; returns its position in the call order.
    pub fn add_perturbator(&mut self, perturbator: impl Into<Perturbator>) -> usize {
        self.perturbators.push(perturbator.into());
        self.perturbators.len() - 1
    }

    /// Registers a tracer; returns its position in the call order.
    pub fn add_tracer(&mut self, tracer: impl Into<Tracer>) -> usize {
        self.tracers.push(tracer.into());
        self.tracers.len() - 1
    }

    /// Runs the pre-run hooks. The schedule is checked before any of them.
    pub fn begin_run(&mut self, start: f64, end: f64, dt: f64) -> SimResult<()> {
        if self.active.is_some() {
            return Err(SimError::AlreadyRunning);
        }
        let schedule = RunSchedule::new(start, end, dt);
        schedule.validate()?;

        info!(
            "Starting run t=[{}, {}] dt={} ({} perturbators, {} tracers)",
            start,
            end,
            dt,
            self.perturbators.len(),
            self.tracers.len()
        );

        for perturbator in &mut self.perturbators {
            perturbator.before_run(&mut self.network, start, end, dt)?;
        }
        for tracer in &mut self.tracers {
            debug!("before_run: {} tracer", tracer.name());
            tracer.before_run(&self.network, start, end, dt)?;
        }

        self.active = Some(ActiveRun {
            schedule,
            last_time: start,
        });
        Ok(())
    }

    /// Reports an accepted step that ended at `time`.
    pub fn accepted_step(&mut self, time: f64) -> SimResult<()> {
        let active = self.active.as_mut().ok_or(SimError::NotRunning)?;
        if time < active.last_time {
            return Err(SimError::TimeWentBackwards {
                previous: active.last_time,
                time,
            });
        }
        active.last_time = time;

        for tracer in &mut self.tracers {
            tracer.after_step(&self.network, time)?;
        }
        Ok(())
    }

    /// Runs the post-run hooks and closes the run.
    pub fn finish_run(&mut self) -> SimResult<()> {
        let active = self.active.take().ok_or(SimError::NotRunning)?;
        let result = self.notify_after_run();
        info!(
            "Finished run at t={} (scheduled end {})",
            active.last_time, active.schedule.end
        );
        result
    }

    /// Every tracer gets `after_run`, in order, even after one fails. The
    /// first failure is returned.
    fn notify_after_run(&mut self) -> SimResult<()> {
        let mut first = None;
        for tracer in &mut self.tracers {
            if let Err(e) = tracer.after_run(&self.network) {
                warn!("after_run of {} tracer failed: {}", tracer.name(), e);
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), |e| Err(e.into()))
    }

    /// Closes a run that failed part way and hands back `cause`.
    fn abort_run(&mut self, cause: SimError) -> SimError {
        if self.active.take().is_some() {
            warn!("Aborting run: {}", cause);
            // Later failures are logged by notify_after_run; `cause` wins.
            let _ = self.notify_after_run();
        }
        cause
    }

    /// Drives a full run with `solver`.
    pub fn run<S: Solver + ?Sized>(
        &mut self,
        solver: &mut S,
        start: f64,
        end: f64,
        dt: f64,
    ) -> SimResult<RunReport> {
        self.begin_run(start, end, dt)?;
        let schedule = RunSchedule::new(start, end, dt);

        let mut report = RunReport {
            final_time: start,
            ..Default::default()
        };
        let mut consecutive = 0u32;
        let total = schedule.step_count();
        let mut k = 0u64;

        while k < total {
            let time = schedule.time_after(k);
            let next = schedule.time_after(k + 1);
            match solver.advance(&mut self.network, time, next - time) {
                StepOutcome::Accepted => {
                    consecutive = 0;
                    k += 1;
                    report.accepted_steps += 1;
                    report.final_time = next;
                    if let Err(e) = self.accepted_step(next) {
                        return Err(self.abort_run(e));
                    }
                }
                StepOutcome::Rejected => {
                    consecutive += 1;
                    report.rejected_steps += 1;
                    if consecutive > self.max_rejections {
                        warn!("Solver stalled at t={} after {} rejections", time, consecutive);
                        return Err(self.abort_run(SimError::Stalled {
                            time,
                            rejections: consecutive,
                        }));
                    }
                }
            }
        }

        self.finish_run()?;
        debug!(
            "Run report: {} accepted, {} rejected",
            report.accepted_steps, report.rejected_steps
        );
        Ok(report)
    }
}
