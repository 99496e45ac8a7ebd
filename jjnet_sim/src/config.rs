//! Serde configuration for a lattice run.
//!
//! Every field has a default, so a config file only needs to name what it
//! changes:
//!
//! ```json
//! {
//!   "seed": 7,
//!   "grid": { "x": 8, "y": 8, "z": 2 },
//!   "perturbation": { "average": [0, 0, 0] },
//!   "tracers": [{ "kind": "voltage", "tag_expr": "inner" }]
//! }
//! ```

use crate::error::SimResult;
use crate::run::{RunContext, RunSchedule};
use jjnet_core::{
    FluxSection, FluxSectionParams, FluxWorker, Grid3d, GridSize, IndexTracer, PhaseWorker,
    Perturbator, PopulateSummary, StaticParams, StaticPerturbator, TagExpr, TraceWorker, Tracer,
    VoltageWorker,
};
use jjnet_env::{StreamHandle, StreamSpec};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Odd multipliers for per-stream sub-seeds.
const SEED_MIX: u64 = 0x9e3779b97f4a7c15;
const STREAM_MIX: u64 = 0x517cc1b727220a95;

/// Sub-seed of stream `slot`. Distinct slots give distinct seeds for one master seed.
pub fn derive_seed(seed: u64, slot: u64) -> u64 {
    seed.wrapping_mul(SEED_MIX)
        .wrapping_add(slot.wrapping_add(1).wrapping_mul(STREAM_MIX))
}

/// Stream slots, fixed so adding a tracer never reshuffles the draws.
mod slot {
    pub const DAMPING: u64 = 0;
    pub const TAU: u64 = 1;
    pub const CRITICAL_CURRENT: u64 = 2;
    pub const PERTURB_X: u64 = 3;
    pub const PERTURB_Y: u64 = 4;
    pub const PERTURB_Z: u64 = 5;
}

/// Distributions of the per-contact parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactStreams {
    pub damping: StreamSpec,
    pub tau: StreamSpec,
    pub critical_current: StreamSpec,
}

impl Default for ContactStreams {
    fn default() -> Self {
        Self {
            damping: StreamSpec::Constant { value: 1.0 },
            tau: StreamSpec::Constant { value: 1.0 },
            critical_current: StreamSpec::Constant { value: 40.0 },
        }
    }
}

/// Static position perturbation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticConfig {
    /// Target centroid
    pub average: [f64; 3],
    /// Contacts to move; empty selects all
    pub tag_expr: String,
    /// Position distributions along x, y, z
    pub x: StreamSpec,
    pub y: StreamSpec,
    pub z: StreamSpec,
}

impl Default for StaticConfig {
    fn default() -> Self {
        let jitter = StreamSpec::Normal {
            mean: 0.0,
            std_dev: 0.05,
        };
        Self {
            average: [0.0; 3],
            tag_expr: String::new(),
            x: jitter.clone(),
            y: jitter.clone(),
            z: jitter,
        }
    }
}

/// One configured tracer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TracerConfig {
    Voltage {
        #[serde(default)]
        tag_expr: String,
        #[serde(default)]
        file_template: Option<String>,
    },
    Phase {
        #[serde(default)]
        tag_expr: String,
        #[serde(default)]
        file_template: Option<String>,
    },
    Flux {
        #[serde(default)]
        tag_expr: String,
        #[serde(default)]
        file_template: Option<String>,
    },
    FluxSection(FluxSectionParams),
}

fn index_tracer<W: TraceWorker>(
    tag_expr: &str,
    file_template: &Option<String>,
) -> SimResult<IndexTracer<W>> {
    let tracer = IndexTracer::new(TagExpr::parse(tag_expr)?);
    Ok(match file_template {
        Some(template) => tracer.with_template(template.clone()),
        None => tracer,
    })
}

impl TracerConfig {
    pub fn build(&self) -> SimResult<Tracer> {
        Ok(match self {
            TracerConfig::Voltage {
                tag_expr,
                file_template,
            } => index_tracer::<VoltageWorker>(tag_expr, file_template)?.into(),
            TracerConfig::Phase {
                tag_expr,
                file_template,
            } => index_tracer::<PhaseWorker>(tag_expr, file_template)?.into(),
            TracerConfig::Flux {
                tag_expr,
                file_template,
            } => index_tracer::<FluxWorker>(tag_expr, file_template)?.into(),
            TracerConfig::FluxSection(params) => FluxSection::new(params.clone()).into(),
        })
    }
}

/// Complete description of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Master seed for every random stream
    pub seed: u64,
    pub grid: GridSize,
    pub streams: ContactStreams,
    pub perturbation: Option<StaticConfig>,
    pub tracers: Vec<TracerConfig>,
    pub schedule: RunSchedule,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            grid: GridSize::cube(4),
            streams: ContactStreams::default(),
            perturbation: None,
            tracers: Vec::new(),
            schedule: RunSchedule::default(),
        }
    }
}

impl SimConfig {
    /// Reads a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> SimResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&text)?;
        debug!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_json(text: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    fn stream(&self, spec: &StreamSpec, slot: u64) -> SimResult<StreamHandle> {
        Ok(spec.build(derive_seed(self.seed, slot))?)
    }

    pub fn populator(&self) -> SimResult<Grid3d> {
        let damping = self.stream(&self.streams.damping, slot::DAMPING)?;
        let tau = self.stream(&self.streams.tau, slot::TAU)?;
        let critical_current = self.stream(&self.streams.critical_current, slot::CRITICAL_CURRENT)?;
        Ok(Grid3d::with_streams(self.grid, damping, tau, critical_current)
            .map_err(jjnet_core::CoreError::from)?)
    }

    pub fn perturbator(&self) -> SimResult<Option<Perturbator>> {
        let Some(cfg) = &self.perturbation else {
            return Ok(None);
        };
        let params = StaticParams {
            average: Vector3::from(cfg.average),
            tag_expr: TagExpr::parse(&cfg.tag_expr)?,
        };
        let streams = vec![
            self.stream(&cfg.x, slot::PERTURB_X)?,
            self.stream(&cfg.y, slot::PERTURB_Y)?,
            self.stream(&cfg.z, slot::PERTURB_Z)?,
        ];
        let perturbator =
            StaticPerturbator::new(params, streams).map_err(jjnet_core::CoreError::from)?;
        Ok(Some(perturbator.into()))
    }

    pub fn tracers(&self) -> SimResult<Vec<Tracer>> {
        self.tracers.iter().map(TracerConfig::build).collect()
    }

    /// Populates a fresh context and registers the configured strategies.
    pub fn build_context(&self) -> SimResult<(RunContext, PopulateSummary)> {
        let mut ctx = RunContext::new();
        let summary = ctx.populate(&self.populator()?)?;
        if let Some(perturbator) = self.perturbator()? {
            ctx.add_perturbator(perturbator);
        }
        for tracer in self.tracers()? {
            ctx.add_tracer(tracer);
        }
        info!(
            "Built {}x{}x{} lattice (seed {}): {} contacts, {} circuits",
            self.grid.x,
            self.grid.y,
            self.grid.z,
            self.seed,
            summary.total_contacts(),
            summary.total_circuits()
        );
        Ok((ctx, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;
    use jjnet_core::{Axis, ConfigError, CoreError};

    #[test]
    fn test_empty_json_is_default() {
        let config = SimConfig::from_json("{}").unwrap();
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn test_partial_json_overrides() {
        let config = SimConfig::from_json(
            r#"{
                "seed": 7,
                "grid": { "x": 3, "y": 2, "z": 1 },
                "streams": { "damping": { "kind": "uniform", "low": 0.9, "high": 1.1 } },
                "perturbation": { "average": [1, 2, 3], "tag_expr": "inner" },
                "tracers": [
                    { "kind": "voltage", "tag_expr": "boundary & x" },
                    { "kind": "flux_section", "plane": "x", "position": 1 }
                ],
                "schedule": { "start": 0.0, "end": 2.0, "dt": 0.5 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.seed, 7);
        assert_eq!(config.grid, GridSize::new(3, 2, 1));
        assert_eq!(config.streams.tau, StreamSpec::Constant { value: 1.0 });
        let perturbation = config.perturbation.as_ref().unwrap();
        assert_eq!(perturbation.average, [1.0, 2.0, 3.0]);
        assert_eq!(perturbation.x, StaticConfig::default().x);

        let TracerConfig::FluxSection(params) = &config.tracers[1] else {
            panic!("expected flux section");
        };
        assert_eq!(params.plane, Axis::X);
        assert_eq!(params.file_name, "flux.section");
        assert_eq!(config.schedule, RunSchedule::new(0.0, 2.0, 0.5));
    }

    #[test]
    fn test_sub_seeds_differ() {
        let seeds: std::collections::BTreeSet<u64> = (0..6).map(|s| derive_seed(42, s)).collect();
        assert_eq!(seeds.len(), 6);
        assert_ne!(derive_seed(0, 0), derive_seed(0, 1));
    }

    #[test]
    fn test_build_context_registers_strategies() {
        let config = SimConfig {
            grid: GridSize::cube(2),
            perturbation: Some(StaticConfig::default()),
            tracers: vec![
                TracerConfig::Voltage {
                    tag_expr: String::new(),
                    file_template: None,
                },
                TracerConfig::FluxSection(FluxSectionParams::default()),
            ],
            ..Default::default()
        };
        let (ctx, summary) = config.build_context().unwrap();
        assert_eq!(summary.total_contacts(), 12);
        assert_eq!(summary.total_circuits(), 6);
        assert_eq!(ctx.perturbators().len(), 1);
        let names: Vec<&str> = ctx.tracers().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["voltage", "flux_section"]);
    }

    #[test]
    fn test_same_seed_same_lattice() {
        let config = SimConfig {
            grid: GridSize::new(3, 3, 2),
            streams: ContactStreams {
                critical_current: StreamSpec::Normal {
                    mean: 40.0,
                    std_dev: 2.0,
                },
                ..Default::default()
            },
            ..Default::default()
        };
        let (a, _) = config.build_context().unwrap();
        let (b, _) = config.build_context().unwrap();
        assert_eq!(a.network(), b.network());

        let other = SimConfig { seed: 43, ..config };
        let (c, _) = other.build_context().unwrap();
        assert_ne!(a.network(), c.network());
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let config = SimConfig {
            grid: GridSize::new(2, 0, 2),
            ..Default::default()
        };
        let err = config.build_context().unwrap_err();
        assert!(matches!(
            err,
            SimError::Core(CoreError::Config(ConfigError::InvalidDimension { axis: Axis::Y, .. }))
        ));
    }

    #[test]
    fn test_bad_tag_expr_rejected() {
        let config = SimConfig {
            tracers: vec![TracerConfig::Phase {
                tag_expr: "inner & (".to_string(),
                file_template: None,
            }],
            ..Default::default()
        };
        assert!(matches!(config.tracers(), Err(SimError::TagExpr(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SimConfig::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, SimError::Io(_)));
    }
}
