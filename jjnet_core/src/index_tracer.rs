//! Per-index trace files.
//!
//! An `IndexTracer` resolves its tag expression once at run start, opens
//! one file per matched contact (or circuit) and appends a
//! `<time>\t<value>` line to each after every accepted step. What gets
//! written is up to the worker.

use crate::error::TraceError;
use crate::network::Network;
use crate::tag_expr::TagExpr;
use crate::tracer::{Trace, Tracer};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Placeholder replaced by the entity index in file templates.
pub const INDEX_PLACEHOLDER: &str = "{index}";

/// Which collection a worker reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceTarget {
    Contacts,
    Circuits,
}

/// Knows how to label and sample one scalar per entity.
pub trait TraceWorker {
    const TARGET: TraceTarget;

    /// Metric name used in the header line
    const METRIC: &'static str;

    /// Default file name template
    const FILE_TEMPLATE: &'static str;

    fn value(network: &Network, index: usize) -> f64;

    fn write_header(out: &mut impl Write, index: usize) -> std::io::Result<()> {
        writeln!(out, "# time\t{}[{}]", Self::METRIC, index)
    }

    fn write_value(out: &mut impl Write, network: &Network, index: usize, time: f64) -> std::io::Result<()> {
        writeln!(out, "{}\t{}", time, Self::value(network, index))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VoltageWorker;

impl TraceWorker for VoltageWorker {
    const TARGET: TraceTarget = TraceTarget::Contacts;
    const METRIC: &'static str = "voltage";
    const FILE_TEMPLATE: &'static str = "u.{index}";

    fn value(network: &Network, index: usize) -> f64 {
        network.contact(index).voltage
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseWorker;

impl TraceWorker for PhaseWorker {
    const TARGET: TraceTarget = TraceTarget::Contacts;
    const METRIC: &'static str = "phase";
    const FILE_TEMPLATE: &'static str = "phase.{index}";

    fn value(network: &Network, index: usize) -> f64 {
        network.contact(index).phase
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FluxWorker;

impl TraceWorker for FluxWorker {
    const TARGET: TraceTarget = TraceTarget::Circuits;
    const METRIC: &'static str = "flux";
    const FILE_TEMPLATE: &'static str = "flux.{index}";

    fn value(network: &Network, index: usize) -> f64 {
        network.flux(index)
    }
}

struct TraceOutput {
    index: usize,
    path: PathBuf,
    writer: BufWriter<File>,
}

impl fmt::Debug for TraceOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceOutput")
            .field("index", &self.index)
            .field("path", &self.path)
            .finish()
    }
}

/// Writes one trace file per matched entity.
pub struct IndexTracer<W> {
    tag_expr: TagExpr,
    file_template: String,
    outputs: Vec<TraceOutput>,
    worker: PhantomData<W>,
}

impl<W: TraceWorker> IndexTracer<W> {
    /// Traces every entity matching `tag_expr` into the worker's default files.
    pub fn new(tag_expr: TagExpr) -> Self {
        Self {
            tag_expr,
            file_template: W::FILE_TEMPLATE.to_string(),
            outputs: Vec::new(),
            worker: PhantomData,
        }
    }

    /// Overrides the file name template. `{index}` is replaced by the entity index.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.file_template = template.into();
        self
    }

    pub fn file_template(&self) -> &str {
        &self.file_template
    }

    pub fn tag_expr(&self) -> &TagExpr {
        &self.tag_expr
    }

    /// Path of the trace file for `index`.
    pub fn path_for(&self, index: usize) -> PathBuf {
        PathBuf::from(self.file_template.replace(INDEX_PLACEHOLDER, &index.to_string()))
    }

    /// Indices currently being traced.
    pub fn targets(&self) -> Vec<usize> {
        self.outputs.iter().map(|o| o.index).collect()
    }

    fn resolve(&self, network: &Network) -> Vec<usize> {
        match W::TARGET {
            TraceTarget::Contacts => network.match_contacts(&self.tag_expr),
            TraceTarget::Circuits => network.match_circuits(&self.tag_expr),
        }
    }

    fn open(&self, index: usize) -> Result<TraceOutput, TraceError> {
        let path = self.path_for(index);
        let file = File::create(&path).map_err(|source| TraceError::Open {
            path: path.clone(),
            source,
        })?;

        let mut writer = BufWriter::new(file);
        W::write_header(&mut writer, index).map_err(|source| TraceError::Write {
            path: path.clone(),
            source,
        })?;

        Ok(TraceOutput { index, path, writer })
    }

    /// Flushes and drops every open file. All of them are flushed even
    /// after a failure; the first error is returned.
    fn close(&mut self) -> Result<(), TraceError> {
        let mut first = None;
        for mut output in self.outputs.drain(..) {
            if let Err(source) = output.writer.flush() {
                warn!("Flush of {} failed: {}", output.path.display(), source);
                first.get_or_insert(TraceError::Write {
                    path: output.path,
                    source,
                });
            }
        }
        first.map_or(Ok(()), Err)
    }
}

impl<W: TraceWorker> fmt::Debug for IndexTracer<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexTracer")
            .field("metric", &W::METRIC)
            .field("tag_expr", &self.tag_expr)
            .field("file_template", &self.file_template)
            .field("outputs", &self.outputs)
            .finish()
    }
}

impl<W> Trace for IndexTracer<W>
where
    W: TraceWorker,
    IndexTracer<W>: Into<Tracer>,
{
    fn before_run(
        &mut self,
        network: &Network,
        _start_time: f64,
        _end_time: f64,
        _dt: f64,
    ) -> Result<(), TraceError> {
        // A repeated run starts fresh files.
        self.close()?;

        let indices = self.resolve(network);
        let mut outputs = Vec::with_capacity(indices.len());
        for index in indices {
            outputs.push(self.open(index)?);
        }
        debug!("{} tracer opened {} files", W::METRIC, outputs.len());
        self.outputs = outputs;
        Ok(())
    }

    fn after_step(&mut self, network: &Network, time: f64) -> Result<(), TraceError> {
        for output in &mut self.outputs {
            W::write_value(&mut output.writer, network, output.index, time).map_err(|source| {
                TraceError::Write {
                    path: output.path.clone(),
                    source,
                }
            })?;
        }
        Ok(())
    }

    fn after_run(&mut self, _network: &Network) -> Result<(), TraceError> {
        self.close()
    }

    fn duplicate(&self) -> Tracer {
        IndexTracer::<W> {
            tag_expr: self.tag_expr.clone(),
            file_template: self.file_template.clone(),
            outputs: Vec::new(),
            worker: PhantomData,
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Circuit, ContactRef};
    use crate::contact::Contact;
    use crate::tagged::TaggedEntity;
    use std::fs;

    fn small_network() -> Network {
        let mut net = Network::new();
        for tag in ["x", "y", "x"] {
            let mut c = Contact::default();
            c.add_tag(tag);
            net.add_contact(c);
        }
        net.add_circuit(Circuit::new(1.0, [ContactRef::new(0, 1.0, 1.0); 4]));
        net
    }

    #[test]
    fn test_voltage_trace_files() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("u.{index}").to_string_lossy().into_owned();
        let mut net = small_network();

        let mut tracer = IndexTracer::<VoltageWorker>::new(TagExpr::tag("x")).with_template(template);
        tracer.before_run(&net, 0.0, 1.0, 0.5).unwrap();
        assert_eq!(tracer.targets(), vec![0, 2]);

        net.contact_mut(0).voltage = 0.25;
        net.contact_mut(2).voltage = -1.5;
        tracer.after_step(&net, 0.5).unwrap();
        net.contact_mut(0).voltage = 0.5;
        tracer.after_step(&net, 1.0).unwrap();
        tracer.after_run(&net).unwrap();

        let u0 = fs::read_to_string(dir.path().join("u.0")).unwrap();
        assert_eq!(u0, "# time\tvoltage[0]\n0.5\t0.25\n1\t0.5\n");
        let u2 = fs::read_to_string(dir.path().join("u.2")).unwrap();
        assert_eq!(u2, "# time\tvoltage[2]\n0.5\t-1.5\n1\t-1.5\n");
        assert!(!dir.path().join("u.1").exists());
    }

    #[test]
    fn test_flux_worker_reads_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("f{index}.dat").to_string_lossy().into_owned();
        let mut net = small_network();

        let mut tracer = IndexTracer::<FluxWorker>::new(TagExpr::All).with_template(template);
        tracer.before_run(&net, 0.0, 1.0, 0.1).unwrap();
        net.circuit_mut(0).flux = 0.75;
        tracer.after_step(&net, 0.1).unwrap();
        tracer.after_run(&net).unwrap();

        let f0 = fs::read_to_string(dir.path().join("f0.dat")).unwrap();
        assert_eq!(f0, "# time\tflux[0]\n0.1\t0.75\n");
    }

    #[test]
    fn test_header_precedes_data_and_times_increase() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("p.{index}").to_string_lossy().into_owned();
        let net = small_network();

        let mut tracer = IndexTracer::<PhaseWorker>::new(TagExpr::tag("y")).with_template(template);
        tracer.before_run(&net, 0.0, 1.0, 0.1).unwrap();
        for step in 1..=10 {
            tracer.after_step(&net, step as f64 * 0.1).unwrap();
        }
        tracer.after_run(&net).unwrap();

        let content = fs::read_to_string(dir.path().join("p.1")).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("# time\tphase[1]"));
        let times: Vec<f64> = lines
            .map(|l| l.split('\t').next().unwrap().parse().unwrap())
            .collect();
        assert_eq!(times.len(), 10);
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_open_failure_surfaces_at_run_start() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir
            .path()
            .join("missing")
            .join("u.{index}")
            .to_string_lossy()
            .into_owned();
        let net = small_network();

        let mut tracer = IndexTracer::<VoltageWorker>::new(TagExpr::All).with_template(template);
        let err = tracer.before_run(&net, 0.0, 1.0, 0.1).unwrap_err();
        assert!(matches!(err, TraceError::Open { .. }));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_close_flushes_past_a_failed_file() {
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink("/dev/full", dir.path().join("u.0")).unwrap();
        let template = dir.path().join("u.{index}").to_string_lossy().into_owned();
        let mut net = small_network();

        let mut tracer = IndexTracer::<VoltageWorker>::new(TagExpr::tag("x")).with_template(template);
        tracer.before_run(&net, 0.0, 1.0, 0.5).unwrap();
        net.contact_mut(2).voltage = 3.0;
        tracer.after_step(&net, 0.5).unwrap();

        let err = tracer.after_run(&net).unwrap_err();
        assert!(matches!(err, TraceError::Write { ref path, .. } if path.ends_with("u.0")));
        assert!(tracer.targets().is_empty());
        let u2 = fs::read_to_string(dir.path().join("u.2")).unwrap();
        assert_eq!(u2, "# time\tvoltage[2]\n0.5\t3\n");
    }

    #[test]
    fn test_no_match_opens_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("u.{index}").to_string_lossy().into_owned();
        let net = small_network();

        let mut tracer = IndexTracer::<VoltageWorker>::new(TagExpr::tag("z")).with_template(template);
        tracer.before_run(&net, 0.0, 1.0, 0.1).unwrap();
        tracer.after_step(&net, 0.1).unwrap();
        tracer.after_run(&net).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_duplicate_keeps_configuration_only() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("u.{index}").to_string_lossy().into_owned();
        let net = small_network();

        let mut tracer = IndexTracer::<VoltageWorker>::new(TagExpr::tag("x")).with_template(template.clone());
        tracer.before_run(&net, 0.0, 1.0, 0.1).unwrap();

        let Tracer::Voltage(copy) = tracer.duplicate() else {
            panic!("duplicate changed variant");
        };
        assert_eq!(copy.file_template(), template);
        assert_eq!(copy.tag_expr(), &TagExpr::tag("x"));
        assert!(copy.targets().is_empty());
        tracer.after_run(&net).unwrap();
    }

    #[test]
    fn test_default_templates() {
        let t = IndexTracer::<VoltageWorker>::new(TagExpr::All);
        assert_eq!(t.path_for(7), PathBuf::from("u.7"));
        let t = IndexTracer::<FluxWorker>::new(TagExpr::All);
        assert_eq!(t.path_for(3), PathBuf::from("flux.3"));
    }
}
