//! Pre-run perturbation of contact state.
//!
//! A perturbator is configured once and invoked at the start of every run
//! with `(network, start_time, end_time, dt)`. Scripts may repeat runs, so
//! invoking it again under the same configuration is expected.

use crate::error::{ConfigError, CoreResult};
use crate::network::Network;
use crate::tag_expr::TagExpr;
use jjnet_env::StreamHandle;
use nalgebra::Vector3;
use tracing::debug;

/// A pre-run strategy.
pub trait Perturb {
    fn before_run(
        &mut self,
        network: &mut Network,
        start_time: f64,
        end_time: f64,
        dt: f64,
    ) -> CoreResult<()>;

    /// Copies the configuration. Random streams stay shared.
    fn duplicate(&self) -> Perturbator;
}

/// The available perturbators.
#[derive(Debug, Clone, Default)]
pub enum Perturbator {
    /// Leaves the network untouched
    #[default]
    Null,
    Static(StaticPerturbator),
}

impl Perturb for Perturbator {
    fn before_run(
        &mut self,
        network: &mut Network,
        start_time: f64,
        end_time: f64,
        dt: f64,
    ) -> CoreResult<()> {
        match self {
            Perturbator::Null => Ok(()),
            Perturbator::Static(p) => p.before_run(network, start_time, end_time, dt),
        }
    }

    fn duplicate(&self) -> Perturbator {
        match self {
            Perturbator::Null => Perturbator::Null,
            Perturbator::Static(p) => p.duplicate(),
        }
    }
}

impl From<StaticPerturbator> for Perturbator {
    fn from(p: StaticPerturbator) -> Self {
        Perturbator::Static(p)
    }
}

/// Parameters of the static perturbator.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticParams {
    /// Centroid the realized positions must have
    pub average: Vector3<f64>,
    /// Contacts to perturb
    pub tag_expr: TagExpr,
}

impl Default for StaticParams {
    fn default() -> Self {
        Self {
            average: Vector3::zeros(),
            tag_expr: TagExpr::All,
        }
    }
}

/// Scatters contact positions with a prescribed centroid.
///
/// Each matched contact gets an independent `(x, y, z)` sample; the whole
/// set is then shifted so its mean equals `average` exactly.
#[derive(Debug, Clone)]
pub struct StaticPerturbator {
    params: StaticParams,
    x: StreamHandle,
    y: StreamHandle,
    z: StreamHandle,
}

impl StaticPerturbator {
    pub const STREAMS: usize = 3;

    /// Creates the perturbator from streams ordered x, y, z.
    pub fn new(params: StaticParams, streams: Vec<StreamHandle>) -> Result<Self, ConfigError> {
        let supplied = streams.len();
        let mut streams = streams.into_iter();
        match (streams.next(), streams.next(), streams.next()) {
            (Some(x), Some(y), Some(z)) => Ok(Self { params, x, y, z }),
            _ => Err(ConfigError::MissingStreams {
                strategy: "static perturbator",
                required: Self::STREAMS,
                supplied,
            }),
        }
    }

    pub fn params(&self) -> &StaticParams {
        &self.params
    }

    fn draw(&self) -> Vector3<f64> {
        let x = self.x.sample();
        let y = self.y.sample();
        let z = self.z.sample();
        Vector3::new(x, y, z)
    }
}

impl Perturb for StaticPerturbator {
    fn before_run(
        &mut self,
        network: &mut Network,
        _start_time: f64,
        _end_time: f64,
        _dt: f64,
    ) -> CoreResult<()> {
        let indices = network.match_contacts(&self.params.tag_expr);
        if indices.is_empty() {
            debug!("Static perturbator matched no contacts");
            return Ok(());
        }

        let samples: Vec<Vector3<f64>> = indices.iter().map(|_| self.draw()).collect();
        let mean = samples.iter().sum::<Vector3<f64>>() / samples.len() as f64;
        let offset = mean - self.params.average;

        for (&index, sample) in indices.iter().zip(&samples) {
            network.contact_mut(index).position = sample - offset;
        }

        debug!(
            "Static perturbator moved {} contacts, offset ({:.4}, {:.4}, {:.4})",
            indices.len(),
            offset.x,
            offset.y,
            offset.z
        );
        Ok(())
    }

    fn duplicate(&self) -> Perturbator {
        Perturbator::Static(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::Contact;
    use crate::tagged::TaggedEntity;
    use approx::assert_relative_eq;
    use jjnet_env::{ConstantStream, ReplayStream, UniformStream};
    use proptest::prelude::*;

    fn network_of(n: usize, tag: &str) -> Network {
        let mut net = Network::new();
        for _ in 0..n {
            let mut c = Contact::default();
            c.add_tag(tag);
            net.add_contact(c);
        }
        net
    }

    fn centroid(net: &Network, indices: &[usize]) -> Vector3<f64> {
        indices
            .iter()
            .map(|&i| net.contact(i).position)
            .sum::<Vector3<f64>>()
            / indices.len() as f64
    }

    fn counting_stream(counter: std::sync::Arc<std::sync::atomic::AtomicUsize>) -> StreamHandle {
        StreamHandle::new(move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            0.5
        })
    }

    #[test]
    fn test_centroid_equals_target() {
        let mut net = network_of(10, "x");
        let streams = vec![
            StreamHandle::new(UniformStream::new(1, -1.0, 1.0).unwrap()),
            StreamHandle::new(UniformStream::new(2, -1.0, 1.0).unwrap()),
            StreamHandle::new(UniformStream::new(3, -1.0, 1.0).unwrap()),
        ];
        let params = StaticParams {
            average: Vector3::new(0.5, -2.0, 3.0),
            ..Default::default()
        };
        let mut p = StaticPerturbator::new(params, streams).unwrap();
        p.before_run(&mut net, 0.0, 10.0, 0.01).unwrap();

        let c = centroid(&net, &(0..10).collect::<Vec<_>>());
        assert_relative_eq!(c, Vector3::new(0.5, -2.0, 3.0), epsilon = 1e-12);
    }

    #[test]
    fn test_only_matching_contacts_move() {
        let mut net = network_of(3, "x");
        let mut other = Contact::default();
        other.add_tag("y");
        net.add_contact(other);

        let streams = vec![
            StreamHandle::new(ReplayStream::new(vec![1.0, 2.0, 3.0]).unwrap()),
            StreamHandle::new(ConstantStream(0.0)),
            StreamHandle::new(ConstantStream(0.0)),
        ];
        let params = StaticParams {
            average: Vector3::zeros(),
            tag_expr: TagExpr::tag("x"),
        };
        let mut p = StaticPerturbator::new(params, streams).unwrap();
        p.before_run(&mut net, 0.0, 1.0, 0.1).unwrap();

        let xs: Vec<f64> = (0..3).map(|i| net.contact(i).position.x).collect();
        assert_eq!(xs, vec![-1.0, 0.0, 1.0]);
        assert_eq!(net.contact(3).position, Vector3::zeros());
    }

    #[test]
    fn test_no_match_draws_nothing() {
        let counter = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut net = network_of(4, "x");
        let before = net.clone();

        let streams = (0..3).map(|_| counting_stream(counter.clone())).collect();
        let params = StaticParams {
            average: Vector3::new(1.0, 1.0, 1.0),
            tag_expr: TagExpr::tag("z"),
        };
        let mut p = StaticPerturbator::new(params, streams).unwrap();
        p.before_run(&mut net, 0.0, 1.0, 0.1).unwrap();

        assert_eq!(net, before);
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_streams_rejected() {
        let err = StaticPerturbator::new(
            StaticParams::default(),
            vec![StreamHandle::new(ConstantStream(0.0)); 2],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingStreams { required: 3, supplied: 2, .. }
        ));
    }

    #[test]
    fn test_duplicate_shares_streams() {
        let shared = StreamHandle::new(ReplayStream::new(vec![1.0, 2.0, 3.0, 4.0]).unwrap());
        let p = StaticPerturbator::new(
            StaticParams::default(),
            vec![shared.clone(), StreamHandle::new(ConstantStream(0.0)), StreamHandle::new(ConstantStream(0.0))],
        )
        .unwrap();

        let mut copy = p.duplicate();
        let Perturbator::Static(inner) = &copy else {
            panic!("duplicate changed variant");
        };
        assert!(inner.x.same_stream(&shared));
        assert_eq!(inner.params(), p.params());

        // One contact: the single sample is the mean, position equals target.
        let mut net = network_of(1, "x");
        copy.before_run(&mut net, 0.0, 1.0, 0.1).unwrap();
        assert_eq!(net.contact(0).position, Vector3::zeros());
        // The copy consumed from the shared stream.
        assert_eq!(shared.sample(), 2.0);
    }

    #[test]
    fn test_rerun_is_idempotent_for_identical_draws() {
        let mut net = network_of(5, "x");
        let streams = vec![StreamHandle::new(ConstantStream(7.0)); 3];
        let mut p: Perturbator = StaticPerturbator::new(StaticParams::default(), streams)
            .unwrap()
            .into();

        p.before_run(&mut net, 0.0, 1.0, 0.1).unwrap();
        let first = net.clone();
        p.before_run(&mut net, 0.0, 1.0, 0.1).unwrap();
        assert_eq!(net, first);
    }

    #[test]
    fn test_null_perturbator_is_noop() {
        let mut net = network_of(2, "x");
        let before = net.clone();
        Perturbator::Null.before_run(&mut net, 0.0, 1.0, 0.1).unwrap();
        assert_eq!(net, before);
    }

    proptest! {
        #[test]
        fn prop_centroid_for_any_samples(
            samples in proptest::collection::vec(-1e3f64..1e3, 3..60),
            target in proptest::array::uniform3(-10f64..10.0),
        ) {
            let n = samples.len() / 3;
            let mut net = network_of(n, "x");
            let streams = vec![
                StreamHandle::new(ReplayStream::new(samples.clone()).unwrap()),
                StreamHandle::new(ReplayStream::new(samples.iter().rev().cloned().collect()).unwrap()),
                StreamHandle::new(ConstantStream(target[2] * 2.0)),
            ];
            let average = Vector3::from(target);
            let params = StaticParams { average, ..Default::default() };
            let mut p = StaticPerturbator::new(params, streams).unwrap();
            p.before_run(&mut net, 0.0, 1.0, 0.1).unwrap();

            let c = centroid(&net, &(0..n).collect::<Vec<_>>());
            prop_assert!((c - average).norm() < 1e-9);
        }
    }
}
