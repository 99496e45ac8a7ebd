//! The lattice populator.
//!
//! Fills an empty network with a regular cubic grid of contacts and unit
//! flux loops. The grid is scanned once in row-major order over `(x, y, z)`.
//! At every node, contacts are added along each axis whose lower neighbour
//! exists, and a circuit is closed on every face whose four edges are now
//! known.
//!
//! Contacts are stored in the index tables at their *upper* node, so the
//! X contact between `(x-1, y, z)` and `(x, y, z)` lives at `[x][y][z]`.
//!
//! Every circuit is traversed right-handed about its face normal, where
//! the in-plane axes `(a, b)` are the cyclic pair of the normal
//! (`X → (Y, Z)`, `Y → (Z, X)`, `Z → (X, Y)`):
//!
//! ```text
//!   L+b ◄──── -a ──── L+a+b
//!    │                  ▲
//!   -b                 +b
//!    ▼                  │
//!    L  ───── +a ────► L+a
//! ```
//!
//! Because the rule never depends on position, the flux sign convention is
//! the same everywhere in the lattice.

use crate::circuit::{Circuit, ContactRef};
use crate::contact::Contact;
use crate::error::{ConfigError, CoreResult, LatticeError};
use crate::network::Network;
use crate::tagged::{Tagged, TaggedEntity};
use jjnet_env::StreamHandle;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Tag names written by the populator.
pub mod tags {
    pub const WEST: &str = "west";
    pub const EAST: &str = "east";
    pub const SOUTH: &str = "south";
    pub const NORTH: &str = "north";
    pub const BOTTOM: &str = "bottom";
    pub const TOP: &str = "top";

    pub const BOUNDARY: &str = "boundary";
    pub const INNER: &str = "inner";
}

/// Area of a unit face.
const FACE_AREA: f64 = 1.0;

/// A lattice axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Orientation tag and coordinate property name.
    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// The two axes spanning the plane orthogonal to this one, in cyclic order.
    pub fn in_plane(self) -> (Axis, Axis) {
        match self {
            Axis::X => (Axis::Y, Axis::Z),
            Axis::Y => (Axis::Z, Axis::X),
            Axis::Z => (Axis::X, Axis::Y),
        }
    }

    /// Boundary tag at coordinate 0.
    pub fn lower_tag(self) -> &'static str {
        match self {
            Axis::X => tags::WEST,
            Axis::Y => tags::SOUTH,
            Axis::Z => tags::BOTTOM,
        }
    }

    /// Boundary tag at the last coordinate.
    pub fn upper_tag(self) -> &'static str {
        match self {
            Axis::X => tags::EAST,
            Axis::Y => tags::NORTH,
            Axis::Z => tags::TOP,
        }
    }

    pub fn unit(self) -> Vector3<f64> {
        match self {
            Axis::X => Vector3::x(),
            Axis::Y => Vector3::y(),
            Axis::Z => Vector3::z(),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "x" => Ok(Axis::X),
            "y" => Ok(Axis::Y),
            "z" => Ok(Axis::Z),
            _ => Err(format!("Unknown axis: {}", s)),
        }
    }
}

/// Grid dimensions in nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl GridSize {
    pub fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// A cube of side `n`.
    pub fn cube(n: usize) -> Self {
        Self::new(n, n, n)
    }

    pub fn along(&self, axis: Axis) -> usize {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    pub fn as_array(&self) -> [usize; 3] {
        [self.x, self.y, self.z]
    }

    /// Contacts oriented along `axis`: the product of sizes with that one reduced by 1.
    pub fn contacts_along(&self, axis: Axis) -> usize {
        let mut dims = self.as_array();
        dims[axis.index()] = dims[axis.index()].saturating_sub(1);
        dims.iter().product()
    }

    /// Circuits whose face normal is `axis`.
    pub fn circuits_along(&self, axis: Axis) -> usize {
        let (a, b) = axis.in_plane();
        let mut dims = self.as_array();
        dims[a.index()] = dims[a.index()].saturating_sub(1);
        dims[b.index()] = dims[b.index()].saturating_sub(1);
        dims.iter().product()
    }

    pub fn expected_contacts(&self) -> usize {
        Axis::ALL.iter().map(|&a| self.contacts_along(a)).sum()
    }

    pub fn expected_circuits(&self) -> usize {
        Axis::ALL.iter().map(|&a| self.circuits_along(a)).sum()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for axis in Axis::ALL {
            let size = self.along(axis);
            if size == 0 {
                return Err(ConfigError::InvalidDimension { axis, size });
            }
        }
        Ok(())
    }
}

type Node = [usize; 3];

fn step_down(node: Node, axis: Axis) -> Node {
    let mut lower = node;
    lower[axis.index()] -= 1;
    lower
}

/// Dense per-axis table of contact indices. Unfilled slots are `None`.
#[derive(Debug, Clone)]
struct IndexTable {
    axis: Axis,
    dims: Node,
    slots: Vec<Option<usize>>,
}

impl IndexTable {
    fn new(axis: Axis, dims: Node) -> Self {
        Self {
            axis,
            dims,
            slots: vec![None; dims.iter().product()],
        }
    }

    fn offset(&self, node: Node) -> usize {
        (node[0] * self.dims[1] + node[1]) * self.dims[2] + node[2]
    }

    fn set(&mut self, node: Node, index: usize) {
        let offset = self.offset(node);
        self.slots[offset] = Some(index);
    }

    fn get(&self, node: Node) -> Result<usize, LatticeError> {
        self.slots[self.offset(node)].ok_or(LatticeError::MissingContact {
            axis: self.axis,
            x: node[0],
            y: node[1],
            z: node[2],
        })
    }
}

/// Counts of entities created by a populator, per axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulateSummary {
    /// Contacts oriented along X, Y, Z
    pub contacts: [usize; 3],
    /// Circuits with face normal X, Y, Z
    pub circuits: [usize; 3],
}

impl PopulateSummary {
    pub fn total_contacts(&self) -> usize {
        self.contacts.iter().sum()
    }

    pub fn total_circuits(&self) -> usize {
        self.circuits.iter().sum()
    }
}

/// A topology-building strategy.
pub trait Populate {
    /// Builds topology into an empty network.
    fn populate(&self, network: &mut Network) -> CoreResult<PopulateSummary>;
}

/// Regular 3-D lattice populator.
///
/// Every contact draws damping, tau and critical current from the three
/// configured streams, in that order. Cloning shares the streams.
#[derive(Debug, Clone)]
pub struct Grid3d {
    size: GridSize,
    damping: StreamHandle,
    tau: StreamHandle,
    critical_current: StreamHandle,
}

impl Grid3d {
    /// Number of streams the populator consumes.
    pub const STREAMS: usize = 3;

    /// Creates a populator from a stream list ordered damping, tau,
    /// critical current. Extra streams are ignored.
    pub fn new(size: GridSize, streams: Vec<StreamHandle>) -> Result<Self, ConfigError> {
        let supplied = streams.len();
        let mut streams = streams.into_iter();
        match (streams.next(), streams.next(), streams.next()) {
            (Some(damping), Some(tau), Some(critical_current)) => {
                Self::with_streams(size, damping, tau, critical_current)
            }
            _ => Err(ConfigError::MissingStreams {
                strategy: "grid3d populator",
                required: Self::STREAMS,
                supplied,
            }),
        }
    }

    pub fn with_streams(
        size: GridSize,
        damping: StreamHandle,
        tau: StreamHandle,
        critical_current: StreamHandle,
    ) -> Result<Self, ConfigError> {
        size.validate()?;
        Ok(Self {
            size,
            damping,
            tau,
            critical_current,
        })
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    /// -1 at coordinate 0, +1 at the last coordinate, 0 inside.
    fn side(&self, axis: Axis, coord: usize) -> f64 {
        if coord == 0 {
            -1.0
        } else if coord == self.size.along(axis) - 1 {
            1.0
        } else {
            0.0
        }
    }

    /// Adds face tags along `axes`, then `boundary` or `inner`.
    fn classify(&self, tagged: &mut Tagged, node: Node, axes: &[Axis]) {
        let mut on_boundary = false;
        for &axis in axes {
            let coord = node[axis.index()];
            if coord == 0 {
                tagged.add_tag(axis.lower_tag());
                on_boundary = true;
            }
            if coord == self.size.along(axis) - 1 {
                tagged.add_tag(axis.upper_tag());
                on_boundary = true;
            }
        }

        tagged.add_tag(if on_boundary { tags::BOUNDARY } else { tags::INNER });
    }

    fn add_contact(&self, network: &mut Network, axis: Axis, node: Node) -> usize {
        let damping = self.damping.sample();
        let tau = self.tau.sample();
        let critical_current = self.critical_current.sample();
        let mut contact = Contact::new(damping, tau, critical_current);

        contact.add_tag(axis.name());
        for prop in Axis::ALL {
            let mut coord = node[prop.index()] as i64;
            if prop == axis {
                coord -= 1;
            }
            contact.set_property(prop.name(), coord);
        }

        let (a, b) = axis.in_plane();
        self.classify(contact.tagged_mut(), node, &[a, b]);

        let outward = a.unit() * self.side(a, node[a.index()]) + b.unit() * self.side(b, node[b.index()]);
        contact.normal = axis.unit().cross(&outward);

        network.add_contact(contact)
    }

    fn add_circuit(
        &self,
        network: &mut Network,
        normal: Axis,
        node: Node,
        tables: &[IndexTable; 3],
    ) -> Result<usize, LatticeError> {
        let (a, b) = normal.in_plane();
        let a_edges = &tables[a.index()];
        let b_edges = &tables[b.index()];

        let refs = [
            ContactRef::new(a_edges.get(step_down(node, b))?, 1.0, 1.0),
            ContactRef::new(b_edges.get(node)?, 1.0, 1.0),
            ContactRef::new(a_edges.get(node)?, 1.0, -1.0),
            ContactRef::new(b_edges.get(step_down(node, a))?, 1.0, -1.0),
        ];

        let mut circuit = Circuit::new(FACE_AREA, refs);
        circuit.add_tag(normal.name());
        circuit.set_property(normal.name(), node[normal.index()] as i64);
        circuit.set_property(a.name(), node[a.index()] as i64 - 1);
        circuit.set_property(b.name(), node[b.index()] as i64 - 1);
        self.classify(circuit.tagged_mut(), node, &[normal]);

        Ok(network.add_circuit(circuit))
    }
}

impl Populate for Grid3d {
    fn populate(&self, network: &mut Network) -> CoreResult<PopulateSummary> {
        if !network.is_empty() {
            return Err(LatticeError::AlreadyPopulated {
                contacts: network.contact_count(),
                circuits: network.circuit_count(),
            }
            .into());
        }

        let dims = self.size.as_array();
        let mut tables = Axis::ALL.map(|axis| IndexTable::new(axis, dims));
        let mut summary = PopulateSummary::default();

        for x in 0..self.size.x {
            for y in 0..self.size.y {
                for z in 0..self.size.z {
                    let node = [x, y, z];

                    for axis in Axis::ALL {
                        if node[axis.index()] > 0 {
                            let index = self.add_contact(network, axis, node);
                            tables[axis.index()].set(node, index);
                            summary.contacts[axis.index()] += 1;
                        }
                    }

                    for normal in [Axis::Z, Axis::Y, Axis::X] {
                        let (a, b) = normal.in_plane();
                        if node[a.index()] > 0 && node[b.index()] > 0 {
                            self.add_circuit(network, normal, node, &tables)?;
                            summary.circuits[normal.index()] += 1;
                        }
                    }
                }
            }
        }

        for axis in Axis::ALL {
            debug!(
                "  {}: {} contacts, {} circuits",
                axis,
                summary.contacts[axis.index()],
                summary.circuits[axis.index()]
            );
        }
        info!(
            "Populated {}x{}x{} lattice: {} contacts, {} circuits",
            self.size.x,
            self.size.y,
            self.size.z,
            summary.total_contacts(),
            summary.total_circuits()
        );

        Ok(summary)
    }
}
