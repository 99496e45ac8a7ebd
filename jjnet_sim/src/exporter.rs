//! JSON export of a built topology.
//!
//! Dumps every contact and circuit with its tags and properties so that
//! lattices can be inspected or plotted outside the simulator.

use jjnet_core::lattice::tags;
use jjnet_core::{ContactRef, GridSize, Network, PopulateSummary, PropertyValue, TaggedEntity};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;

/// One exported contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub index: usize,
    pub tags: Vec<String>,
    pub properties: BTreeMap<String, PropertyValue>,
    pub damping: f64,
    pub tau: f64,
    pub critical_current: f64,
    pub normal: [f64; 3],
    pub position: [f64; 3],
}

/// One exported circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitRecord {
    pub index: usize,
    pub tags: Vec<String>,
    pub properties: BTreeMap<String, PropertyValue>,
    pub area: f64,
    pub refs: Vec<ContactRef>,
}

/// Boundary classification totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryCounts {
    pub boundary: usize,
    pub inner: usize,
}

/// Complete topology export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyExport {
    /// Master seed used for the parameter streams
    pub seed: u64,
    pub grid: GridSize,
    /// Counts per orientation
    pub summary: PopulateSummary,
    pub contact_classes: BoundaryCounts,
    pub circuit_classes: BoundaryCounts,
    pub contacts: Vec<ContactRecord>,
    pub circuits: Vec<CircuitRecord>,
}

fn vec3(v: &Vector3<f64>) -> [f64; 3] {
    [v.x, v.y, v.z]
}

fn classify<'a, E: TaggedEntity + 'a>(entities: impl Iterator<Item = &'a E>) -> BoundaryCounts {
    let mut counts = BoundaryCounts::default();
    for entity in entities {
        if entity.has_tag(tags::BOUNDARY) {
            counts.boundary += 1;
        } else if entity.has_tag(tags::INNER) {
            counts.inner += 1;
        }
    }
    counts
}

fn tag_list(entity: &impl TaggedEntity) -> Vec<String> {
    entity.tagged().tags().map(str::to_string).collect()
}

fn property_map(entity: &impl TaggedEntity) -> BTreeMap<String, PropertyValue> {
    entity
        .tagged()
        .properties()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

impl TopologyExport {
    /// Snapshots `network` as built from `grid`.
    pub fn new(network: &Network, seed: u64, grid: GridSize, summary: PopulateSummary) -> Self {
        let contacts = network
            .contacts()
            .enumerate()
            .map(|(index, c)| ContactRecord {
                index,
                tags: tag_list(c),
                properties: property_map(c),
                damping: c.damping,
                tau: c.tau,
                critical_current: c.critical_current,
                normal: vec3(&c.normal),
                position: vec3(&c.position),
            })
            .collect();

        let circuits = network
            .circuits()
            .enumerate()
            .map(|(index, c)| CircuitRecord {
                index,
                tags: tag_list(c),
                properties: property_map(c),
                area: c.area,
                refs: c.refs.to_vec(),
            })
            .collect();

        Self {
            seed,
            grid,
            summary,
            contact_classes: classify(network.contacts()),
            circuit_classes: classify(network.circuits()),
            contacts,
            circuits,
        }
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
