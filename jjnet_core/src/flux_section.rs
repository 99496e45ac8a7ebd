//! Flux map of a single lattice plane.
//!
//! After the run, every circuit whose face normal is `plane` and whose
//! coordinate along it equals `position` is placed on a dense grid over
//! the two in-plane coordinates and written out as
//!
//! ```text
//! # plane z, position 2
//! 0	0	0.125
//! 0	1	0.25
//!
//! 1	0	-0.5
//! ```
//!
//! grouped by the first in-plane coordinate, one blank line between groups.

use crate::error::TraceError;
use crate::lattice::Axis;
use crate::network::Network;
use crate::tagged::TaggedEntity;
use crate::tracer::{Trace, Tracer};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluxSectionParams {
    /// Output file. Empty disables output.
    pub file_name: String,
    /// Face normal of the circuits to collect
    pub plane: Axis,
    /// Coordinate along `plane`
    pub position: i64,
}

impl Default for FluxSectionParams {
    fn default() -> Self {
        Self {
            file_name: "flux.section".to_string(),
            plane: Axis::Z,
            position: 0,
        }
    }
}

/// Dense table of flux values over the bounding rectangle of one plane.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionTable {
    pub plane: Axis,
    pub position: i64,
    a_range: (i64, i64),
    b_range: (i64, i64),
    cells: Vec<Option<f64>>,
}

impl SectionTable {
    fn width(&self) -> usize {
        (self.b_range.1 - self.b_range.0 + 1) as usize
    }

    fn cell_offset(&self, a: i64, b: i64) -> usize {
        (a - self.a_range.0) as usize * self.width() + (b - self.b_range.0) as usize
    }

    /// Flux stored at `(a, b)`, if a circuit occupies that cell.
    pub fn get(&self, a: i64, b: i64) -> Option<f64> {
        if a < self.a_range.0 || a > self.a_range.1 || b < self.b_range.0 || b > self.b_range.1 {
            return None;
        }
        self.cells[self.cell_offset(a, b)]
    }

    /// Filled cells per first-coordinate value, both ascending. Values of
    /// `a` with no filled cell do not form a group.
    pub fn groups(&self) -> Vec<(i64, Vec<(i64, f64)>)> {
        (self.a_range.0..=self.a_range.1)
            .filter_map(|a| {
                let row: Vec<(i64, f64)> = (self.b_range.0..=self.b_range.1)
                    .filter_map(|b| self.get(a, b).map(|flux| (b, flux)))
                    .collect();
                (!row.is_empty()).then_some((a, row))
            })
            .collect()
    }

    pub fn filled(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn write_to(&self, out: &mut impl Write) -> std::io::Result<()> {
        writeln!(out, "# plane {}, position {}", self.plane, self.position)?;
        for (i, (a, row)) in self.groups().into_iter().enumerate() {
            if i > 0 {
                writeln!(out)?;
            }
            for (b, flux) in row {
                writeln!(out, "{}\t{}\t{}", a, b, flux)?;
            }
        }
        Ok(())
    }
}

/// One-shot extractor of a plane's flux map.
#[derive(Debug, Clone, Default)]
pub struct FluxSection {
    params: FluxSectionParams,
}

impl FluxSection {
    pub fn new(params: FluxSectionParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &FluxSectionParams {
        &self.params
    }

    /// Collects the plane's circuits. `None` when no circuit lies on it.
    pub fn section(&self, network: &Network) -> Result<Option<SectionTable>, TraceError> {
        let plane = self.params.plane;
        let (a_axis, b_axis) = plane.in_plane();

        let mut hits = Vec::new();
        for circuit in network.circuits() {
            if !circuit.has_tag(plane.name())
                || circuit.property::<i64>(plane.name())? != self.params.position
            {
                continue;
            }
            let a = circuit.property::<i64>(a_axis.name())?;
            let b = circuit.property::<i64>(b_axis.name())?;
            hits.push((a, b, circuit.flux));
        }

        let Some(&(a0, b0, _)) = hits.first() else {
            return Ok(None);
        };
        let (mut a_range, mut b_range) = ((a0, a0), (b0, b0));
        for &(a, b, _) in &hits {
            a_range = (a_range.0.min(a), a_range.1.max(a));
            b_range = (b_range.0.min(b), b_range.1.max(b));
        }

        let len = ((a_range.1 - a_range.0 + 1) * (b_range.1 - b_range.0 + 1)) as usize;
        let mut table = SectionTable {
            plane,
            position: self.params.position,
            a_range,
            b_range,
            cells: vec![None; len],
        };
        for (a, b, flux) in hits {
            let offset = table.cell_offset(a, b);
            table.cells[offset] = Some(flux);
        }

        Ok(Some(table))
    }
}

impl Trace for FluxSection {
    fn after_run(&mut self, network: &Network) -> Result<(), TraceError> {
        if self.params.file_name.is_empty() {
            return Ok(());
        }
        let Some(table) = self.section(network)? else {
            debug!(
                "No circuits on plane {} at position {}, flux section skipped",
                self.params.plane, self.params.position
            );
            return Ok(());
        };

        let path = PathBuf::from(&self.params.file_name);
        let file = File::create(&path).map_err(|source| TraceError::Open {
            path: path.clone(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        table
            .write_to(&mut writer)
            .and_then(|_| writer.flush())
            .map_err(|source| TraceError::Write {
                path: path.clone(),
                source,
            })?;

        info!(
            "Wrote flux section for plane {} ({} cells) to {}",
            self.params.plane,
            table.filled(),
            path.display()
        );
        Ok(())
    }

    fn duplicate(&self) -> Tracer {
        Tracer::FluxSection(self.clone())
    }
}
