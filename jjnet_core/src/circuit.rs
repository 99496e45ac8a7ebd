//! Circuits: closed flux loops over four contacts.

use crate::tagged::{Tagged, TaggedEntity};
use serde::{Deserialize, Serialize};

/// Signed reference from a circuit into the network's contacts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactRef {
    /// Contact index in the owning network
    pub index: usize,
    pub gain: f64,
    /// +1 or -1 depending on traversal direction
    pub weight: f64,
}

impl ContactRef {
    pub fn new(index: usize, gain: f64, weight: f64) -> Self {
        Self { index, gain, weight }
    }
}

/// A closed loop of exactly four contacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    pub refs: [ContactRef; 4],
    pub area: f64,
    /// Loop flux, owned by the external solver
    pub flux: f64,
    tagged: Tagged,
}

impl Circuit {
    pub fn new(area: f64, refs: [ContactRef; 4]) -> Self {
        Self {
            refs,
            area,
            flux: 0.0,
            tagged: Tagged::new(),
        }
    }

    /// Sum of the reference weights. Zero for a properly closed loop.
    pub fn weight_sum(&self) -> f64 {
        self.refs.iter().map(|r| r.weight).sum()
    }

    /// Contact indices in traversal order.
    pub fn contact_indices(&self) -> [usize; 4] {
        self.refs.map(|r| r.index)
    }
}

impl TaggedEntity for Circuit {
    fn tagged(&self) -> &Tagged {
        &self.tagged
    }

    fn tagged_mut(&mut self) -> &mut Tagged {
        &mut self.tagged
    }
}
