//! Contacts: the weak-link edges of a network.

use crate::tagged::{Tagged, TaggedEntity};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// A junction edge.
///
/// The physical parameters are fixed at construction. `phase` and
/// `voltage` belong to the external solver and start at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Damping coefficient (beta)
    pub damping: f64,

    /// Characteristic time
    pub tau: f64,

    /// Critical current
    pub critical_current: f64,

    /// Position offset written by perturbators
    pub position: Vector3<f64>,

    /// Boundary normal computed by the populator
    pub normal: Vector3<f64>,

    /// External field at this contact, supplied by the solver setup
    pub field: Vector3<f64>,

    /// Junction phase
    pub phase: f64,

    /// Junction voltage
    pub voltage: f64,

    tagged: Tagged,
}

impl Contact {
    /// Creates a contact with the given parameters and zeroed state.
    pub fn new(damping: f64, tau: f64, critical_current: f64) -> Self {
        Self {
            damping,
            tau,
            critical_current,
            position: Vector3::zeros(),
            normal: Vector3::zeros(),
            field: Vector3::zeros(),
            phase: 0.0,
            voltage: 0.0,
            tagged: Tagged::new(),
        }
    }
}

impl Default for Contact {
    fn default() -> Self {
        Self::new(1.0, 1.0, 40.0)
    }
}

impl TaggedEntity for Contact {
    fn tagged(&self) -> &Tagged {
        &self.tagged
    }

    fn tagged_mut(&mut self) -> &mut Tagged {
        &mut self.tagged
    }
}
