//! The network: owner of all contacts and circuits.
//!
//! Indices handed out by `add_contact` / `add_circuit` are permanent.
//! Circuits hold contact indices captured during population, and tracers
//! and perturbators resolve indices captured earlier in the same run, so
//! nothing is ever removed or renumbered.

use crate::circuit::Circuit;
use crate::contact::Contact;
use crate::tag_expr::TagExpr;
use crate::tagged::TaggedEntity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    contacts: Vec<Contact>,
    circuits: Vec<Circuit>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a contact and returns its index.
    pub fn add_contact(&mut self, contact: Contact) -> usize {
        self.contacts.push(contact);
        self.contacts.len() - 1
    }

    /// Appends a circuit and returns its index.
    pub fn add_circuit(&mut self, circuit: Circuit) -> usize {
        self.circuits.push(circuit);
        self.circuits.len() - 1
    }

    /// # Panics
    /// If `index` is out of range.
    pub fn contact(&self, index: usize) -> &Contact {
        let len = self.contacts.len();
        self.contacts
            .get(index)
            .unwrap_or_else(|| panic!("contact index {} out of range ({} contacts)", index, len))
    }

    /// # Panics
    /// If `index` is out of range.
    pub fn contact_mut(&mut self, index: usize) -> &mut Contact {
        let len = self.contacts.len();
        self.contacts
            .get_mut(index)
            .unwrap_or_else(|| panic!("contact index {} out of range ({} contacts)", index, len))
    }

    /// # Panics
    /// If `index` is out of range.
    pub fn circuit(&self, index: usize) -> &Circuit {
        let len = self.circuits.len();
        self.circuits
            .get(index)
            .unwrap_or_else(|| panic!("circuit index {} out of range ({} circuits)", index, len))
    }

    /// # Panics
    /// If `index` is out of range.
    pub fn circuit_mut(&mut self, index: usize) -> &mut Circuit {
        let len = self.circuits.len();
        self.circuits
            .get_mut(index)
            .unwrap_or_else(|| panic!("circuit index {} out of range ({} circuits)", index, len))
    }

    pub fn get_contact(&self, index: usize) -> Option<&Contact> {
        self.contacts.get(index)
    }

    pub fn get_circuit(&self, index: usize) -> Option<&Circuit> {
        self.circuits.get(index)
    }

    /// Flux of a circuit.
    pub fn flux(&self, index: usize) -> f64 {
        self.circuit(index).flux
    }

    /// Indices of contacts matching `expr`, ascending.
    pub fn match_contacts(&self, expr: &TagExpr) -> Vec<usize> {
        match_indices(&self.contacts, expr)
    }

    /// Indices of circuits matching `expr`, ascending.
    pub fn match_circuits(&self, expr: &TagExpr) -> Vec<usize> {
        match_indices(&self.circuits, expr)
    }

    pub fn contacts(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.iter()
    }

    pub fn contacts_mut(&mut self) -> impl Iterator<Item = &mut Contact> {
        self.contacts.iter_mut()
    }

    pub fn circuits(&self) -> impl Iterator<Item = &Circuit> {
        self.circuits.iter()
    }

    pub fn circuits_mut(&mut self) -> impl Iterator<Item = &mut Circuit> {
        self.circuits.iter_mut()
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    pub fn circuit_count(&self) -> usize {
        self.circuits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty() && self.circuits.is_empty()
    }
}

fn match_indices<E: TaggedEntity>(entities: &[E], expr: &TagExpr) -> Vec<usize> {
    entities
        .iter()
        .enumerate()
        .filter(|(_, e)| expr.matches(e.tagged()))
        .map(|(i, _)| i)
        .collect()
}
