use super::molecule::Molecule;
use crate::core::forcefield::ForceField;
use std::sync::Arc;

/// An ordered collection of molecules described with one force field.
#[derive(Debug, Clone, Default)]
pub struct System {
    pub molecules: Vec<Molecule>,
    pub force_field: Option<Arc<ForceField>>,
}

impl System {
    pub fn new(force_field: Option<Arc<ForceField>>) -> Self {
        Self {
            molecules: Vec::new(),
            force_field,
        }
    }

    /// Adds a molecule, attaching it to the system force field when it has none.
    pub fn add_molecule(&mut self, mut molecule: Molecule) {
        if molecule.force_field().is_none() {
            molecule.set_force_field(self.force_field.clone());
        }
        self.molecules.push(molecule);
    }

    /// Total number of particles over all molecules.
    pub fn num_particles(&self) -> usize {
        self.molecules.iter().map(Molecule::len).sum()
    }
}
