//! Consistency checks run after all matches have been merged.
//!
//! None of these conditions stops a transformation. Each is logged with a `category`
//! field and recorded in the [`MappingReport`] returned to the caller.

use super::correspondence::CorrespondenceTable;
use crate::core::models::ids::NodeId;
use crate::core::models::molecule::Molecule;
use crate::core::models::value::Value;
use crate::core::utils::identifiers::{format_atom, is_hydrogen};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    InconsistentData,
    UnmappedAtom,
    General,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InconsistentData => "inconsistent-data",
            Self::UnmappedAtom => "unmapped-atom",
            Self::General => "general",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interactions added by modifications, keyed by interaction type and output atoms,
/// with the names of the modifications that added them.
pub type AppliedInteractions = BTreeMap<(String, Vec<NodeId>), Vec<String>>;

/// An attribute whose contributing input particles disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeConflict {
    pub output: NodeId,
    pub attribute: String,
    pub values: Vec<Value>,
}

/// Everything a transformation found suspicious.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingReport {
    /// Input particles covered by more than one block match.
    pub overlapping_atoms: BTreeSet<NodeId>,
    /// Output particles built from overlapping input particles.
    pub overlapping_outputs: BTreeSet<NodeId>,
    /// Output particles that no input particle maps onto explicitly.
    pub none_to_one: BTreeSet<NodeId>,
    /// Input particles whose output particles are not connected to each other.
    pub disconnected: BTreeMap<NodeId, BTreeSet<NodeId>>,
    /// Heavy input particles covered by no match.
    pub uncovered_atoms: BTreeSet<NodeId>,
    /// Hydrogen input particles covered by no match.
    pub uncovered_hydrogens: BTreeSet<NodeId>,
    /// Modification name groups no combination of modification templates covers.
    pub uncovered_modifications: Vec<Vec<String>>,
    /// Modification templates whose match reaches beyond the modified particles.
    pub overlapping_modifications: Vec<String>,
    pub attribute_conflicts: Vec<AttributeConflict>,
    /// Interactions set by more than one modification.
    pub multiply_modified: Vec<(String, Vec<NodeId>)>,
}

impl MappingReport {
    /// Input particles not covered by any match, hydrogens included.
    pub fn one_to_none(&self) -> BTreeSet<NodeId> {
        self.uncovered_atoms
            .union(&self.uncovered_hydrogens)
            .copied()
            .collect()
    }

    /// Whether nothing above debug severity was found.
    pub fn is_clean(&self) -> bool {
        self.overlapping_atoms.is_empty()
            && self.disconnected.is_empty()
            && self.uncovered_atoms.is_empty()
            && self.uncovered_modifications.is_empty()
            && self.overlapping_modifications.is_empty()
            && self.attribute_conflicts.is_empty()
            && self.multiply_modified.is_empty()
    }
}

fn labels<'a>(molecule: &Molecule, ids: impl IntoIterator<Item = &'a NodeId>) -> Vec<String> {
    ids.into_iter()
        .filter_map(|id| molecule.node(*id).map(format_atom))
        .collect()
}

/// Many-to-one: input particles covered by several block matches.
///
/// The flagged output particles leave out none-to-one particles, which no input
/// particle maps onto explicitly.
pub fn check_overlap(
    molecule: &Molecule,
    output: &Molecule,
    table: &CorrespondenceTable,
    overlapping_atoms: &BTreeSet<NodeId>,
    report: &mut MappingReport,
) {
    if overlapping_atoms.is_empty() {
        return;
    }
    let outputs: BTreeSet<NodeId> = overlapping_atoms
        .iter()
        .flat_map(|&mol| table.output_ids_except(mol, &report.none_to_one))
        .collect();
    warn!(
        category = %Category::InconsistentData,
        atoms = ?labels(molecule, overlapping_atoms),
        outputs = ?labels(output, &outputs),
        "These atoms are covered by multiple blocks. The listed output particles are probably wrong."
    );
    report.overlapping_atoms.extend(overlapping_atoms);
    report.overlapping_outputs.extend(outputs);
}

/// One-to-many: input particles whose output particles end up disconnected.
pub fn check_one_to_many(
    molecule: &Molecule,
    output: &Molecule,
    table: &CorrespondenceTable,
    report: &mut MappingReport,
) {
    for mol in table.mapped_inputs() {
        let outputs = table.output_ids_except(mol, &report.none_to_one);
        if outputs.len() > 1 && !output.is_connected_subset(&outputs) {
            warn!(
                category = %Category::InconsistentData,
                atom = molecule.node(mol).map(format_atom).unwrap_or_default(),
                outputs = ?labels(output, &outputs),
                "Input particle maps to multiple output particles that are disconnected. There are probably edges missing."
            );
            report.disconnected.insert(mol, outputs);
        }
    }
}

/// One-to-none: input particles no match covers.
pub fn check_uncovered(molecule: &Molecule, table: &CorrespondenceTable, report: &mut MappingReport) {
    let (hydrogens, others): (BTreeSet<NodeId>, BTreeSet<NodeId>) = molecule
        .nodes()
        .filter(|(id, _)| !table.is_mapped(*id))
        .map(|(id, _)| id)
        .partition(|&id| molecule.node(id).is_some_and(is_hydrogen));

    if !hydrogens.is_empty() {
        debug!(
            category = %Category::UnmappedAtom,
            atoms = ?labels(molecule, &hydrogens),
            "These hydrogen atoms are not covered by a mapping."
        );
    }
    if !others.is_empty() {
        warn!(
            category = %Category::UnmappedAtom,
            atoms = ?labels(molecule, &others),
            "These atoms are not covered by a mapping. Either the mappings don't describe all atoms, or there is no mapping for every residue."
        );
    }
    report.uncovered_hydrogens.extend(hydrogens);
    report.uncovered_atoms.extend(others);
}

/// Interactions that more than one modification claims.
pub fn check_modified_interactions(applied: &AppliedInteractions, report: &mut MappingReport) {
    for ((kind, atoms), modifications) in applied {
        if modifications.len() > 1 {
            warn!(
                category = %Category::InconsistentData,
                interaction = kind.as_str(),
                atoms = ?atoms,
                modifications = ?modifications,
                "Interaction set by multiple modification mappings."
            );
            report.multiply_modified.push((kind.clone(), atoms.clone()));
        }
    }
}
