use crate::core::mapping::Weights;
use crate::core::models::ids::NodeId;
use std::collections::{BTreeMap, BTreeSet};

/// The weighted correspondence between input and output particles of one
/// transformation, kept in both directions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrespondenceTable {
    mol_to_out: BTreeMap<NodeId, Weights>,
    out_to_mol: BTreeMap<NodeId, Weights>,
}

impl CorrespondenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that input particle `mol` contributes to output particle `out` with
    /// `weight`, overwriting a previous weight for the same pair.
    pub fn link(&mut self, mol: NodeId, out: NodeId, weight: f64) {
        self.mol_to_out.entry(mol).or_default().insert(out, weight);
        self.out_to_mol.entry(out).or_default().insert(mol, weight);
    }

    /// Output particles `mol` contributes to, with weights.
    pub fn outputs_of(&self, mol: NodeId) -> Option<&Weights> {
        self.mol_to_out.get(&mol)
    }

    /// Input particles contributing to `out`, with weights.
    pub fn inputs_of(&self, out: NodeId) -> Option<&Weights> {
        self.out_to_mol.get(&out)
    }

    /// Output particles of `mol`, leaving out those in `excluded`.
    pub fn output_ids_except(&self, mol: NodeId, excluded: &BTreeSet<NodeId>) -> BTreeSet<NodeId> {
        self.outputs_of(mol)
            .into_iter()
            .flat_map(|weights| weights.keys())
            .filter(|out| !excluded.contains(out))
            .copied()
            .collect()
    }

    pub fn is_mapped(&self, mol: NodeId) -> bool {
        self.mol_to_out.contains_key(&mol)
    }

    pub fn mapped_inputs(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.mol_to_out.keys().copied()
    }

    /// Output particles with at least one contributing input particle, ascending.
    pub fn mapped_outputs(&self) -> impl Iterator<Item = (NodeId, &Weights)> {
        self.out_to_mol.iter().map(|(&out, weights)| (out, weights))
    }
}
