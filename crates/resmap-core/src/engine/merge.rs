use super::correspondence::CorrespondenceTable;
use super::diagnostics::{AppliedInteractions, Category};
use super::error::EngineError;
use super::matching::{is_truthy, sort_by_lowest_atom};
use crate::core::mapping::MappingMatch;
use crate::core::models::ids::NodeId;
use crate::core::models::molecule::Molecule;
use crate::core::models::value::{Attributes, ParticleAttributes, keys};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{error, info};

/// The output molecule under construction and everything recorded while matches are
/// merged into it.
#[derive(Debug, Clone, Default)]
pub struct MergeState {
    pub output: Molecule,
    pub table: CorrespondenceTable,
    /// Input particles covered by more than one block match.
    pub overlapping: BTreeSet<NodeId>,
    /// Output particles no input particle maps onto explicitly.
    pub none_to_one: BTreeSet<NodeId>,
    /// Output particle to the input particle its kept attributes come from.
    pub references: BTreeMap<NodeId, NodeId>,
    pub applied_interactions: AppliedInteractions,
    /// Input particles of every merged match, in merge order.
    pub processed: Vec<BTreeSet<NodeId>>,
    block_covered: BTreeSet<NodeId>,
}

impl MergeState {
    pub fn new(output: Molecule) -> Self {
        Self {
            output,
            ..Self::default()
        }
    }

    /// Merges block and modification matches in order of their lowest input particle.
    ///
    /// Output residues are numbered in merge order, so the order determines residue ids.
    /// On equal lowest particles the block match goes first.
    pub fn apply_matches(
        &mut self,
        mut blocks: Vec<MappingMatch<'_>>,
        mut modifications: Vec<MappingMatch<'_>>,
    ) -> Result<(), EngineError> {
        sort_by_lowest_atom(&mut blocks);
        sort_by_lowest_atom(&mut modifications);
        let mut blocks = blocks.into_iter().peekable();
        let mut modifications = modifications.into_iter().peekable();

        loop {
            let take_modification = match (blocks.peek(), modifications.peek()) {
                (None, None) => break,
                (None, Some(_)) => true,
                (Some(_), None) => false,
                (Some(block), Some(modification)) => modification.lowest_atom() < block.lowest_atom(),
            };
            if take_modification {
                if let Some(found) = modifications.next() {
                    self.apply_modification_match(&found)?;
                }
            } else if let Some(found) = blocks.next() {
                self.apply_block_match(&found)?;
            }
        }
        Ok(())
    }

    /// Appends the fragment of a block match to the output.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IncompatibleBlock`] when the fragment cannot be merged,
    /// typically because its `nrexcl` differs from the fragments merged before it.
    pub fn apply_block_match(&mut self, found: &MappingMatch<'_>) -> Result<(), EngineError> {
        if self.output.nrexcl.is_none() {
            self.output.nrexcl = found.block.nrexcl;
        }
        let block_to_out = self.output.merge_molecule(found.block).map_err(|source| {
            let residues: Vec<String> = found
                .block
                .nodes()
                .filter_map(|(_, attributes)| attributes.resname())
                .map(str::to_string)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            error!(
                category = %Category::InconsistentData,
                residues = ?residues,
                "Residue(s) not compatible with the others: {}", source
            );
            EngineError::IncompatibleBlock { residues, source }
        })?;

        let atoms = found.atoms();
        self.overlapping
            .extend(atoms.intersection(&self.block_covered).copied());
        self.block_covered.extend(atoms.iter().copied());

        for (&mol, weights) in &found.mol_to_block {
            for (block_id, &weight) in weights {
                let out = translate(&block_to_out, *block_id)?;
                self.table.link(mol, out, weight);
            }
        }

        let mapped: BTreeSet<NodeId> = found
            .mol_to_block
            .values()
            .flat_map(|weights| weights.keys().copied())
            .collect();
        for spawned in found.block.node_ids().filter(|id| !mapped.contains(id)) {
            let out = translate(&block_to_out, spawned)?;
            self.none_to_one.insert(out);
            for &mol in &atoms {
                self.table.link(mol, out, 0.0);
            }
        }

        for (&to, &mol) in &found.references {
            self.references.insert(translate(&block_to_out, to)?, mol);
        }
        self.processed.push(atoms);
        Ok(())
    }

    /// Applies a modification match to the particles already in the output.
    ///
    /// Template particles flagged with `PTM_atom` are added as new output particles,
    /// taking the residue id and charge group of the particle the modification is
    /// attached to. All other template particles must already exist: they are found among the output
    /// particles of the input particles mapped onto them, by atom name.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnresolvedModificationAtom`] when an existing particle
    /// cannot be found.
    pub fn apply_modification_match(&mut self, found: &MappingMatch<'_>) -> Result<(), EngineError> {
        let name = found.mapping.name();
        info!(category = %Category::General, modification = name, "Applying modification mapping.");

        let mut mod_to_mol: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        for (&mol, weights) in &found.mol_to_block {
            for &mod_id in weights.keys() {
                mod_to_mol.entry(mod_id).or_default().insert(mol);
            }
        }

        let mut mod_to_out = BTreeMap::new();
        let mut introduced = Vec::new();
        for (mod_id, attributes) in found.block.nodes() {
            if attributes.get(keys::PTM_ATOM).is_some_and(is_truthy) {
                introduced.push((mod_id, attributes));
                continue;
            }
            let atom_name = attributes.get(keys::ATOM_NAME);
            let candidates: BTreeSet<NodeId> = mod_to_mol
                .get(&mod_id)
                .into_iter()
                .flatten()
                .filter_map(|&mol| self.table.outputs_of(mol))
                .flat_map(|weights| weights.keys().copied())
                .collect();
            let out = candidates
                .into_iter()
                .find(|&out| {
                    self.output
                        .node(out)
                        .is_some_and(|node| node.get(keys::ATOM_NAME) == atom_name)
                })
                .ok_or_else(|| EngineError::UnresolvedModificationAtom {
                    modification: name.to_string(),
                    atom_name: attributes.atom_name().unwrap_or_default().to_string(),
                })?;
            mod_to_out.insert(mod_id, out);
        }

        let residue = self.anchor_residue(found, &mod_to_out);
        for (mod_id, attributes) in introduced {
            let out = self.output.next_node_id();
            let mut atom = attributes.clone();
            atom.extend(residue.clone());
            self.output.add_node(out, atom)?;
            mod_to_out.insert(mod_id, out);
        }

        for (&mol, weights) in &found.mol_to_block {
            for (mod_id, &weight) in weights {
                self.table.link(mol, translate(&mod_to_out, *mod_id)?, weight);
            }
        }

        for (kind, interactions) in found.block.interactions() {
            for interaction in interactions {
                let atoms = interaction
                    .atoms
                    .iter()
                    .map(|&atom| translate(&mod_to_out, atom))
                    .collect::<Result<Vec<_>, _>>()?;
                self.output.add_interaction(
                    kind,
                    atoms.clone(),
                    interaction.parameters.clone(),
                    interaction.meta.clone(),
                )?;
                self.applied_interactions
                    .entry((kind.to_string(), atoms))
                    .or_default()
                    .push(name.to_string());
            }
        }

        for (&to, &mol) in &found.references {
            self.references.insert(translate(&mod_to_out, to)?, mol);
        }
        self.processed.push(found.atoms());
        Ok(())
    }
}

impl MergeState {
    /// Residue id and charge group of the output particle a modification attaches to.
    ///
    /// That is the lowest resolved particle of the modification, or else the lowest
    /// output particle of its input particles.
    fn anchor_residue(
        &self,
        found: &MappingMatch<'_>,
        resolved: &BTreeMap<NodeId, NodeId>,
    ) -> Attributes {
        let anchor = resolved.values().copied().min().or_else(|| {
            found
                .atoms()
                .iter()
                .filter_map(|&mol| self.table.outputs_of(mol))
                .flat_map(|weights| weights.keys().copied())
                .min()
        });
        let Some(node) = anchor.and_then(|out| self.output.node(out)) else {
            return Attributes::new();
        };
        [keys::RESID, keys::CHARGE_GROUP]
            .into_iter()
            .filter_map(|key| node.get(key).map(|value| (key.to_string(), value.clone())))
            .collect()
    }
}

fn translate(ids: &BTreeMap<NodeId, NodeId>, id: NodeId) -> Result<NodeId, EngineError> {
    ids.get(&id)
        .copied()
        .ok_or_else(|| EngineError::Internal(format!("template particle {id} was not merged")))
}
