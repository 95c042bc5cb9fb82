//! # Template Mappings
//!
//! A [`Mapping`] describes how a fragment at one resolution translates into a fragment
//! at another. It pairs a pattern molecule (`block_from`) with the molecule it produces
//! (`block_to`) and a weighted correspondence between their particles. Mappings are
//! grouped per pair of force fields in a [`MappingCatalog`].

use crate::core::forcefield::ForceField;
use crate::core::graph::{self, EdgeEnds};
use crate::core::models::block::{Block, BlockError};
use crate::core::models::ids::NodeId;
use crate::core::models::molecule::Molecule;
use crate::core::models::value::{Attributes, ParticleAttributes};
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;

/// Weights of the particles one particle corresponds to.
pub type Weights = BTreeMap<NodeId, f64>;
/// A weighted many-to-many correspondence between two sets of particles.
pub type Correspondence = BTreeMap<NodeId, Weights>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MappingError {
    #[error("Mapping '{mapping}' refers to particle {id}, which is not part of its source fragment")]
    UnknownFromParticle { mapping: String, id: NodeId },

    #[error("Mapping '{mapping}' refers to particle {id}, which is not part of its target fragment")]
    UnknownToParticle { mapping: String, id: NodeId },

    #[error("Mapping '{mapping}' refers to atom '{atom}', which is not part of block '{block}'")]
    UnknownAtomName {
        mapping: String,
        block: String,
        atom: String,
    },

    #[error("Invalid block in mapping: {0}")]
    Block(#[from] BlockError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappingKind {
    /// An ordinary residue-to-residue template.
    Block,
    /// A template for one or more named chemical modifications.
    Modification,
}

/// A resolution template.
#[derive(Debug, Clone)]
pub struct Mapping {
    kind: MappingKind,
    name: String,
    names: Vec<String>,
    block_from: Molecule,
    block_to: Molecule,
    mapping: Correspondence,
    references: BTreeMap<NodeId, NodeId>,
}

/// One occurrence of a [`Mapping`] in a molecule.
#[derive(Debug, Clone)]
pub struct MappingMatch<'a> {
    /// For every matched molecule particle, the `block` particles it maps to.
    pub mol_to_block: Correspondence,
    /// The fragment this match produces.
    pub block: &'a Molecule,
    /// For `block` particles with a reference, the molecule particle attributes are
    /// copied from.
    pub references: BTreeMap<NodeId, NodeId>,
    pub mapping: &'a Mapping,
}

impl MappingMatch<'_> {
    /// The lowest molecule particle covered by the match.
    pub fn lowest_atom(&self) -> Option<NodeId> {
        self.mol_to_block.keys().next().copied()
    }

    pub fn atoms(&self) -> BTreeSet<NodeId> {
        self.mol_to_block.keys().copied().collect()
    }
}

impl Mapping {
    /// Creates a mapping after checking every referenced particle exists.
    ///
    /// `mapping` goes from `block_from` particles to weighted `block_to` particles and
    /// `references` from `block_to` particles to `block_from` particles.
    pub fn new(
        kind: MappingKind,
        name: impl Into<String>,
        names: Vec<String>,
        block_from: Molecule,
        block_to: Molecule,
        mapping: Correspondence,
        references: BTreeMap<NodeId, NodeId>,
    ) -> Result<Self, MappingError> {
        let name = name.into();
        let unknown_from = |id| MappingError::UnknownFromParticle {
            mapping: name.clone(),
            id,
        };
        let unknown_to = |id| MappingError::UnknownToParticle {
            mapping: name.clone(),
            id,
        };

        for (&from, weights) in &mapping {
            if !block_from.contains(from) {
                return Err(unknown_from(from));
            }
            if let Some(&to) = weights.keys().find(|&&to| !block_to.contains(to)) {
                return Err(unknown_to(to));
            }
        }
        for (&to, &from) in &references {
            if !block_to.contains(to) {
                return Err(unknown_to(to));
            }
            if !block_from.contains(from) {
                return Err(unknown_from(from));
            }
        }

        Ok(Self {
            kind,
            name,
            names,
            block_from,
            block_to,
            mapping,
            references,
        })
    }

    /// A residue template translating `from` into `to`.
    ///
    /// Each `(from atom, to atom)` pair adds a correspondence; an atom mapped to several
    /// target atoms spreads its weight evenly over them. Both blocks are instantiated with
    /// ids starting at 0 and the target fragment is attached to `to_force_field`.
    pub fn from_blocks(
        from: &Block,
        to: &Block,
        to_force_field: Option<Arc<ForceField>>,
        pairs: &[(&str, &str)],
    ) -> Result<Self, MappingError> {
        let name = from.display_name().to_string();
        let block_from = from.to_molecule(0, 1, 0)?;
        let mut block_to = to.to_molecule(0, 1, 0)?;
        block_to.set_force_field(to_force_field);

        let from_ids = ids_by_name(&block_from);
        let to_ids = ids_by_name(&block_to);
        let lookup = |ids: &BTreeMap<String, NodeId>, block: &Block, atom: &str| {
            ids.get(atom).copied().ok_or_else(|| MappingError::UnknownAtomName {
                mapping: name.clone(),
                block: block.display_name().to_string(),
                atom: atom.to_string(),
            })
        };

        let mut mapping = Correspondence::new();
        for &(from_atom, to_atom) in pairs {
            let from_id = lookup(&from_ids, from, from_atom)?;
            let to_id = lookup(&to_ids, to, to_atom)?;
            mapping.entry(from_id).or_default().insert(to_id, 1.0);
        }
        for weights in mapping.values_mut() {
            let share = 1.0 / weights.len() as f64;
            weights.values_mut().for_each(|weight| *weight = share);
        }

        Self::new(
            MappingKind::Block,
            name.clone(),
            vec![name],
            block_from,
            block_to,
            mapping,
            BTreeMap::new(),
        )
    }

    /// A one-to-one template reproducing `block` in another force field.
    ///
    /// Every atom maps onto its namesake with weight 1 and serves as its reference.
    pub fn identity(block: &Block, to_force_field: Option<Arc<ForceField>>) -> Result<Self, MappingError> {
        let pairs: Vec<(&str, &str)> = block
            .atoms()
            .filter_map(|atom| atom.atom_name())
            .map(|name| (name, name))
            .collect();
        let mapping = Self::from_blocks(block, block, to_force_field, &pairs)?;
        let references = mapping
            .mapping
            .iter()
            .flat_map(|(&from, weights)| weights.keys().map(move |&to| (to, from)))
            .collect();
        Ok(mapping.with_references(references))
    }

    /// A modification template covering the modifications `names`.
    pub fn modification(
        names: Vec<String>,
        block_from: Molecule,
        block_to: Molecule,
        mapping: Correspondence,
    ) -> Result<Self, MappingError> {
        let name = names.join("+");
        Self::new(
            MappingKind::Modification,
            name,
            names,
            block_from,
            block_to,
            mapping,
            BTreeMap::new(),
        )
    }

    /// Replaces the reference particles, `block_to` particle to `block_from` particle.
    pub fn with_references(mut self, references: BTreeMap<NodeId, NodeId>) -> Self {
        self.references = references
            .into_iter()
            .filter(|(to, from)| self.block_to.contains(*to) && self.block_from.contains(*from))
            .collect();
        self
    }

    pub fn kind(&self) -> MappingKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn nrexcl(&self) -> Option<u32> {
        self.block_to.nrexcl
    }

    pub fn block_from(&self) -> &Molecule {
        &self.block_from
    }

    pub fn block_to(&self) -> &Molecule {
        &self.block_to
    }

    pub fn correspondence(&self) -> &Correspondence {
        &self.mapping
    }

    /// Finds every occurrence of the source fragment in `molecule`.
    ///
    /// `node_match` receives molecule attributes first and template attributes second;
    /// `edge_match` likewise. Embeddings covering the same set of molecule particles are
    /// reported once, keeping the first one found, so a symmetric template yields a
    /// single match per fragment rather than one per automorphism. Embeddings in which
    /// no particle maps to anything are dropped.
    pub fn map<NM, EM>(&self, molecule: &Molecule, node_match: NM, edge_match: EM) -> Vec<MappingMatch<'_>>
    where
        NM: FnMut(&Attributes, &Attributes) -> bool,
        EM: FnMut(EdgeEnds<'_>, EdgeEnds<'_>) -> bool,
    {
        let mut seen = BTreeSet::new();
        graph::subgraph_isomorphisms(&self.block_from, molecule, node_match, edge_match)
            .into_iter()
            .filter(|embedding| seen.insert(embedding.values().copied().collect::<BTreeSet<_>>()))
            .filter_map(|embedding| {
                let mol_to_block: Correspondence = embedding
                    .iter()
                    .filter_map(|(from, &mol)| self.mapping.get(from).map(|weights| (mol, weights.clone())))
                    .collect();
                if mol_to_block.is_empty() {
                    return None;
                }
                let references = self
                    .references
                    .iter()
                    .filter_map(|(&to, from)| embedding.get(from).map(|&mol| (to, mol)))
                    .collect();
                Some(MappingMatch {
                    mol_to_block,
                    block: &self.block_to,
                    references,
                    mapping: self,
                })
            })
            .collect()
    }
}

fn ids_by_name(molecule: &Molecule) -> BTreeMap<String, NodeId> {
    molecule
        .nodes()
        .filter_map(|(id, attributes)| attributes.atom_name().map(|name| (name.to_string(), id)))
        .collect()
}

/// Mappings grouped by source force field, then target force field, then name.
#[derive(Debug, Clone, Default)]
pub struct MappingCatalog {
    collections: BTreeMap<String, BTreeMap<String, IndexMap<String, Mapping>>>,
}

impl MappingCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `mapping` from force field `from` to force field `to`, replacing any
    /// mapping with the same name.
    pub fn insert(&mut self, from: &str, to: &str, mapping: Mapping) {
        self.collections
            .entry(from.to_string())
            .or_default()
            .entry(to.to_string())
            .or_default()
            .insert(mapping.name().to_string(), mapping);
    }

    /// The mappings from force field `from` to force field `to`, by name.
    pub fn get(&self, from: &str, to: &str) -> Option<&IndexMap<String, Mapping>> {
        self.collections.get(from)?.get(to)
    }

    pub fn len(&self) -> usize {
        self.collections
            .values()
            .flat_map(BTreeMap::values)
            .map(IndexMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
