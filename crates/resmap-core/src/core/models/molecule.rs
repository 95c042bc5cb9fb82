use super::ids::NodeId;
use super::interaction::{Interaction, InteractionPattern, version_of};
use super::value::{Attributes, ParticleAttributes, Value, keys};
use crate::core::forcefield::ForceField;
use crate::core::graph;
use crate::core::matching::interaction_match;
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MoleculeError {
    #[error("Particle {id} has no atom name")]
    MissingAtomName { id: NodeId },

    #[error("Unknown atom {0}")]
    UnknownAtom(NodeId),

    #[error("Cannot merge molecules with different force fields ('{this}' and '{other}')")]
    IncompatibleForceField { this: String, other: String },

    #[error(
        "Cannot merge molecules with different nrexcl. This molecule has nrexcl={this:?}, while the other has nrexcl={other:?}"
    )]
    IncompatibleNrexcl {
        this: Option<u32>,
        other: Option<u32>,
    },

    #[error("Can't find interaction of type {kind} between atoms {atoms:?} and with version {version}")]
    InteractionNotFound {
        kind: String,
        atoms: Vec<NodeId>,
        version: i64,
    },

    #[error("Cannot find a matching interaction of type {0}")]
    NoMatchingInteraction(String),
}

/// An attributed molecular graph.
///
/// Particles are stored in insertion order and keyed by integer identifiers. Bonds are
/// undirected edges; interactions are grouped by type name into ordered lists. The
/// force field is shared with other molecules and compared by identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Molecule {
    nodes: IndexMap<NodeId, Attributes>,
    adjacency: BTreeMap<NodeId, BTreeSet<NodeId>>,
    interactions: IndexMap<String, Vec<Interaction>>,
    /// Number of bonded neighbours excluded from non-bonded interactions.
    pub nrexcl: Option<u32>,
    pub meta: Attributes,
    force_field: Option<Arc<ForceField>>,
}

impl Molecule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_force_field(force_field: Arc<ForceField>) -> Self {
        Self {
            force_field: Some(force_field),
            ..Self::default()
        }
    }

    pub fn force_field(&self) -> Option<&Arc<ForceField>> {
        self.force_field.as_ref()
    }

    pub fn set_force_field(&mut self, force_field: Option<Arc<ForceField>>) {
        self.force_field = force_field;
    }

    /// Whether both molecules refer to the very same force field instance.
    pub fn shares_force_field_with(&self, other: &Molecule) -> bool {
        match (&self.force_field, &other.force_field) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Attributes> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Attributes> {
        self.nodes.get_mut(&id)
    }

    /// Iterates over the particles in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Attributes)> {
        self.nodes.iter().map(|(&id, attributes)| (id, attributes))
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn max_node_id(&self) -> Option<NodeId> {
        self.nodes.keys().copied().max()
    }

    /// The identifier the next appended particle receives.
    pub fn next_node_id(&self) -> NodeId {
        self.max_node_id().map_or(0, |id| id + 1)
    }

    /// Adds a particle, or updates the attributes of an existing one.
    ///
    /// # Errors
    ///
    /// Returns [`MoleculeError::MissingAtomName`] if `attributes` has no atom name.
    pub fn add_node(&mut self, id: NodeId, attributes: Attributes) -> Result<(), MoleculeError> {
        if attributes.atom_name().is_none() {
            return Err(MoleculeError::MissingAtomName { id });
        }
        self.insert_node_unchecked(id, attributes);
        Ok(())
    }

    /// Appends a particle with the next free identifier and returns that identifier.
    pub fn add_atom(&mut self, attributes: Attributes) -> Result<NodeId, MoleculeError> {
        let id = self.next_node_id();
        self.add_node(id, attributes)?;
        Ok(id)
    }

    fn insert_node_unchecked(&mut self, id: NodeId, attributes: Attributes) {
        self.nodes.entry(id).or_default().extend(attributes);
        self.adjacency.entry(id).or_default();
    }

    /// Removes a particle together with its edges and every interaction referencing it.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Attributes> {
        let attributes = self.nodes.shift_remove(&id)?;
        if let Some(neighbors) = self.adjacency.remove(&id) {
            for neighbor in neighbors {
                if let Some(others) = self.adjacency.get_mut(&neighbor) {
                    others.remove(&id);
                }
            }
        }
        for interactions in self.interactions.values_mut() {
            interactions.retain(|interaction| !interaction.atoms.contains(&id));
        }
        Some(attributes)
    }

    pub fn remove_nodes_from(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        for id in ids {
            self.remove_node(id);
        }
    }

    /// Adds an undirected edge. Adding an existing edge is a no-op.
    pub fn add_edge(&mut self, a: NodeId, b: NodeId) -> Result<(), MoleculeError> {
        for id in [a, b] {
            if !self.contains(id) {
                return Err(MoleculeError::UnknownAtom(id));
            }
        }
        self.adjacency.entry(a).or_default().insert(b);
        self.adjacency.entry(b).or_default().insert(a);
        Ok(())
    }

    pub fn has_edge(&self, a: NodeId, b: NodeId) -> bool {
        self.adjacency
            .get(&a)
            .is_some_and(|neighbors| neighbors.contains(&b))
    }

    pub fn neighbors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.adjacency.get(&id).into_iter().flatten().copied()
    }

    pub fn degree(&self, id: NodeId) -> usize {
        self.adjacency.get(&id).map_or(0, BTreeSet::len)
    }

    /// Iterates over every edge once, as `(low, high)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.adjacency.iter().flat_map(|(&a, neighbors)| {
            neighbors
                .iter()
                .filter(move |&&b| a <= b)
                .map(move |&b| (a, b))
        })
    }

    pub fn edge_count(&self) -> usize {
        self.edges().count()
    }

    /// All edges with one end in `first` and the other in `second`, as `(first, second)`.
    pub fn edges_between(
        &self,
        first: &BTreeSet<NodeId>,
        second: &BTreeSet<NodeId>,
    ) -> BTreeSet<(NodeId, NodeId)> {
        first
            .iter()
            .flat_map(|&a| {
                self.neighbors(a)
                    .filter(|b| second.contains(b))
                    .map(move |b| (a, b))
            })
            .collect()
    }

    /// Adds an interaction of type `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`MoleculeError::UnknownAtom`] if any atom is not part of the molecule.
    pub fn add_interaction(
        &mut self,
        kind: &str,
        atoms: Vec<NodeId>,
        parameters: Vec<String>,
        meta: Attributes,
    ) -> Result<(), MoleculeError> {
        if let Some(&missing) = atoms.iter().find(|&&atom| !self.contains(atom)) {
            return Err(MoleculeError::UnknownAtom(missing));
        }
        self.interactions
            .entry(kind.to_string())
            .or_default()
            .push(Interaction::new(atoms, parameters, meta));
        Ok(())
    }

    /// Replaces the interaction with the same atoms and version, or appends a new one.
    pub fn add_or_replace_interaction(
        &mut self,
        kind: &str,
        atoms: Vec<NodeId>,
        parameters: Vec<String>,
        meta: Attributes,
    ) -> Result<(), MoleculeError> {
        let version = version_of(&meta);
        let existing = self.interactions.get_mut(kind).and_then(|interactions| {
            interactions
                .iter_mut()
                .find(|interaction| interaction.atoms == atoms && interaction.version() == version)
        });
        match existing {
            Some(interaction) => {
                *interaction = Interaction::new(atoms, parameters, meta);
                Ok(())
            }
            None => self.add_interaction(kind, atoms, parameters, meta),
        }
    }

    /// The interactions of type `kind`, in insertion order.
    pub fn get_interactions(&self, kind: &str) -> &[Interaction] {
        self.interactions.get(kind).map_or(&[], Vec::as_slice)
    }

    /// Iterates over interaction types and their interactions.
    pub fn interactions(&self) -> impl Iterator<Item = (&str, &[Interaction])> {
        self.interactions
            .iter()
            .map(|(kind, interactions)| (kind.as_str(), interactions.as_slice()))
    }

    pub fn interaction_count(&self, kind: &str) -> usize {
        self.get_interactions(kind).len()
    }

    /// Removes the interaction of type `kind` over `atoms` with the given version.
    ///
    /// # Errors
    ///
    /// Returns [`MoleculeError::InteractionNotFound`] if no interaction has both the
    /// atoms and the version.
    pub fn remove_interaction(
        &mut self,
        kind: &str,
        atoms: &[NodeId],
        version: i64,
    ) -> Result<Interaction, MoleculeError> {
        let not_found = || MoleculeError::InteractionNotFound {
            kind: kind.to_string(),
            atoms: atoms.to_vec(),
            version,
        };
        let interactions = self.interactions.get_mut(kind).ok_or_else(not_found)?;
        let index = interactions
            .iter()
            .position(|interaction| interaction.atoms == atoms && interaction.version() == version)
            .ok_or_else(not_found)?;
        Ok(interactions.remove(index))
    }

    /// Removes the first interaction of type `kind` that matches `template`.
    pub fn remove_matching_interaction(
        &mut self,
        kind: &str,
        template: &impl InteractionPattern,
    ) -> Result<Interaction, MoleculeError> {
        let index = self
            .get_interactions(kind)
            .iter()
            .position(|interaction| interaction_match(self, interaction, template))
            .ok_or_else(|| MoleculeError::NoMatchingInteraction(kind.to_string()))?;
        match self.interactions.get_mut(kind) {
            Some(interactions) => Ok(interactions.remove(index)),
            None => Err(MoleculeError::NoMatchingInteraction(kind.to_string())),
        }
    }

    /// Particles whose attributes equal every value in `constraints`.
    ///
    /// A [`Value::Null`] constraint also matches particles lacking the attribute.
    pub fn find_atoms<'a>(
        &'a self,
        constraints: &'a Attributes,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.nodes.iter().filter_map(move |(&id, attributes)| {
            constraints
                .iter()
                .all(|(key, value)| attributes.get(key).unwrap_or(&Value::Null) == value)
                .then_some(id)
        })
    }

    /// Appends the particles, edges and interactions of `other` to this molecule.
    ///
    /// Identifiers of the added particles start after the current largest identifier,
    /// residue ids are offset past the residue of the last particle and charge groups
    /// past its charge group. When the last particle carries no residue id or charge
    /// group, the largest one present in the molecule is used instead.
    ///
    /// # Return
    ///
    /// The correspondence from identifiers in `other` to identifiers in `self`.
    ///
    /// # Errors
    ///
    /// Fails without modifying `self` when the force fields are not the same instance,
    /// the `nrexcl` values differ, or an interaction of `other` refers to a particle
    /// `other` does not contain.
    pub fn merge_molecule(
        &mut self,
        other: &Molecule,
    ) -> Result<BTreeMap<NodeId, NodeId>, MoleculeError> {
        if !self.shares_force_field_with(other) {
            let name = |molecule: &Molecule| {
                molecule
                    .force_field
                    .as_ref()
                    .map_or_else(|| "none".to_string(), |ff| ff.name.clone())
            };
            return Err(MoleculeError::IncompatibleForceField {
                this: name(self),
                other: name(other),
            });
        }
        if self.nrexcl != other.nrexcl {
            return Err(MoleculeError::IncompatibleNrexcl {
                this: self.nrexcl,
                other: other.nrexcl,
            });
        }

        if let Some(&missing) = other
            .interactions()
            .flat_map(|(_, interactions)| interactions)
            .flat_map(|interaction| &interaction.atoms)
            .find(|&&atom| !other.contains(atom))
        {
            return Err(MoleculeError::UnknownAtom(missing));
        }

        let (offset, residue_offset, charge_group_offset) =
            match self.max_node_id().and_then(|id| self.node(id).map(|last| (id, last))) {
                Some((last_id, last)) => (
                    last_id + 1,
                    last.resid()
                        .or_else(|| self.nodes().filter_map(|(_, node)| node.resid()).max())
                        .map_or(0, |resid| resid + 1),
                    last.charge_group()
                        .or_else(|| self.nodes().filter_map(|(_, node)| node.charge_group()).max())
                        .unwrap_or(-1)
                        + 1,
                ),
                None => (0, 0, 0),
            };

        let mut correspondence = BTreeMap::new();
        for (index, (id, attributes)) in other.nodes().enumerate() {
            let new_id = offset + index;
            correspondence.insert(id, new_id);
            let mut new_atom = attributes.clone();
            if let Some(resid) = attributes.resid() {
                new_atom.insert(keys::RESID.to_string(), Value::Int(resid + residue_offset));
            }
            new_atom.insert(
                keys::CHARGE_GROUP.to_string(),
                Value::Int(attributes.charge_group().unwrap_or(0) + charge_group_offset),
            );
            self.insert_node_unchecked(new_id, new_atom);
        }

        for (kind, interactions) in other.interactions() {
            let entry = self.interactions.entry(kind.to_string()).or_default();
            for interaction in interactions {
                let atoms = interaction
                    .atoms
                    .iter()
                    .map(|atom| {
                        correspondence
                            .get(atom)
                            .copied()
                            .ok_or(MoleculeError::UnknownAtom(*atom))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                entry.push(Interaction::new(
                    atoms,
                    interaction.parameters.clone(),
                    interaction.meta.clone(),
                ));
            }
        }

        for (a, b) in other.edges() {
            if let (Some(&a), Some(&b)) = (correspondence.get(&a), correspondence.get(&b)) {
                self.adjacency.entry(a).or_default().insert(b);
                self.adjacency.entry(b).or_default().insert(a);
            }
        }

        Ok(correspondence)
    }

    /// The induced subgraph over `ids`, keeping interactions entirely inside it.
    pub fn subgraph<'a>(&self, ids: impl IntoIterator<Item = &'a NodeId>) -> Molecule {
        let selection: BTreeSet<NodeId> = ids.into_iter().copied().collect();
        let mut subgraph = Molecule {
            nrexcl: self.nrexcl,
            meta: self.meta.clone(),
            force_field: self.force_field.clone(),
            ..Molecule::default()
        };
        for (id, attributes) in self.nodes() {
            if selection.contains(&id) {
                subgraph.insert_node_unchecked(id, attributes.clone());
            }
        }
        for (a, b) in self.edges() {
            if selection.contains(&a) && selection.contains(&b) {
                subgraph.adjacency.entry(a).or_default().insert(b);
                subgraph.adjacency.entry(b).or_default().insert(a);
            }
        }
        for (kind, interactions) in self.interactions() {
            let kept: Vec<Interaction> = interactions
                .iter()
                .filter(|interaction| interaction.atoms.iter().all(|atom| selection.contains(atom)))
                .cloned()
                .collect();
            if !kept.is_empty() {
                subgraph.interactions.insert(kind.to_string(), kept);
            }
        }
        subgraph
    }

    /// Connected components of the subgraph induced by `ids`.
    pub fn connected_components(&self, ids: &BTreeSet<NodeId>) -> Vec<Vec<NodeId>> {
        graph::connected_components(self, ids)
    }

    /// Whether the subgraph induced by `ids` is connected.
    pub fn is_connected_subset(&self, ids: &BTreeSet<NodeId>) -> bool {
        self.connected_components(ids).len() <= 1
    }

    /// Groups particles into residues.
    ///
    /// A residue is a connected group of particles sharing chain, residue id and
    /// residue name. Residues are returned in the order of their first particle.
    pub fn iter_residues(&self) -> Vec<Vec<NodeId>> {
        type ResidueKey = (Option<String>, Option<i64>, Option<String>);
        let mut by_key: IndexMap<ResidueKey, BTreeSet<NodeId>> = IndexMap::new();
        for (id, attributes) in self.nodes() {
            let key = (
                attributes.chain().map(str::to_string),
                attributes.resid(),
                attributes.resname().map(str::to_string),
            );
            by_key.entry(key).or_default().insert(id);
        }
        let mut residues: Vec<Vec<NodeId>> = by_key
            .values()
            .flat_map(|ids| self.connected_components(ids))
            .collect();
        let order: BTreeMap<NodeId, usize> = self
            .node_ids()
            .enumerate()
            .map(|(position, id)| (id, position))
            .collect();
        residues.sort_by_key(|residue| residue.iter().filter_map(|id| order.get(id)).min().copied());
        residues
    }

    /// Whether both molecules have the same connectivity with matching atom and
    /// residue names.
    pub fn share_moltype_with(&self, other: &Molecule) -> bool {
        if self.len() != other.len() || self.edge_count() != other.edge_count() {
            return false;
        }
        let same_names = |a: &Attributes, b: &Attributes| {
            a.atom_name() == b.atom_name() && a.resname() == b.resname()
        };
        !graph::subgraph_isomorphisms(self, other, same_names, |_, _| true).is_empty()
    }
}
