use super::ids::NodeId;
use super::value::{Attributes, Value};

/// Metadata key distinguishing several interactions over the same atoms.
pub const VERSION_KEY: &str = "version";
/// Metadata key that disables edge generation when set to `false`.
pub const EDGE_KEY: &str = "edge";

/// An immutable, typed relation over an ordered tuple of particles.
///
/// In a [`Molecule`](super::molecule::Molecule) the atoms are particle identifiers; in a
/// [`Block`](super::block::Block) they are atom names.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction<K = NodeId> {
    pub atoms: Vec<K>,
    /// Opaque, ordered parameters as written in the template.
    pub parameters: Vec<String>,
    pub meta: Attributes,
}

impl<K> Interaction<K> {
    pub fn new(atoms: Vec<K>, parameters: Vec<String>, meta: Attributes) -> Self {
        Self {
            atoms,
            parameters,
            meta,
        }
    }

    /// The version tag of the interaction; 0 when unset.
    pub fn version(&self) -> i64 {
        version_of(&self.meta)
    }

    /// Whether consecutive atoms of the interaction should become edges.
    pub fn generates_edges(&self) -> bool {
        self.meta
            .get(EDGE_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    /// Rewrites the atoms of the interaction, failing on the first atom `f` rejects.
    pub fn try_map_atoms<L, E>(
        &self,
        mut f: impl FnMut(&K) -> Result<L, E>,
    ) -> Result<Interaction<L>, E> {
        let atoms = self.atoms.iter().map(&mut f).collect::<Result<Vec<_>, _>>()?;
        Ok(Interaction {
            atoms,
            parameters: self.parameters.clone(),
            meta: self.meta.clone(),
        })
    }
}

/// An interaction a template asks to remove, with per-atom attribute constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteInteraction<K = NodeId> {
    pub atoms: Vec<K>,
    pub atom_attrs: Vec<Attributes>,
    pub parameters: Vec<String>,
    pub meta: Attributes,
}

impl<K> DeleteInteraction<K> {
    pub fn new(
        atoms: Vec<K>,
        atom_attrs: Vec<Attributes>,
        parameters: Vec<String>,
        meta: Attributes,
    ) -> Self {
        Self {
            atoms,
            atom_attrs,
            parameters,
            meta,
        }
    }
}

/// Anything an interaction of a molecule can be matched against.
pub trait InteractionPattern {
    fn atoms(&self) -> &[NodeId];
    fn parameters(&self) -> &[String];
    fn meta(&self) -> &Attributes;

    /// Attribute constraints for each atom, in the order of [`InteractionPattern::atoms`].
    fn atom_constraints(&self) -> Option<&[Attributes]> {
        None
    }
}

impl InteractionPattern for Interaction {
    fn atoms(&self) -> &[NodeId] {
        &self.atoms
    }

    fn parameters(&self) -> &[String] {
        &self.parameters
    }

    fn meta(&self) -> &Attributes {
        &self.meta
    }
}

impl InteractionPattern for DeleteInteraction {
    fn atoms(&self) -> &[NodeId] {
        &self.atoms
    }

    fn parameters(&self) -> &[String] {
        &self.parameters
    }

    fn meta(&self) -> &Attributes {
        &self.meta
    }

    fn atom_constraints(&self) -> Option<&[Attributes]> {
        Some(&self.atom_attrs)
    }
}

pub(crate) fn version_of(meta: &Attributes) -> i64 {
    meta.get(VERSION_KEY).and_then(Value::as_int).unwrap_or(0)
}
