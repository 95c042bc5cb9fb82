use super::block::Block;
use super::ids::NodeId;
use super::interaction::DeleteInteraction;
use super::molecule::{Molecule, MoleculeError};
use super::value::{Attributes, Value, keys};
use crate::core::utils::geometry;
use indexmap::IndexMap;
use nalgebra::Point3;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LinkError {
    #[error("{kind} expects {expected} atom keys, but {found} were provided")]
    WrongKeyCount {
        kind: EffectorKind,
        expected: usize,
        found: usize,
    },

    #[error("Link atom '{0}' is not part of the match")]
    UnmatchedAtom(String),

    #[error("Particle {0} has no position")]
    MissingPosition(NodeId),

    #[error(transparent)]
    Molecule(#[from] MoleculeError),
}

/// The geometric quantity a [`LinkParameterEffector`] measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectorKind {
    /// Distance between two particles, in the unit of the positions.
    Distance,
    /// Angle at the middle of three particles, in degrees.
    Angle,
    /// Torsion around the two middle particles of four, in degrees; cis is 0.
    Dihedral,
    /// Torsion like [`EffectorKind::Dihedral`] but measured from trans.
    DihedralLeft,
}

impl EffectorKind {
    pub fn key_count(self) -> usize {
        match self {
            Self::Distance => 2,
            Self::Angle => 3,
            Self::Dihedral | Self::DihedralLeft => 4,
        }
    }
}

impl fmt::Display for EffectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Distance => "distance",
            Self::Angle => "angle",
            Self::Dihedral => "dihedral",
            Self::DihedralLeft => "dihedral_left",
        };
        f.write_str(name)
    }
}

/// An interaction parameter computed from the coordinates of matched particles.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkParameterEffector {
    pub kind: EffectorKind,
    /// Link atom names, resolved through the match at evaluation time.
    pub keys: Vec<String>,
    /// Number of decimals of the rendered value; full precision when unset.
    pub precision: Option<usize>,
}

impl LinkParameterEffector {
    /// # Errors
    ///
    /// Returns [`LinkError::WrongKeyCount`] when `keys` does not hold exactly as many
    /// atoms as `kind` measures.
    pub fn new(
        kind: EffectorKind,
        keys: Vec<String>,
        precision: Option<usize>,
    ) -> Result<Self, LinkError> {
        if keys.len() != kind.key_count() {
            return Err(LinkError::WrongKeyCount {
                kind,
                expected: kind.key_count(),
                found: keys.len(),
            });
        }
        Ok(Self {
            kind,
            keys,
            precision,
        })
    }

    pub fn evaluate(
        &self,
        molecule: &Molecule,
        matched: &BTreeMap<String, NodeId>,
    ) -> Result<f64, LinkError> {
        let positions = self
            .keys
            .iter()
            .map(|key| {
                let id = *matched
                    .get(key)
                    .ok_or_else(|| LinkError::UnmatchedAtom(key.clone()))?;
                molecule
                    .node(id)
                    .ok_or(MoleculeError::UnknownAtom(id))?
                    .get(keys::POSITION)
                    .and_then(Value::as_position)
                    .copied()
                    .ok_or(LinkError::MissingPosition(id))
            })
            .collect::<Result<Vec<Point3<f64>>, _>>()?;

        Ok(match (self.kind, positions.as_slice()) {
            (EffectorKind::Distance, [a, b]) => (b - a).norm(),
            (EffectorKind::Angle, [a, b, c]) => geometry::angle(&(a - b), &(c - b)).to_degrees(),
            (EffectorKind::Dihedral, &[a, b, c, d]) => geometry::dihedral(&[a, b, c, d]).to_degrees(),
            (EffectorKind::DihedralLeft, &[a, b, c, d]) => {
                geometry::dihedral_left(&[a, b, c, d]).to_degrees()
            }
            (kind, _) => {
                return Err(LinkError::WrongKeyCount {
                    kind,
                    expected: kind.key_count(),
                    found: positions.len(),
                });
            }
        })
    }

    /// Evaluates the effector and formats the value as an interaction parameter.
    pub fn render(
        &self,
        molecule: &Molecule,
        matched: &BTreeMap<String, NodeId>,
    ) -> Result<String, LinkError> {
        let value = self.evaluate(molecule, matched)?;
        Ok(match self.precision {
            Some(precision) => format!("{value:.precision$}"),
            None => value.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkParameter {
    Literal(String),
    Computed(LinkParameterEffector),
}

impl From<&str> for LinkParameter {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_string())
    }
}

impl From<LinkParameterEffector> for LinkParameter {
    fn from(value: LinkParameterEffector) -> Self {
        Self::Computed(value)
    }
}

/// An interaction a link adds, over link atom names.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkInteraction {
    pub atoms: Vec<String>,
    pub parameters: Vec<LinkParameter>,
    pub meta: Attributes,
}

/// A template connecting particles across residues.
///
/// The particles and edges of the link live in [`Link::block`], keyed by link atom
/// name; a link atom may carry a `replace` map of attributes written onto the particle
/// it matches. Links are found in a molecule by an external matcher, which hands the
/// resulting link-atom-to-particle match to [`Link::apply`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Link {
    pub block: Block,
    interactions: IndexMap<String, Vec<LinkInteraction>>,
    non_edges: Vec<(String, String)>,
    removed_interactions: IndexMap<String, Vec<DeleteInteraction<String>>>,
    /// Attributes set on every matched particle.
    pub apply_to_all: Attributes,
    /// Attributes merged into the metadata of the molecule.
    pub molecule_meta: Attributes,
    /// Alternative atom sequences, each a list of atom names with their constraints.
    patterns: Vec<Vec<(String, Attributes)>>,
}

impl Link {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            block: Block::new(name),
            ..Self::default()
        }
    }

    pub fn add_interaction(
        &mut self,
        kind: &str,
        atoms: Vec<String>,
        parameters: Vec<LinkParameter>,
        meta: Attributes,
    ) {
        self.interactions
            .entry(kind.to_string())
            .or_default()
            .push(LinkInteraction {
                atoms,
                parameters,
                meta,
            });
    }

    pub fn interactions(&self) -> impl Iterator<Item = (&str, &[LinkInteraction])> {
        self.interactions
            .iter()
            .map(|(kind, interactions)| (kind.as_str(), interactions.as_slice()))
    }

    pub fn add_removed_interaction(&mut self, kind: &str, interaction: DeleteInteraction<String>) {
        self.removed_interactions
            .entry(kind.to_string())
            .or_default()
            .push(interaction);
    }

    /// Declares that the particles matched by `a` and `b` must not be bonded.
    pub fn add_non_edge(&mut self, a: impl Into<String>, b: impl Into<String>) {
        self.non_edges.push((a.into(), b.into()));
    }

    pub fn non_edges(&self) -> &[(String, String)] {
        &self.non_edges
    }

    pub fn add_pattern(&mut self, pattern: Vec<(String, Attributes)>) {
        self.patterns.push(pattern);
    }

    pub fn patterns(&self) -> &[Vec<(String, Attributes)>] {
        &self.patterns
    }

    /// Whether no declared non-edge is bonded in `molecule`.
    ///
    /// A non-edge naming an atom outside the match constrains nothing.
    pub fn non_edges_respected(
        &self,
        molecule: &Molecule,
        matched: &BTreeMap<String, NodeId>,
    ) -> bool {
        self.non_edges.iter().all(|(a, b)| {
            match (matched.get(a), matched.get(b)) {
                (Some(&a), Some(&b)) => !molecule.has_edge(a, b),
                _ => true,
            }
        })
    }

    /// Applies the link to `molecule` at `matched`.
    ///
    /// Removed interactions go first, then link edges and interactions are added,
    /// replacing interactions with the same atoms and version. Afterwards `replace`
    /// maps of link atoms, [`Link::apply_to_all`] and [`Link::molecule_meta`] are written.
    ///
    /// # Errors
    ///
    /// Fails when a link atom is not matched, a removed interaction is not present, a
    /// computed parameter lacks positions, or an edge or interaction refers to an
    /// unknown particle. The molecule is left untouched on failure.
    pub fn apply(
        &self,
        molecule: &mut Molecule,
        matched: &BTreeMap<String, NodeId>,
    ) -> Result<(), LinkError> {
        let resolve = |name: &String| {
            matched
                .get(name)
                .copied()
                .ok_or_else(|| LinkError::UnmatchedAtom(name.clone()))
        };
        let mut linked = molecule.clone();

        for (kind, removals) in &self.removed_interactions {
            for removal in removals {
                let atoms = removal.atoms.iter().map(resolve).collect::<Result<Vec<_>, _>>()?;
                let pattern = DeleteInteraction::new(
                    atoms,
                    removal.atom_attrs.clone(),
                    removal.parameters.clone(),
                    removal.meta.clone(),
                );
                linked.remove_matching_interaction(kind, &pattern)?;
            }
        }

        for (a, b) in self.block.edges() {
            let (Some(&a), Some(&b)) = (matched.get(a), matched.get(b)) else {
                continue;
            };
            linked.add_edge(a, b)?;
        }

        for (kind, interactions) in &self.interactions {
            for interaction in interactions {
                let atoms = interaction
                    .atoms
                    .iter()
                    .map(resolve)
                    .collect::<Result<Vec<_>, _>>()?;
                let parameters = interaction
                    .parameters
                    .iter()
                    .map(|parameter| match parameter {
                        LinkParameter::Literal(text) => Ok(text.clone()),
                        LinkParameter::Computed(effector) => effector.render(&linked, matched),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                linked.add_or_replace_interaction(kind, atoms, parameters, interaction.meta.clone())?;
            }
        }

        for atom in self.block.atoms() {
            let Some(name) = atom.get(keys::ATOM_NAME).and_then(Value::as_str) else {
                continue;
            };
            let Some(replace) = atom.get(keys::REPLACE).and_then(Value::as_map) else {
                continue;
            };
            let id = resolve(&name.to_string())?;
            let node = linked.node_mut(id).ok_or(MoleculeError::UnknownAtom(id))?;
            node.extend(replace.iter().map(|(key, value)| (key.clone(), value.clone())));
        }

        if !self.apply_to_all.is_empty() {
            for &id in matched.values() {
                let node = linked.node_mut(id).ok_or(MoleculeError::UnknownAtom(id))?;
                node.extend(
                    self.apply_to_all
                        .iter()
                        .map(|(key, value)| (key.clone(), value.clone())),
                );
            }
        }

        linked.meta.extend(
            self.molecule_meta
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        *molecule = linked;
        Ok(())
    }
}
