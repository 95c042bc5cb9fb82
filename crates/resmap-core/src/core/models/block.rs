use super::interaction::Interaction;
use super::molecule::{Molecule, MoleculeError};
use super::value::{Attributes, ParticleAttributes, Value, keys};
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Interaction types whose consecutive atoms are bonded.
pub const EDGE_GENERATING_TYPES: [&str; 5] = ["bonds", "angles", "dihedrals", "cmap", "constraints"];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BlockError {
    #[error("Atom has no atom name: {0:?}")]
    MissingAtomName(Attributes),

    #[error("Block '{block}' refers to atom '{atom}', which has no particle data")]
    UnknownAtom { block: String, atom: String },

    #[error("Failed to build molecule from block '{block}': {source}")]
    Molecule {
        block: String,
        #[source]
        source: MoleculeError,
    },
}

/// A residue template.
///
/// Particles are keyed by atom name and interactions refer to atoms by name. Edges may
/// name atoms that carry no particle data; such placeholders stand for atoms of a
/// neighbouring residue and are not reported as atoms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub name: Option<String>,
    nodes: IndexMap<String, Attributes>,
    adjacency: BTreeMap<String, BTreeSet<String>>,
    interactions: IndexMap<String, Vec<Interaction<String>>>,
    pub nrexcl: Option<u32>,
}

impl Block {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unnamed")
    }

    /// Adds an atom keyed by its `atomname` attribute.
    pub fn add_atom(&mut self, atom: Attributes) -> Result<(), BlockError> {
        let Some(name) = atom.atom_name().map(str::to_string) else {
            return Err(BlockError::MissingAtomName(atom));
        };
        self.nodes.entry(name.clone()).or_default().extend(atom);
        self.adjacency.entry(name).or_default();
        Ok(())
    }

    /// Iterates over the atoms carrying particle data, in insertion order.
    pub fn atoms(&self) -> impl Iterator<Item = &Attributes> {
        self.nodes.values().filter(|attributes| !attributes.is_empty())
    }

    pub fn atom(&self, name: &str) -> Option<&Attributes> {
        self.nodes.get(name).filter(|attributes| !attributes.is_empty())
    }

    pub fn len(&self) -> usize {
        self.atoms().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds an edge by atom names, creating placeholder nodes when needed.
    pub fn add_edge(&mut self, a: &str, b: &str) {
        for name in [a, b] {
            if !self.nodes.contains_key(name) {
                self.nodes.insert(name.to_string(), Attributes::new());
            }
        }
        self.adjacency.entry(a.to_string()).or_default().insert(b.to_string());
        self.adjacency.entry(b.to_string()).or_default().insert(a.to_string());
    }

    pub fn has_edge(&self, a: &str, b: &str) -> bool {
        self.adjacency.get(a).is_some_and(|neighbors| neighbors.contains(b))
    }

    pub fn neighbors<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.adjacency
            .get(name)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Iterates over every edge once, with names in lexical order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.adjacency.iter().flat_map(|(a, neighbors)| {
            neighbors
                .iter()
                .filter(move |b| a <= *b)
                .map(move |b| (a.as_str(), b.as_str()))
        })
    }

    pub fn add_interaction(
        &mut self,
        kind: &str,
        atoms: Vec<String>,
        parameters: Vec<String>,
        meta: Attributes,
    ) {
        self.interactions
            .entry(kind.to_string())
            .or_default()
            .push(Interaction::new(atoms, parameters, meta));
    }

    pub fn get_interactions(&self, kind: &str) -> &[Interaction<String>] {
        self.interactions.get(kind).map_or(&[], Vec::as_slice)
    }

    pub fn interactions(&self) -> impl Iterator<Item = (&str, &[Interaction<String>])> {
        self.interactions
            .iter()
            .map(|(kind, interactions)| (kind.as_str(), interactions.as_slice()))
    }

    /// Creates edges between consecutive atoms of every interaction of type `kind`.
    ///
    /// Interactions with `edge = false` in their metadata are skipped. Unknown types are
    /// silently ignored.
    pub fn make_edges_from_interaction_type(&mut self, kind: &str) {
        let pairs: Vec<(String, String)> = self
            .get_interactions(kind)
            .iter()
            .filter(|interaction| interaction.generates_edges())
            .flat_map(|interaction| {
                interaction
                    .atoms
                    .windows(2)
                    .map(|pair| (pair[0].clone(), pair[1].clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        for (a, b) in pairs {
            self.add_edge(&a, &b);
        }
    }

    /// Creates edges from every [`EDGE_GENERATING_TYPES`] interaction.
    pub fn make_edges_from_interactions(&mut self) {
        for kind in EDGE_GENERATING_TYPES {
            self.make_edges_from_interaction_type(kind);
        }
    }

    /// Every `(a, b, c)` path of two edges, in both directions.
    pub fn guess_angles(&self) -> Vec<[String; 3]> {
        let mut angles = Vec::new();
        for a in self.nodes.keys() {
            for b in self.neighbors(a) {
                for c in self.neighbors(b) {
                    if c != a.as_str() {
                        angles.push([a.clone(), b.to_string(), c.to_string()]);
                    }
                }
            }
        }
        angles
    }

    /// Every `(a, b, c, d)` path of three edges, in both directions.
    pub fn guess_dihedrals(&self) -> Vec<[String; 4]> {
        let mut dihedrals = Vec::new();
        for [a, b, c] in self.guess_angles() {
            for d in self.neighbors(&c) {
                if d != a && d != b {
                    dihedrals.push([a.clone(), b.clone(), c.clone(), d.to_string()]);
                }
            }
        }
        dihedrals
    }

    /// Whether a proper dihedral has `center` as its ordered central pair.
    pub fn has_dihedral_around(&self, center: (&str, &str)) -> bool {
        self.has_torsion_around("dihedrals", center)
    }

    /// Whether an improper torsion has `center` as its ordered central pair.
    pub fn has_improper_around(&self, center: (&str, &str)) -> bool {
        self.has_torsion_around("impropers", center)
    }

    fn has_torsion_around(&self, kind: &str, (b, c): (&str, &str)) -> bool {
        self.get_interactions(kind).iter().any(|interaction| {
            let atoms = &interaction.atoms;
            atoms.len() == 4 && atoms[1] == b && atoms[2] == c
        })
    }

    /// Instantiates the block as a standalone molecule.
    ///
    /// Atoms receive consecutive identifiers starting at `atom_offset`, the residue id
    /// `resid`, the block name as residue name, and their charge group shifted by
    /// `offset_charge_group`. Interactions keep their parameters and their metadata,
    /// so `version` and `edge` flags survive instantiation.
    pub fn to_molecule(
        &self,
        atom_offset: usize,
        resid: i64,
        offset_charge_group: i64,
    ) -> Result<Molecule, BlockError> {
        let block = self.display_name().to_string();
        let wrap = |source| BlockError::Molecule {
            block: block.clone(),
            source,
        };

        let mut molecule = Molecule::new();
        let mut name_to_id = BTreeMap::new();
        for (id, atom) in (atom_offset..).zip(self.atoms()) {
            let mut new_atom = atom.clone();
            new_atom.insert(keys::RESID.to_string(), Value::Int(resid));
            new_atom.insert(
                keys::RESNAME.to_string(),
                self.name.clone().map_or(Value::Null, Value::Str),
            );
            new_atom.insert(
                keys::CHARGE_GROUP.to_string(),
                Value::Int(atom.charge_group().unwrap_or(0) + offset_charge_group),
            );
            if let Some(name) = atom.atom_name() {
                name_to_id.insert(name.to_string(), id);
            }
            molecule.add_node(id, new_atom).map_err(wrap)?;
        }

        let lookup = |name: &String| {
            name_to_id
                .get(name)
                .copied()
                .ok_or_else(|| BlockError::UnknownAtom {
                    block: block.clone(),
                    atom: name.clone(),
                })
        };
        for (kind, interactions) in self.interactions() {
            for interaction in interactions {
                let mapped = interaction.try_map_atoms(lookup)?;
                molecule
                    .add_interaction(kind, mapped.atoms, mapped.parameters, mapped.meta)
                    .map_err(wrap)?;
            }
        }
        for (a, b) in self.edges() {
            let (a, b) = (lookup(&a.to_string())?, lookup(&b.to_string())?);
            molecule.add_edge(a, b).map_err(wrap)?;
        }

        molecule.nrexcl = self.nrexcl;
        Ok(molecule)
    }
}
