use crate::core::models::ids::NodeId;
use crate::core::models::molecule::MoleculeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Molecule operation failed: {source}")]
    Molecule {
        #[from]
        source: MoleculeError,
    },

    #[error("Residue(s) {residues:?} is not compatible with the others: {source}")]
    IncompatibleBlock {
        residues: Vec<String>,
        #[source]
        source: MoleculeError,
    },

    #[error("No node found in molecule with atom name {atom_name} (modification '{modification}')")]
    UnresolvedModificationAtom {
        modification: String,
        atom_name: String,
    },

    #[error("Modified particles {atoms:?} do not all carry the same modifications")]
    InconsistentModifications { atoms: Vec<NodeId> },

    #[error("Molecule has no force field to map from")]
    MissingForceField,

    #[error("No mappings known from force field '{from}' to '{to}'")]
    MissingMappings { from: String, to: String },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
