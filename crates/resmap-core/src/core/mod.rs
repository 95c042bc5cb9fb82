//! # Core Module
//!
//! The fundamental building blocks of resmap: the attributed molecular graph model,
//! residue templates, force fields, template mappings and the pattern matching
//! primitives used to locate templates inside a molecule.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Attribute values, interactions,
//!   molecules, residue blocks and systems
//! - **Force Fields** ([`forcefield`]) - Named collections of residue blocks
//! - **Template Mappings** ([`mapping`]) - Resolution templates and their catalog
//! - **Pattern Matching** ([`matching`]) - Attribute and interaction matching
//! - **Graph Algorithms** ([`graph`]) - Subgraph isomorphism and connected components
//! - **Utilities** ([`utils`]) - Particle identification helpers and geometry

pub mod forcefield;
pub mod graph;
pub mod mapping;
pub mod matching;
pub mod models;
pub mod utils;
