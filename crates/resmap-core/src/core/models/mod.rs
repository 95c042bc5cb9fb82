//! # Core Models Module
//!
//! Data structures used to represent molecules at any resolution.
//!
//! ## Key Components
//!
//! - [`value`] - Attribute values, attribute maps and link predicates
//! - [`interaction`] - Typed interaction records over ordered particle tuples
//! - [`molecule`] - The attributed molecular graph
//! - [`block`] - Residue templates keyed by atom name
//! - [`link`] - Inter-residue link templates and coordinate-derived parameters
//! - [`system`] - A collection of molecules sharing a force field
//! - [`ids`] - Particle identifiers
//!
//! ## Usage
//!
//! ```ignore
//! use resmap::attrs;
//! use resmap::core::models::molecule::Molecule;
//!
//! let mut molecule = Molecule::new();
//! let n = molecule.add_atom(attrs! { "atomname" => "N", "resid" => 1 })?;
//! let ca = molecule.add_atom(attrs! { "atomname" => "CA", "resid" => 1 })?;
//! molecule.add_edge(n, ca)?;
//! ```

pub mod block;
pub mod ids;
pub mod interaction;
pub mod link;
pub mod molecule;
pub mod system;
pub mod value;
