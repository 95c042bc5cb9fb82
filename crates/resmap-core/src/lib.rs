//! # resmap Core Library
//!
//! A library for transforming molecular graphs between structural resolutions, for
//! example from an all-atom description to a coarse-grained one, using a catalog of
//! residue-level template mappings.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Molecule`, `Block`,
//!   `ForceField`, `System`), attribute values and predicates, template mappings and
//!   their catalog, and the graph algorithms the engine relies on.
//!
//! - **[`engine`]: The Logic Core.** Match discovery, weighted correspondence tracking,
//!   fragment merging, attribute reconciliation, connectivity synthesis and the
//!   consistency diagnostics of a resolution transformation.
//!
//! - **[`workflows`]: The Public API.** Entry points that run a complete transformation
//!   on one molecule or on a whole system.

pub mod core;
pub mod engine;
pub mod workflows;
