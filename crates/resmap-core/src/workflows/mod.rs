//! # Workflows Module
//!
//! High-level entry points that run a complete resolution transformation.
//!
//! ## Overview
//!
//! Workflows tie the engine steps together. They look up the templates for a pair of
//! force fields, run every step on a molecule and hand back the output molecule with
//! the report of everything suspicious that was found on the way.
//!
//! ## Architecture
//!
//! - **Mapping Workflow** ([`map`]) - Transformation of one molecule ([`map::do_mapping`])
//!   or of a whole system ([`map::DoMapping`])

pub mod map;
