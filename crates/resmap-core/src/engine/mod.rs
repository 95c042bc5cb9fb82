//! # Engine Module
//!
//! The machinery of a resolution transformation: finding template occurrences in an
//! input molecule, merging them into an output molecule and checking the result.
//!
//! ## Overview
//!
//! A transformation proceeds in fixed steps. Block and modification templates are
//! matched against the input ([`matching`]), the matches are merged in order of their
//! lowest input particle while a weighted correspondence between input and output
//! particles is recorded ([`merge`], [`correspondence`]), output particles receive
//! provenance and kept attributes ([`reconcile`]), bonds between matched fragments are
//! carried over ([`connectivity`]) and finally the result is checked for overlaps,
//! gaps and conflicts ([`diagnostics`]).
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Kept attributes and handling of unknown molecules
//! - **Match Discovery** ([`matching`]) - Template matchers and modification set cover
//! - **Merging** ([`merge`]) - Building the output molecule from matches
//! - **Attribute Reconciliation** ([`reconcile`]) - Provenance and kept attributes
//! - **Connectivity** ([`connectivity`]) - Edges between merged fragments
//! - **Diagnostics** ([`diagnostics`]) - Recoverable inconsistencies and their report
//! - **Progress Monitoring** ([`progress`]) - Progress reporting callbacks
//! - **Error Handling** ([`error`]) - Fatal transformation errors
//!
//! ## Key Capabilities
//!
//! - **Many-to-many correspondences** with weights in both directions
//! - **Graceful degradation** on incomplete templates, logging instead of failing
//! - **Exact cover** of modification tags by modification templates

pub mod config;
pub mod connectivity;
pub mod correspondence;
pub mod diagnostics;
pub mod error;
pub mod matching;
pub mod merge;
pub mod progress;
pub mod reconcile;
