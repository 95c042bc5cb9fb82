//! # Force Field Module
//!
//! A force field is a named collection of residue [`Block`]s, inter-residue [`Link`]s
//! and free-form variables.
//! Reading force fields from disk is the job of external parsers; this module only
//! holds the in-memory model those parsers produce.
//!
//! Molecules refer to their force field through an [`Arc`](std::sync::Arc), and two
//! molecules are considered to share a force field only when they point to the same
//! instance.

use super::models::block::Block;
use super::models::link::Link;
use super::models::value::{Attributes, Value};
use indexmap::IndexMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForceField {
    pub name: String,
    blocks: IndexMap<String, Block>,
    links: Vec<Link>,
    pub variables: Attributes,
}

impl ForceField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Registers `block` under its name, replacing any block with the same name.
    pub fn add_block(&mut self, block: Block) {
        let name = block.display_name().to_string();
        self.blocks.insert(name, block);
    }

    pub fn block(&self, name: &str) -> Option<&Block> {
        self.blocks.get(name)
    }

    pub fn blocks(&self) -> impl Iterator<Item = (&str, &Block)> {
        self.blocks.iter().map(|(name, block)| (name.as_str(), block))
    }

    /// The blocks molecules of this force field are compared against.
    pub fn reference_graphs(&self) -> &IndexMap<String, Block> {
        &self.blocks
    }

    /// Appends `link`; links are kept in the order they were added.
    pub fn add_link(&mut self, link: Link) {
        self.links.push(link);
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }
}
