//! Discovery of template occurrences in a molecule.
//!
//! Block templates are matched on atom names and residue boundaries. Modification
//! templates are only searched for when the molecule carries modification tags, and
//! only the combination of templates that exactly covers those tags is used.

use super::diagnostics::{Category, MappingReport};
use super::error::EngineError;
use crate::core::graph::EdgeEnds;
use crate::core::mapping::{Mapping, MappingKind, MappingMatch};
use crate::core::matching::attributes_match;
use crate::core::models::ids::NodeId;
use crate::core::models::molecule::Molecule;
use crate::core::models::value::{Attributes, ParticleAttributes, Value, keys};
use crate::core::utils::identifiers::match_ignored_keys;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Compares a molecule particle with a template particle, ignoring bookkeeping
/// attributes such as charges and residue ids.
pub fn node_match(molecule: &Attributes, template: &Attributes) -> bool {
    attributes_match(molecule, template, &match_ignored_keys())
}

/// Like [`node_match`], but atom names are taken from `_old_atomname` when set.
///
/// A template particle without any name accepts every atom name.
pub fn block_node_match(molecule: &Attributes, template: &Attributes) -> bool {
    let name_of = |attributes: &Attributes| {
        attributes
            .get(keys::OLD_ATOM_NAME)
            .or_else(|| attributes.get(keys::ATOM_NAME))
            .cloned()
    };
    let names_match = match (name_of(molecule), name_of(template)) {
        (_, None) => true,
        (name, Some(Value::Predicate(predicate))) => predicate.matches_value(name.as_ref()),
        (name, Some(expected)) => name.as_ref() == Some(&expected),
    };
    if !names_match {
        return false;
    }
    let mut ignored = match_ignored_keys();
    ignored.push(keys::ATOM_NAME);
    attributes_match(molecule, template, &ignored)
}

/// Two edges match when both or neither of them cross a residue boundary.
pub fn block_edge_match(molecule: EdgeEnds<'_>, template: EdgeEnds<'_>) -> bool {
    let same_residue = |(a, b): EdgeEnds<'_>| a.get(keys::RESID) == b.get(keys::RESID);
    same_residue(molecule) == same_residue(template)
}

/// Matcher for modification templates.
///
/// An empty template residue name and a false `PTM_atom` flag are not constraints.
pub fn ptm_node_match(molecule: &Attributes, template: &Attributes) -> bool {
    let loose_resname = template
        .get(keys::RESNAME)
        .is_some_and(|resname| resname.is_null() || resname.as_str() == Some(""));
    let loose_ptm = template
        .get(keys::PTM_ATOM)
        .is_some_and(|flag| !is_truthy(flag));
    if !loose_resname && !loose_ptm {
        return node_match(molecule, template);
    }
    let mut template = template.clone();
    if loose_resname {
        template.remove(keys::RESNAME);
    }
    if loose_ptm {
        template.remove(keys::PTM_ATOM);
    }
    node_match(molecule, &template)
}

pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(x) => *x != 0.0,
        Value::Str(s) => !s.is_empty(),
        Value::List(items) => !items.is_empty(),
        Value::Map(map) => !map.is_empty(),
        Value::Weights(weights) => !weights.is_empty(),
        Value::Graph(graph) => !graph.is_empty(),
        Value::Position(_) | Value::Predicate(_) => true,
    }
}

/// Every occurrence of every block template in `molecule`, in template order.
pub fn find_block_matches<'a>(
    molecule: &Molecule,
    mappings: impl IntoIterator<Item = &'a Mapping>,
) -> Vec<MappingMatch<'a>> {
    mappings
        .into_iter()
        .filter(|mapping| mapping.kind() == MappingKind::Block)
        .flat_map(|mapping| {
            let matches = mapping.map(molecule, block_node_match, block_edge_match);
            debug!(mapping = mapping.name(), count = matches.len(), "Block template matched.");
            matches
        })
        .collect()
}

/// A connected group of modified particles and the modifications they carry.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifiedRegion {
    pub atoms: BTreeSet<NodeId>,
    pub modifications: Vec<String>,
}

/// Groups tagged particles into connected regions.
///
/// # Errors
///
/// Returns [`EngineError::InconsistentModifications`] when the particles of a region
/// do not all carry the same list of modifications.
pub fn modified_regions(molecule: &Molecule) -> Result<Vec<ModifiedRegion>, EngineError> {
    let modified: BTreeSet<NodeId> = molecule
        .nodes()
        .filter(|(_, attributes)| !attributes.modification_names().is_empty())
        .map(|(id, _)| id)
        .collect();

    molecule
        .connected_components(&modified)
        .into_iter()
        .map(|component| {
            let mut tags = component
                .iter()
                .filter_map(|&id| molecule.node(id))
                .map(ParticleAttributes::modification_names);
            let modifications = tags.next().unwrap_or_default();
            if tags.any(|other| other != modifications) {
                return Err(EngineError::InconsistentModifications { atoms: component });
            }
            Ok(ModifiedRegion {
                atoms: component.into_iter().collect(),
                modifications,
            })
        })
        .collect()
}

/// Exact multiset cover of `to_cover` by `options`.
///
/// Options are tried in the given order and each may be used several times. The
/// returned indices refer to `options`. Empty options never contribute.
pub fn cover(to_cover: &[String], options: &[&[String]]) -> Option<Vec<usize>> {
    fn search(left: &[String], options: &[&[String]], start: usize) -> Option<Vec<usize>> {
        if left.is_empty() {
            return Some(Vec::new());
        }
        for (index, option) in options.iter().enumerate().skip(start) {
            if option.is_empty() {
                continue;
            }
            let Some(rest) = take_all(left, option) else {
                continue;
            };
            if let Some(mut found) = search(&rest, options, index) {
                found.insert(0, index);
                return Some(found);
            }
        }
        None
    }
    search(to_cover, options, 0)
}

/// `items` without one occurrence of every element of `taken`, if all are present.
fn take_all(items: &[String], taken: &[String]) -> Option<Vec<String>> {
    let mut left = items.to_vec();
    for item in taken {
        let position = left.iter().position(|candidate| candidate == item)?;
        left.remove(position);
    }
    Some(left)
}

/// Occurrences of the modification templates needed to explain the modification tags
/// of `molecule`.
///
/// Tag groups that no combination of templates covers are logged and recorded in
/// `report`. Templates covering more modifications are applied first and a match is
/// only kept when it touches a modified particle not explained by an earlier match.
pub fn modification_matches<'a>(
    molecule: &Molecule,
    mappings: impl IntoIterator<Item = &'a Mapping>,
    report: &mut MappingReport,
) -> Result<Vec<MappingMatch<'a>>, EngineError> {
    let regions = modified_regions(molecule)?;
    if regions.is_empty() {
        return Ok(Vec::new());
    }

    let mut known: Vec<&Mapping> = mappings
        .into_iter()
        .filter(|mapping| mapping.kind() == MappingKind::Modification)
        .collect();
    known.sort_by(|a, b| {
        b.names()
            .len()
            .cmp(&a.names().len())
            .then_with(|| a.names().cmp(b.names()))
    });
    let options: Vec<&[String]> = known.iter().map(|mapping| mapping.names()).collect();

    let groups: BTreeSet<&Vec<String>> = regions.iter().map(|region| &region.modifications).collect();
    let mut needed = BTreeSet::new();
    for group in groups {
        match cover(group, &options) {
            Some(indices) => needed.extend(indices),
            None => {
                let known_names: Vec<&str> = known.iter().map(|mapping| mapping.name()).collect();
                warn!(
                    category = %Category::General,
                    modifications = ?group,
                    known = ?known_names,
                    "Can't find modification mappings for these modifications."
                );
                report.uncovered_modifications.push(group.clone());
            }
        }
    }

    let mut remaining: BTreeSet<NodeId> = regions.into_iter().flat_map(|region| region.atoms).collect();
    let mut matches = Vec::new();
    // `needed` is ordered by index, which follows the largest-first order of `known`.
    for index in needed {
        let mapping = known[index];
        for found in mapping.map(molecule, ptm_node_match, |_, _| true) {
            let atoms = found.atoms();
            if atoms.is_disjoint(&remaining) {
                continue;
            }
            if !atoms.is_subset(&remaining) {
                warn!(
                    category = %Category::InconsistentData,
                    modification = mapping.name(),
                    "Overlapping modification mappings."
                );
                report.overlapping_modifications.push(mapping.name().to_string());
            }
            remaining.retain(|atom| !atoms.contains(atom));
            matches.push(found);
        }
    }
    Ok(matches)
}

/// Sorts matches by the lowest molecule particle they cover.
pub fn sort_by_lowest_atom(matches: &mut [MappingMatch<'_>]) {
    matches.sort_by_key(|found| found.lowest_atom());
}

/// Molecule particles covered by at least two of `matches`.
pub fn multiply_covered(matches: &[MappingMatch<'_>]) -> BTreeSet<NodeId> {
    let mut counts: BTreeMap<NodeId, usize> = BTreeMap::new();
    for atom in matches.iter().flat_map(|found| found.mol_to_block.keys()) {
        *counts.entry(*atom).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|&(_, count)| count > 1)
        .map(|(atom, _)| atom)
        .collect()
}
