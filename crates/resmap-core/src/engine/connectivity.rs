use super::error::EngineError;
use super::merge::MergeState;
use crate::core::models::ids::NodeId;
use crate::core::models::molecule::Molecule;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Adds output edges for input bonds running between two different merged matches.
///
/// Edges inside a match come from its template. For a bond between particles of two
/// matches, every output particle of one end is bonded to every output particle of the
/// other end. None-to-one particles never get such edges, and self loops are skipped.
pub fn connect_matches(molecule: &Molecule, state: &mut MergeState) -> Result<(), EngineError> {
    let mut matches_of: BTreeMap<NodeId, BTreeSet<usize>> = BTreeMap::new();
    for (index, atoms) in state.processed.iter().enumerate() {
        for &atom in atoms {
            matches_of.entry(atom).or_default().insert(index);
        }
    }

    let mut added = 0;
    for (a, b) in molecule.edges() {
        let (Some(first), Some(second)) = (matches_of.get(&a), matches_of.get(&b)) else {
            continue;
        };
        // There must be two distinct matches, one holding each end.
        let spans_matches = first.len() > 1 || second.len() > 1 || first != second;
        if !spans_matches {
            continue;
        }
        let outs_a = state.table.output_ids_except(a, &state.none_to_one);
        let outs_b = state.table.output_ids_except(b, &state.none_to_one);
        for &out_a in &outs_a {
            for &out_b in outs_b.iter().filter(|&&out_b| out_b != out_a) {
                if !state.output.has_edge(out_a, out_b) {
                    state.output.add_edge(out_a, out_b)?;
                    added += 1;
                }
            }
        }
    }
    debug!(edges = added, "Connected merged fragments.");
    Ok(())
}
