use super::diagnostics::{AttributeConflict, Category, MappingReport};
use super::merge::MergeState;
use crate::core::models::ids::NodeId;
use crate::core::models::molecule::Molecule;
use crate::core::models::value::{Attributes, Value, keys};
use crate::core::utils::identifiers::format_atom;
use std::collections::BTreeSet;
use tracing::warn;

/// The attributes of `node` listed in `keep`, with the overrides of its `replace`
/// attribute applied first.
pub fn kept_attributes(node: &Attributes, keep: &[String]) -> Attributes {
    let overrides = node.get(keys::REPLACE).and_then(Value::as_map);
    keep.iter()
        .filter_map(|key| {
            overrides
                .and_then(|overrides| overrides.get(key))
                .or_else(|| node.get(key))
                .map(|value| (key.clone(), value.clone()))
        })
        .collect()
}

/// Sets the provenance and kept attributes of every mapped output particle.
///
/// Each output particle records the input subgraph it stems from (`graph`) and the
/// weights of its input particles (`mapping_weights`). Kept attributes come from the
/// reference particle when there is one. Otherwise every contributing input particle
/// is consulted in ascending order and the first value wins; disagreeing values are
/// logged and recorded in `report`.
///
/// # Return
///
/// The output particles left without an atom name, which must be removed.
pub fn reconcile_attributes(
    molecule: &Molecule,
    state: &mut MergeState,
    keep: &[String],
    report: &mut MappingReport,
) -> BTreeSet<NodeId> {
    let mut to_remove = BTreeSet::new();
    for (out, weights) in state.table.mapped_outputs() {
        let Some(node) = state.output.node_mut(out) else {
            continue;
        };
        node.insert(
            keys::GRAPH.to_string(),
            Value::Graph(Box::new(molecule.subgraph(weights.keys()))),
        );
        node.insert(keys::MAPPING_WEIGHTS.to_string(), Value::Weights(weights.clone()));

        let reference = state.references.get(&out).and_then(|&mol| molecule.node(mol));
        if let Some(reference) = reference {
            node.extend(kept_attributes(reference, keep));
        } else {
            let inputs: Vec<Attributes> = weights
                .keys()
                .filter_map(|&mol| molecule.node(mol))
                .map(|input| kept_attributes(input, keep))
                .collect();
            for key in keep {
                let values: Vec<&Value> = inputs.iter().filter_map(|input| input.get(key)).collect();
                let Some(&first) = values.first() else {
                    continue;
                };
                if values.iter().any(|&value| value != first) {
                    warn!(
                        category = %Category::InconsistentData,
                        attribute = key.as_str(),
                        atom = format_atom(node),
                        "Input particles disagree on this attribute; the first value is used."
                    );
                    report.attribute_conflicts.push(AttributeConflict {
                        output: out,
                        attribute: key.clone(),
                        values: values.iter().map(|&value| value.clone()).collect(),
                    });
                }
                node.insert(key.clone(), first.clone());
            }
        }

        if node.get(keys::ATOM_NAME).is_none_or(Value::is_null) {
            to_remove.insert(out);
        }
    }
    to_remove
}
