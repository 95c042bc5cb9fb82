//! # Pattern Matching Primitives
//!
//! Predicates used by subgraph-isomorphism callbacks and by interaction lookups.

use crate::core::models::interaction::{Interaction, InteractionPattern};
use crate::core::models::molecule::Molecule;
use crate::core::models::value::{Attributes, Value};

/// Whether `attributes` satisfy every constraint of `template`.
///
/// Keys listed in `ignore_keys` are skipped. [`Value::Predicate`] constraints are
/// evaluated with [`LinkPredicate::matches`](crate::core::models::value::LinkPredicate::matches);
/// any other constraint requires an equal value. Keys of `attributes` that the template
/// does not mention are irrelevant.
pub fn attributes_match(attributes: &Attributes, template: &Attributes, ignore_keys: &[&str]) -> bool {
    template
        .iter()
        .filter(|(key, _)| !ignore_keys.contains(&key.as_str()))
        .all(|(key, expected)| match expected {
            Value::Predicate(predicate) => predicate.matches(attributes, key),
            value => attributes.get(key) == Some(value),
        })
}

/// Whether `interaction` of `molecule` is described by `template`.
///
/// The atom tuples must be identical and the parameters identical unless the template
/// leaves them empty. Per-atom constraints of the template, when present, must match
/// the corresponding particles, and the interaction metadata must match the template
/// metadata.
pub fn interaction_match(
    molecule: &Molecule,
    interaction: &Interaction,
    template: &impl InteractionPattern,
) -> bool {
    if interaction.atoms.as_slice() != template.atoms() {
        return false;
    }
    if !template.parameters().is_empty() && template.parameters() != interaction.parameters.as_slice() {
        return false;
    }
    if let Some(constraints) = template.atom_constraints() {
        let atoms_match = interaction
            .atoms
            .iter()
            .zip(constraints)
            .all(|(&atom, constraint)| {
                molecule
                    .node(atom)
                    .is_some_and(|attributes| attributes_match(attributes, constraint, &[]))
            });
        if !atoms_match {
            return false;
        }
    }
    attributes_match(&interaction.meta, template.meta(), &[])
}
