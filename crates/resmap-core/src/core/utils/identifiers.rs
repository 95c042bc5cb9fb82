use crate::core::models::value::{Attributes, ParticleAttributes};
use phf::{Set, phf_set};

static HYDROGEN_ELEMENTS: Set<&'static str> = phf_set! { "H", "D" };

/// Particle attributes that never take part in block recognition.
static MATCH_IGNORED_KEYS: Set<&'static str> = phf_set! {
    "atype", "charge", "charge_group", "resid", "replace", "_old_atomname",
};

pub fn is_hydrogen_element(element: &str) -> bool {
    HYDROGEN_ELEMENTS.contains(element.trim())
}

/// Whether the particle is a hydrogen according to its `element` attribute.
pub fn is_hydrogen(attributes: &Attributes) -> bool {
    attributes.element().is_some_and(is_hydrogen_element)
}

pub fn is_match_ignored_key(key: &str) -> bool {
    MATCH_IGNORED_KEYS.contains(key)
}

/// Keys skipped when comparing molecule particles with block particles.
pub fn match_ignored_keys() -> Vec<&'static str> {
    let mut keys: Vec<&'static str> = MATCH_IGNORED_KEYS.iter().copied().collect();
    keys.sort_unstable();
    keys
}

/// A short human-readable label such as `A-ALA12:CA`.
///
/// Missing parts are left out.
pub fn format_atom(attributes: &Attributes) -> String {
    let mut label = String::new();
    if let Some(chain) = attributes.chain().filter(|chain| !chain.is_empty()) {
        label.push_str(chain);
        label.push('-');
    }
    if let Some(resname) = attributes.resname() {
        label.push_str(resname);
    }
    if let Some(resid) = attributes.resid() {
        label.push_str(&resid.to_string());
    }
    if let Some(name) = attributes.atom_name() {
        if !label.is_empty() {
            label.push(':');
        }
        label.push_str(name);
    }
    label
}
