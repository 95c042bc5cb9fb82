//! # Graph Algorithms
//!
//! Thin adapters between [`Molecule`] and `petgraph`. The molecule is projected onto an
//! undirected `petgraph` graph whose node weights are particle identifiers, so the
//! attribute predicates can look the particles up in the source molecule.

use crate::core::models::ids::NodeId;
use crate::core::models::molecule::Molecule;
use crate::core::models::value::Attributes;
use petgraph::algo::subgraph_isomorphisms_iter;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use std::collections::{BTreeMap, BTreeSet};

/// The attributes of both endpoints of an edge, in no particular order.
pub type EdgeEnds<'a> = (&'a Attributes, &'a Attributes);

/// A correspondence from pattern particle identifiers to target particle identifiers.
pub type Isomorphism = BTreeMap<NodeId, NodeId>;

fn to_petgraph(molecule: &Molecule) -> UnGraph<NodeId, (NodeId, NodeId)> {
    let mut graph = UnGraph::with_capacity(molecule.len(), molecule.edge_count());
    let mut indices = BTreeMap::new();
    for id in molecule.node_ids() {
        indices.insert(id, graph.add_node(id));
    }
    for (a, b) in molecule.edges() {
        if let (Some(&ia), Some(&ib)) = (indices.get(&a), indices.get(&b)) {
            graph.add_edge(ia, ib, (a, b));
        }
    }
    graph
}

fn edge_ends(molecule: &Molecule, (a, b): (NodeId, NodeId)) -> Option<EdgeEnds<'_>> {
    Some((molecule.node(a)?, molecule.node(b)?))
}

/// Finds every embedding of `pattern` into `target`.
///
/// `node_match` receives the attributes of the target particle first and those of the
/// pattern particle second. `edge_match` receives the endpoint attributes of the target
/// edge and of the pattern edge, in the same order.
pub fn subgraph_isomorphisms<NM, EM>(
    pattern: &Molecule,
    target: &Molecule,
    mut node_match: NM,
    mut edge_match: EM,
) -> Vec<Isomorphism>
where
    NM: FnMut(&Attributes, &Attributes) -> bool,
    EM: FnMut(EdgeEnds<'_>, EdgeEnds<'_>) -> bool,
{
    if pattern.is_empty() || pattern.len() > target.len() {
        return Vec::new();
    }
    let pattern_graph = to_petgraph(pattern);
    let target_graph = to_petgraph(target);

    let mut nodes = |p: &NodeId, t: &NodeId| match (pattern.node(*p), target.node(*t)) {
        (Some(p), Some(t)) => node_match(t, p),
        _ => false,
    };
    let mut edges = |p: &(NodeId, NodeId), t: &(NodeId, NodeId)| {
        match (edge_ends(pattern, *p), edge_ends(target, *t)) {
            (Some(p), Some(t)) => edge_match(t, p),
            _ => false,
        }
    };

    let (pattern_ref, target_ref) = (&pattern_graph, &target_graph);
    subgraph_isomorphisms_iter(&pattern_ref, &target_ref, &mut nodes, &mut edges)
        .into_iter()
        .flatten()
        .map(|mapping| {
            mapping
                .into_iter()
                .enumerate()
                .filter_map(|(p, t)| {
                    let p = *pattern_graph.node_weight(NodeIndex::new(p))?;
                    let t = *target_graph.node_weight(NodeIndex::new(t))?;
                    Some((p, t))
                })
                .collect()
        })
        .collect()
}

/// Connected components of the subgraph of `molecule` induced by `ids`.
///
/// Each component is sorted, and components are ordered by their smallest identifier.
/// Identifiers that are not part of the molecule are ignored.
pub fn connected_components(molecule: &Molecule, ids: &BTreeSet<NodeId>) -> Vec<Vec<NodeId>> {
    let members: Vec<NodeId> = ids.iter().copied().filter(|&id| molecule.contains(id)).collect();
    let positions: BTreeMap<NodeId, usize> = members
        .iter()
        .enumerate()
        .map(|(position, &id)| (id, position))
        .collect();

    let mut sets = UnionFind::<usize>::new(members.len());
    for (&id, &position) in &positions {
        for neighbor in molecule.neighbors(id) {
            if let Some(&other) = positions.get(&neighbor) {
                sets.union(position, other);
            }
        }
    }

    let mut groups: BTreeMap<usize, Vec<NodeId>> = BTreeMap::new();
    for (position, &id) in members.iter().enumerate() {
        groups.entry(sets.find(position)).or_default().push(id);
    }
    let mut components: Vec<Vec<NodeId>> = groups.into_values().collect();
    components.sort_by_key(|component| component.first().copied());
    components
}
