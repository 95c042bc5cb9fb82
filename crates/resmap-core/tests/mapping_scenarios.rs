use resmap::attrs;
use resmap::core::forcefield::ForceField;
use resmap::core::mapping::{Correspondence, Mapping, MappingCatalog, MappingKind};
use resmap::core::models::block::Block;
use resmap::core::models::ids::NodeId;
use resmap::core::models::molecule::Molecule;
use resmap::core::models::value::{LinkPredicate, ParticleAttributes, Value};
use resmap::engine::config::MappingConfig;
use resmap::workflows::map::do_mapping;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

fn force_fields() -> (Arc<ForceField>, Arc<ForceField>) {
    (
        Arc::new(ForceField::new("universal")),
        Arc::new(ForceField::new("martini")),
    )
}

fn all_ids(molecule: &Molecule) -> BTreeSet<NodeId> {
    molecule.node_ids().collect()
}

/// A chain of `length` identical particles in one residue.
fn uniform_chain(force_field: &Arc<ForceField>, length: usize) -> Molecule {
    let mut molecule = Molecule::with_force_field(Arc::clone(force_field));
    for _ in 0..length {
        let id = molecule
            .add_atom(attrs! { "atomname" => "X", "resname" => "CHN", "resid" => 1, "element" => "C" })
            .unwrap();
        if id > 0 {
            molecule.add_edge(id - 1, id).unwrap();
        }
    }
    molecule
}

/// A three-particle linear template mapped one-to-one onto three beads, plus
/// `spawned` beads no particle maps onto.
fn linear_template(to_ff: &Arc<ForceField>, spawned: usize) -> Mapping {
    let mut from = Molecule::new();
    for _ in 0..3 {
        from.add_atom(attrs! { "atomname" => "X", "resname" => "CHN", "resid" => 1 })
            .unwrap();
    }
    from.add_edge(0, 1).unwrap();
    from.add_edge(1, 2).unwrap();

    let mut to = Molecule::with_force_field(Arc::clone(to_ff));
    for name in ["P", "Q", "R"] {
        to.add_atom(attrs! { "atomname" => name, "resname" => "CHN", "resid" => 1 })
            .unwrap();
    }
    to.add_edge(0, 1).unwrap();
    to.add_edge(1, 2).unwrap();
    for index in 0..spawned {
        let id = to
            .add_atom(attrs! { "atomname" => format!("D{index}"), "resname" => "CHN", "resid" => 1 })
            .unwrap();
        to.add_edge(1, id).unwrap();
    }

    let mapping: Correspondence = (0..3).map(|id| (id, BTreeMap::from([(id, 1.0)]))).collect();
    Mapping::new(
        MappingKind::Block,
        "CHN",
        vec!["CHN".to_string()],
        from,
        to,
        mapping,
        BTreeMap::new(),
    )
    .unwrap()
}

#[test]
fn overlapping_linear_template_on_four_chain() {
    let (from_ff, to_ff) = force_fields();
    let molecule = uniform_chain(&from_ff, 4);
    let mut catalog = MappingCatalog::new();
    catalog.insert("universal", "martini", linear_template(&to_ff, 0));

    let outcome = do_mapping(&molecule, &catalog, &to_ff, &MappingConfig::default()).unwrap();

    let output = &outcome.molecule;
    assert_eq!(output.len(), 6);
    assert_eq!(outcome.report.overlapping_atoms, BTreeSet::from([1, 2]));
    for shared in [1, 2] {
        let weights = output
            .nodes()
            .filter_map(|(_, node)| node.get("mapping_weights").and_then(Value::as_weights))
            .filter(|weights| weights.contains_key(&shared))
            .count();
        assert_eq!(weights, 2, "particle {shared} should feed one bead per match");
    }
    assert!(output.is_connected_subset(&all_ids(output)));
    assert!(outcome.report.uncovered_atoms.is_empty());
}

#[test]
fn overlap_and_none_to_one_outputs_are_disjoint() {
    let (from_ff, to_ff) = force_fields();
    let molecule = uniform_chain(&from_ff, 4);
    let mut catalog = MappingCatalog::new();
    catalog.insert("universal", "martini", linear_template(&to_ff, 1));

    let outcome = do_mapping(&molecule, &catalog, &to_ff, &MappingConfig::default()).unwrap();

    let report = &outcome.report;
    assert_eq!(report.none_to_one.len(), 2);
    assert!(!report.overlapping_outputs.is_empty());
    assert!(report.overlapping_outputs.is_disjoint(&report.none_to_one));
    for dummy in &report.none_to_one {
        let name = outcome.molecule.node(*dummy).and_then(|node| node.atom_name());
        assert!(name.is_some_and(|name| name.starts_with('D')));
    }
    // Dummies keep their template edge but are never bonded across fragments.
    for &dummy in &report.none_to_one {
        assert_eq!(outcome.molecule.degree(dummy), 1);
    }
}

struct Residue<'a> {
    name: &'a str,
    atoms: &'a [(&'a str, &'a str)],
    bonds: &'a [(&'a str, &'a str)],
}

const GLY: Residue<'static> = Residue {
    name: "GLY",
    atoms: &[("N", "N"), ("CA", "C"), ("C", "C"), ("O", "O")],
    bonds: &[("N", "CA"), ("CA", "C"), ("C", "O")],
};

const SER: Residue<'static> = Residue {
    name: "SER",
    atoms: &[("N", "N"), ("CA", "C"), ("C", "C"), ("O", "O"), ("CB", "C"), ("OG", "O")],
    bonds: &[("N", "CA"), ("CA", "C"), ("C", "O"), ("CA", "CB"), ("CB", "OG")],
};

fn block_of(residue: &Residue<'_>) -> Block {
    let mut block = Block::new(residue.name);
    for (name, element) in residue.atoms {
        block
            .add_atom(attrs! { "atomname" => *name, "element" => *element })
            .unwrap();
    }
    for (a, b) in residue.bonds {
        block.add_interaction("bonds", vec![a.to_string(), b.to_string()], vec![], Default::default());
    }
    block.make_edges_from_interactions();
    block
}

fn bead_block(name: &str, beads: &[&str]) -> Block {
    let mut block = Block::new(name);
    for bead in beads {
        block.add_atom(attrs! { "atomname" => *bead }).unwrap();
    }
    for pair in beads.windows(2) {
        block.add_interaction("bonds", vec![pair[0].to_string(), pair[1].to_string()], vec![], Default::default());
    }
    block.make_edges_from_interactions();
    block
}

/// Appends the atoms of `residue` and bonds its first atom to `previous`, returning the
/// ids by atom name.
fn append_residue(
    molecule: &mut Molecule,
    residue: &Residue<'_>,
    resid: i64,
    previous: Option<NodeId>,
) -> BTreeMap<String, NodeId> {
    let mut ids = BTreeMap::new();
    for (name, element) in residue.atoms {
        let id = molecule
            .add_atom(attrs! {
                "atomname" => *name,
                "element" => *element,
                "resname" => residue.name,
                "resid" => resid,
                "chain" => "A",
            })
            .unwrap();
        ids.insert(name.to_string(), id);
    }
    for (a, b) in residue.bonds {
        molecule.add_edge(ids[*a], ids[*b]).unwrap();
    }
    if let Some(previous) = previous {
        molecule.add_edge(previous, ids["N"]).unwrap();
    }
    ids
}

/// Tags `og` and a new phosphate bonded to it with the `phospho` modification.
fn phosphorylate(molecule: &mut Molecule, og: NodeId) -> [NodeId; 2] {
    let phospho = Value::from(vec!["phospho"]);
    let residue = molecule.node(og).unwrap().clone();
    molecule
        .node_mut(og)
        .unwrap()
        .insert("modifications".into(), phospho.clone());
    let mut extra = |name: &str, element: &str| {
        let mut attributes = residue.clone();
        attributes.extend(attrs! {
            "atomname" => name, "element" => element, "modifications" => phospho.clone(),
        });
        molecule.add_atom(attributes).unwrap()
    };
    let p = extra("P", "P");
    let o1p = extra("O1P", "O");
    molecule.add_edge(og, p).unwrap();
    molecule.add_edge(p, o1p).unwrap();
    [p, o1p]
}

/// Glycine followed by a phosphorylated serine, the phosphate tagged as a modification.
fn phosphoserine_peptide(force_field: &Arc<ForceField>) -> (Molecule, Vec<NodeId>) {
    let mut molecule = Molecule::with_force_field(Arc::clone(force_field));
    let gly = append_residue(&mut molecule, &GLY, 1, None);
    let ser = append_residue(&mut molecule, &SER, 2, Some(gly["C"]));
    let [p, o1p] = phosphorylate(&mut molecule, ser["OG"]);
    (molecule, vec![ser["OG"], p, o1p])
}

fn peptide_catalog(to_ff: &Arc<ForceField>) -> MappingCatalog {
    let mut catalog = MappingCatalog::new();
    let gly = Mapping::from_blocks(
        &block_of(&GLY),
        &bead_block("GLY", &["BB"]),
        Some(Arc::clone(to_ff)),
        &[("N", "BB"), ("CA", "BB"), ("C", "BB"), ("O", "BB")],
    )
    .unwrap();
    let ser = Mapping::from_blocks(
        &block_of(&SER),
        &bead_block("SER", &["BB", "SC1"]),
        Some(Arc::clone(to_ff)),
        &[("N", "BB"), ("CA", "BB"), ("C", "BB"), ("O", "BB"), ("CB", "SC1"), ("OG", "SC1")],
    )
    .unwrap();
    catalog.insert("universal", "martini", gly);
    catalog.insert("universal", "martini", ser);
    catalog
}

fn phospho_template(to_ff: &Arc<ForceField>) -> Mapping {
    let mut from = Molecule::new();
    for name in ["OG", "P", "O1P"] {
        from.add_atom(attrs! { "atomname" => name, "resname" => "" }).unwrap();
    }
    from.add_edge(0, 1).unwrap();
    from.add_edge(1, 2).unwrap();

    let mut to = Molecule::with_force_field(Arc::clone(to_ff));
    to.add_atom(attrs! { "atomname" => "SC1" }).unwrap();
    to.add_atom(attrs! { "atomname" => "PO4", "resname" => "SER", "PTM_atom" => true })
        .unwrap();
    to.add_edge(0, 1).unwrap();
    to.add_interaction("bonds", vec![0, 1], vec!["1".into(), "0.40".into()], Default::default())
        .unwrap();

    Mapping::modification(
        vec!["phospho".to_string()],
        from,
        to,
        Correspondence::from([
            (0, BTreeMap::from([(0, 1.0)])),
            (1, BTreeMap::from([(1, 1.0)])),
            (2, BTreeMap::from([(1, 1.0)])),
        ]),
    )
    .unwrap()
}

#[test]
fn uncovered_modification_falls_through_to_one_to_none() {
    let (from_ff, to_ff) = force_fields();
    let (molecule, tagged) = phosphoserine_peptide(&from_ff);
    let catalog = peptide_catalog(&to_ff);

    let outcome = do_mapping(&molecule, &catalog, &to_ff, &MappingConfig::default()).unwrap();

    let report = &outcome.report;
    assert_eq!(report.uncovered_modifications, vec![vec!["phospho".to_string()]]);
    let one_to_none = report.one_to_none();
    assert!(one_to_none.contains(&tagged[1]));
    assert!(one_to_none.contains(&tagged[2]));
    assert_eq!(one_to_none.len(), 2);

    let names: Vec<&str> = outcome
        .molecule
        .nodes()
        .filter_map(|(_, node)| node.atom_name())
        .collect();
    assert_eq!(names, vec!["BB", "BB", "SC1"]);
    assert!(outcome.molecule.has_edge(0, 1));
    assert!(outcome.molecule.has_edge(1, 2));
}

#[test]
fn covered_modification_adds_flagged_beads() {
    let (from_ff, to_ff) = force_fields();
    let (molecule, tagged) = phosphoserine_peptide(&from_ff);
    let mut catalog = peptide_catalog(&to_ff);
    catalog.insert("universal", "martini", phospho_template(&to_ff));

    let outcome = do_mapping(&molecule, &catalog, &to_ff, &MappingConfig::default()).unwrap();

    let report = &outcome.report;
    assert!(report.uncovered_modifications.is_empty());
    assert!(report.overlapping_modifications.is_empty());
    assert!(report.one_to_none().is_empty());

    let output = &outcome.molecule;
    assert_eq!(output.len(), 4);
    let po4 = output
        .nodes()
        .find(|(_, node)| node.atom_name() == Some("PO4"))
        .map(|(id, _)| id)
        .unwrap();
    let sc1 = output
        .nodes()
        .find(|(_, node)| node.atom_name() == Some("SC1"))
        .map(|(id, _)| id)
        .unwrap();
    assert!(output.has_edge(sc1, po4));
    assert!(output.get_interactions("bonds").iter().any(|bond| bond.atoms == vec![sc1, po4]));

    let weights = output.node(po4).and_then(|node| node.get("mapping_weights")).and_then(Value::as_weights);
    assert_eq!(
        weights.map(|weights| weights.keys().copied().collect::<Vec<_>>()),
        Some(vec![tagged[1], tagged[2]])
    );
}

#[test]
fn identity_mapping_reproduces_the_molecule() {
    let martini = Arc::new(ForceField::new("martini"));
    let gly = bead_block("GLY", &["BB"]);
    let ser = bead_block("SER", &["BB", "SC1"]);

    let mut molecule = Molecule::with_force_field(Arc::clone(&martini));
    for block in [&gly, &ser, &gly] {
        let mut fragment = block.to_molecule(0, 1, 0).unwrap();
        fragment.set_force_field(Some(Arc::clone(&martini)));
        molecule.merge_molecule(&fragment).unwrap();
    }
    let backbone: Vec<NodeId> = molecule
        .nodes()
        .filter(|(_, node)| node.atom_name() == Some("BB"))
        .map(|(id, _)| id)
        .collect();
    for pair in backbone.windows(2) {
        molecule.add_edge(pair[0], pair[1]).unwrap();
    }

    let mut catalog = MappingCatalog::new();
    for block in [&gly, &ser] {
        catalog.insert("martini", "martini", Mapping::identity(block, Some(Arc::clone(&martini))).unwrap());
    }

    let outcome = do_mapping(&molecule, &catalog, &martini, &MappingConfig::default()).unwrap();

    let output = &outcome.molecule;
    assert!(output.share_moltype_with(&molecule));
    assert_eq!(output.edge_count(), molecule.edge_count());
    for (kind, interactions) in molecule.interactions() {
        assert_eq!(output.interaction_count(kind), interactions.len(), "{kind}");
    }
    assert!(outcome.report.is_clean());
}

#[test]
fn residues_after_a_modification_keep_increasing() {
    let (from_ff, to_ff) = force_fields();
    let mut molecule = Molecule::with_force_field(Arc::clone(&from_ff));
    let ser = append_residue(&mut molecule, &SER, 1, None);
    phosphorylate(&mut molecule, ser["OG"]);
    append_residue(&mut molecule, &GLY, 2, Some(ser["C"]));
    let mut catalog = peptide_catalog(&to_ff);
    catalog.insert("universal", "martini", phospho_template(&to_ff));

    let outcome = do_mapping(&molecule, &catalog, &to_ff, &MappingConfig::default()).unwrap();

    let beads: Vec<(&str, Option<i64>)> = outcome
        .molecule
        .nodes()
        .map(|(_, node)| (node.atom_name().unwrap(), node.resid()))
        .collect();
    let [(_, serine), (_, side_chain), (_, phosphate), (_, glycine)] = beads[..] else {
        panic!("unexpected beads {beads:?}");
    };
    assert_eq!(
        beads.iter().map(|(name, _)| *name).collect::<Vec<_>>(),
        vec!["BB", "SC1", "PO4", "BB"]
    );
    assert_eq!(side_chain, serine);
    assert_eq!(phosphate, serine);
    assert!(glycine > serine, "{glycine:?} should follow {serine:?}");
}

#[test]
fn split_particle_without_bond_is_reported_disconnected() {
    let (from_ff, to_ff) = force_fields();
    let mut molecule = Molecule::with_force_field(Arc::clone(&from_ff));
    molecule
        .add_atom(attrs! { "atomname" => "X", "resname" => "ION", "resid" => 1 })
        .unwrap();

    let mut from = Molecule::new();
    from.add_atom(attrs! { "atomname" => "X", "resname" => "ION" }).unwrap();
    let mut to = Molecule::with_force_field(Arc::clone(&to_ff));
    to.add_atom(attrs! { "atomname" => "P" }).unwrap();
    to.add_atom(attrs! { "atomname" => "Q" }).unwrap();
    let split = Mapping::new(
        MappingKind::Block,
        "ION",
        vec!["ION".to_string()],
        from,
        to,
        Correspondence::from([(0, BTreeMap::from([(0, 0.5), (1, 0.5)]))]),
        BTreeMap::new(),
    )
    .unwrap();
    let mut catalog = MappingCatalog::new();
    catalog.insert("universal", "martini", split);

    let outcome = do_mapping(&molecule, &catalog, &to_ff, &MappingConfig::default()).unwrap();

    assert_eq!(outcome.molecule.len(), 2);
    assert_eq!(
        outcome.report.disconnected,
        BTreeMap::from([(0, BTreeSet::from([0, 1]))])
    );
    assert!(!outcome.report.is_clean());
}

#[test]
fn interaction_set_by_two_modifications_is_reported() {
    let (from_ff, to_ff) = force_fields();
    let oxidized = Value::from(vec!["ox"]);
    let mut molecule = Molecule::with_force_field(Arc::clone(&from_ff));
    for name in ["A", "B", "C"] {
        let mut attributes = attrs! { "atomname" => name, "resname" => "RES", "resid" => 1 };
        if name != "B" {
            attributes.insert("modifications".into(), oxidized.clone());
        }
        let id = molecule.add_atom(attributes).unwrap();
        if id > 0 {
            molecule.add_edge(id - 1, id).unwrap();
        }
    }

    let mut from = Molecule::new();
    for name in ["A", "B", "C"] {
        from.add_atom(attrs! { "atomname" => name, "resname" => "RES" }).unwrap();
    }
    from.add_edge(0, 1).unwrap();
    from.add_edge(1, 2).unwrap();
    let mut to = Molecule::with_force_field(Arc::clone(&to_ff));
    to.add_atom(attrs! { "atomname" => "BB" }).unwrap();
    to.add_atom(attrs! { "atomname" => "SC1" }).unwrap();
    to.add_edge(0, 1).unwrap();
    let halves = BTreeMap::from([(0, 0.5), (1, 0.5)]);
    let residue = Mapping::new(
        MappingKind::Block,
        "RES",
        vec!["RES".to_string()],
        from,
        to,
        Correspondence::from([
            (0, halves.clone()),
            (1, BTreeMap::from([(0, 1.0)])),
            (2, halves),
        ]),
        BTreeMap::new(),
    )
    .unwrap();

    // Either tagged end of the residue is an oxidation site.
    let mut site = Molecule::new();
    site.add_atom(attrs! { "atomname" => "A", "resname" => "" }).unwrap();
    site.node_mut(0).unwrap().insert(
        "atomname".into(),
        Value::from(LinkPredicate::Choice(vec![Value::from("A"), Value::from("C")])),
    );
    let mut bond = Molecule::new();
    bond.add_atom(attrs! { "atomname" => "BB" }).unwrap();
    bond.add_atom(attrs! { "atomname" => "SC1" }).unwrap();
    bond.add_interaction("bonds", vec![0, 1], vec!["1".into(), "0.3".into()], Default::default())
        .unwrap();
    let oxidation = Mapping::modification(
        vec!["ox".to_string()],
        site,
        bond,
        Correspondence::from([(0, BTreeMap::from([(0, 1.0), (1, 1.0)]))]),
    )
    .unwrap();

    let mut catalog = MappingCatalog::new();
    catalog.insert("universal", "martini", residue);
    catalog.insert("universal", "martini", oxidation);

    let outcome = do_mapping(&molecule, &catalog, &to_ff, &MappingConfig::default()).unwrap();

    assert_eq!(outcome.molecule.len(), 2);
    assert_eq!(outcome.report.multiply_modified, vec![("bonds".to_string(), vec![0, 1])]);
    assert!(outcome.report.uncovered_modifications.is_empty());
    assert_eq!(outcome.molecule.interaction_count("bonds"), 2);
}
