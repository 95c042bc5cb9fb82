use resmap::attrs;
use resmap::core::forcefield::ForceField;
use resmap::core::models::molecule::{Molecule, MoleculeError};
use resmap::core::models::value::ParticleAttributes;
use std::sync::Arc;

fn fragment(force_field: &Arc<ForceField>, names: &[&str]) -> Molecule {
    let mut molecule = Molecule::with_force_field(Arc::clone(force_field));
    for name in names {
        let id = molecule
            .add_atom(attrs! { "atomname" => *name, "resname" => "RES", "resid" => 1 })
            .unwrap();
        if id > 0 {
            molecule.add_edge(id - 1, id).unwrap();
        }
    }
    if names.len() > 1 {
        molecule
            .add_interaction("bonds", vec![0, 1], vec!["1".into(), "0.3".into()], Default::default())
            .unwrap();
    }
    molecule
}

#[test]
fn merging_shifts_ids_past_the_highest_id() {
    let ff = Arc::new(ForceField::new("martini"));
    for (left, right) in [(1, 1), (2, 3), (4, 1), (3, 5)] {
        let names = ["A", "B", "C", "D", "E"];
        let mut target = fragment(&ff, &names[..left]);
        let other = fragment(&ff, &names[..right]);
        let edges_before = target.edge_count();

        let correspondence = target.merge_molecule(&other).unwrap();

        assert_eq!(target.len(), left + right);
        assert_eq!(target.edge_count(), edges_before + other.edge_count());
        for (old, new) in &correspondence {
            assert_eq!(*new, old + left);
            assert_eq!(
                target.node(*new).and_then(|node| node.atom_name()),
                other.node(*old).and_then(|node| node.atom_name())
            );
        }
        assert_eq!(
            target.interaction_count("bonds"),
            usize::from(left > 1) + usize::from(right > 1)
        );
    }
}

#[test]
fn merged_residues_are_renumbered_after_the_last_one() {
    let ff = Arc::new(ForceField::new("martini"));
    let mut target = Molecule::with_force_field(Arc::clone(&ff));
    for _ in 0..3 {
        target.merge_molecule(&fragment(&ff, &["BB"])).unwrap();
    }
    let resids: Vec<i64> = target.nodes().filter_map(|(_, node)| node.resid()).collect();
    assert_eq!(resids, vec![1, 3, 5]);
}

#[test]
fn incompatible_merges_leave_the_target_untouched() {
    let ff = Arc::new(ForceField::new("martini"));
    let namesake = Arc::new(ForceField::new("martini"));
    let mut target = fragment(&ff, &["A", "B"]);

    let foreign = fragment(&namesake, &["C"]);
    assert!(matches!(
        target.merge_molecule(&foreign),
        Err(MoleculeError::IncompatibleForceField { .. })
    ));

    let mut stricter = fragment(&ff, &["C"]);
    stricter.nrexcl = Some(2);
    assert!(matches!(
        target.merge_molecule(&stricter),
        Err(MoleculeError::IncompatibleNrexcl { .. })
    ));

    assert_eq!(target.len(), 2);
    assert_eq!(target.edge_count(), 1);
}
