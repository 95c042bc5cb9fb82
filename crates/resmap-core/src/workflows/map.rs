use crate::core::forcefield::ForceField;
use crate::core::mapping::{Mapping, MappingCatalog};
use crate::core::models::molecule::Molecule;
use crate::core::models::system::System;
use crate::engine::config::MappingConfig;
use crate::engine::connectivity::connect_matches;
use crate::engine::diagnostics::{self, Category, MappingReport};
use crate::engine::error::EngineError;
use crate::engine::matching::{find_block_matches, modification_matches};
use crate::engine::merge::MergeState;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::reconcile::reconcile_attributes;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A transformed molecule and the diagnostics gathered while building it.
#[derive(Debug, Clone)]
pub struct MappingOutcome {
    pub molecule: Molecule,
    pub report: MappingReport,
}

/// Transforms `molecule` into the force field `to_ff`.
///
/// The templates are taken from `catalog`, for the pair formed by the force field of
/// `molecule` and `to_ff`. Output particles carry the attributes of their template
/// particles, plus the attributes of `config.attribute_keep` copied from the input.
///
/// # Errors
///
/// Fails when the molecule has no force field, when the catalog has no templates for
/// the force field pair, or on the fatal inconsistencies listed in [`EngineError`].
/// Recoverable problems are logged and collected in the returned report instead.
#[instrument(skip_all, name = "do_mapping")]
pub fn do_mapping(
    molecule: &Molecule,
    catalog: &MappingCatalog,
    to_ff: &Arc<ForceField>,
    config: &MappingConfig,
) -> Result<MappingOutcome, EngineError> {
    let from_ff = molecule.force_field().ok_or(EngineError::MissingForceField)?;
    let mappings = catalog
        .get(&from_ff.name, &to_ff.name)
        .ok_or_else(|| EngineError::MissingMappings {
            from: from_ff.name.clone(),
            to: to_ff.name.clone(),
        })?;
    map_with(molecule, mappings, to_ff, config)
}

fn map_with(
    molecule: &Molecule,
    mappings: &IndexMap<String, Mapping>,
    to_ff: &Arc<ForceField>,
    config: &MappingConfig,
) -> Result<MappingOutcome, EngineError> {
    let mut report = MappingReport::default();

    // === Step 1: Find template occurrences ===
    let block_matches = find_block_matches(molecule, mappings.values());
    let mod_matches = modification_matches(molecule, mappings.values(), &mut report)?;
    info!(
        particles = molecule.len(),
        blocks = block_matches.len(),
        modifications = mod_matches.len(),
        "Found template matches."
    );

    // === Step 2: Merge matches into the output molecule ===
    let mut output = Molecule::with_force_field(Arc::clone(to_ff));
    output.meta = molecule.meta.clone();
    let mut state = MergeState::new(output);
    state.apply_matches(block_matches, mod_matches)?;

    // === Step 3: Provenance and kept attributes ===
    let to_remove = reconcile_attributes(molecule, &mut state, &config.attribute_keep, &mut report);

    // === Step 4: Bonds between fragments ===
    connect_matches(molecule, &mut state)?;

    // === Step 5: Sanity checks ===
    report.none_to_one = state.none_to_one.clone();
    diagnostics::check_overlap(molecule, &state.output, &state.table, &state.overlapping, &mut report);
    diagnostics::check_one_to_many(molecule, &state.output, &state.table, &mut report);
    diagnostics::check_uncovered(molecule, &state.table, &mut report);
    diagnostics::check_modified_interactions(&state.applied_interactions, &mut report);

    // === Step 6: Finalize ===
    let mut output = state.output;
    if !to_remove.is_empty() {
        debug!(count = to_remove.len(), "Removing particles without atom name.");
    }
    output.remove_nodes_from(to_remove);
    info!(
        particles = output.len(),
        edges = output.edge_count(),
        clean = report.is_clean(),
        "Molecule mapped."
    );

    Ok(MappingOutcome {
        molecule: output,
        report,
    })
}

/// Transforms every molecule of a system into one target force field.
#[derive(Debug, Clone)]
pub struct DoMapping {
    catalog: Arc<MappingCatalog>,
    to_ff: Arc<ForceField>,
    config: MappingConfig,
}

impl DoMapping {
    pub fn new(catalog: Arc<MappingCatalog>, to_ff: Arc<ForceField>, config: MappingConfig) -> Self {
        Self {
            catalog,
            to_ff,
            config,
        }
    }

    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    pub fn run_molecule(&self, molecule: &Molecule) -> Result<MappingOutcome, EngineError> {
        do_mapping(molecule, &self.catalog, &self.to_ff, &self.config)
    }

    /// Replaces the molecules of `system` with their transformed versions.
    ///
    /// Molecules that transform into nothing are left out. With `delete_unknown` set,
    /// molecules without templates for their force field are left out as well instead
    /// of failing the run. The system force field becomes the target force field.
    ///
    /// # Return
    ///
    /// The report of every molecule kept, in system order.
    #[instrument(skip_all, name = "do_mapping_system")]
    pub fn run_system(
        &self,
        system: &mut System,
        reporter: &ProgressReporter,
    ) -> Result<Vec<MappingReport>, EngineError> {
        let results = reporter.phase("Mapping", || {
            reporter.report(Progress::TaskStart {
                total_steps: system.molecules.len() as u64,
            });

            #[cfg(not(feature = "parallel"))]
            let iterator = system.molecules.iter().enumerate();

            #[cfg(feature = "parallel")]
            let iterator = system.molecules.par_iter().enumerate();

            let results: Vec<Result<Option<MappingOutcome>, EngineError>> = iterator
                .map(|(index, molecule)| {
                    let result = self.map_system_molecule(index, molecule, reporter);
                    reporter.report(Progress::TaskIncrement);
                    result
                })
                .collect();

            reporter.report(Progress::TaskFinish);
            results
        });

        let mut molecules = Vec::with_capacity(results.len());
        let mut reports = Vec::with_capacity(results.len());
        for result in results {
            if let Some(outcome) = result? {
                molecules.push(outcome.molecule);
                reports.push(outcome.report);
            }
        }
        info!(
            kept = molecules.len(),
            dropped = system.molecules.len() - molecules.len(),
            "System mapped."
        );
        system.molecules = molecules;
        system.force_field = Some(Arc::clone(&self.to_ff));
        Ok(reports)
    }

    fn map_system_molecule(
        &self,
        index: usize,
        molecule: &Molecule,
        reporter: &ProgressReporter,
    ) -> Result<Option<MappingOutcome>, EngineError> {
        let outcome = match self.run_molecule(molecule) {
            Ok(outcome) => outcome,
            Err(EngineError::MissingMappings { from, to }) if self.config.delete_unknown => {
                warn!(
                    category = %Category::General,
                    molecule = index,
                    "No mappings from '{}' to '{}'; the molecule is removed from the system.",
                    from,
                    to
                );
                reporter.report(Progress::MoleculeDropped { index });
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        if outcome.molecule.is_empty() {
            debug!(molecule = index, "Molecule mapped to nothing and is removed.");
            reporter.report(Progress::MoleculeDropped { index });
            return Ok(None);
        }
        reporter.report(Progress::MoleculeMapped {
            index,
            particles: outcome.molecule.len(),
        });
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs;
    use crate::core::models::block::Block;
    use crate::core::models::value::Value;
    use crate::engine::config::MappingConfigBuilder;
    use std::sync::Mutex;

    fn glycine() -> Block {
        let mut block = Block::new("GLY");
        for name in ["N", "CA", "C", "O"] {
            block.add_atom(attrs! { "atomname" => name }).unwrap();
        }
        for (a, b) in [("N", "CA"), ("CA", "C"), ("C", "O")] {
            block.add_interaction("bonds", vec![a.into(), b.into()], vec![], Default::default());
        }
        block.make_edges_from_interactions();
        block
    }

    fn bead() -> Block {
        let mut block = Block::new("GLY");
        block.add_atom(attrs! { "atomname" => "BB", "atype" => "P5" }).unwrap();
        block
    }

    struct Setup {
        from_ff: Arc<ForceField>,
        to_ff: Arc<ForceField>,
        catalog: MappingCatalog,
    }

    fn setup() -> Setup {
        let from_ff = Arc::new(ForceField::new("universal"));
        let to_ff = Arc::new(ForceField::new("martini"));
        let mapping = Mapping::from_blocks(
            &glycine(),
            &bead(),
            Some(Arc::clone(&to_ff)),
            &[("N", "BB"), ("CA", "BB"), ("C", "BB"), ("O", "BB")],
        )
        .unwrap();
        let mut catalog = MappingCatalog::new();
        catalog.insert("universal", "martini", mapping);
        Setup {
            from_ff,
            to_ff,
            catalog,
        }
    }

    fn polyglycine(force_field: &Arc<ForceField>, residues: i64) -> Molecule {
        let mut molecule = Molecule::with_force_field(Arc::clone(force_field));
        let mut previous_c = None;
        for resid in 1..=residues {
            let mut ids = Vec::new();
            for (name, element) in [("N", "N"), ("CA", "C"), ("C", "C"), ("O", "O")] {
                ids.push(
                    molecule
                        .add_atom(attrs! {
                            "atomname" => name,
                            "element" => element,
                            "resname" => "GLY",
                            "resid" => resid,
                            "chain" => "A",
                        })
                        .unwrap(),
                );
            }
            for pair in ids.windows(2) {
                molecule.add_edge(pair[0], pair[1]).unwrap();
            }
            if let Some(c) = previous_c {
                molecule.add_edge(c, ids[0]).unwrap();
            }
            previous_c = Some(ids[2]);
        }
        molecule
    }

    #[test]
    fn maps_residues_onto_beads() {
        let Setup {
            from_ff,
            to_ff,
            catalog,
        } = setup();
        let molecule = polyglycine(&from_ff, 3);

        let outcome = do_mapping(&molecule, &catalog, &to_ff, &MappingConfig::default()).unwrap();

        let output = &outcome.molecule;
        assert_eq!(output.len(), 3);
        assert!(output.has_edge(0, 1));
        assert!(output.has_edge(1, 2));
        assert!(!output.has_edge(0, 2));
        assert!(Arc::ptr_eq(output.force_field().unwrap(), &to_ff));
        assert_eq!(output.node(1).unwrap().get("chain"), Some(&Value::from("A")));
        assert_eq!(output.node(1).unwrap().get("atype"), Some(&Value::from("P5")));
        assert!(outcome.report.is_clean());
    }

    #[test]
    fn molecule_without_force_field_is_rejected() {
        let Setup { to_ff, catalog, .. } = setup();
        let result = do_mapping(&Molecule::new(), &catalog, &to_ff, &MappingConfig::default());
        assert!(matches!(result, Err(EngineError::MissingForceField)));
    }

    #[test]
    fn unknown_force_field_pair_is_rejected() {
        let Setup { to_ff, catalog, .. } = setup();
        let other = Arc::new(ForceField::new("amber"));
        let result = do_mapping(&polyglycine(&other, 1), &catalog, &to_ff, &MappingConfig::default());
        assert!(matches!(
            result,
            Err(EngineError::MissingMappings { from, to }) if from == "amber" && to == "martini"
        ));
    }

    #[test]
    fn run_system_drops_unknown_molecules_when_asked() {
        let Setup {
            from_ff,
            to_ff,
            catalog,
        } = setup();
        let other = Arc::new(ForceField::new("amber"));
        let mut system = System::new(Some(Arc::clone(&from_ff)));
        system.add_molecule(polyglycine(&from_ff, 2));
        system.add_molecule(polyglycine(&other, 1));
        system.add_molecule(polyglycine(&from_ff, 1));

        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event: Progress| {
            events.lock().unwrap().push(event);
        }));
        let config = MappingConfigBuilder::new().delete_unknown(true).build();
        let processor = DoMapping::new(Arc::new(catalog), Arc::clone(&to_ff), config);

        let reports = processor.run_system(&mut system, &reporter).unwrap();
        drop(reporter);

        assert_eq!(reports.len(), 2);
        assert_eq!(system.molecules.iter().map(Molecule::len).collect::<Vec<_>>(), vec![2, 1]);
        assert!(Arc::ptr_eq(system.force_field.as_ref().unwrap(), &to_ff));
        let events = events.into_inner().unwrap();
        assert!(events.contains(&Progress::MoleculeDropped { index: 1 }));
        assert_eq!(events.first(), Some(&Progress::PhaseStart { name: "Mapping" }));
        assert_eq!(events.last(), Some(&Progress::PhaseFinish));
    }

    #[test]
    fn run_system_propagates_unknown_molecules_by_default() {
        let Setup { to_ff, catalog, .. } = setup();
        let other = Arc::new(ForceField::new("amber"));
        let mut system = System::new(None);
        system.add_molecule(polyglycine(&other, 1));
        let processor = DoMapping::new(Arc::new(catalog), to_ff, MappingConfig::default());

        let result = processor.run_system(&mut system, &ProgressReporter::new());

        assert!(matches!(result, Err(EngineError::MissingMappings { .. })));
        assert_eq!(system.molecules.len(), 1);
    }
}
