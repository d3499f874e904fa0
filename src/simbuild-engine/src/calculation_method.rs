// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Merging calculation methods into the molecules that use them.
//!
//! For every method, in order, output formulas are assigned to the
//! black-box parameters they target and help parameters are created.  The
//! first method to supply a formula wins; any later definition has to be
//! equivalent or the merge fails.

use std::collections::HashSet;

use log::debug;

use crate::blocks::{BuildingBlocks, CalculationMethod, MoleculeBuilder};
use crate::common::Result;
use crate::consistency_err;
use crate::descriptor::{DescriptorCriteria, DescriptorIndex};
use crate::formula::{formulas_are_the_same, Formula};
use crate::keywords::{KeywordReplacer, ReplacementContext};
use crate::mapper::{instantiate_formula, parameter_from};
use crate::model::Model;
use crate::tree::EntityId;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub output_formulas_assigned: usize,
    pub help_parameters_created: usize,
}

struct Merger<'a> {
    model: &'a mut Model,
    ctx: &'a ReplacementContext,
    containers: DescriptorIndex,
    // parameters that were black boxes when the merge started
    black_boxes: HashSet<EntityId>,
    report: MergeReport,
}

pub fn merge_calculation_methods(
    model: &mut Model,
    blocks: &BuildingBlocks,
    ctx: &ReplacementContext,
) -> Result<MergeReport> {
    let containers = DescriptorIndex::containers(&model.tree, model.root);
    let black_boxes = model
        .tree
        .subtree(model.root)
        .into_iter()
        .filter(|id| {
            let entity = &model.tree[*id];
            entity.is_parameter() && entity.formula.as_ref().is_some_and(|f| f.is_black_box())
        })
        .collect();

    let mut merger = Merger {
        model,
        ctx,
        containers,
        black_boxes,
        report: MergeReport::default(),
    };

    for method in blocks.calculation_methods.iter() {
        let molecules = blocks.molecules_using(&method.name);
        merger.assign_output_formulas(method, &molecules)?;
        merger.add_help_parameters(method, &molecules)?;
    }
    Ok(merger.report)
}

impl Merger<'_> {
    fn assign_output_formulas(
        &mut self,
        method: &CalculationMethod,
        molecules: &[&MoleculeBuilder],
    ) -> Result<()> {
        for output in method.output_formulas.iter() {
            let target = &output.target;
            for molecule in molecules {
                let parameters = self.molecule_parameters(
                    &target.container_criteria,
                    &molecule.name,
                    &target.parameter_name,
                )?;
                for parameter in parameters {
                    // overridden on purpose; not ours to touch
                    if !self.black_boxes.contains(&parameter) {
                        continue;
                    }

                    let origin = format!("{}|{}", method.name, target.parameter_name);
                    let unset = self.model.tree[parameter]
                        .formula
                        .as_ref()
                        .is_some_and(|f| f.is_black_box());
                    if unset {
                        self.model.tree[parameter].formula =
                            Some(instantiate_formula(&output.formula, &origin));
                        self.replace_keywords(parameter, &molecule.name);
                        self.report.output_formulas_assigned += 1;
                        debug!(
                            "{}: formula from calculation method '{}'",
                            self.model.tree.absolute_path(parameter),
                            method.name
                        );
                    } else if !self.same_formula(
                        parameter,
                        &output.formula,
                        &origin,
                        &molecule.name,
                    ) {
                        return consistency_err!(
                            TwoDifferentFormulaForSameParameter,
                            format!(
                                "'{}' at {} (calculation method '{}', molecule '{}')",
                                target.parameter_name,
                                self.model.tree.absolute_path(parameter),
                                method.name,
                                molecule.name
                            )
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn add_help_parameters(
        &mut self,
        method: &CalculationMethod,
        molecules: &[&MoleculeBuilder],
    ) -> Result<()> {
        for help in method.help_parameters.iter() {
            let name = &help.parameter.name;
            let origin = format!("{}|{}", method.name, name);
            for molecule in molecules {
                let containers =
                    self.molecule_containers(&help.container_criteria, &molecule.name)?;
                for container in containers {
                    let existing = self
                        .model
                        .tree
                        .child_by_name(container, name)
                        .filter(|id| self.model.tree[*id].is_parameter());
                    match existing {
                        None => {
                            let parameter = self
                                .model
                                .tree
                                .add_child(container, parameter_from(&help.parameter, &origin))?;
                            self.replace_keywords(parameter, &molecule.name);
                            self.report.help_parameters_created += 1;
                        }
                        Some(parameter) => {
                            let same = self.same_formula(
                                parameter,
                                &help.parameter.formula,
                                &origin,
                                &molecule.name,
                            );
                            if !same {
                                return consistency_err!(
                                    HelpParameterAlreadyDefinedWithAnotherFormula,
                                    format!(
                                        "'{}' at {} (calculation method '{}')",
                                        name,
                                        self.model.tree.absolute_path(parameter),
                                        method.name
                                    )
                                );
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// The child container named after `molecule` in every container
    /// matching `criteria`.
    fn molecule_containers(
        &self,
        criteria: &DescriptorCriteria,
        molecule: &str,
    ) -> Result<Vec<EntityId>> {
        let tree = &self.model.tree;
        Ok(self
            .containers
            .all_satisfied_by(criteria)?
            .into_iter()
            .filter_map(|container| tree.child_by_name(container, molecule))
            .filter(|id| tree[*id].is_container())
            .collect())
    }

    fn molecule_parameters(
        &self,
        criteria: &DescriptorCriteria,
        molecule: &str,
        parameter_name: &str,
    ) -> Result<Vec<EntityId>> {
        let tree = &self.model.tree;
        Ok(self
            .molecule_containers(criteria, molecule)?
            .into_iter()
            .filter_map(|container| tree.child_by_name(container, parameter_name))
            .filter(|id| tree[*id].is_parameter())
            .collect())
    }

    fn replace_keywords(&mut self, parameter: EntityId, molecule: &str) {
        let tree = &mut self.model.tree;
        KeywordReplacer::new(self.ctx)
            .molecule(molecule)
            .replace_in(tree, parameter);
        if let Some(neighborhood) = tree.neighborhood_ancestor(parameter) {
            KeywordReplacer::new(self.ctx)
                .neighborhood(tree, neighborhood)
                .replace_in(tree, neighborhood);
        }
    }

    /// Whether `formula`, once mapped and keyword-replaced in place of the
    /// current formula of `parameter`, is equivalent to it.  The current
    /// formula is put back in every case.
    fn same_formula(
        &mut self,
        parameter: EntityId,
        formula: &Formula,
        origin: &str,
        molecule: &str,
    ) -> bool {
        let previous = self.model.tree[parameter].formula.take();
        self.model.tree[parameter].formula = Some(instantiate_formula(formula, origin));
        self.replace_keywords(parameter, molecule);
        let same = formulas_are_the_same(
            self.model.tree[parameter].formula.as_ref(),
            previous.as_ref(),
        );
        self.model.tree[parameter].formula = previous;
        same
    }
}
