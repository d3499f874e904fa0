// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;

use log::{error, info};

use crate::blocks::BuildingBlocks;
use crate::calculation_method::merge_calculation_methods;
use crate::common::Result;
use crate::dimensions::DimensionLookup;
use crate::dynamic::expand_dynamic_formulas;
use crate::events::create_event_groups;
use crate::keywords::ReplacementContext;
use crate::model::Model;
use crate::model_err;
use crate::observer::create_observers;
use crate::options::BuildOptions;
use crate::origin::check_formula_origin;
use crate::path_expander::expand_dynamic_references;
use crate::reaction::create_reaction;
use crate::transport::create_transports;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConstructionPhase {
    Idle,
    PathsExpanded,
    ReactionsPlaced,
    TransportsPlaced,
    ObserversPlaced,
    EventsPlaced,
    DynamicFormulasExpanded,
    CalculationMethodsMerged,
    OriginConsistencyChecked,
    Done,
    Failed,
}

impl fmt::Display for ConstructionPhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ConstructionPhase::*;
        let name = match self {
            Idle => "idle",
            PathsExpanded => "paths_expanded",
            ReactionsPlaced => "reactions_placed",
            TransportsPlaced => "transports_placed",
            ObserversPlaced => "observers_placed",
            EventsPlaced => "events_placed",
            DynamicFormulasExpanded => "dynamic_formulas_expanded",
            CalculationMethodsMerged => "calculation_methods_merged",
            OriginConsistencyChecked => "origin_consistency_checked",
            Done => "done",
            Failed => "failed",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConstructionReport {
    pub paths_expanded: usize,
    pub reactions_created: usize,
    pub transports_created: usize,
    pub observers_created: usize,
    pub event_groups_created: usize,
    pub dynamic_formulas_expanded: usize,
    pub output_formulas_assigned: usize,
    pub help_parameters_created: usize,
    pub origin_ids_reset: usize,
}

/// One construction pass over a single model.  Everything the phases need
/// is threaded through here; nothing is shared between passes.
pub struct ConstructionPass<'a> {
    model: &'a mut Model,
    blocks: &'a BuildingBlocks,
    options: &'a BuildOptions,
    dims: &'a dyn DimensionLookup,
    phase: ConstructionPhase,
}

impl<'a> ConstructionPass<'a> {
    pub fn new(
        model: &'a mut Model,
        blocks: &'a BuildingBlocks,
        options: &'a BuildOptions,
        dims: &'a dyn DimensionLookup,
    ) -> Self {
        ConstructionPass {
            model,
            blocks,
            options,
            dims,
            phase: ConstructionPhase::Idle,
        }
    }

    pub fn phase(&self) -> ConstructionPhase {
        self.phase
    }

    /// Runs every phase in order.  The first error moves the pass to
    /// `Failed` and is returned; later phases are not attempted.
    pub fn run(&mut self) -> Result<ConstructionReport> {
        if self.phase != ConstructionPhase::Idle {
            return model_err!(
                BadConfiguration,
                format!("construction pass already ran (phase {})", self.phase)
            );
        }
        match self.run_phases() {
            Ok(report) => {
                self.advance(ConstructionPhase::Done);
                Ok(report)
            }
            Err(err) => {
                error!("construction of '{}' failed: {}", self.model.name(), err);
                self.phase = ConstructionPhase::Failed;
                Err(err)
            }
        }
    }

    fn advance(&mut self, phase: ConstructionPhase) {
        info!("{}: {} -> {}", self.model.name(), self.phase, phase);
        self.phase = phase;
    }

    fn run_phases(&mut self) -> Result<ConstructionReport> {
        self.options.validate()?;
        let mut report = ConstructionReport::default();

        report.paths_expanded = expand_dynamic_references(self.model, self.options)?;
        self.advance(ConstructionPhase::PathsExpanded);

        for reaction in self.blocks.reactions.iter() {
            if create_reaction(self.model, reaction)? {
                report.reactions_created += 1;
            }
        }
        self.advance(ConstructionPhase::ReactionsPlaced);

        // reaction properties containers are top containers from here on
        let ctx = ReplacementContext::for_model(self.model);
        report.transports_created = create_transports(self.model, self.blocks, &ctx)?;
        self.advance(ConstructionPhase::TransportsPlaced);

        report.observers_created = create_observers(self.model, self.blocks, &ctx)?;
        self.advance(ConstructionPhase::ObserversPlaced);

        report.event_groups_created = create_event_groups(self.model, self.blocks, &ctx)?;
        self.advance(ConstructionPhase::EventsPlaced);

        report.dynamic_formulas_expanded = expand_dynamic_formulas(self.model, self.dims)?;
        self.advance(ConstructionPhase::DynamicFormulasExpanded);

        let merged = merge_calculation_methods(self.model, self.blocks, &ctx)?;
        report.output_formulas_assigned = merged.output_formulas_assigned;
        report.help_parameters_created = merged.help_parameters_created;
        self.advance(ConstructionPhase::CalculationMethodsMerged);

        report.origin_ids_reset = check_formula_origin(self.model);
        self.advance(ConstructionPhase::OriginConsistencyChecked);

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;
    use crate::dimensions::DimensionRegistry;
    use crate::formula::{ExplicitFormula, Formula};
    use crate::testutils::organism_model;

    #[test]
    fn test_empty_blocks_run_to_done() {
        let mut m = organism_model();
        let blocks = BuildingBlocks::default();
        let options = BuildOptions::default();
        let dims = DimensionRegistry::new_with_builtins();
        let mut pass = ConstructionPass::new(&mut m.model, &blocks, &options, &dims);
        assert_eq!(ConstructionPhase::Idle, pass.phase());
        assert_eq!(ConstructionReport::default(), pass.run().unwrap());
        assert_eq!(ConstructionPhase::Done, pass.phase());

        let err = pass.run().unwrap_err();
        assert_eq!(ErrorCode::BadConfiguration, err.code);
    }

    #[test]
    fn test_failure_moves_to_failed() {
        let mut m = organism_model();
        m.model
            .add_parameter(
                m.liver,
                "P",
                Formula::Explicit(
                    ExplicitFormula::new("X")
                        .with_path("X", "Organism|Liver|NBH|Organism|Lung|NBH"),
                ),
            )
            .unwrap();
        let blocks = BuildingBlocks::default();
        let options = BuildOptions::default();
        let dims = DimensionRegistry::new_with_builtins();
        let mut pass = ConstructionPass::new(&mut m.model, &blocks, &options, &dims);
        let err = pass.run().unwrap_err();
        assert_eq!(ErrorCode::NoNeighborhoodBetween, err.code);
        assert_eq!(ConstructionPhase::Failed, pass.phase());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(
            "calculation_methods_merged",
            ConstructionPhase::CalculationMethodsMerged.to_string()
        );
        assert_eq!("transports_placed", ConstructionPhase::TransportsPlaced.to_string());
    }
}
