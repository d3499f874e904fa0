// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Placement of event groups with their events and assignments.

use log::debug;

use crate::blocks::{
    BuildingBlocks, EventAssignmentBuilder, EventBuilder, EventGroupBuilder, ParameterBuilder,
};
use crate::common::Result;
use crate::descriptor::DescriptorIndex;
use crate::keywords::{KeywordReplacer, ReplacementContext};
use crate::mapper::{event_assignment_from, event_from, parameter_from};
use crate::model::Model;
use crate::path::keywords;
use crate::tree::{Entity, EntityId, EntityKind, ParameterBuildMode};

/// Creates every event group of `blocks`.  A group with source criteria
/// goes into each spatial container matching them (as the tree was on
/// entry), one without into the model root.  Returns the number of groups
/// created.
pub fn create_event_groups(
    model: &mut Model,
    blocks: &BuildingBlocks,
    ctx: &ReplacementContext,
) -> Result<usize> {
    let index = DescriptorIndex::build(
        &model.tree,
        model
            .tree
            .descendants(model.root)
            .into_iter()
            .filter(|id| matches!(model.tree[*id].kind, EntityKind::Container { .. })),
    );

    let mut created = 0;
    for builder in blocks.event_groups.iter() {
        let containers = if builder.source_criteria.is_empty() {
            vec![model.root]
        } else {
            index.all_satisfied_by(&builder.source_criteria)?
        };
        for container in containers {
            create_event_group(model, blocks, builder, container, ctx)?;
            created += 1;
        }
    }
    Ok(created)
}

fn add_local_parameters(
    model: &mut Model,
    parent: EntityId,
    owner: &str,
    parameters: &[ParameterBuilder],
) -> Result<()> {
    for parameter in parameters
        .iter()
        .filter(|p| p.build_mode == ParameterBuildMode::Local)
    {
        let origin = format!("{}|{}", owner, parameter.name);
        model
            .tree
            .add_child(parent, parameter_from(parameter, &origin))?;
    }
    Ok(())
}

fn create_event_group(
    model: &mut Model,
    blocks: &BuildingBlocks,
    builder: &EventGroupBuilder,
    container: EntityId,
    ctx: &ReplacementContext,
) -> Result<EntityId> {
    let group = model
        .tree
        .add_child(container, Entity::new(&builder.name, EntityKind::EventGroup))?;
    add_local_parameters(model, group, &builder.name, &builder.parameters)?;
    for event in builder.events.iter() {
        create_event(model, blocks, builder, event, group, ctx)?;
    }

    KeywordReplacer::new(ctx).replace_in(&mut model.tree, group);
    debug!(
        "event group '{}' created in {}",
        builder.name,
        model.tree.absolute_path(container)
    );
    Ok(group)
}

fn create_event(
    model: &mut Model,
    blocks: &BuildingBlocks,
    group: &EventGroupBuilder,
    builder: &EventBuilder,
    parent: EntityId,
    ctx: &ReplacementContext,
) -> Result<()> {
    let origin = format!("{}|{}", group.name, builder.name);
    let event = model.tree.add_child(parent, event_from(builder, &origin))?;
    add_local_parameters(model, event, &origin, &builder.parameters)?;

    for assignment in builder.assignments.iter() {
        let origin = format!("{}|{}", origin, assignment.name);
        if assignment
            .object_path
            .contains(keywords::ALL_FLOATING_MOLECULES)
        {
            add_floating_assignments(model, blocks, assignment, event, &origin, ctx)?;
        } else {
            model
                .tree
                .add_child(event, event_assignment_from(assignment, &origin))?;
        }
    }
    Ok(())
}

/// One assignment per floating molecule, named `<assignment>_<molecule>`.
fn add_floating_assignments(
    model: &mut Model,
    blocks: &BuildingBlocks,
    builder: &EventAssignmentBuilder,
    event: EntityId,
    origin: &str,
    ctx: &ReplacementContext,
) -> Result<()> {
    for molecule in blocks.floating_molecules() {
        let mut entity = event_assignment_from(builder, origin);
        entity.name = format!("{}_{}", builder.name, molecule.name);
        let assignment = model.tree.add_child(event, entity)?;
        KeywordReplacer::new(ctx)
            .molecule(&molecule.name)
            .floating_molecule(&molecule.name)
            .replace_in(&mut model.tree, assignment);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::MoleculeBuilder;
    use crate::descriptor::DescriptorCriteria;
    use crate::formula::{ExplicitFormula, Formula};
    use crate::path::ObjectPath;
    use crate::testutils::organism_with_molecules;

    fn assignment(name: &str, object_path: &str) -> EventAssignmentBuilder {
        EventAssignmentBuilder {
            name: name.to_owned(),
            object_path: ObjectPath::parse(object_path),
            formula: Formula::Constant(0.0),
            use_as_value: true,
            dimension: None,
        }
    }

    fn blocks(criteria: DescriptorCriteria) -> BuildingBlocks {
        let mut enzyme = MoleculeBuilder::new("E");
        enzyme.is_floating_xenobiotic = false;
        BuildingBlocks {
            molecules: vec![MoleculeBuilder::new("A"), MoleculeBuilder::new("B"), enzyme],
            event_groups: vec![EventGroupBuilder {
                name: "Emptying".to_owned(),
                source_criteria: criteria,
                events: vec![EventBuilder {
                    name: "Start".to_owned(),
                    formula: Formula::Explicit(
                        ExplicitFormula::new("Time > T")
                            .with_path("T", "Organism|Kidney|Volume"),
                    ),
                    one_time: true,
                    assignments: vec![
                        assignment("Reset", "..|..|..|ALL_FLOATING_MOLECULES"),
                        assignment("Shrink", "..|..|..|Volume"),
                    ],
                    parameters: vec![],
                }],
                parameters: vec![ParameterBuilder::new("Interval", Formula::Constant(6.0))],
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_event_group_with_floating_assignments() {
        let mut m = organism_with_molecules();
        let ctx = ReplacementContext::for_model(&m.model);
        let blocks = blocks(DescriptorCriteria::all_of(&["Kidney"]));
        assert_eq!(1, create_event_groups(&mut m.model, &blocks, &ctx).unwrap());

        let tree = &m.model.tree;
        let group = tree.child_by_name(m.kidney, "Emptying").unwrap();
        assert!(tree.child_by_name(group, "Interval").is_some());
        assert!(tree.child_by_name(m.liver, "Emptying").is_none());

        let start = tree.child_by_name(group, "Start").unwrap();
        assert_eq!(EntityKind::Event { one_time: true }, tree[start].kind);
        let condition = tree[start].formula.as_ref().unwrap();
        assert_eq!("Sim|Organism|Kidney|Volume", condition.paths()[0].path.to_string());

        let names: Vec<&str> = tree
            .children(start)
            .iter()
            .map(|id| tree[*id].name.as_str())
            .collect();
        assert_eq!(vec!["Reset_A", "Reset_B", "Shrink"], names);

        let reset_b = tree.child_by_name(start, "Reset_B").unwrap();
        let EntityKind::EventAssignment { object_path, .. } = &tree[reset_b].kind else {
            panic!("not an assignment");
        };
        assert_eq!("..|..|..|B", object_path.to_string());
        let kidney_b = tree.child_by_name(m.kidney, "B").unwrap();
        assert_eq!(kidney_b, object_path.resolve(tree, reset_b).unwrap());
    }

    #[test]
    fn test_event_group_without_criteria_goes_into_root() {
        let mut m = organism_with_molecules();
        let ctx = ReplacementContext::for_model(&m.model);
        let blocks = blocks(DescriptorCriteria::default());
        assert_eq!(1, create_event_groups(&mut m.model, &blocks, &ctx).unwrap());
        assert!(m.model.tree.child_by_name(m.model.root, "Emptying").is_some());
        assert!(m.model.tree.child_by_name(m.kidney, "Emptying").is_none());
    }
}
