// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Placement of transports between the two endpoints of a neighborhood.
//!
//! A transport for molecule `M` lands in `<neighborhood>|M|<transport>`;
//! the `M` container is shared by every transport of that molecule.

use log::debug;

use crate::blocks::{BuildingBlocks, TransportBuilder};
use crate::common::Result;
use crate::descriptor::{DescriptorCriteria, EntityDescriptor};
use crate::keywords::{KeywordReplacer, ReplacementContext};
use crate::mapper::{parameter_from, process_rate_parameter_from, transport_from};
use crate::model::Model;
use crate::model_err;
use crate::tree::{
    ContainerMode, ContainerType, Entity, EntityId, EntityKind, ParameterBuildMode,
};

fn satisfies(model: &Model, criteria: &DescriptorCriteria, container: EntityId) -> bool {
    criteria.is_empty()
        || criteria.is_satisfied_by(&EntityDescriptor::from_tree(&model.tree, container))
}

/// The (source, target) endpoints `builder` connects in `neighborhood`.
/// The declared orientation is tried first, then the reversed one.
fn direction(
    model: &Model,
    builder: &TransportBuilder,
    first: EntityId,
    second: EntityId,
) -> Option<(EntityId, EntityId)> {
    let connects = |source, target| {
        satisfies(model, &builder.source_criteria, source)
            && satisfies(model, &builder.target_criteria, target)
    };
    if connects(first, second) {
        Some((first, second))
    } else if connects(second, first) {
        Some((second, first))
    } else {
        None
    }
}

fn amount_in(model: &Model, container: EntityId, molecule: &str) -> Option<EntityId> {
    model
        .tree
        .child_by_name(container, molecule)
        .filter(|id| model.tree[*id].is_molecule_amount())
}

/// Creates every transport of `blocks`.  Returns the number created.
pub fn create_transports(
    model: &mut Model,
    blocks: &BuildingBlocks,
    ctx: &ReplacementContext,
) -> Result<usize> {
    let mut created = 0;
    for neighborhood in model.all_neighborhoods() {
        let EntityKind::Neighborhood { first, second } = model.tree[neighborhood].kind else {
            continue;
        };
        for builder in blocks.transports.iter() {
            let Some((source, target)) = direction(model, builder, first, second) else {
                continue;
            };
            for molecule in blocks.molecules_for(&builder.molecule_list) {
                let amounts = (
                    amount_in(model, source, &molecule.name),
                    amount_in(model, target, &molecule.name),
                );
                let (Some(source_amount), Some(target_amount)) = amounts else {
                    continue;
                };
                add_transport(
                    model,
                    builder,
                    neighborhood,
                    &molecule.name,
                    (source, source_amount),
                    (target, target_amount),
                    ctx,
                )?;
                created += 1;
            }
        }
    }
    Ok(created)
}

fn add_transport(
    model: &mut Model,
    builder: &TransportBuilder,
    neighborhood: EntityId,
    molecule: &str,
    (source, source_amount): (EntityId, EntityId),
    (target, target_amount): (EntityId, EntityId),
    ctx: &ReplacementContext,
) -> Result<()> {
    let molecule_container = model.tree.get_or_add_child(neighborhood, molecule, || {
        Entity::container("", ContainerMode::Logical, ContainerType::Molecule)
    });
    if !model.tree[molecule_container].is_container() {
        return model_err!(
            DuplicateChildName,
            format!(
                "'{}' under {} is not a molecule container",
                molecule,
                model.tree.absolute_path(neighborhood)
            )
        );
    }

    let transport = model.tree.add_child(
        molecule_container,
        transport_from(builder, source_amount, target_amount),
    )?;
    for parameter in builder
        .parameters
        .iter()
        .filter(|p| p.build_mode == ParameterBuildMode::Local)
    {
        let origin = format!("{}|{}", builder.name, parameter.name);
        model
            .tree
            .add_child(transport, parameter_from(parameter, &origin))?;
    }
    if builder.create_process_rate_parameter {
        model
            .tree
            .add_child(transport, process_rate_parameter_from(builder))?;
    }

    KeywordReplacer::new(ctx)
        .molecule(molecule)
        .neighborhood(&model.tree, neighborhood)
        .transport(&model.tree, source, target)
        .replace_in(&mut model.tree, transport);
    debug!(
        "transport '{}' of '{}' created in {}",
        builder.name,
        molecule,
        model.tree.absolute_path(neighborhood)
    );
    Ok(())
}
