// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use log::debug;

use crate::blocks::ReactionBuilder;
use crate::common::Result;
use crate::descriptor::EntityDescriptor;
use crate::keywords::{KeywordReplacer, ReplacementContext};
use crate::mapper::{local_reaction_from, parameter_from};
use crate::model::Model;
use crate::tree::{
    ContainerMode, ContainerType, Entity, EntityId, EntityKind, ParameterBuildMode,
};

/// Places `builder` into every physical container holding all of its
/// partners and satisfying its container criteria.  Returns whether any
/// local reaction was created; if none was, the shared properties container
/// is removed again.
///
/// The properties container is a new top container, so paths into it are
/// anchored with a context taken after it was added.
pub fn create_reaction(model: &mut Model, builder: &ReactionBuilder) -> Result<bool> {
    let properties = create_properties_container(model, builder)?;
    let ctx = ReplacementContext::for_model(model);
    KeywordReplacer::new(&ctx)
        .reaction(&builder.name)
        .replace_in(&mut model.tree, properties);

    let candidates: Vec<EntityId> = model
        .tree
        .subtree(model.root)
        .into_iter()
        .filter(|id| model.tree[*id].is_container())
        .collect();

    let mut created = 0;
    for container in candidates {
        if !can_create_reaction_in(model, builder, container) {
            continue;
        }
        let reaction = model
            .tree
            .add_child(container, local_reaction_from(builder, properties))?;
        for parameter in builder
            .parameters
            .iter()
            .filter(|p| p.build_mode == ParameterBuildMode::Local)
        {
            let origin = format!("{}|{}", builder.name, parameter.name);
            model
                .tree
                .add_child(reaction, parameter_from(parameter, &origin))?;
        }
        KeywordReplacer::new(&ctx)
            .reaction(&builder.name)
            .replace_in(&mut model.tree, reaction);
        debug!(
            "reaction '{}' created in {}",
            builder.name,
            model.tree.absolute_path(container)
        );
        created += 1;
    }

    if created == 0 {
        debug!("no container qualifies for reaction '{}'", builder.name);
        model.tree.remove(properties);
    }
    Ok(created > 0)
}

fn create_properties_container(model: &mut Model, builder: &ReactionBuilder) -> Result<EntityId> {
    let properties = model.tree.get_or_add_child(model.root, &builder.name, || {
        Entity::container("", ContainerMode::Logical, ContainerType::Reaction)
    });
    for parameter in builder
        .parameters
        .iter()
        .filter(|p| p.build_mode != ParameterBuildMode::Local)
    {
        let origin = format!("{}|{}", builder.name, parameter.name);
        model
            .tree
            .add_child(properties, parameter_from(parameter, &origin))?;
    }
    Ok(properties)
}

fn can_create_reaction_in(model: &Model, builder: &ReactionBuilder, container: EntityId) -> bool {
    let tree = &model.tree;
    if !matches!(
        tree[container].kind,
        EntityKind::Container {
            mode: ContainerMode::Physical,
            ..
        }
    ) {
        return false;
    }

    let has_amount = |name: &str| {
        tree.child_by_name(container, name)
            .is_some_and(|id| tree[id].is_molecule_amount())
    };
    if !builder.required_molecules().all(has_amount) {
        return false;
    }

    builder.container_criteria.is_empty()
        || builder
            .container_criteria
            .is_satisfied_by(&EntityDescriptor::from_tree(tree, container))
}
