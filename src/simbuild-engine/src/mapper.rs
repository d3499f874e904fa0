// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Field mapping from building blocks into concrete entities.

use crate::blocks::{
    EventAssignmentBuilder, EventBuilder, MoleculeBuilder, ObserverBuilder, ParameterBuilder,
    ReactionBuilder, TransportBuilder,
};
use crate::formula::Formula;
use crate::path::keywords;
use crate::tree::{Entity, EntityId, EntityKind, ParameterBuildMode, QuantityType};

pub const PROCESS_RATE: &str = "ProcessRate";
pub const PASSIVE: &str = "Passive";
pub const ACTIVE: &str = "Active";
pub const INFLUX: &str = "Influx";
pub const NOT_INFLUX: &str = "NotInflux";

/// Clones a template formula.  Explicit formulas without an origin id are
/// stamped with `origin` so that the clones can be checked against each
/// other once construction is done.
pub fn instantiate_formula(formula: &Formula, origin: &str) -> Formula {
    let mut formula = formula.clone();
    if let Formula::Explicit(explicit) = &mut formula {
        if explicit.origin_id.is_none() {
            explicit.origin_id = Some(origin.to_owned());
        }
    }
    formula
}

pub fn parameter_from(builder: &ParameterBuilder, origin: &str) -> Entity {
    let mut entity = Entity::new(
        &builder.name,
        EntityKind::Parameter {
            build_mode: builder.build_mode,
        },
    )
    .with_formula(instantiate_formula(&builder.formula, origin))
    .with_dimension(builder.dimension.clone());
    entity.tags.extend(builder.tags.iter().cloned());
    entity
}

pub fn molecule_amount_from(builder: &MoleculeBuilder) -> Entity {
    Entity::new(
        &builder.name,
        EntityKind::MoleculeAmount {
            quantity_type: builder.quantity_type,
        },
    )
    .with_formula(instantiate_formula(&builder.default_start_formula, &builder.name))
    .with_dimension(builder.dimension.clone())
}

pub fn observer_from(builder: &ObserverBuilder, quantity_type: QuantityType) -> Entity {
    Entity::new(&builder.name, EntityKind::Observer { quantity_type })
        .with_formula(instantiate_formula(&builder.formula, &builder.name))
        .with_dimension(builder.dimension.clone())
}

/// The local reaction only; its local parameters are added by the caller.
pub fn local_reaction_from(builder: &ReactionBuilder, properties: EntityId) -> Entity {
    Entity::new(&builder.name, EntityKind::Reaction { properties })
        .with_formula(instantiate_formula(&builder.formula, &builder.name))
        .with_dimension(builder.dimension.clone())
}

/// The transport only; local parameters and the process rate parameter
/// are added by the caller.
pub fn transport_from(builder: &TransportBuilder, source: EntityId, target: EntityId) -> Entity {
    Entity::new(&builder.name, EntityKind::Transport { source, target })
        .with_formula(instantiate_formula(&builder.formula, &builder.name))
        .with_dimension(builder.dimension.clone())
}

/// A parameter exposing the rate of the transport it is placed below.  The
/// formula is the transport's, with relative paths moved up one level.
pub fn process_rate_parameter_from(builder: &TransportBuilder) -> Entity {
    let origin = format!("{}|{}", builder.name, PROCESS_RATE);
    let mut formula = instantiate_formula(&builder.formula, &origin);
    for usable in formula.paths_mut() {
        if usable.path.is_relative() {
            usable.path.push_front(keywords::PARENT_CONTAINER);
        }
    }

    let mut parameter = Entity::new(
        PROCESS_RATE,
        EntityKind::Parameter {
            build_mode: ParameterBuildMode::Local,
        },
    )
    .with_formula(formula)
    .with_dimension(builder.dimension.clone())
    .with_tag(keywords::MOLECULE)
    .with_tag(keywords::NEIGHBORHOOD);
    let transport_type = builder.transport_type;
    if !transport_type.is_active() {
        parameter = parameter.with_tag(PASSIVE);
    } else if transport_type.is_influx() {
        parameter = parameter.with_tag(ACTIVE).with_tag(INFLUX);
    } else {
        parameter = parameter.with_tag(ACTIVE).with_tag(NOT_INFLUX);
    }
    parameter
}

pub fn event_from(builder: &EventBuilder, origin: &str) -> Entity {
    Entity::new(
        &builder.name,
        EntityKind::Event {
            one_time: builder.one_time,
        },
    )
    .with_formula(instantiate_formula(&builder.formula, origin))
}

pub fn event_assignment_from(builder: &EventAssignmentBuilder, origin: &str) -> Entity {
    Entity::new(
        &builder.name,
        EntityKind::EventAssignment {
            object_path: builder.object_path.clone(),
            use_as_value: builder.use_as_value,
        },
    )
    .with_formula(instantiate_formula(&builder.formula, origin))
    .with_dimension(builder.dimension.clone())
}
