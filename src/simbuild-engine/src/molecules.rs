// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use log::debug;

use crate::blocks::MoleculeBuilder;
use crate::common::Result;
use crate::descriptor::EntityDescriptor;
use crate::formula::{add_parent_volume_reference, ExplicitFormula, Formula};
use crate::keywords::{KeywordReplacer, ReplacementContext};
use crate::mapper::{instantiate_formula, molecule_amount_from, parameter_from};
use crate::model::Model;
use crate::options::BuildOptions;
use crate::path::{keywords, FormulaUsablePath, ObjectPath};
use crate::tree::{Entity, EntityId, ParameterBuildMode};

const START_VALUE_ALIAS: &str = "StartValue";

/// Creates the amount of `builder` in `container` together with the local
/// molecule parameters whose container criteria the container satisfies
/// (empty criteria mean every container).
///
/// A molecule declared as a concentration keeps its start formula in a
/// start value parameter; the amount becomes that value times the volume of
/// `container`.
pub fn create_molecule_amount(
    model: &mut Model,
    builder: &MoleculeBuilder,
    container: EntityId,
    options: &BuildOptions,
    ctx: &ReplacementContext,
) -> Result<EntityId> {
    let descriptor = EntityDescriptor::from_tree(&model.tree, container);
    let by_concentration =
        builder.dimension.as_deref() == Some(options.concentration_dimension.as_str());

    let mut entity = molecule_amount_from(builder);
    if by_concentration {
        entity.formula = Some(instantiate_formula(
            &start_value_reference(options),
            &builder.name,
        ));
        entity.dimension = Some(options.amount_dimension.clone());
    }
    let amount = model.tree.add_child(container, entity)?;

    if by_concentration {
        let origin = format!("{}|{}", builder.name, options.start_value_parameter);
        let start_value = Entity::parameter(
            &options.start_value_parameter,
            instantiate_formula(&builder.default_start_formula, &origin),
        )
        .with_dimension(Some(options.concentration_dimension.clone()));
        model.tree.add_child(amount, start_value)?;
    }

    for parameter in builder.parameters.iter() {
        if parameter.build_mode != ParameterBuildMode::Local {
            continue;
        }
        let criteria = &parameter.container_criteria;
        if !criteria.is_empty() && !criteria.is_satisfied_by(&descriptor) {
            continue;
        }
        let origin = format!("{}|{}", builder.name, parameter.name);
        model
            .tree
            .add_child(amount, parameter_from(parameter, &origin))?;
    }

    KeywordReplacer::new(ctx)
        .molecule(&builder.name)
        .replace_in(&mut model.tree, amount);
    debug!(
        "molecule '{}' created in {}",
        builder.name,
        model.tree.absolute_path(container)
    );
    Ok(amount)
}

/// `StartValue * V`, referencing the start value below the amount and the
/// volume of the amount's container.
fn start_value_reference(options: &BuildOptions) -> Formula {
    let start_value = ObjectPath::from_segments([
        keywords::PARENT_CONTAINER,
        keywords::MOLECULE,
        options.start_value_parameter.as_str(),
    ]);
    let mut explicit = ExplicitFormula::new("");
    explicit.paths.push(
        FormulaUsablePath::new(START_VALUE_ALIAS, start_value)
            .with_dimension(Some(options.concentration_dimension.clone())),
    );
    let mut formula = Formula::Explicit(explicit);

    let volume = add_parent_volume_reference(
        &mut formula,
        &options.volume_parameter,
        &options.volume_alias,
        Some(options.volume_dimension.clone()),
    );
    if let (Formula::Explicit(explicit), Some(volume)) = (&mut formula, volume) {
        explicit.formula_string = format!("{START_VALUE_ALIAS} * {volume}");
    }
    formula
}
