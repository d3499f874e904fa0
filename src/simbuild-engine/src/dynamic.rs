// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use log::debug;

use crate::common::Result;
use crate::consistency_err;
use crate::descriptor::{DescriptorCriteria, DescriptorIndex, EntityDescriptor};
use crate::dimensions::DimensionLookup;
use crate::formula::{ExplicitFormula, Formula};
use crate::model::Model;
use crate::tree::{EntityId, Tree};

/// The path of `id` below the model root, i.e. without the simulation name.
pub(crate) fn consolidated_path(tree: &Tree, id: EntityId) -> Vec<String> {
    let mut path = tree.absolute_path(id).segments().to_vec();
    if !path.is_empty() {
        path.remove(0);
    }
    path
}

/// Replaces every dynamic formula in the model with the explicit aggregate
/// over the formula-usable entities its criteria currently select.
///
/// All dynamic formulas are checked and expanded against the tree as it was
/// on entry before any of them is replaced, so an error leaves the model
/// untouched.
pub fn expand_dynamic_formulas(model: &mut Model, dims: &dyn DimensionLookup) -> Result<usize> {
    let tree = &model.tree;
    let index = DescriptorIndex::formula_usables(tree, model.root);

    let mut expansions: Vec<(EntityId, ExplicitFormula)> = vec![];
    for id in model.formula_users() {
        let dynamic = match tree[id].formula.as_ref() {
            Some(Formula::Dynamic(dynamic)) => dynamic,
            _ => continue,
        };

        let owner = EntityDescriptor::from_tree(tree, id);
        if dynamic.criteria.is_satisfied_by(&owner) {
            return consistency_err!(
                CircularReferenceInSumFormula,
                format!(
                    "formula '{}' would reference '{}'",
                    dynamic.name,
                    tree.absolute_path(id)
                )
            );
        }

        let criteria: DescriptorCriteria = match tree.parent(id) {
            Some(parent) => dynamic
                .criteria
                .rewrite_in_parent(&consolidated_path(tree, parent))?,
            None => dynamic.criteria.clone(),
        };

        let members = index
            .all_satisfied_by(&criteria)?
            .into_iter()
            .map(|member| {
                (
                    tree.absolute_path(member),
                    dims.stamp(tree[member].dimension.as_deref()),
                )
            })
            .collect::<Vec<_>>();

        debug!(
            "{}: '{}' aggregates {} entities",
            tree.absolute_path(id),
            dynamic.name,
            members.len()
        );
        expansions.push((id, dynamic.expand_with(members)));
    }

    let expanded = expansions.len();
    for (id, explicit) in expansions {
        model.tree[id].formula = Some(Formula::Explicit(explicit));
    }
    Ok(expanded)
}
