// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use serde::{Deserialize, Serialize};

use crate::blocks::MoleculeBuilder;
use crate::dynamic::consolidated_path;
use crate::formula::Formula;
use crate::model::Model;
use crate::path::ObjectPath;
use crate::tree::{ContainerMode, EntityKind, ParameterBuildMode};

/// A start value for a parameter, addressed by its path below the root.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterValue {
    pub path: ObjectPath,
    pub value: f64,
    pub dimension: Option<String>,
}

/// One value per physical container, molecule, and local molecule parameter
/// with a constant formula.
pub fn create_parameter_values(
    model: &Model,
    molecules: &[MoleculeBuilder],
) -> Vec<ParameterValue> {
    let physical = model.tree.subtree(model.root).into_iter().filter(|id| {
        matches!(
            model.tree[*id].kind,
            EntityKind::Container {
                mode: ContainerMode::Physical,
                ..
            }
        )
    });

    let mut values = vec![];
    for container in physical {
        let container_path = consolidated_path(&model.tree, container);
        for molecule in molecules {
            for parameter in molecule.parameters.iter() {
                let value = match (&parameter.formula, parameter.build_mode) {
                    (Formula::Constant(value), ParameterBuildMode::Local) => *value,
                    _ => continue,
                };
                let mut path = ObjectPath::from_segments(container_path.iter().cloned());
                path.push(molecule.name.clone());
                path.push(parameter.name.clone());
                values.push(ParameterValue {
                    path,
                    value,
                    dimension: parameter.dimension.clone(),
                });
            }
        }
    }
    values
}
