// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::HashMap;

use log::warn;

use crate::formula::Formula;
use crate::model::Model;
use crate::tree::EntityId;

/// Explicit formulas cloned from the same template share an origin id.
/// Once construction has rewritten their paths they may no longer agree;
/// every formula whose references differ from the first formula of its
/// group gets its origin id cleared.  Returns how many were cleared.
pub fn check_formula_origin(model: &mut Model) -> usize {
    let mut groups: HashMap<String, Vec<EntityId>> = HashMap::new();
    let mut order: Vec<String> = vec![];
    for id in model.formula_users() {
        if let Some(Formula::Explicit(explicit)) = model.tree[id].formula.as_ref() {
            match explicit.origin_id.as_deref() {
                Some(origin) if !origin.is_empty() => {
                    let group = groups.entry(origin.to_owned()).or_insert_with(|| {
                        order.push(origin.to_owned());
                        vec![]
                    });
                    group.push(id);
                }
                _ => {}
            }
        }
    }

    let mut reset = 0;
    for origin in order {
        let members = &groups[&origin];
        let Some((&first, rest)) = members.split_first() else {
            continue;
        };
        let reference = model.tree[first]
            .formula
            .as_ref()
            .map(|f| f.paths().to_vec())
            .unwrap_or_default();
        if reference.is_empty() {
            continue;
        }

        for &id in rest {
            let Some(Formula::Explicit(explicit)) = model.tree[id].formula.as_mut() else {
                continue;
            };
            let same = explicit.paths.len() == reference.len()
                && explicit
                    .paths
                    .iter()
                    .zip(reference.iter())
                    .all(|(a, b)| a.same_reference_as(b));
            if !same {
                explicit.origin_id = None;
                reset += 1;
                warn!(
                    "{}: references diverge from origin '{}', origin reset",
                    model.tree.absolute_path(id),
                    origin
                );
            }
        }
    }
    reset
}
