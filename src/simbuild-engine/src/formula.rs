// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::descriptor::DescriptorCriteria;
use crate::path::{keywords, FormulaUsablePath, ObjectPath};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExplicitFormula {
    pub formula_string: String,
    #[serde(default)]
    pub paths: Vec<FormulaUsablePath>,
    /// Shared by every formula cloned from the same template.
    #[serde(default)]
    pub origin_id: Option<String>,
}

impl ExplicitFormula {
    pub fn new(formula_string: &str) -> Self {
        ExplicitFormula {
            formula_string: formula_string.to_owned(),
            paths: vec![],
            origin_id: None,
        }
    }

    pub fn with_path(mut self, alias: &str, path: &str) -> Self {
        self.paths
            .push(FormulaUsablePath::new(alias, ObjectPath::parse(path)));
        self
    }

    pub fn with_origin(mut self, origin_id: &str) -> Self {
        self.origin_id = Some(origin_id.to_owned());
        self
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionKind {
    Normal,
    LogNormal,
    Uniform,
    Discrete,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistributedFormula {
    pub distribution: DistributionKind,
    pub parameters: Vec<(String, f64)>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationKind {
    #[default]
    Sum,
    Product,
}

impl AggregationKind {
    fn operator(self) -> &'static str {
        match self {
            AggregationKind::Sum => " + ",
            AggregationKind::Product => " * ",
        }
    }

    fn identity(self) -> &'static str {
        match self {
            AggregationKind::Sum => "0",
            AggregationKind::Product => "1",
        }
    }
}

/// An aggregate over every formula-usable entity matching `criteria`,
/// resolved into an explicit formula during the construction pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DynamicFormula {
    pub name: String,
    pub criteria: DescriptorCriteria,
    #[serde(default)]
    pub aggregation: AggregationKind,
    /// members are referenced as `<variable>_1`, `<variable>_2`, ...
    pub variable: String,
}

impl DynamicFormula {
    /// Builds the explicit aggregate referencing `members` in order.
    pub fn expand_with(&self, members: Vec<(ObjectPath, Option<String>)>) -> ExplicitFormula {
        let paths: Vec<FormulaUsablePath> = members
            .into_iter()
            .enumerate()
            .map(|(i, (path, dimension))| {
                FormulaUsablePath::new(&format!("{}_{}", self.variable, i + 1), path)
                    .with_dimension(dimension)
            })
            .collect();

        let formula_string = if paths.is_empty() {
            self.aggregation.identity().to_owned()
        } else {
            paths
                .iter()
                .map(|p| p.alias.as_str())
                .collect::<Vec<_>>()
                .join(self.aggregation.operator())
        };

        ExplicitFormula {
            formula_string,
            paths,
            origin_id: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Formula {
    Constant(f64),
    Explicit(ExplicitFormula),
    Distributed(DistributedFormula),
    /// to be supplied later, usually by a calculation method
    BlackBox,
    Dynamic(DynamicFormula),
}

impl Formula {
    pub fn explicit(formula_string: &str) -> Self {
        Formula::Explicit(ExplicitFormula::new(formula_string))
    }

    pub fn is_black_box(&self) -> bool {
        matches!(self, Formula::BlackBox)
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Formula::Dynamic(_))
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Formula::Constant(_))
    }

    pub fn paths(&self) -> &[FormulaUsablePath] {
        match self {
            Formula::Explicit(explicit) => &explicit.paths,
            _ => &[],
        }
    }

    pub fn paths_mut(&mut self) -> &mut [FormulaUsablePath] {
        match self {
            Formula::Explicit(explicit) => &mut explicit.paths,
            _ => &mut [],
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Formula::Constant(_) => 0,
            Formula::Explicit(_) => 1,
            Formula::Distributed(_) => 2,
            Formula::BlackBox => 3,
            Formula::Dynamic(_) => 4,
        }
    }
}

/// Structural formula equivalence.  Constant and explicit formulas are
/// compared by content (explicit: expression string plus the alias to path
/// map, independent of declaration order); distributed, black-box and
/// dynamic formulas only by variant.
pub fn formulas_are_the_same(first: Option<&Formula>, second: Option<&Formula>) -> bool {
    let (first, second) = match (first, second) {
        (None, None) => return true,
        (Some(first), Some(second)) => (first, second),
        _ => return false,
    };

    if first.tag() != second.tag() {
        return false;
    }

    match (first, second) {
        (Formula::Constant(a), Formula::Constant(b)) => a == b,
        (Formula::Explicit(a), Formula::Explicit(b)) => {
            if a.formula_string != b.formula_string {
                return false;
            }
            let by_alias = |f: &ExplicitFormula| -> HashMap<String, ObjectPath> {
                f.paths
                    .iter()
                    .map(|p| (p.alias.clone(), p.path.clone()))
                    .collect()
            };
            by_alias(a) == by_alias(b)
        }
        _ => true,
    }
}

/// Returns `base` if it is not taken, otherwise the first free `base1`,
/// `base2`, ...
pub fn unique_alias<'a, I>(base: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let existing: Vec<&str> = existing.into_iter().collect();
    if !existing.contains(&base) {
        return base.to_owned();
    }
    let mut i = 1;
    loop {
        let candidate = format!("{base}{i}");
        if !existing.contains(&candidate.as_str()) {
            return candidate;
        }
        i += 1;
    }
}

/// Makes `formula` reference the volume of its owner's parent container and
/// returns the alias that now refers to it.  Only explicit formulas can
/// hold references; others get `None`.
pub fn add_parent_volume_reference(
    formula: &mut Formula,
    volume_name: &str,
    volume_alias: &str,
    volume_dimension: Option<String>,
) -> Option<String> {
    let explicit = match formula {
        Formula::Explicit(explicit) => explicit,
        _ => return None,
    };

    let volume_path = ObjectPath::from_segments([keywords::PARENT_CONTAINER, volume_name]);
    if let Some(existing) = explicit.paths.iter().find(|p| p.path == volume_path) {
        return Some(existing.alias.clone());
    }

    let alias = unique_alias(volume_alias, explicit.paths.iter().map(|p| p.alias.as_str()));
    explicit
        .paths
        .push(FormulaUsablePath::new(&alias, volume_path).with_dimension(volume_dimension));
    Some(alias)
}
