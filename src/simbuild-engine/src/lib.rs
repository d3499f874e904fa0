// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

#![forbid(unsafe_code)]

pub mod blocks;
pub mod calculation_method;
pub mod common;
pub mod construction;
pub mod descriptor;
pub mod dimensions;
pub mod dynamic;
pub mod events;
pub mod formula;
pub mod keywords;
mod mapper;
pub mod model;
pub mod molecules;
pub mod observer;
pub mod options;
pub mod origin;
pub mod parameter_values;
pub mod path;
pub mod path_expander;
pub mod reaction;
#[cfg(test)]
mod testutils;
pub mod transport;
pub mod tree;

pub use self::calculation_method::{merge_calculation_methods, MergeReport};
pub use self::common::{Error, ErrorCode, ErrorKind, Result};
pub use self::construction::{ConstructionPass, ConstructionPhase, ConstructionReport};
pub use self::dynamic::expand_dynamic_formulas;
pub use self::formula::{formulas_are_the_same, Formula};
pub use self::model::Model;
pub use self::options::BuildOptions;
pub use self::path::{FormulaUsablePath, ObjectPath};
pub use self::path_expander::expand_dynamic_references;
pub use self::tree::{Entity, EntityId, EntityKind, Tree};
