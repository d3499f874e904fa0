// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Building blocks: the declarative templates a model is constructed from.
//!
//! Parsing them from persisted projects happens elsewhere; these types only
//! derive serde so that already-decoded configuration can be handed in.

use serde::{Deserialize, Serialize};

use crate::common::{Error, ErrorCode, ErrorKind, Result};
use crate::descriptor::DescriptorCriteria;
use crate::formula::Formula;
use crate::path::ObjectPath;
use crate::tree::{ParameterBuildMode, QuantityType};

fn bad_configuration(err: serde_json::Error) -> Error {
    Error::new(
        ErrorKind::Model,
        ErrorCode::BadConfiguration,
        Some(err.to_string()),
    )
}

/// Decodes `json`, requiring the top level to be an object.
pub(crate) fn parse_object(json: &str) -> Result<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_str(json).map_err(bad_configuration)?;
    if !value.is_object() {
        return crate::model_err!(
            BadConfiguration,
            "configuration must be a JSON object".to_owned()
        );
    }
    Ok(value)
}

fn default_true() -> bool {
    true
}

fn default_coefficient() -> f64 {
    1.0
}

fn default_start_formula() -> Formula {
    Formula::Constant(0.0)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterBuilder {
    pub name: String,
    pub formula: Formula,
    #[serde(default)]
    pub dimension: Option<String>,
    #[serde(default)]
    pub build_mode: ParameterBuildMode,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Local molecule parameters are only created in containers matching
    /// these; empty criteria mean everywhere.
    #[serde(default)]
    pub container_criteria: DescriptorCriteria,
}

impl ParameterBuilder {
    pub fn new(name: &str, formula: Formula) -> Self {
        ParameterBuilder {
            name: name.to_owned(),
            formula,
            dimension: None,
            build_mode: ParameterBuildMode::Local,
            tags: vec![],
            container_criteria: DescriptorCriteria::default(),
        }
    }

    pub fn with_mode(mut self, build_mode: ParameterBuildMode) -> Self {
        self.build_mode = build_mode;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoleculeBuilder {
    pub name: String,
    #[serde(default)]
    pub quantity_type: QuantityType,
    #[serde(default)]
    pub dimension: Option<String>,
    /// only floating molecules take part in calculation methods
    #[serde(default = "default_true")]
    pub is_floating_xenobiotic: bool,
    #[serde(default)]
    pub used_calculation_methods: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterBuilder>,
    #[serde(default = "default_start_formula")]
    pub default_start_formula: Formula,
}

impl MoleculeBuilder {
    pub fn new(name: &str) -> Self {
        MoleculeBuilder {
            name: name.to_owned(),
            quantity_type: QuantityType::Drug,
            dimension: Some("Amount".to_owned()),
            is_floating_xenobiotic: true,
            used_calculation_methods: vec![],
            parameters: vec![],
            default_start_formula: default_start_formula(),
        }
    }

    pub fn uses(&self, calculation_method: &str) -> bool {
        self.used_calculation_methods
            .iter()
            .any(|cm| cm == calculation_method)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReactionPartner {
    pub molecule: String,
    #[serde(default = "default_coefficient")]
    pub stoichiometric_coefficient: f64,
}

impl ReactionPartner {
    pub fn new(molecule: &str) -> Self {
        ReactionPartner {
            molecule: molecule.to_owned(),
            stoichiometric_coefficient: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReactionBuilder {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub formula: Formula,
    #[serde(default)]
    pub dimension: Option<String>,
    #[serde(default)]
    pub educts: Vec<ReactionPartner>,
    #[serde(default)]
    pub products: Vec<ReactionPartner>,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub container_criteria: DescriptorCriteria,
    /// local parameters go with every reaction instance, global and
    /// property parameters into the shared properties container
    #[serde(default)]
    pub parameters: Vec<ParameterBuilder>,
}

impl ReactionBuilder {
    /// Every molecule that has to be present for the reaction to run.
    pub fn required_molecules(&self) -> impl Iterator<Item = &str> {
        self.educts
            .iter()
            .chain(self.products.iter())
            .map(|p| p.molecule.as_str())
            .chain(self.modifiers.iter().map(|m| m.as_str()))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MoleculeList {
    #[serde(default)]
    pub for_all: bool,
    #[serde(default)]
    pub molecule_names: Vec<String>,
    #[serde(default)]
    pub molecule_names_to_exclude: Vec<String>,
}

impl MoleculeList {
    pub fn all_except(excluded: &[&str]) -> Self {
        MoleculeList {
            for_all: true,
            molecule_names: vec![],
            molecule_names_to_exclude: excluded.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn only(names: &[&str]) -> Self {
        MoleculeList {
            for_all: false,
            molecule_names: names.iter().map(|s| s.to_string()).collect(),
            molecule_names_to_exclude: vec![],
        }
    }

    pub fn accepts(&self, molecule: &str) -> bool {
        if self.for_all {
            !self.molecule_names_to_exclude.iter().any(|m| m == molecule)
        } else {
            self.molecule_names.iter().any(|m| m == molecule)
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObserverKind {
    /// attached below each matching molecule amount
    Amount,
    /// attached below the molecule container of each matching molecule
    Container,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObserverBuilder {
    pub name: String,
    pub kind: ObserverKind,
    pub formula: Formula,
    #[serde(default)]
    pub dimension: Option<String>,
    #[serde(default)]
    pub molecule_list: MoleculeList,
    #[serde(default)]
    pub container_criteria: DescriptorCriteria,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub parameter_name: String,
    pub container_criteria: DescriptorCriteria,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HelpParameter {
    pub parameter: ParameterBuilder,
    pub container_criteria: DescriptorCriteria,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputFormula {
    pub formula: Formula,
    pub target: ParameterDescriptor,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalculationMethod {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub help_parameters: Vec<HelpParameter>,
    #[serde(default)]
    pub output_formulas: Vec<OutputFormula>,
}

/// Passive types move molecules along a gradient; the rest are active.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportType {
    #[default]
    Diffusion,
    Convection,
    Influx,
    Efflux,
    PgpLike,
}

impl TransportType {
    pub fn is_active(self) -> bool {
        matches!(
            self,
            TransportType::Influx | TransportType::Efflux | TransportType::PgpLike
        )
    }

    pub fn is_influx(self) -> bool {
        self == TransportType::Influx
    }
}

/// Placed below every neighborhood whose endpoints match the source and
/// target criteria, once per listed molecule present on both sides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransportBuilder {
    pub name: String,
    pub formula: Formula,
    #[serde(default)]
    pub dimension: Option<String>,
    #[serde(default)]
    pub transport_type: TransportType,
    #[serde(default)]
    pub molecule_list: MoleculeList,
    #[serde(default)]
    pub source_criteria: DescriptorCriteria,
    #[serde(default)]
    pub target_criteria: DescriptorCriteria,
    #[serde(default)]
    pub parameters: Vec<ParameterBuilder>,
    #[serde(default)]
    pub create_process_rate_parameter: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventAssignmentBuilder {
    pub name: String,
    /// the quantity changed when the event fires
    pub object_path: ObjectPath,
    pub formula: Formula,
    #[serde(default)]
    pub use_as_value: bool,
    #[serde(default)]
    pub dimension: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventBuilder {
    pub name: String,
    /// the condition
    pub formula: Formula,
    #[serde(default)]
    pub one_time: bool,
    #[serde(default)]
    pub assignments: Vec<EventAssignmentBuilder>,
    #[serde(default)]
    pub parameters: Vec<ParameterBuilder>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventGroupBuilder {
    pub name: String,
    /// an event group goes into every container matching these
    #[serde(default)]
    pub source_criteria: DescriptorCriteria,
    #[serde(default)]
    pub events: Vec<EventBuilder>,
    #[serde(default)]
    pub parameters: Vec<ParameterBuilder>,
}

/// The building blocks selected for one simulation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingBlocks {
    pub molecules: Vec<MoleculeBuilder>,
    pub reactions: Vec<ReactionBuilder>,
    pub observers: Vec<ObserverBuilder>,
    /// the calculation methods in use, applied in this order
    pub calculation_methods: Vec<CalculationMethod>,
    pub transports: Vec<TransportBuilder>,
    pub event_groups: Vec<EventGroupBuilder>,
}

impl BuildingBlocks {
    /// Only a JSON object is accepted; every omitted section is empty.
    pub fn from_json(json: &str) -> Result<Self> {
        let value = parse_object(json)?;
        serde_json::from_value(value).map_err(bad_configuration)
    }

    pub fn molecule(&self, name: &str) -> Option<&MoleculeBuilder> {
        self.molecules.iter().find(|m| m.name == name)
    }

    /// Floating molecules declaring use of `calculation_method`.
    pub fn molecules_using(&self, calculation_method: &str) -> Vec<&MoleculeBuilder> {
        self.molecules
            .iter()
            .filter(|m| m.is_floating_xenobiotic && m.uses(calculation_method))
            .collect()
    }

    pub fn floating_molecules(&self) -> Vec<&MoleculeBuilder> {
        self.molecules
            .iter()
            .filter(|m| m.is_floating_xenobiotic)
            .collect()
    }

    pub fn molecules_for(&self, list: &MoleculeList) -> Vec<&MoleculeBuilder> {
        self.molecules
            .iter()
            .filter(|m| list.accepts(&m.name))
            .collect()
    }
}
