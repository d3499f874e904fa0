// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use serde::{Deserialize, Serialize};

use crate::blocks::parse_object;
use crate::common::{Error, ErrorCode, ErrorKind, Result};

/// Names the construction pass relies on.  The defaults match the spatial
/// structures produced for whole-body models.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    pub organism: String,
    pub lumen: String,
    /// Ordered from the stomach downwards; navigation keywords step through
    /// this list.
    pub lumen_segments: Vec<String>,
    pub neighborhoods: String,
    // parent volume references
    pub volume_parameter: String,
    pub volume_alias: String,
    pub volume_dimension: String,
    /// Molecules declared in this dimension get a start value parameter and
    /// an amount computed from it.
    pub concentration_dimension: String,
    pub amount_dimension: String,
    pub start_value_parameter: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            organism: "Organism".to_owned(),
            lumen: "Lumen".to_owned(),
            lumen_segments: [
                "Stomach",
                "Duodenum",
                "UpperJejunum",
                "LowerJejunum",
                "UpperIleum",
                "LowerIleum",
                "Caecum",
                "ColonAscendens",
                "ColonTransversum",
                "ColonDescendens",
                "ColonSigmoid",
                "Rectum",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            neighborhoods: "Neighborhoods".to_owned(),
            volume_parameter: "Volume".to_owned(),
            volume_alias: "V".to_owned(),
            volume_dimension: "Volume".to_owned(),
            concentration_dimension: "Concentration".to_owned(),
            amount_dimension: "Amount".to_owned(),
            start_value_parameter: "Start value".to_owned(),
        }
    }
}

impl BuildOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        let value = parse_object(json)?;
        let options: BuildOptions = serde_json::from_value(value).map_err(|err| {
            Error::new(
                ErrorKind::Model,
                ErrorCode::BadConfiguration,
                Some(err.to_string()),
            )
        })?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lumen_segments.is_empty() {
            return crate::model_err!(BadConfiguration, "no lumen segments".to_owned());
        }
        if self.organism.is_empty() || self.lumen.is_empty() || self.neighborhoods.is_empty() {
            return crate::model_err!(BadConfiguration, "empty container name".to_owned());
        }
        if self.volume_parameter.is_empty() || self.start_value_parameter.is_empty() {
            return crate::model_err!(BadConfiguration, "empty parameter name".to_owned());
        }
        Ok(())
    }

    pub fn lumen_segment_index(&self, name: &str) -> Option<usize> {
        self.lumen_segments.iter().position(|s| s == name)
    }
}
