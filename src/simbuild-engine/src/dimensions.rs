// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub base_unit: String,
}

/// Read-only view of the unit system: construction only needs to know
/// whether a dimension exists, to stamp it on formula paths.
pub trait DimensionLookup {
    fn dimension(&self, name: &str) -> Option<&Dimension>;

    /// `name` if it is a known dimension
    fn stamp(&self, name: Option<&str>) -> Option<String> {
        name.and_then(|n| self.dimension(n)).map(|d| d.name.clone())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DimensionRegistry {
    dimensions: HashMap<String, Dimension>,
}

impl DimensionRegistry {
    pub fn new(dimensions: &[Dimension]) -> Self {
        DimensionRegistry {
            dimensions: dimensions
                .iter()
                .map(|dim| (dim.name.clone(), dim.clone()))
                .collect(),
        }
    }

    pub fn new_with_builtins() -> Self {
        let builtins: &[(&str, &str)] = &[
            ("Dimensionless", ""),
            ("Amount", "µmol"),
            ("Volume", "l"),
            ("Concentration", "µmol/l"),
            ("Time", "min"),
            ("Flow", "l/min"),
            ("Amount per time", "µmol/min"),
        ];
        let builtins = builtins
            .iter()
            .map(|(name, unit)| Dimension {
                name: name.to_string(),
                base_unit: unit.to_string(),
            })
            .collect::<Vec<_>>();
        Self::new(&builtins)
    }
}

impl DimensionLookup for DimensionRegistry {
    fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.get(name)
    }
}

#[test]
fn test_stamp() {
    let dims = DimensionRegistry::new_with_builtins();
    assert_eq!(Some("Volume".to_owned()), dims.stamp(Some("Volume")));
    assert_eq!(None, dims.stamp(Some("Furlongs")));
    assert_eq!(None, dims.stamp(None));
    assert_eq!("l", dims.dimension("Volume").unwrap().base_unit);
}
