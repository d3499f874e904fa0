// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use crate::formula::Formula;
use crate::model::Model;
use crate::tree::{ContainerMode, ContainerType, EntityId, QuantityType};

pub(crate) struct OrganismModel {
    pub model: Model,
    pub organism: EntityId,
    pub liver: EntityId,
    pub kidney: EntityId,
    pub lung: EntityId,
    pub liver_kidney: EntityId,
}

fn organ(model: &mut Model, parent: EntityId, name: &str) -> EntityId {
    let id = model
        .add_container(parent, name, ContainerMode::Physical, ContainerType::Organ)
        .unwrap();
    model.tree[id].tags.insert("Organ".to_owned());
    model
        .add_parameter(id, "Volume", Formula::Constant(1.0))
        .unwrap();
    id
}

/// `Sim|Organism|{Liver,Kidney,Lung}`, each organ with a `Volume`, and a
/// single `Liver_Kidney` neighborhood.
pub(crate) fn organism_model() -> OrganismModel {
    let mut model = Model::new("Sim", "Neighborhoods");
    let organism = model
        .add_container(
            model.root,
            "Organism",
            ContainerMode::Physical,
            ContainerType::Organism,
        )
        .unwrap();
    let liver = organ(&mut model, organism, "Liver");
    let kidney = organ(&mut model, organism, "Kidney");
    let lung = organ(&mut model, organism, "Lung");
    let liver_kidney = model.add_neighborhood("Liver_Kidney", liver, kidney).unwrap();
    OrganismModel {
        model,
        organism,
        liver,
        kidney,
        lung,
        liver_kidney,
    }
}

/// The organism model with molecule amounts: `A` and `B` in the liver and
/// the kidney, `A` only in the lung.
pub(crate) fn organism_with_molecules() -> OrganismModel {
    let mut m = organism_model();
    for (container, molecules) in [
        (m.liver, &["A", "B"][..]),
        (m.kidney, &["A", "B"][..]),
        (m.lung, &["A"][..]),
    ] {
        for molecule in molecules {
            m.model
                .add_molecule_amount(container, molecule, QuantityType::Drug)
                .unwrap();
        }
    }
    m
}

pub(crate) struct LumenModel {
    pub model: Model,
    pub stomach: EntityId,
    pub duodenum: EntityId,
    pub duodenum_mucosa: EntityId,
}

/// `Sim|Organism|Lumen|{Stomach,Duodenum,UpperJejunum}` plus a mucosa
/// compartment `Sim|Organism|SmallIntestine|Mucosa|Duodenum`.
pub(crate) fn lumen_model() -> LumenModel {
    let mut model = Model::new("Sim", "Neighborhoods");
    let physical =
        |model: &mut Model, parent: EntityId, name: &str, container_type: ContainerType| {
            model
                .add_container(parent, name, ContainerMode::Physical, container_type)
                .unwrap()
        };
    let root = model.root;
    let organism = physical(&mut model, root, "Organism", ContainerType::Organism);
    let lumen = physical(&mut model, organism, "Lumen", ContainerType::Organ);
    let stomach = physical(&mut model, lumen, "Stomach", ContainerType::Compartment);
    let duodenum = physical(&mut model, lumen, "Duodenum", ContainerType::Compartment);
    physical(&mut model, lumen, "UpperJejunum", ContainerType::Compartment);
    let intestine = physical(&mut model, organism, "SmallIntestine", ContainerType::Organ);
    let mucosa = physical(&mut model, intestine, "Mucosa", ContainerType::Compartment);
    let duodenum_mucosa = physical(&mut model, mucosa, "Duodenum", ContainerType::Compartment);
    LumenModel {
        model,
        stomach,
        duodenum,
        duodenum_mucosa,
    }
}
