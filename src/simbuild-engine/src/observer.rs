// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use log::debug;

use crate::blocks::{BuildingBlocks, ObserverBuilder, ObserverKind};
use crate::common::Result;
use crate::descriptor::DescriptorIndex;
use crate::keywords::{KeywordReplacer, ReplacementContext};
use crate::mapper::observer_from;
use crate::model::Model;
use crate::model_err;
use crate::tree::{ContainerMode, ContainerType, Entity, EntityId, EntityKind, QuantityType};

/// Creates every observer of `blocks`: amount observers first, then
/// container observers.  Containers are matched against the tree as it was
/// on entry.  Returns the number of observers created.
pub fn create_observers(
    model: &mut Model,
    blocks: &BuildingBlocks,
    ctx: &ReplacementContext,
) -> Result<usize> {
    let index = DescriptorIndex::build(
        &model.tree,
        model
            .tree
            .descendants(model.root)
            .into_iter()
            .filter(|id| model.tree[*id].is_container()),
    );

    let mut created = 0;
    for kind in [ObserverKind::Amount, ObserverKind::Container] {
        for builder in blocks.observers.iter().filter(|o| o.kind == kind) {
            let containers = index.all_satisfied_by(&builder.container_criteria)?;
            created += match kind {
                ObserverKind::Amount => {
                    create_amount_observer(model, blocks, builder, &containers, ctx)?
                }
                ObserverKind::Container => {
                    create_container_observer(model, blocks, builder, &containers, ctx)?
                }
            };
        }
    }
    Ok(created)
}

fn attach(
    model: &mut Model,
    builder: &ObserverBuilder,
    parent: EntityId,
    molecule: &str,
    quantity_type: QuantityType,
    ctx: &ReplacementContext,
) -> Result<()> {
    let observer = model
        .tree
        .add_child(parent, observer_from(builder, quantity_type))?;
    KeywordReplacer::new(ctx)
        .molecule(molecule)
        .replace_in(&mut model.tree, observer);
    debug!(
        "observer '{}' created in {}",
        builder.name,
        model.tree.absolute_path(parent)
    );
    Ok(())
}

fn create_amount_observer(
    model: &mut Model,
    blocks: &BuildingBlocks,
    builder: &ObserverBuilder,
    containers: &[EntityId],
    ctx: &ReplacementContext,
) -> Result<usize> {
    let molecules: Vec<&str> = blocks
        .molecules_for(&builder.molecule_list)
        .iter()
        .map(|m| m.name.as_str())
        .collect();

    let mut created = 0;
    for &container in containers {
        let amounts: Vec<(EntityId, String, QuantityType)> = model
            .tree
            .children(container)
            .iter()
            .filter_map(|id| match model.tree[*id].kind {
                EntityKind::MoleculeAmount { quantity_type }
                    if molecules.contains(&model.tree[*id].name.as_str()) =>
                {
                    Some((*id, model.tree[*id].name.clone(), quantity_type))
                }
                _ => None,
            })
            .collect();

        for (amount, name, quantity_type) in amounts {
            attach(model, builder, amount, &name, quantity_type, ctx)?;
            created += 1;
        }
    }
    Ok(created)
}

fn create_container_observer(
    model: &mut Model,
    blocks: &BuildingBlocks,
    builder: &ObserverBuilder,
    containers: &[EntityId],
    ctx: &ReplacementContext,
) -> Result<usize> {
    let molecules = blocks.molecules_for(&builder.molecule_list);

    let mut created = 0;
    for &container in containers {
        for molecule in molecules.iter() {
            let molecule_container = match model.tree.child_by_name(container, &molecule.name) {
                Some(id) if model.tree[id].is_container() => id,
                Some(_) => {
                    return model_err!(
                        DuplicateChildName,
                        format!(
                            "'{}' in {} is not a container",
                            molecule.name,
                            model.tree.absolute_path(container)
                        )
                    );
                }
                // only expected below logical containers
                None => model.tree.get_or_add_child(container, &molecule.name, || {
                    Entity::container("", ContainerMode::Logical, ContainerType::Molecule)
                }),
            };
            attach(
                model,
                builder,
                molecule_container,
                &molecule.name,
                molecule.quantity_type,
                ctx,
            )?;
            created += 1;
        }
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{MoleculeBuilder, MoleculeList};
    use crate::descriptor::DescriptorCriteria;
    use crate::formula::{ExplicitFormula, Formula};
    use crate::testutils::organism_model;

    fn observer(kind: ObserverKind, list: MoleculeList) -> ObserverBuilder {
        ObserverBuilder {
            name: "Concentration".to_owned(),
            kind,
            formula: Formula::Explicit(
                ExplicitFormula::new("M / V")
                    .with_path("M", "..|MOLECULE")
                    .with_path("V", "..|..|Volume"),
            ),
            dimension: Some("Concentration".to_owned()),
            molecule_list: list,
            container_criteria: DescriptorCriteria::all_of(&["Organ"]),
        }
    }

    fn blocks(observers: Vec<ObserverBuilder>) -> BuildingBlocks {
        BuildingBlocks {
            molecules: ["A", "B", "X"].iter().map(|n| MoleculeBuilder::new(n)).collect(),
            observers,
            ..Default::default()
        }
    }

    fn observer_paths(model: &Model) -> Vec<String> {
        model
            .tree
            .subtree(model.root)
            .into_iter()
            .filter(|id| matches!(model.tree[*id].kind, EntityKind::Observer { .. }))
            .map(|id| model.tree.absolute_path(id).to_string())
            .collect()
    }

    #[test]
    fn test_amount_observer_all_except() {
        let mut m = organism_model();
        for container in [m.liver, m.kidney] {
            for molecule in ["A", "X"] {
                m.model
                    .add_molecule_amount(container, molecule, QuantityType::Drug)
                    .unwrap();
            }
        }
        m.model
            .add_molecule_amount(m.lung, "B", QuantityType::Enzyme)
            .unwrap();

        let ctx = ReplacementContext::for_model(&m.model);
        let blocks = blocks(vec![observer(
            ObserverKind::Amount,
            MoleculeList::all_except(&["X"]),
        )]);
        assert_eq!(3, create_observers(&mut m.model, &blocks, &ctx).unwrap());
        assert_eq!(
            vec![
                "Sim|Organism|Liver|A|Concentration",
                "Sim|Organism|Kidney|A|Concentration",
                "Sim|Organism|Lung|B|Concentration",
            ],
            observer_paths(&m.model)
        );

        let lung_b = m.model.tree.child_by_name(m.lung, "B").unwrap();
        let obs = m.model.tree.child_by_name(lung_b, "Concentration").unwrap();
        assert_eq!(
            EntityKind::Observer {
                quantity_type: QuantityType::Enzyme
            },
            m.model.tree[obs].kind
        );
        let paths = m.model.tree[obs].formula.as_ref().unwrap().paths();
        assert_eq!("..|B", paths[0].path.to_string());
    }

    #[test]
    fn test_container_observer_creates_molecule_container() {
        let mut m = organism_model();
        m.model
            .add_molecule_amount(m.liver, "A", QuantityType::Drug)
            .unwrap();

        let ctx = ReplacementContext::for_model(&m.model);
        let blocks = blocks(vec![observer(ObserverKind::Container, MoleculeList::only(&["A"]))]);
        assert_eq!(3, create_observers(&mut m.model, &blocks, &ctx).unwrap());
        assert_eq!(
            vec![
                "Sim|Organism|Liver|A|Concentration",
                "Sim|Organism|Kidney|A|Concentration",
                "Sim|Organism|Lung|A|Concentration",
            ],
            observer_paths(&m.model)
        );

        let created = m.model.tree.child_by_name(m.kidney, "A").unwrap();
        assert_eq!(
            EntityKind::Container {
                mode: ContainerMode::Logical,
                container_type: ContainerType::Molecule
            },
            m.model.tree[created].kind
        );
        let existing = m.model.tree.child_by_name(m.liver, "A").unwrap();
        assert!(m.model.tree[existing].is_molecule_amount());
    }
}
