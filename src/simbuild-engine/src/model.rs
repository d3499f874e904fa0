// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use crate::common::Result;
use crate::formula::Formula;
use crate::tree::{
    ContainerMode, ContainerType, Entity, EntityId, EntityKind, QuantityType, Tree,
};

pub const NEIGHBORHOOD_TAG: &str = "Neighborhood";

/// The model under construction: a container tree whose root is named after
/// the simulation, with the neighborhood graph kept in a logical container
/// directly below the root.
#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    pub tree: Tree,
    pub root: EntityId,
    pub neighborhoods: EntityId,
}

impl Model {
    pub fn new(name: &str, neighborhoods_name: &str) -> Self {
        let mut tree = Tree::new();
        let root = tree.add_root(Entity::container(
            name,
            ContainerMode::Logical,
            ContainerType::Simulation,
        ));
        let neighborhoods = tree.get_or_add_child(root, neighborhoods_name, || {
            Entity::container("", ContainerMode::Logical, ContainerType::Other)
        });
        Model {
            tree,
            root,
            neighborhoods,
        }
    }

    pub fn name(&self) -> &str {
        &self.tree[self.root].name
    }

    pub fn add_container(
        &mut self,
        parent: EntityId,
        name: &str,
        mode: ContainerMode,
        container_type: ContainerType,
    ) -> Result<EntityId> {
        self.tree
            .add_child(parent, Entity::container(name, mode, container_type))
    }

    pub fn add_parameter(
        &mut self,
        parent: EntityId,
        name: &str,
        formula: Formula,
    ) -> Result<EntityId> {
        self.tree.add_child(parent, Entity::parameter(name, formula))
    }

    pub fn add_molecule_amount(
        &mut self,
        container: EntityId,
        name: &str,
        quantity_type: QuantityType,
    ) -> Result<EntityId> {
        self.tree.add_child(
            container,
            Entity::new(name, EntityKind::MoleculeAmount { quantity_type })
                .with_dimension(Some("Amount".to_owned())),
        )
    }

    pub fn add_neighborhood(
        &mut self,
        name: &str,
        first: EntityId,
        second: EntityId,
    ) -> Result<EntityId> {
        self.tree.add_child(
            self.neighborhoods,
            Entity::new(name, EntityKind::Neighborhood { first, second })
                .with_tag(NEIGHBORHOOD_TAG),
        )
    }

    /// Every neighborhood, in tree order.
    pub fn all_neighborhoods(&self) -> Vec<EntityId> {
        self.tree
            .descendants(self.neighborhoods)
            .into_iter()
            .filter(|id| self.tree[*id].is_neighborhood())
            .collect()
    }

    /// Neighborhoods among `candidates` that have `container` as one of
    /// their endpoints.
    pub fn neighborhoods_of(&self, container: EntityId, candidates: &[EntityId]) -> Vec<EntityId> {
        candidates
            .iter()
            .copied()
            .filter(|id| match self.tree[*id].kind {
                EntityKind::Neighborhood { first, second } => {
                    first == container || second == container
                }
                _ => false,
            })
            .collect()
    }

    /// Names of the top containers, excluding the neighborhoods container.
    pub fn top_container_names(&self) -> Vec<String> {
        self.tree
            .children(self.root)
            .iter()
            .filter(|id| **id != self.neighborhoods)
            .map(|id| self.tree[*id].name.clone())
            .collect()
    }

    /// Every entity that owns a formula, in tree order.
    pub fn formula_users(&self) -> Vec<EntityId> {
        self.tree
            .subtree(self.root)
            .into_iter()
            .filter(|id| self.tree[*id].formula.is_some())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighborhood_lookup() {
        let mut model = Model::new("Sim", "Neighborhoods");
        let organism = model
            .add_container(model.root, "Organism", ContainerMode::Physical, ContainerType::Organism)
            .unwrap();
        let liver = model
            .add_container(organism, "Liver", ContainerMode::Physical, ContainerType::Organ)
            .unwrap();
        let kidney = model
            .add_container(organism, "Kidney", ContainerMode::Physical, ContainerType::Organ)
            .unwrap();
        let lung = model
            .add_container(organism, "Lung", ContainerMode::Physical, ContainerType::Organ)
            .unwrap();
        let n1 = model.add_neighborhood("Liver_Kidney", liver, kidney).unwrap();
        let n2 = model.add_neighborhood("Lung_Liver", lung, liver).unwrap();

        let all = model.all_neighborhoods();
        assert_eq!(vec![n1, n2], all);
        assert_eq!(vec![n1, n2], model.neighborhoods_of(liver, &all));
        let to_liver = model.neighborhoods_of(liver, &all);
        assert_eq!(vec![n1], model.neighborhoods_of(kidney, &to_liver));
        assert_eq!(vec!["Organism".to_owned()], model.top_container_names());
        assert_eq!("Sim", model.name());
    }
}
