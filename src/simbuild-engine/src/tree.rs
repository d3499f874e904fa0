// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Arena-backed container tree.
//!
//! Every node is owned by the [`Tree`] and addressed by an [`EntityId`];
//! parents are stored as ids, so there are no reference cycles.  Removed
//! nodes leave an empty slot behind and their ids are never reused.

use std::collections::BTreeSet;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::common::Result;
use crate::formula::Formula;
use crate::model_err;
use crate::path::ObjectPath;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(usize);

impl EntityId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerMode {
    Physical,
    Logical,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerType {
    Simulation,
    Organism,
    Organ,
    Compartment,
    Neighborhood,
    Molecule,
    Reaction,
    Other,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuantityType {
    Drug,
    Enzyme,
    Metabolite,
    Transporter,
    Complex,
    OtherProtein,
    #[default]
    Undefined,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterBuildMode {
    #[default]
    Local,
    Global,
    Property,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EntityKind {
    Container {
        mode: ContainerMode,
        container_type: ContainerType,
    },
    /// An adjacency edge between two physical containers.  It lives in the
    /// tree (so it can own parameters) but its endpoints are not its parent.
    Neighborhood { first: EntityId, second: EntityId },
    MoleculeAmount { quantity_type: QuantityType },
    Parameter { build_mode: ParameterBuildMode },
    /// `quantity_type` is the type of the observed molecule.
    Observer { quantity_type: QuantityType },
    /// A local reaction instance sharing the global `properties` container.
    Reaction { properties: EntityId },
    /// Moves molecules from the `source` amount to the `target` amount.  Lives
    /// in a molecule container below a neighborhood.
    Transport { source: EntityId, target: EntityId },
    EventGroup,
    /// The formula is the condition that fires the event.
    Event { one_time: bool },
    EventAssignment {
        object_path: ObjectPath,
        use_as_value: bool,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub name: String,
    pub kind: EntityKind,
    pub tags: BTreeSet<String>,
    pub formula: Option<Formula>,
    pub dimension: Option<String>,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
}

impl Entity {
    pub fn new(name: &str, kind: EntityKind) -> Self {
        Entity {
            name: name.to_owned(),
            kind,
            tags: BTreeSet::new(),
            formula: None,
            dimension: None,
            parent: None,
            children: vec![],
        }
    }

    pub fn container(name: &str, mode: ContainerMode, container_type: ContainerType) -> Self {
        Self::new(
            name,
            EntityKind::Container {
                mode,
                container_type,
            },
        )
    }

    pub fn parameter(name: &str, formula: Formula) -> Self {
        Self::new(
            name,
            EntityKind::Parameter {
                build_mode: ParameterBuildMode::Local,
            },
        )
        .with_formula(formula)
    }

    pub fn with_formula(mut self, formula: Formula) -> Self {
        self.formula = Some(formula);
        self
    }

    pub fn with_dimension(mut self, dimension: Option<String>) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.insert(tag.to_owned());
        self
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    /// Containers can be the target of descriptor criteria and can hold
    /// molecule containers or amounts.
    pub fn is_container(&self) -> bool {
        matches!(
            self.kind,
            EntityKind::Container { .. }
                | EntityKind::Neighborhood { .. }
                | EntityKind::MoleculeAmount { .. }
                | EntityKind::Reaction { .. }
                | EntityKind::Transport { .. }
                | EntityKind::EventGroup
                | EntityKind::Event { .. }
        )
    }

    /// Anything that can be referenced from a formula.
    pub fn is_formula_usable(&self) -> bool {
        matches!(
            self.kind,
            EntityKind::Parameter { .. }
                | EntityKind::MoleculeAmount { .. }
                | EntityKind::Observer { .. }
                | EntityKind::Transport { .. }
        )
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self.kind, EntityKind::Parameter { .. })
    }

    pub fn is_molecule_amount(&self) -> bool {
        matches!(self.kind, EntityKind::MoleculeAmount { .. })
    }

    pub fn is_neighborhood(&self) -> bool {
        matches!(self.kind, EntityKind::Neighborhood { .. })
    }

    pub fn mode(&self) -> ContainerMode {
        match self.kind {
            EntityKind::Container { mode, .. } => mode,
            _ => ContainerMode::Logical,
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name == name
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tree {
    nodes: Vec<Option<Entity>>,
}

impl Tree {
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a parentless node.
    pub fn add_root(&mut self, mut entity: Entity) -> EntityId {
        entity.parent = None;
        entity.children.clear();
        let id = EntityId(self.nodes.len());
        self.nodes.push(Some(entity));
        id
    }

    pub fn add_child(&mut self, parent: EntityId, mut entity: Entity) -> Result<EntityId> {
        if self.child_by_name(parent, &entity.name).is_some() {
            return model_err!(
                DuplicateChildName,
                format!("'{}' already exists under {}", entity.name, self.absolute_path(parent))
            );
        }
        entity.parent = Some(parent);
        entity.children.clear();
        let id = EntityId(self.nodes.len());
        self.nodes.push(Some(entity));
        self[parent].children.push(id);
        Ok(id)
    }

    /// Returns the child named `name`, creating it with `make` if there is
    /// none yet.
    pub fn get_or_add_child<F>(&mut self, parent: EntityId, name: &str, make: F) -> EntityId
    where
        F: FnOnce() -> Entity,
    {
        if let Some(id) = self.child_by_name(parent, name) {
            return id;
        }
        let mut entity = make();
        entity.name = name.to_owned();
        entity.parent = Some(parent);
        entity.children.clear();
        let id = EntityId(self.nodes.len());
        self.nodes.push(Some(entity));
        self[parent].children.push(id);
        id
    }

    /// Detaches `id` from its parent and drops it and all its descendants.
    pub fn remove(&mut self, id: EntityId) {
        if let Some(parent) = self.parent(id) {
            self[parent].children.retain(|c| *c != id);
        }
        for node in self.subtree(id) {
            self.nodes[node.0] = None;
        }
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.nodes.get(id.0).and_then(|n| n.as_ref())
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    pub fn parent(&self, id: EntityId) -> Option<EntityId> {
        self[id].parent
    }

    pub fn children(&self, id: EntityId) -> &[EntityId] {
        &self[id].children
    }

    pub fn child_by_name(&self, id: EntityId, name: &str) -> Option<EntityId> {
        self[id]
            .children
            .iter()
            .copied()
            .find(|c| self[*c].name == name)
    }

    pub fn root_of(&self, id: EntityId) -> EntityId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// `id` followed by all of its descendants, in pre-order.
    pub fn subtree(&self, id: EntityId) -> Vec<EntityId> {
        let mut result = vec![];
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            result.push(current);
            // reversed so that children pop off in declaration order
            stack.extend(self[current].children.iter().rev().copied());
        }
        result
    }

    /// All descendants of `id` in pre-order, excluding `id` itself.
    pub fn descendants(&self, id: EntityId) -> Vec<EntityId> {
        let mut all = self.subtree(id);
        all.remove(0);
        all
    }

    /// Names from the root down to (and including) `id`.
    pub fn absolute_path(&self, id: EntityId) -> ObjectPath {
        let mut names = self.ancestor_names(id);
        names.push(self[id].name.clone());
        ObjectPath::from_segments(names)
    }

    /// Names of every strict ancestor of `id`, root first.
    pub fn ancestor_names(&self, id: EntityId) -> Vec<String> {
        let mut names = vec![];
        let mut current = self.parent(id);
        while let Some(parent) = current {
            names.push(self[parent].name.clone());
            current = self.parent(parent);
        }
        names.reverse();
        names
    }

    /// The closest neighborhood among `id` and its ancestors.
    pub fn neighborhood_ancestor(&self, id: EntityId) -> Option<EntityId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if self[node].is_neighborhood() {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }
}

impl Index<EntityId> for Tree {
    type Output = Entity;

    fn index(&self, id: EntityId) -> &Entity {
        match self.nodes.get(id.0) {
            Some(Some(entity)) => entity,
            _ => panic!("entity {} was removed from the tree", id.0),
        }
    }
}

impl IndexMut<EntityId> for Tree {
    fn index_mut(&mut self, id: EntityId) -> &mut Entity {
        match self.nodes.get_mut(id.0) {
            Some(Some(entity)) => entity,
            _ => panic!("entity {} was removed from the tree", id.0),
        }
    }
}
