// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Descriptor criteria and the per-pass index they are evaluated against.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::common::Result;
use crate::consistency_err;
use crate::tree::{EntityId, Tree};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CriteriaOperator {
    #[default]
    And,
    Or,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DescriptorCondition {
    MatchAll,
    MatchTag(String),
    NotMatchTag(String),
    /// some strict ancestor has this name
    InContainer(String),
    NotInContainer(String),
    /// placeholder for "next to the entity being evaluated"; has to be
    /// rewritten into `InContainer` conditions before index evaluation
    InParent,
    Criteria(DescriptorCriteria),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorCriteria {
    #[serde(default)]
    pub operator: CriteriaOperator,
    #[serde(default)]
    pub conditions: Vec<DescriptorCondition>,
}

/// What the criteria see of an entity.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityDescriptor {
    pub id: EntityId,
    pub parent: Option<EntityId>,
    /// explicit tags plus the entity's own name
    pub tags: BTreeSet<String>,
    pub ancestors: BTreeSet<String>,
}

impl EntityDescriptor {
    pub fn from_tree(tree: &Tree, id: EntityId) -> Self {
        let entity = &tree[id];
        let mut tags = entity.tags.clone();
        tags.insert(entity.name.clone());
        EntityDescriptor {
            id,
            parent: entity.parent(),
            tags,
            ancestors: tree.ancestor_names(id).into_iter().collect(),
        }
    }
}

impl DescriptorCriteria {
    pub fn new(operator: CriteriaOperator, conditions: Vec<DescriptorCondition>) -> Self {
        DescriptorCriteria {
            operator,
            conditions,
        }
    }

    pub fn all_of(tags: &[&str]) -> Self {
        Self::new(
            CriteriaOperator::And,
            tags.iter()
                .map(|t| DescriptorCondition::MatchTag(t.to_string()))
                .collect(),
        )
    }

    pub fn and(mut self, condition: DescriptorCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// true if an `InParent` condition appears anywhere in the tree
    pub fn contains_in_parent(&self) -> bool {
        self.conditions.iter().any(|c| match c {
            DescriptorCondition::InParent => true,
            DescriptorCondition::Criteria(nested) => nested.contains_in_parent(),
            _ => false,
        })
    }

    /// Evaluates the criteria against a single entity, which is also the
    /// subject `InParent` refers to.
    pub fn is_satisfied_by(&self, entity: &EntityDescriptor) -> bool {
        self.is_satisfied_relative_to(entity, entity.parent)
    }

    /// Evaluates against `candidate`; `InParent` holds when the candidate
    /// lives directly in `subject_parent`.  Empty criteria match nothing.
    pub fn is_satisfied_relative_to(
        &self,
        candidate: &EntityDescriptor,
        subject_parent: Option<EntityId>,
    ) -> bool {
        if self.is_empty() {
            return false;
        }
        let mut results = self
            .conditions
            .iter()
            .map(|c| condition_satisfied(c, candidate, subject_parent));
        match self.operator {
            CriteriaOperator::And => results.all(|r| r),
            CriteriaOperator::Or => results.any(|r| r),
        }
    }

    /// Replaces top-level `InParent` conditions with one `InContainer`
    /// condition per segment of `parent_path`.
    pub fn rewrite_in_parent(&self, parent_path: &[String]) -> Result<DescriptorCriteria> {
        if !self.contains_in_parent() {
            return Ok(self.clone());
        }

        let nested_in_parent = self.conditions.iter().any(|c| match c {
            DescriptorCondition::Criteria(nested) => nested.contains_in_parent(),
            _ => false,
        });
        if self.operator != CriteriaOperator::And || nested_in_parent {
            return consistency_err!(InParentTagCanOnlyBeUsedWithAndOperator);
        }

        let mut rewritten = DescriptorCriteria {
            operator: CriteriaOperator::And,
            conditions: self
                .conditions
                .iter()
                .filter(|c| !matches!(c, DescriptorCondition::InParent))
                .cloned()
                .collect(),
        };
        rewritten.conditions.extend(
            parent_path
                .iter()
                .map(|segment| DescriptorCondition::InContainer(segment.clone())),
        );
        Ok(rewritten)
    }
}

fn condition_satisfied(
    condition: &DescriptorCondition,
    candidate: &EntityDescriptor,
    subject_parent: Option<EntityId>,
) -> bool {
    use DescriptorCondition::*;
    match condition {
        MatchAll => true,
        MatchTag(tag) => candidate.tags.contains(tag),
        NotMatchTag(tag) => !candidate.tags.contains(tag),
        InContainer(name) => candidate.ancestors.contains(name),
        NotInContainer(name) => !candidate.ancestors.contains(name),
        InParent => subject_parent.is_some() && candidate.parent == subject_parent,
        Criteria(nested) => nested.is_satisfied_relative_to(candidate, subject_parent),
    }
}

/// Entities of one kind (containers, or formula-usable quantities) indexed by
/// tag and by ancestor name.  Built once per pass and read-only afterwards;
/// results come back in the order the entities were indexed.
#[derive(Clone, Debug, Default)]
pub struct DescriptorIndex {
    entries: Vec<EntityDescriptor>,
    by_tag: HashMap<String, BTreeSet<usize>>,
    by_ancestor: HashMap<String, BTreeSet<usize>>,
}

impl DescriptorIndex {
    pub fn build<I>(tree: &Tree, ids: I) -> Self
    where
        I: IntoIterator<Item = EntityId>,
    {
        let mut index = DescriptorIndex::default();
        for id in ids {
            let descriptor = EntityDescriptor::from_tree(tree, id);
            let pos = index.entries.len();
            for tag in descriptor.tags.iter() {
                index.by_tag.entry(tag.clone()).or_default().insert(pos);
            }
            for name in descriptor.ancestors.iter() {
                index
                    .by_ancestor
                    .entry(name.clone())
                    .or_default()
                    .insert(pos);
            }
            index.entries.push(descriptor);
        }
        index
    }

    /// Every container (including `root`) below `root`.
    pub fn containers(tree: &Tree, root: EntityId) -> Self {
        let ids = tree.subtree(root).into_iter().filter(|id| tree[*id].is_container());
        Self::build(tree, ids)
    }

    /// Every formula-usable entity below `root`.
    pub fn formula_usables(tree: &Tree, root: EntityId) -> Self {
        let ids = tree
            .descendants(root)
            .into_iter()
            .filter(|id| tree[*id].is_formula_usable());
        Self::build(tree, ids)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn all_satisfied_by(&self, criteria: &DescriptorCriteria) -> Result<Vec<EntityId>> {
        let matches = self.evaluate(criteria)?;
        Ok(matches.into_iter().map(|pos| self.entries[pos].id).collect())
    }

    fn all(&self) -> BTreeSet<usize> {
        (0..self.entries.len()).collect()
    }

    fn lookup(map: &HashMap<String, BTreeSet<usize>>, key: &str) -> BTreeSet<usize> {
        map.get(key).cloned().unwrap_or_default()
    }

    fn evaluate(&self, criteria: &DescriptorCriteria) -> Result<BTreeSet<usize>> {
        let mut result: Option<BTreeSet<usize>> = None;
        for condition in criteria.conditions.iter() {
            let matches = self.evaluate_condition(condition)?;
            result = Some(match (result, criteria.operator) {
                (None, _) => matches,
                (Some(acc), CriteriaOperator::And) => acc.intersection(&matches).copied().collect(),
                (Some(acc), CriteriaOperator::Or) => acc.union(&matches).copied().collect(),
            });
        }
        Ok(result.unwrap_or_default())
    }

    fn evaluate_condition(&self, condition: &DescriptorCondition) -> Result<BTreeSet<usize>> {
        use DescriptorCondition::*;
        let matches = match condition {
            MatchAll => self.all(),
            MatchTag(tag) => Self::lookup(&self.by_tag, tag),
            NotMatchTag(tag) => {
                let excluded = Self::lookup(&self.by_tag, tag);
                self.all().difference(&excluded).copied().collect()
            }
            InContainer(name) => Self::lookup(&self.by_ancestor, name),
            NotInContainer(name) => {
                let excluded = Self::lookup(&self.by_ancestor, name);
                self.all().difference(&excluded).copied().collect()
            }
            InParent => {
                return consistency_err!(
                    InParentConditionNotRewritten,
                    "IN PARENT must be rewritten for the entity using it".to_owned()
                );
            }
            Criteria(nested) => self.evaluate(nested)?,
        };
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;
    use crate::formula::Formula;
    use crate::tree::{ContainerMode, ContainerType, Entity};

    struct Fixture {
        tree: Tree,
        root: EntityId,
        liver: EntityId,
        liver_cell: EntityId,
        kidney: EntityId,
        kidney_cell: EntityId,
    }

    fn fixture() -> Fixture {
        let organ = |name: &str| {
            Entity::container(name, ContainerMode::Physical, ContainerType::Organ).with_tag("Organ")
        };
        let cell = || {
            Entity::container(
                "Intracellular",
                ContainerMode::Physical,
                ContainerType::Compartment,
            )
        };
        let mut tree = Tree::new();
        let root = tree.add_root(Entity::container(
            "Organism",
            ContainerMode::Physical,
            ContainerType::Organism,
        ));
        let liver = tree.add_child(root, organ("Liver")).unwrap();
        let liver_cell = tree.add_child(liver, cell()).unwrap();
        let kidney = tree.add_child(root, organ("Kidney")).unwrap();
        let kidney_cell = tree.add_child(kidney, cell()).unwrap();
        tree.add_child(kidney_cell, Entity::parameter("pH", Formula::Constant(7.0)))
            .unwrap();
        Fixture {
            tree,
            root,
            liver,
            liver_cell,
            kidney,
            kidney_cell,
        }
    }

    #[test]
    fn test_index_and_or() {
        let f = fixture();
        let index = DescriptorIndex::containers(&f.tree, f.root);
        assert_eq!(5, index.len());

        let organs = DescriptorCriteria::all_of(&["Organ"]);
        assert_eq!(vec![f.liver, f.kidney], index.all_satisfied_by(&organs).unwrap());

        let kidney_cell = DescriptorCriteria::all_of(&["Intracellular"])
            .and(DescriptorCondition::InContainer("Kidney".to_owned()));
        assert_eq!(
            vec![f.kidney_cell],
            index.all_satisfied_by(&kidney_cell).unwrap()
        );

        let either = DescriptorCriteria::new(
            CriteriaOperator::Or,
            vec![
                DescriptorCondition::MatchTag("Liver".to_owned()),
                DescriptorCondition::Criteria(kidney_cell.clone()),
            ],
        );
        assert_eq!(
            vec![f.liver, f.kidney_cell],
            index.all_satisfied_by(&either).unwrap()
        );
    }

    #[test]
    fn test_negations_and_match_all() {
        let f = fixture();
        let index = DescriptorIndex::containers(&f.tree, f.root);

        let not_kidney = DescriptorCriteria::all_of(&["Intracellular"])
            .and(DescriptorCondition::NotInContainer("Kidney".to_owned()));
        assert_eq!(vec![f.liver_cell], index.all_satisfied_by(&not_kidney).unwrap());

        let not_organ = DescriptorCriteria::new(
            CriteriaOperator::And,
            vec![
                DescriptorCondition::MatchAll,
                DescriptorCondition::NotMatchTag("Organ".to_owned()),
            ],
        );
        assert_eq!(
            vec![f.root, f.liver_cell, f.kidney_cell],
            index.all_satisfied_by(&not_organ).unwrap()
        );
    }

    #[test]
    fn test_empty_criteria_match_nothing() {
        let f = fixture();
        let index = DescriptorIndex::containers(&f.tree, f.root);
        let empty = DescriptorCriteria::default();
        assert!(index.all_satisfied_by(&empty).unwrap().is_empty());
        let liver = EntityDescriptor::from_tree(&f.tree, f.liver);
        assert!(!empty.is_satisfied_by(&liver));
    }

    #[test]
    fn test_in_parent_rejected_by_index() {
        let f = fixture();
        let index = DescriptorIndex::containers(&f.tree, f.root);
        let criteria = DescriptorCriteria::all_of(&["Organ"]).and(DescriptorCondition::InParent);
        let err = index.all_satisfied_by(&criteria).unwrap_err();
        assert_eq!(ErrorCode::InParentConditionNotRewritten, err.code);
    }

    #[test]
    fn test_single_entity_evaluation() {
        let f = fixture();
        let liver_cell = EntityDescriptor::from_tree(&f.tree, f.liver_cell);
        let criteria =
            DescriptorCriteria::all_of(&["Intracellular"]).and(DescriptorCondition::InParent);
        assert!(criteria.is_satisfied_by(&liver_cell));
        assert!(criteria.is_satisfied_relative_to(&liver_cell, Some(f.liver)));
        assert!(!criteria.is_satisfied_relative_to(&liver_cell, Some(f.kidney)));
    }

    #[test]
    fn test_rewrite_in_parent() {
        let criteria = DescriptorCriteria::all_of(&["pH"]).and(DescriptorCondition::InParent);
        let parent_path = vec!["Kidney".to_owned(), "Intracellular".to_owned()];
        let rewritten = criteria.rewrite_in_parent(&parent_path).unwrap();
        assert!(!rewritten.contains_in_parent());
        assert_eq!(
            vec![
                DescriptorCondition::MatchTag("pH".to_owned()),
                DescriptorCondition::InContainer("Kidney".to_owned()),
                DescriptorCondition::InContainer("Intracellular".to_owned()),
            ],
            rewritten.conditions
        );

        let or = DescriptorCriteria::new(
            CriteriaOperator::Or,
            vec![
                DescriptorCondition::MatchTag("pH".to_owned()),
                DescriptorCondition::InParent,
            ],
        );
        let err = or.rewrite_in_parent(&parent_path).unwrap_err();
        assert_eq!(ErrorCode::InParentTagCanOnlyBeUsedWithAndOperator, err.code);

        let nested = DescriptorCriteria::all_of(&["pH"]).and(DescriptorCondition::Criteria(
            DescriptorCriteria::new(CriteriaOperator::And, vec![DescriptorCondition::InParent]),
        ));
        assert!(nested.rewrite_in_parent(&parent_path).is_err());

        let untouched = DescriptorCriteria::all_of(&["pH"]);
        assert_eq!(untouched, untouched.rewrite_in_parent(&parent_path).unwrap());
    }
}
