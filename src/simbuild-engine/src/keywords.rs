// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Replacement of the simple keywords (`MOLECULE`, `REACTION`, the
//! neighborhood and transport keywords, `ALL_FLOATING_MOLECULES`) and of
//! top-container prefixes in formula paths.

use std::collections::BTreeSet;

use crate::model::Model;
use crate::path::{keywords, ObjectPath};
use crate::tree::{EntityId, EntityKind, Tree};

/// What absolute paths get anchored to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplacementContext {
    pub model_name: String,
    pub top_container_names: Vec<String>,
}

impl ReplacementContext {
    pub fn for_model(model: &Model) -> Self {
        ReplacementContext {
            model_name: model.name().to_owned(),
            top_container_names: model.top_container_names(),
        }
    }

    /// Prefixes absolute paths starting at a top container with the model
    /// name.  Relative paths and paths starting with a keyword are left
    /// alone.
    pub fn anchor(&self, path: &mut ObjectPath) {
        let first = match path.first() {
            Some(first) => first,
            None => return,
        };
        if keywords::is_keyword(first) {
            return;
        }
        if self.top_container_names.iter().any(|n| n == first) {
            path.push_front(self.model_name.clone());
        }
    }
}

pub struct KeywordReplacer<'a> {
    context: &'a ReplacementContext,
    replacements: Vec<(&'static str, Vec<String>)>,
}

impl<'a> KeywordReplacer<'a> {
    pub fn new(context: &'a ReplacementContext) -> Self {
        KeywordReplacer {
            context,
            replacements: vec![],
        }
    }

    pub fn molecule(mut self, name: &str) -> Self {
        self.replacements
            .push((keywords::MOLECULE, vec![name.to_owned()]));
        self
    }

    pub fn reaction(mut self, name: &str) -> Self {
        self.replacements
            .push((keywords::REACTION, vec![name.to_owned()]));
        self
    }

    /// `NEIGHBORHOOD`, `FIRST_NEIGHBOR` and `SECOND_NEIGHBOR` become the
    /// absolute paths of the neighborhood and its two endpoints.
    pub fn neighborhood(mut self, tree: &Tree, neighborhood: EntityId) -> Self {
        let to_segments = |id: EntityId| tree.absolute_path(id).segments().to_vec();
        self.replacements
            .push((keywords::NEIGHBORHOOD, to_segments(neighborhood)));
        if let EntityKind::Neighborhood { first, second } = tree[neighborhood].kind {
            self.replacements
                .push((keywords::FIRST_NEIGHBOR, to_segments(first)));
            self.replacements
                .push((keywords::SECOND_NEIGHBOR, to_segments(second)));
        }
        self
    }

    /// `SOURCE` and `TARGET` become the absolute paths of a transport's
    /// endpoints.
    pub fn transport(mut self, tree: &Tree, source: EntityId, target: EntityId) -> Self {
        self.replacements
            .push((keywords::SOURCE, tree.absolute_path(source).segments().to_vec()));
        self.replacements
            .push((keywords::TARGET, tree.absolute_path(target).segments().to_vec()));
        self
    }

    /// `ALL_FLOATING_MOLECULES` becomes the name of one floating molecule.
    pub fn floating_molecule(mut self, name: &str) -> Self {
        self.replacements
            .push((keywords::ALL_FLOATING_MOLECULES, vec![name.to_owned()]));
        self
    }

    fn replacement_for(&self, segment: &str) -> Option<&[String]> {
        self.replacements
            .iter()
            .find(|(keyword, _)| *keyword == segment)
            .map(|(_, replacement)| replacement.as_slice())
    }

    /// Replaces keyword segments in a single pass over the original
    /// segments; substituted segments are never matched again.
    pub fn replace_in_path(&self, path: &mut ObjectPath) {
        if path.segments().iter().any(|s| self.replacement_for(s).is_some()) {
            let replaced: ObjectPath = path
                .segments()
                .iter()
                .flat_map(|segment| match self.replacement_for(segment) {
                    Some(replacement) => replacement.to_vec(),
                    None => vec![segment.clone()],
                })
                .collect();
            path.replace_with(replaced);
        }
        self.context.anchor(path);
    }

    /// A tag equal to a keyword becomes the name its replacement ends in.
    fn replace_in_tags(&self, tags: &BTreeSet<String>) -> BTreeSet<String> {
        tags.iter()
            .map(|tag| match self.replacement_for(tag).and_then(|r| r.last()) {
                Some(name) => name.clone(),
                None => tag.clone(),
            })
            .collect()
    }

    /// Applies the replacements to the formula paths, tags and assignment
    /// targets of `id` and all of its descendants.
    pub fn replace_in(&self, tree: &mut Tree, id: EntityId) {
        for node in tree.subtree(id) {
            let entity = &mut tree[node];
            if let Some(formula) = entity.formula.as_mut() {
                for usable in formula.paths_mut() {
                    self.replace_in_path(&mut usable.path);
                }
            }
            if let EntityKind::EventAssignment { object_path, .. } = &mut entity.kind {
                self.replace_in_path(object_path);
            }
            entity.tags = self.replace_in_tags(&entity.tags);
        }
    }
}
