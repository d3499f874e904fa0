// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Expansion of the structural keywords `NBH`, `LUMEN_SEGMENT`,
//! `LUMEN_NEXT_SEGMENT` and `LUMEN_PREVIOUS_SEGMENT` into concrete paths.

use log::debug;

use crate::common::Result;
use crate::model::Model;
use crate::options::BuildOptions;
use crate::path::{keywords, ObjectPath};
use crate::tree::{EntityId, Tree};
use crate::{graph_err, path_err};

/// Expands every keyword-bearing path in the model, returning how many paths
/// were rewritten.  Neighborhood references are expanded first, then lumen
/// segments, then lumen navigation.
pub fn expand_dynamic_references(model: &mut Model, options: &BuildOptions) -> Result<usize> {
    let mut expanded = expand_neighborhood_references(model)?;
    expanded += expand_lumen_segment_references(model, options)?;
    expanded += expand_lumen_navigation_references(model, options)?;
    Ok(expanded)
}

pub fn expand_neighborhood_references(model: &mut Model) -> Result<usize> {
    let neighborhoods = model.all_neighborhoods();
    rewrite_paths(model, keywords::NBH, |model, owner, path| {
        expand_neighborhood(model, &neighborhoods, owner, path)
    })
}

pub fn expand_lumen_segment_references(model: &mut Model, options: &BuildOptions) -> Result<usize> {
    rewrite_paths(model, keywords::LUMEN_SEGMENT, |model, owner, path| {
        expand_lumen_segment(&model.tree, options, owner, path).map(Some)
    })
}

pub fn expand_lumen_navigation_references(
    model: &mut Model,
    options: &BuildOptions,
) -> Result<usize> {
    let mut expanded = 0;
    for keyword in [keywords::LUMEN_NEXT_SEGMENT, keywords::LUMEN_PREVIOUS_SEGMENT] {
        expanded += rewrite_paths(model, keyword, |model, owner, path| {
            expand_lumen_navigation(&model.tree, options, owner, path).map(Some)
        })?;
    }
    Ok(expanded)
}

/// Applies `expand` to every formula path containing `keyword`.  `None`
/// leaves the path as it was.
fn rewrite_paths<F>(model: &mut Model, keyword: &str, mut expand: F) -> Result<usize>
where
    F: FnMut(&Model, EntityId, &ObjectPath) -> Result<Option<ObjectPath>>,
{
    let mut rewritten = 0;
    for owner in model.formula_users() {
        let candidates: Vec<(usize, ObjectPath)> = match model.tree[owner].formula.as_ref() {
            Some(formula) => formula
                .paths()
                .iter()
                .enumerate()
                .filter(|(_, p)| p.path.contains(keyword))
                .map(|(i, p)| (i, p.path.clone()))
                .collect(),
            None => continue,
        };

        for (i, path) in candidates {
            let Some(new_path) = expand(model, owner, &path)? else {
                continue;
            };
            debug!(
                "{}: '{}' expanded to '{}'",
                model.tree.absolute_path(owner),
                path,
                new_path
            );
            if let Some(formula) = model.tree[owner].formula.as_mut() {
                formula.paths_mut()[i].path = new_path;
            }
            rewritten += 1;
        }
    }
    Ok(rewritten)
}

fn resolve_container(
    tree: &Tree,
    owner: EntityId,
    segments: ObjectPath,
    full_path: &ObjectPath,
) -> Result<EntityId> {
    let id = segments.resolve(tree, owner)?;
    if !tree[id].is_container() {
        return path_err!(
            UnresolvedPath,
            format!("'{}' in '{}' is not a container", segments, full_path)
        );
    }
    Ok(id)
}

fn expand_neighborhood(
    model: &Model,
    neighborhoods: &[EntityId],
    owner: EntityId,
    path: &ObjectPath,
) -> Result<Option<ObjectPath>> {
    let (first, last) = match (path.position(keywords::NBH), path.rposition(keywords::NBH)) {
        (Some(first), Some(last)) => (first, last),
        _ => return Ok(None),
    };
    // a single marker cannot be resolved; it is left for later validation
    if first == last {
        return Ok(None);
    }

    let tree = &model.tree;
    let container1 = resolve_container(tree, owner, path.slice(0..first), path)?;
    let container2 = resolve_container(tree, owner, path.slice(first + 1..last), path)?;

    let connected_to_first = model.neighborhoods_of(container1, neighborhoods);
    let between = model.neighborhoods_of(container2, &connected_to_first);
    let Some(neighborhood) = between.first() else {
        return graph_err!(
            NoNeighborhoodBetween,
            format!(
                "{} and {}",
                tree.absolute_path(container1),
                tree.absolute_path(container2)
            )
        );
    };

    let mut new_path = tree.absolute_path(*neighborhood);
    new_path.extend(path.segments()[last + 1..].iter().cloned());
    Ok(Some(new_path))
}

fn expand_lumen_segment(
    tree: &Tree,
    options: &BuildOptions,
    owner: EntityId,
    path: &ObjectPath,
) -> Result<ObjectPath> {
    let (first, last) = match (
        path.position(keywords::LUMEN_SEGMENT),
        path.rposition(keywords::LUMEN_SEGMENT),
    ) {
        (Some(first), Some(last)) => (first, last),
        _ => return Ok(path.clone()),
    };

    if first == 0 {
        return path_err!(
            KeywordCannotBeInFirstPosition,
            format!("{} in '{}'", keywords::LUMEN_SEGMENT, path)
        );
    }
    if first != last {
        return path_err!(
            KeywordCanOnlyBeUsedOnce,
            format!("{} in '{}'", keywords::LUMEN_SEGMENT, path)
        );
    }

    let container = resolve_container(tree, owner, path.slice(0..first), path)?;
    let mut new_path = ObjectPath::from_segments([
        options.organism.as_str(),
        options.lumen.as_str(),
        tree[container].name.as_str(),
    ]);
    new_path.extend(path.segments()[last + 1..].iter().cloned());
    Ok(new_path)
}

fn expand_lumen_navigation(
    tree: &Tree,
    options: &BuildOptions,
    owner: EntityId,
    path: &ObjectPath,
) -> Result<ObjectPath> {
    let next = path.position(keywords::LUMEN_NEXT_SEGMENT);
    let previous = path.position(keywords::LUMEN_PREVIOUS_SEGMENT);
    let (index, step): (usize, isize) = match (next, previous) {
        (Some(_), Some(_)) => {
            return path_err!(LumenNavigationKeywordCanOnlyBeUsedOnce, path.to_string());
        }
        (Some(index), None) => (index, 1),
        (None, Some(index)) => (index, -1),
        (None, None) => return Ok(path.clone()),
    };

    let current = resolve_container(tree, owner, path.slice(0..index), path)?;
    let lumen = tree.parent(current);
    let position = options.lumen_segment_index(&tree[current].name);
    let (lumen, position) = match (lumen, position) {
        (Some(lumen), Some(position)) if tree[lumen].is_named(&options.lumen) => (lumen, position),
        _ => {
            return path_err!(
                ContainerIsNotLumenSegment,
                tree.absolute_path(current).to_string()
            );
        }
    };

    let target = position
        .checked_add_signed(step)
        .filter(|target| *target < options.lumen_segments.len());
    let Some(target) = target else {
        return path_err!(
            CannotNavigateBeyondLumenSegment,
            format!("{} from {}", path.segments()[index], tree.absolute_path(current))
        );
    };

    let mut new_path = tree.absolute_path(lumen);
    new_path.push(options.lumen_segments[target].clone());
    new_path.extend(path.segments()[index + 1..].iter().cloned());
    Ok(new_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;
    use crate::formula::{ExplicitFormula, Formula};
    use crate::testutils::{lumen_model, organism_model};
    use crate::tree::{ContainerMode, ContainerType};

    fn reference(model: &mut Model, owner: EntityId, path: &str) -> EntityId {
        let formula = Formula::Explicit(ExplicitFormula::new("X").with_path("X", path));
        model.add_parameter(owner, "P", formula).unwrap()
    }

    fn first_path(model: &Model, id: EntityId) -> String {
        model.tree[id].formula.as_ref().unwrap().paths()[0]
            .path
            .to_string()
    }

    #[test]
    fn test_neighborhood_expansion() {
        let mut m = organism_model();
        let p = reference(
            &mut m.model,
            m.liver,
            "Organism|Liver|NBH|Organism|Kidney|NBH|Volume",
        );
        assert_eq!(1, expand_neighborhood_references(&mut m.model).unwrap());
        assert_eq!("Sim|Neighborhoods|Liver_Kidney|Volume", first_path(&m.model, p));

        let resolved = ObjectPath::parse(&first_path(&m.model, p));
        assert!(!resolved.has_keyword());
    }

    #[test]
    fn test_expanded_neighborhood_path_resolves() {
        let mut m = organism_model();
        let volume = m
            .model
            .add_parameter(m.liver_kidney, "Volume", Formula::Constant(0.1))
            .unwrap();
        let p = reference(&mut m.model, m.lung, "Organism|Kidney|NBH|Organism|Liver|NBH|Volume");
        expand_neighborhood_references(&mut m.model).unwrap();

        let path = ObjectPath::parse(&first_path(&m.model, p));
        assert_eq!(volume, path.resolve(&m.model.tree, p).unwrap());
    }

    #[test]
    fn test_neighborhood_between_top_containers() {
        let mut model = Model::new("Organism", "Neighborhoods");
        let root = model.root;
        let liver = model
            .add_container(root, "Liver", ContainerMode::Physical, ContainerType::Organ)
            .unwrap();
        let kidney = model
            .add_container(root, "Kidney", ContainerMode::Physical, ContainerType::Organ)
            .unwrap();
        let n1 = model.add_neighborhood("N1", liver, kidney).unwrap();
        let volume = model
            .add_parameter(n1, "Volume", Formula::Constant(2.0))
            .unwrap();
        let p = reference(&mut model, liver, "Liver|NBH|Kidney|NBH|Volume");

        assert_eq!(1, expand_neighborhood_references(&mut model).unwrap());
        assert_eq!("Organism|Neighborhoods|N1|Volume", first_path(&model, p));
        let path = ObjectPath::parse(&first_path(&model, p));
        assert_eq!(volume, path.resolve(&model.tree, p).unwrap());
    }

    #[test]
    fn test_neighborhood_expansion_relative_to_owner() {
        let mut m = organism_model();
        let p = reference(&mut m.model, m.kidney, "..|NBH|..|..|Liver|NBH");
        expand_neighborhood_references(&mut m.model).unwrap();
        assert_eq!("Sim|Neighborhoods|Liver_Kidney", first_path(&m.model, p));
    }

    #[test]
    fn test_single_neighborhood_marker_left_alone() {
        let mut m = organism_model();
        let p = reference(&mut m.model, m.liver, "Organism|Liver|NBH|Volume");
        assert_eq!(0, expand_neighborhood_references(&mut m.model).unwrap());
        assert_eq!("Organism|Liver|NBH|Volume", first_path(&m.model, p));
    }

    #[test]
    fn test_no_neighborhood_between() {
        let mut m = organism_model();
        reference(&mut m.model, m.liver, "Organism|Liver|NBH|Organism|Lung|NBH|Volume");
        let err = expand_neighborhood_references(&mut m.model).unwrap_err();
        assert_eq!(ErrorCode::NoNeighborhoodBetween, err.code);
        assert!(err.get_details().unwrap().contains("Sim|Organism|Lung"));
    }

    #[test]
    fn test_neighborhood_with_unknown_container() {
        let mut m = organism_model();
        reference(&mut m.model, m.liver, "Organism|Heart|NBH|Organism|Lung|NBH|Volume");
        let err = expand_neighborhood_references(&mut m.model).unwrap_err();
        assert_eq!(ErrorCode::UnresolvedPath, err.code);
    }

    #[test]
    fn test_lumen_segment() {
        let mut m = lumen_model();
        let options = BuildOptions::default();
        let p = reference(&mut m.model, m.duodenum_mucosa, "..|LUMEN_SEGMENT|Drug");
        assert_eq!(
            1,
            expand_lumen_segment_references(&mut m.model, &options).unwrap()
        );
        assert_eq!("Organism|Lumen|Duodenum|Drug", first_path(&m.model, p));
    }

    #[test]
    fn test_lumen_segment_first_position() {
        let mut m = lumen_model();
        let options = BuildOptions::default();
        reference(&mut m.model, m.duodenum_mucosa, "LUMEN_SEGMENT|Drug");
        let err = expand_lumen_segment_references(&mut m.model, &options).unwrap_err();
        assert_eq!(ErrorCode::KeywordCannotBeInFirstPosition, err.code);
    }

    #[test]
    fn test_lumen_segment_used_twice() {
        let mut m = lumen_model();
        let options = BuildOptions::default();
        reference(&mut m.model, m.duodenum_mucosa, "..|LUMEN_SEGMENT|LUMEN_SEGMENT");
        let err = expand_lumen_segment_references(&mut m.model, &options).unwrap_err();
        assert_eq!(ErrorCode::KeywordCanOnlyBeUsedOnce, err.code);
    }

    #[test]
    fn test_lumen_navigation() {
        let mut m = lumen_model();
        let options = BuildOptions::default();
        let next = reference(&mut m.model, m.duodenum, "..|LUMEN_NEXT_SEGMENT|Drug");
        let previous = m
            .model
            .add_parameter(
                m.duodenum,
                "Q",
                Formula::Explicit(
                    ExplicitFormula::new("X").with_path("X", "..|LUMEN_PREVIOUS_SEGMENT|Drug"),
                ),
            )
            .unwrap();

        assert_eq!(
            2,
            expand_lumen_navigation_references(&mut m.model, &options).unwrap()
        );
        assert_eq!("Sim|Organism|Lumen|UpperJejunum|Drug", first_path(&m.model, next));
        assert_eq!("Sim|Organism|Lumen|Stomach|Drug", first_path(&m.model, previous));
    }

    #[test]
    fn test_lumen_navigation_errors() {
        let options = BuildOptions::default();

        let mut m = lumen_model();
        reference(&mut m.model, m.stomach, "..|LUMEN_PREVIOUS_SEGMENT");
        let err = expand_lumen_navigation_references(&mut m.model, &options).unwrap_err();
        assert_eq!(ErrorCode::CannotNavigateBeyondLumenSegment, err.code);

        let mut m = lumen_model();
        reference(&mut m.model, m.duodenum_mucosa, "..|LUMEN_NEXT_SEGMENT");
        let err = expand_lumen_navigation_references(&mut m.model, &options).unwrap_err();
        assert_eq!(ErrorCode::ContainerIsNotLumenSegment, err.code);

        let mut m = lumen_model();
        reference(
            &mut m.model,
            m.duodenum,
            "..|LUMEN_NEXT_SEGMENT|LUMEN_PREVIOUS_SEGMENT",
        );
        let err = expand_lumen_navigation_references(&mut m.model, &options).unwrap_err();
        assert_eq!(ErrorCode::LumenNavigationKeywordCanOnlyBeUsedOnce, err.code);
    }

    #[test]
    fn test_expand_dynamic_references_order() {
        let mut m = lumen_model();
        let options = BuildOptions::default();
        let p = reference(&mut m.model, m.duodenum_mucosa, "..|LUMEN_SEGMENT|Drug");
        let q = m
            .model
            .add_parameter(
                m.duodenum,
                "Q",
                Formula::Explicit(
                    ExplicitFormula::new("X").with_path("X", "..|LUMEN_NEXT_SEGMENT"),
                ),
            )
            .unwrap();
        assert_eq!(2, expand_dynamic_references(&mut m.model, &options).unwrap());
        assert_eq!("Organism|Lumen|Duodenum|Drug", first_path(&m.model, p));
        assert_eq!("Sim|Organism|Lumen|UpperJejunum", first_path(&m.model, q));
    }
}
