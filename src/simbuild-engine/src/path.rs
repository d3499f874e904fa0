// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::common::Result;
use crate::path_err;
use crate::tree::{EntityId, Tree};

/// Reserved path segments.  Apart from `PARENT_CONTAINER` none of these
/// survive a construction pass.
pub mod keywords {
    pub const PARENT_CONTAINER: &str = "..";
    pub const NBH: &str = "NBH";
    pub const LUMEN_SEGMENT: &str = "LUMEN_SEGMENT";
    pub const LUMEN_NEXT_SEGMENT: &str = "LUMEN_NEXT_SEGMENT";
    pub const LUMEN_PREVIOUS_SEGMENT: &str = "LUMEN_PREVIOUS_SEGMENT";
    pub const MOLECULE: &str = "MOLECULE";
    pub const REACTION: &str = "REACTION";
    pub const NEIGHBORHOOD: &str = "NEIGHBORHOOD";
    pub const FIRST_NEIGHBOR: &str = "FIRST_NEIGHBOR";
    pub const SECOND_NEIGHBOR: &str = "SECOND_NEIGHBOR";
    pub const SOURCE: &str = "SOURCE";
    pub const TARGET: &str = "TARGET";
    pub const ALL_FLOATING_MOLECULES: &str = "ALL_FLOATING_MOLECULES";

    pub const ALL: &[&str] = &[
        PARENT_CONTAINER,
        NBH,
        LUMEN_SEGMENT,
        LUMEN_NEXT_SEGMENT,
        LUMEN_PREVIOUS_SEGMENT,
        MOLECULE,
        REACTION,
        NEIGHBORHOOD,
        FIRST_NEIGHBOR,
        SECOND_NEIGHBOR,
        SOURCE,
        TARGET,
        ALL_FLOATING_MOLECULES,
    ];

    pub fn is_keyword(segment: &str) -> bool {
        ALL.contains(&segment)
    }
}

pub const PATH_SEPARATOR: &str = "|";

/// An ordered list of names leading from a start entity (relative paths,
/// which begin with `..`) or from the root (absolute paths) to an entity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectPath {
    segments: SmallVec<[String; 4]>,
}

impl ObjectPath {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ObjectPath {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses the `A|B|C` form; empty segments are dropped.
    pub fn parse(path: &str) -> Self {
        Self::from_segments(path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.segments.first().map(|s| s.as_str())
    }

    pub fn push(&mut self, segment: impl Into<String>) {
        self.segments.push(segment.into());
    }

    pub fn push_front(&mut self, segment: impl Into<String>) {
        self.segments.insert(0, segment.into());
    }

    pub fn extend<I, S>(&mut self, segments: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.segments.extend(segments.into_iter().map(Into::into));
    }

    pub fn is_relative(&self) -> bool {
        self.first() == Some(keywords::PARENT_CONTAINER)
    }

    pub fn is_absolute(&self) -> bool {
        !self.is_empty() && !self.is_relative()
    }

    pub fn contains(&self, segment: &str) -> bool {
        self.segments.iter().any(|s| s == segment)
    }

    pub fn position(&self, segment: &str) -> Option<usize> {
        self.segments.iter().position(|s| s == segment)
    }

    pub fn rposition(&self, segment: &str) -> Option<usize> {
        self.segments.iter().rposition(|s| s == segment)
    }

    /// true if any segment still needs expansion or keyword replacement
    pub fn has_keyword(&self) -> bool {
        self.segments
            .iter()
            .any(|s| s != keywords::PARENT_CONTAINER && keywords::is_keyword(s))
    }

    /// A new path holding the segments in `range`.
    pub fn slice(&self, range: Range<usize>) -> ObjectPath {
        Self::from_segments(self.segments[range].iter().cloned())
    }

    /// Replaces the segments in `range` with `replacement`, in place.
    pub fn replace_subrange<I, S>(&mut self, range: Range<usize>, replacement: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tail: Vec<String> = self.segments.drain(range.start..).collect();
        let keep_after = range.end - range.start;
        self.segments.extend(replacement.into_iter().map(Into::into));
        self.segments.extend(tail.into_iter().skip(keep_after));
    }

    pub fn replace_with(&mut self, other: ObjectPath) {
        self.segments = other.segments;
    }

    /// Walks the tree from `start`.  Relative paths start at `start`
    /// itself, absolute paths at the root of `start`'s tree (a leading
    /// segment naming the root is consumed).
    pub fn resolve(&self, tree: &Tree, start: EntityId) -> Result<EntityId> {
        if self.is_empty() {
            return path_err!(UnresolvedPath, "empty path".to_owned());
        }

        let mut segments = self.segments.iter().peekable();
        let mut current = if self.is_relative() {
            start
        } else {
            let root = tree.root_of(start);
            if segments.peek().map(|s| s.as_str()) == Some(tree[root].name.as_str()) {
                segments.next();
            }
            root
        };

        for segment in segments {
            let next = if segment == keywords::PARENT_CONTAINER {
                tree.parent(current)
            } else {
                tree.child_by_name(current, segment)
            };
            current = match next {
                Some(id) => id,
                None => {
                    return path_err!(
                        UnresolvedPath,
                        format!("{} (no '{}' under '{}')", self, segment, tree[current].name)
                    );
                }
            };
        }

        Ok(current)
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.segments.join(PATH_SEPARATOR))
    }
}

impl<S: Into<String>> FromIterator<S> for ObjectPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_segments(iter)
    }
}

/// A path referenced from inside an explicit formula under `alias`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormulaUsablePath {
    pub alias: String,
    pub path: ObjectPath,
    #[serde(default)]
    pub dimension: Option<String>,
}

impl FormulaUsablePath {
    pub fn new(alias: &str, path: ObjectPath) -> Self {
        FormulaUsablePath {
            alias: alias.to_owned(),
            path,
            dimension: None,
        }
    }

    pub fn with_dimension(mut self, dimension: Option<String>) -> Self {
        self.dimension = dimension;
        self
    }

    /// Alias and path must agree; the dimension is informational.
    pub fn same_reference_as(&self, other: &FormulaUsablePath) -> bool {
        self.alias == other.alias && self.path == other.path
    }
}

#[test]
fn test_replace_subrange() {
    let mut path = ObjectPath::parse("A|NBH|B|NBH|Volume");
    path.replace_subrange(0..4, ["Sim", "Neighborhoods", "A_B"]);
    assert_eq!("Sim|Neighborhoods|A_B|Volume", path.to_string());

    let mut path = ObjectPath::parse("A|MOLECULE|C");
    path.replace_subrange(1..2, ["Drug"]);
    assert_eq!("A|Drug|C", path.to_string());

    let mut path = ObjectPath::parse("A|B");
    path.replace_subrange(2..2, ["C", "D"]);
    assert_eq!("A|B|C|D", path.to_string());
}

#[test]
fn test_relative_and_absolute() {
    assert!(ObjectPath::parse("..|Volume").is_relative());
    assert!(!ObjectPath::parse("..|Volume").is_absolute());
    assert!(ObjectPath::parse("Organism|Volume").is_absolute());
    assert!(!ObjectPath::new().is_absolute());
    assert!(!ObjectPath::new().is_relative());
}

#[test]
fn test_has_keyword() {
    assert!(!ObjectPath::parse("..|..|Volume").has_keyword());
    assert!(ObjectPath::parse("..|MOLECULE|Volume").has_keyword());
    assert!(ObjectPath::parse("Liver|NBH|Kidney|NBH|Volume").has_keyword());
}
