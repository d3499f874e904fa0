// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::{error, result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    UnresolvedPath,
    KeywordCannotBeInFirstPosition,
    KeywordCanOnlyBeUsedOnce,
    LumenNavigationKeywordCanOnlyBeUsedOnce,
    CannotNavigateBeyondLumenSegment,
    ContainerIsNotLumenSegment,
    NoNeighborhoodBetween,
    CircularReferenceInSumFormula,
    TwoDifferentFormulaForSameParameter,
    HelpParameterAlreadyDefinedWithAnotherFormula,
    InParentTagCanOnlyBeUsedWithAndOperator,
    InParentConditionNotRewritten,
    DuplicateChildName,
    BadConfiguration,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorCode::*;
        let name = match self {
            UnresolvedPath => "unresolved_path",
            KeywordCannotBeInFirstPosition => "keyword_cannot_be_in_first_position",
            KeywordCanOnlyBeUsedOnce => "keyword_can_only_be_used_once",
            LumenNavigationKeywordCanOnlyBeUsedOnce => {
                "lumen_navigation_keyword_can_only_be_used_once"
            }
            CannotNavigateBeyondLumenSegment => "cannot_navigate_beyond_lumen_segment",
            ContainerIsNotLumenSegment => "container_is_not_lumen_segment",
            NoNeighborhoodBetween => "no_neighborhood_between",
            CircularReferenceInSumFormula => "circular_reference_in_sum_formula",
            TwoDifferentFormulaForSameParameter => "two_different_formula_for_same_parameter",
            HelpParameterAlreadyDefinedWithAnotherFormula => {
                "help_parameter_already_defined_with_another_formula"
            }
            InParentTagCanOnlyBeUsedWithAndOperator => {
                "in_parent_tag_can_only_be_used_with_and_operator"
            }
            InParentConditionNotRewritten => "in_parent_condition_not_rewritten",
            DuplicateChildName => "duplicate_child_name",
            BadConfiguration => "bad_configuration",
        };

        write!(f, "{name}")
    }
}

/// Which part of a construction pass an error came from.  All of them are
/// fatal to the pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// unresolvable or malformed object paths
    Path,
    /// the neighborhood adjacency graph
    Graph,
    /// conflicting or self-referencing definitions
    Consistency,
    /// structural manipulation of the container tree
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub details: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, code: ErrorCode, details: Option<String>) -> Self {
        Error {
            kind,
            code,
            details,
        }
    }

    pub fn get_details(&self) -> Option<String> {
        self.details.clone()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Path => "PathError",
            ErrorKind::Graph => "GraphError",
            ErrorKind::Consistency => "ConsistencyError",
            ErrorKind::Model => "ModelError",
        };
        match self.details {
            Some(ref details) => write!(f, "{}{{{}: {}}}", kind, self.code, details),
            None => write!(f, "{}{{{}}}", kind, self.code),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

#[macro_export]
macro_rules! path_err(
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::Path,
            ErrorCode::$code,
            Some($str),
        ))
    }}
);

#[macro_export]
macro_rules! graph_err(
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::Graph,
            ErrorCode::$code,
            Some($str),
        ))
    }}
);

#[macro_export]
macro_rules! consistency_err {
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::Consistency,
            ErrorCode::$code,
            Some($str),
        ))
    }};
    ($code:tt) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Consistency, ErrorCode::$code, None))
    }};
}

#[macro_export]
macro_rules! model_err(
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(
            ErrorKind::Model,
            ErrorCode::$code,
            Some($str),
        ))
    }}
);

#[test]
fn test_error_display() {
    let err = Error::new(
        ErrorKind::Path,
        ErrorCode::UnresolvedPath,
        Some("Organism|Liver".to_owned()),
    );
    assert_eq!("PathError{unresolved_path: Organism|Liver}", format!("{err}"));

    let err = Error::new(
        ErrorKind::Consistency,
        ErrorCode::InParentTagCanOnlyBeUsedWithAndOperator,
        None,
    );
    assert_eq!(
        "ConsistencyError{in_parent_tag_can_only_be_used_with_and_operator}",
        format!("{err}")
    );
}

#[test]
fn test_error_macros() {
    fn fails() -> Result<()> {
        graph_err!(NoNeighborhoodBetween, "A and B".to_owned())
    }
    let err = fails().unwrap_err();
    assert_eq!(ErrorKind::Graph, err.kind);
    assert_eq!(ErrorCode::NoNeighborhoodBetween, err.code);
    assert_eq!(Some("A and B".to_owned()), err.get_details());
}
