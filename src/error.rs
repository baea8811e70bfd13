use thiserror::Error;

use crate::layout::LayoutKind;
use crate::model::tree::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error(
        "cannot convert {from} to {to}: only same-category conversions are allowed \
         (grid to grid, group to group); use ungroup or wrap in a group instead"
    )]
    CrossCategory { from: LayoutKind, to: LayoutKind },

    #[error("{kind} at {path} would create same-type nesting")]
    SameTypeNesting { path: String, kind: LayoutKind },

    #[error("{kind} at {path} would create nested groups deeper than {max} levels")]
    NestedGroups { path: String, kind: LayoutKind, max: usize },

    #[error("unknown layout kind {0:?}")]
    UnknownKind(String),

    #[error("invalid layout path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("index {index} out of bounds at {path} ({kind} has {len} items)")]
    OutOfBounds { path: String, index: usize, len: usize, kind: LayoutKind },

    #[error("expected {expected} at {path}, found {found}")]
    KindMismatchAtPath { path: String, expected: LayoutKind, found: LayoutKind },

    #[error("node {0:?} is not a layout")]
    NotALayout(NodeId),

    #[error("node {0:?} is not a row or tab")]
    NotAnItem(NodeId),

    #[error("layout {0:?} has no owner")]
    NoOwner(NodeId),

    #[error("cannot merge {source_kind} into {target}")]
    MergeMismatch { target: LayoutKind, source_kind: LayoutKind },

    #[error("the layout changed since the ungroup was requested; request it again")]
    StaleDisambiguation,

    #[error("{choice} is not one of the offered layouts ({options})")]
    InvalidChoice { choice: LayoutKind, options: String },

    #[error("cannot move content to {0}: it is the same path as the removed item")]
    SamePath(String),

    #[error("cannot move content into empty {kind} at {path}")]
    EmptyGroup { path: String, kind: LayoutKind },

    #[error("cannot move the only item out of the {kind} at {path}")]
    LastItem { path: String, kind: LayoutKind },

    #[error("element {0:?} not found")]
    PanelNotFound(String),

    #[error("Options are only valid for AutoGridLayout, target is {0}")]
    OptionsOnlyForAutoGrid(LayoutKind),

    #[error("invalid layout options: {0}")]
    InvalidOptions(String),
}

impl LayoutError {
    pub(crate) fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        LayoutError::InvalidPath { path: path.into(), reason: reason.into() }
    }
}
