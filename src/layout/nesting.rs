//! Structural checks that keep groups from nesting inside groups of the same
//! kind or nesting too deeply.

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;
use crate::layout::LayoutTree;
use crate::layout::path::LayoutPath;
use crate::layout::registry::{GroupKind, LayoutKind};
use crate::model::tree::NodeId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NestingPolicy {
    #[serde(default)]
    pub allow_same_kind: bool,
    #[serde(default = "default_max_group_depth")]
    pub max_group_depth: usize,
}

fn default_max_group_depth() -> usize { 2 }

impl Default for NestingPolicy {
    fn default() -> Self {
        NestingPolicy {
            allow_same_kind: false,
            max_group_depth: default_max_group_depth(),
        }
    }
}

impl NestingPolicy {
    fn same_kind(&self, path: &LayoutPath, group: GroupKind) -> Result<(), LayoutError> {
        if !self.allow_same_kind && path.contains(group) {
            return Err(LayoutError::SameTypeNesting { path: path.to_string(), kind: group.kind() });
        }
        Ok(())
    }

    fn depth(&self, path: &LayoutPath, group: GroupKind, levels: usize) -> Result<(), LayoutError> {
        if path.depth() + levels > self.max_group_depth {
            return Err(LayoutError::NestedGroups {
                path: path.to_string(),
                kind: group.kind(),
                max: self.max_group_depth,
            });
        }
        Ok(())
    }

    /// Adding an item to the existing `group` manager at `path`.
    pub fn check_insert(&self, path: &LayoutPath, group: GroupKind) -> Result<(), LayoutError> {
        self.same_kind(path, group)
    }

    /// Converting the layout at `path` into a `group` manager.
    pub fn check_convert(
        &self,
        tree: &LayoutTree,
        path: &LayoutPath,
        layout: NodeId,
        group: GroupKind,
    ) -> Result<(), LayoutError> {
        self.same_kind(path, group)?;
        let inner = live_child_kinds(tree, layout);
        if !self.allow_same_kind && inner.contains(&group.kind()) {
            return Err(LayoutError::SameTypeNesting { path: path.to_string(), kind: group.kind() });
        }
        let below = inner.iter().any(|k| k.group().is_some()) as usize;
        self.depth(path, group, 1 + below)
    }

    /// Wrapping the layout at `path` in a new `group` manager.
    pub fn check_wrap(
        &self,
        tree: &LayoutTree,
        path: &LayoutPath,
        layout: NodeId,
        group: GroupKind,
    ) -> Result<(), LayoutError> {
        self.depth(path, group, 1 + tree.group_depth(layout))?;
        self.same_kind(path, group)?;
        let wrapped = tree.kind_of(layout)?;
        if !self.allow_same_kind
            && (wrapped == group.kind() || live_child_kinds(tree, layout).contains(&group.kind()))
        {
            return Err(LayoutError::SameTypeNesting { path: path.to_string(), kind: group.kind() });
        }
        Ok(())
    }

    /// Moving an item whose inner layout is `inner` into the `group` manager at `path`.
    pub fn check_move(
        &self,
        tree: &LayoutTree,
        path: &LayoutPath,
        inner: NodeId,
        group: GroupKind,
    ) -> Result<(), LayoutError> {
        self.same_kind(path, group)?;
        if !self.allow_same_kind && tree.kind_of(inner)? == group.kind() {
            return Err(LayoutError::SameTypeNesting { path: path.to_string(), kind: group.kind() });
        }
        self.depth(path, group, 1 + tree.group_depth(inner))
    }
}

/// Kinds of the inner layouts one level below a group manager.
fn live_child_kinds(tree: &LayoutTree, layout: NodeId) -> Vec<LayoutKind> {
    tree.children(layout)
        .into_iter()
        .filter_map(|item| tree.inner_layout(item).ok())
        .filter_map(|inner| tree.kind_of(inner).ok())
        .collect()
}
