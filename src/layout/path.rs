//! Addresses of layouts inside the tree: `/`, `/rows/0`, `/rows/0/tabs/1`, ...

use std::fmt;
use std::str::FromStr;

use crate::error::LayoutError;
use crate::layout::LayoutTree;
use crate::layout::registry::{GroupKind, LayoutKind};
use crate::model::tree::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PathSegment {
    pub group: GroupKind,
    pub index: usize,
}

/// A chain of group items leading from the body layout to a nested layout.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct LayoutPath(Vec<PathSegment>);

impl LayoutPath {
    pub fn root() -> Self { LayoutPath(Vec::new()) }

    pub fn segments(&self) -> &[PathSegment] { &self.0 }

    pub fn depth(&self) -> usize { self.0.len() }

    pub fn is_root(&self) -> bool { self.0.is_empty() }

    pub fn contains(&self, group: GroupKind) -> bool { self.0.iter().any(|s| s.group == group) }

    pub fn join(&self, group: GroupKind, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment { group, index });
        LayoutPath(segments)
    }

    /// The path of the containing manager and the last segment.
    pub fn split_last(&self) -> Option<(LayoutPath, PathSegment)> {
        let (last, rest) = self.0.split_last()?;
        Some((LayoutPath(rest.to_vec()), *last))
    }

    pub fn starts_with(&self, prefix: &LayoutPath) -> bool { self.0.starts_with(&prefix.0) }
}

impl fmt::Display for LayoutPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.0 {
            write!(f, "/{}/{}", segment.group, segment.index)?;
        }
        Ok(())
    }
}

impl FromStr for LayoutPath {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Err(LayoutError::invalid_path(s, "paths start with '/'"));
        };
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        if rest.is_empty() {
            return Ok(LayoutPath::root());
        }
        let tokens: Vec<&str> = rest.split('/').collect();
        if tokens.len() % 2 != 0 {
            return Err(LayoutError::invalid_path(s, "every group segment needs an index"));
        }
        let mut segments = Vec::with_capacity(tokens.len() / 2);
        for pair in tokens.chunks(2) {
            let group = pair[0].parse::<GroupKind>().map_err(|_| {
                LayoutError::invalid_path(s, format!("unknown segment {:?}, expected rows or tabs", pair[0]))
            })?;
            let index = pair[1]
                .parse::<usize>()
                .map_err(|_| LayoutError::invalid_path(s, format!("{:?} is not an index", pair[1])))?;
            segments.push(PathSegment { group, index });
        }
        Ok(LayoutPath(segments))
    }
}

impl LayoutTree {
    /// The layout addressed by `path`.
    pub fn resolve(&self, path: &LayoutPath) -> Result<NodeId, LayoutError> {
        match path.split_last() {
            None => Ok(self.body()),
            Some(_) => self.inner_layout(self.resolve_item(path)?),
        }
    }

    /// The row or tab named by the last segment of `path`.
    pub fn resolve_item(&self, path: &LayoutPath) -> Result<NodeId, LayoutError> {
        let mut layout = self.body();
        let mut walked = LayoutPath::root();
        let mut item = None;
        for segment in path.segments() {
            let found = self.kind_of(layout)?;
            if found != segment.group.kind() {
                return Err(LayoutError::KindMismatchAtPath {
                    path: walked.to_string(),
                    expected: segment.group.kind(),
                    found,
                });
            }
            walked = walked.join(segment.group, segment.index);
            let child = layout.child_at(self.map(), segment.index).ok_or_else(|| {
                LayoutError::OutOfBounds {
                    path: walked.to_string(),
                    index: segment.index,
                    len: layout.child_count(self.map()),
                    kind: found,
                }
            })?;
            layout = self.inner_layout(child)?;
            item = Some(child);
        }
        item.ok_or_else(|| LayoutError::invalid_path("/", "the root path names no row or tab"))
    }

    /// Path of an attached layout, row or tab. Items resolve to the path
    /// ending in their own segment.
    pub fn path_of(&self, node: NodeId) -> Result<LayoutPath, LayoutError> {
        if !self.is_attached(node) {
            return Err(LayoutError::NoOwner(node));
        }
        let mut segments = Vec::new();
        for ancestor in node.ancestors(self.map()) {
            let Some(group) = self.element(ancestor).and_then(|e| e.item_group()) else {
                continue;
            };
            let index = ancestor.index_in_parent(self.map()).unwrap_or(0);
            segments.push(PathSegment { group, index });
        }
        segments.reverse();
        Ok(LayoutPath(segments))
    }

    /// Resolves `path` and returns the kind found there.
    pub fn resolve_with_kind(&self, path: &LayoutPath) -> Result<(NodeId, LayoutKind), LayoutError> {
        let node = self.resolve(path)?;
        Ok((node, self.kind_of(node)?))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn p(s: &str) -> LayoutPath { s.parse().unwrap() }

    #[test]
    fn parse_and_display() {
        for s in ["/", "/rows/0", "/rows/0/tabs/1", "/tabs/12/rows/3"] {
            assert_eq!(s, p(s).to_string());
        }
        assert_eq!(p("/rows/0"), p("/rows/0/"));
        assert_eq!(2, p("/rows/0/tabs/1").depth());
        assert!(p("/rows/0/tabs/1").contains(GroupKind::Tabs));
        assert!(!p("/rows/0").contains(GroupKind::Tabs));
    }

    #[test]
    fn rejects_malformed_paths() {
        for s in ["", "rows/0", "/rows", "/rows/x", "/grid/0", "/rows/0/tabs", "/rows/-1"] {
            assert!(
                matches!(s.parse::<LayoutPath>(), Err(LayoutError::InvalidPath { .. })),
                "{s:?} should not parse"
            );
        }
    }

    #[test]
    fn join_and_split() {
        let path = p("/rows/1").join(GroupKind::Tabs, 0);
        assert_eq!("/rows/1/tabs/0", path.to_string());
        let (parent, last) = path.split_last().unwrap();
        assert_eq!(p("/rows/1"), parent);
        assert_eq!(PathSegment { group: GroupKind::Tabs, index: 0 }, last);
        assert_eq!(None, LayoutPath::root().split_last());
        assert!(path.starts_with(&p("/rows/1")));
    }
}
