//! Catalog of the layout variants and their category taxonomy.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::warn;

use crate::common::collections::BTreeMap;
use crate::error::LayoutError;
use crate::layout::LayoutTree;
use crate::layout::save_model::{ElementSpec, LayoutSpec};
use crate::model::tree::NodeId;

/// Stable kind id of a layout manager. Declaration order is registry order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum LayoutKind {
    GridLayout,
    AutoGridLayout,
    RowsLayout,
    TabsLayout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    Grid,
    Group,
}

/// The two container kinds whose children are titled items.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum GroupKind {
    Rows,
    Tabs,
}

impl LayoutKind {
    pub fn category(self) -> Category {
        match self {
            LayoutKind::GridLayout | LayoutKind::AutoGridLayout => Category::Grid,
            LayoutKind::RowsLayout | LayoutKind::TabsLayout => Category::Group,
        }
    }

    pub fn is_grid(self) -> bool { self.category() == Category::Grid }

    pub fn group(self) -> Option<GroupKind> {
        match self {
            LayoutKind::RowsLayout => Some(GroupKind::Rows),
            LayoutKind::TabsLayout => Some(GroupKind::Tabs),
            _ => None,
        }
    }

    pub fn descriptor(self) -> &'static LayoutDescriptor {
        // REGISTRY is declared in the same order as the enum.
        &REGISTRY[self as usize]
    }
}

impl GroupKind {
    pub fn kind(self) -> LayoutKind {
        match self {
            GroupKind::Rows => LayoutKind::RowsLayout,
            GroupKind::Tabs => LayoutKind::TabsLayout,
        }
    }

    /// Singular noun used in messages.
    pub fn item_name(self) -> &'static str {
        match self {
            GroupKind::Rows => "row",
            GroupKind::Tabs => "tab",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct LayoutDescriptor {
    pub kind: LayoutKind,
    pub name: &'static str,
    pub description: &'static str,
    pub is_grid_layout: bool,
    pub icon: &'static str,
}

pub static REGISTRY: [LayoutDescriptor; 4] = [
    LayoutDescriptor {
        kind: LayoutKind::GridLayout,
        name: "Custom",
        description: "Position and size each panel individually",
        is_grid_layout: true,
        icon: "window-grid",
    },
    LayoutDescriptor {
        kind: LayoutKind::AutoGridLayout,
        name: "Auto grid",
        description: "Panels resize to fit and form a uniform grid",
        is_grid_layout: true,
        icon: "apps",
    },
    LayoutDescriptor {
        kind: LayoutKind::RowsLayout,
        name: "Rows",
        description: "Rows of panels that can be collapsed",
        is_grid_layout: false,
        icon: "list-ul",
    },
    LayoutDescriptor {
        kind: LayoutKind::TabsLayout,
        name: "Tabs",
        description: "Panels grouped under tabs",
        is_grid_layout: false,
        icon: "layers",
    },
];

static_assertions::const_assert_eq!(LayoutKind::TabsLayout as usize + 1, 4);

pub fn descriptors() -> &'static [LayoutDescriptor] { &REGISTRY }

/// Looks up a descriptor by its kind id (`"GridLayout"`, ...).
pub fn lookup(id: &str) -> Result<&'static LayoutDescriptor, LayoutError> {
    id.parse::<LayoutKind>()
        .map(LayoutKind::descriptor)
        .map_err(|_| LayoutError::UnknownKind(id.to_owned()))
}

/// Kinds in registry order.
pub fn kinds() -> impl Iterator<Item = LayoutKind> { LayoutKind::iter() }

impl LayoutDescriptor {
    pub fn create_from_layout(
        &self,
        tree: &mut LayoutTree,
        source: NodeId,
    ) -> Result<NodeId, LayoutError> {
        tree.create_from_layout(source, self.kind)
    }

    /// Builds an empty manager of this kind. Group kinds cannot exist empty, so
    /// they fall back to an empty layout of the tree's default grid kind.
    pub fn create_empty(&self, tree: &mut LayoutTree) -> NodeId {
        if self.kind.is_grid() {
            return tree.new_empty_layout(self.kind);
        }
        let fallback = tree.settings().grid_kind();
        warn!(kind = %self.kind, %fallback, "layout kind cannot be created empty, using the default grid");
        tree.new_empty_layout(fallback)
    }

    pub fn create_from_save_model(
        &self,
        tree: &mut LayoutTree,
        spec: &LayoutSpec,
        elements: &BTreeMap<String, ElementSpec>,
    ) -> Result<NodeId, LayoutError> {
        if spec.kind() != self.kind {
            return Err(LayoutError::KindMismatchAtPath {
                path: "/".into(),
                expected: self.kind,
                found: spec.kind(),
            });
        }
        Ok(tree.create_from_save_model(spec, elements))
    }
}
