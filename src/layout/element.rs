use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::layout::manager::{LayoutBehavior, LayoutManager};
use crate::layout::registry::GroupKind;

/// Payload of a node in the layout forest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Element {
    /// Dashboard body owner. Exactly one `Layout` child.
    Root,
    Layout(LayoutManager),
    /// Exactly one `Layout` child.
    Row(RowItem),
    /// Exactly one `Layout` child.
    Tab(TabItem),
    /// Row boundary inside a grid; children are the panels it owns.
    GridRow(GridRow),
    Panel(Panel),
}

impl Element {
    pub fn as_layout(&self) -> Option<&LayoutManager> {
        match self {
            Element::Layout(manager) => Some(manager),
            _ => None,
        }
    }

    pub fn as_panel(&self) -> Option<&Panel> {
        match self {
            Element::Panel(panel) => Some(panel),
            _ => None,
        }
    }

    /// Rows and tabs, the titled children of a group manager.
    pub fn is_item(&self) -> bool { matches!(self, Element::Row(_) | Element::Tab(_)) }

    /// Nodes that hold exactly one layout child.
    pub fn is_owner(&self) -> bool { matches!(self, Element::Root) || self.is_item() }

    pub fn item_group(&self) -> Option<GroupKind> {
        match self {
            Element::Row(_) => Some(GroupKind::Rows),
            Element::Tab(_) => Some(GroupKind::Tabs),
            _ => None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Element::Row(row) => Some(&row.title),
            Element::Tab(tab) => Some(&tab.title),
            Element::GridRow(marker) => Some(&marker.title),
            Element::Panel(panel) => Some(&panel.title),
            Element::Root | Element::Layout(_) => None,
        }
    }

    pub fn set_title(&mut self, title: String) {
        match self {
            Element::Row(row) => row.title = title,
            Element::Tab(tab) => tab.title = title,
            Element::GridRow(marker) => marker.title = title,
            Element::Panel(panel) => panel.title = title,
            Element::Root | Element::Layout(_) => (),
        }
    }

    pub fn is_repeat_clone(&self) -> bool {
        match self {
            Element::Row(row) => row.is_repeat_clone,
            Element::Tab(tab) => tab.is_repeat_clone,
            Element::GridRow(marker) => marker.is_repeat_clone,
            _ => false,
        }
    }

    pub(crate) fn label(&self) -> String {
        match self {
            Element::Root => "Root".into(),
            Element::Layout(manager) => manager.label(),
            Element::Row(row) => {
                let mut label = format!("Row {:?}", row.title);
                if row.collapse {
                    label.push_str(" collapsed");
                }
                if let Some(var) = &row.repeat_by_variable {
                    label.push_str(&format!(" repeat=${var}"));
                }
                label
            }
            Element::Tab(tab) => format!("Tab {:?}", tab.title),
            Element::GridRow(marker) => format!("GridRow {:?} y={}", marker.title, marker.y),
            Element::Panel(panel) => format!("Panel {} {:?} {}", panel.name, panel.title, panel.placement),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPlacement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl GridPlacement {
    pub fn at(x: u32, y: u32, width: u32, height: u32) -> Self { GridPlacement { x, y, width, height } }

    pub fn bottom(&self) -> u32 { self.y + self.height }
}

impl std::fmt::Display for GridPlacement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{} {}x{}]", self.x, self.y, self.width, self.height)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    /// Element name; unique within a dashboard.
    pub name: String,
    /// Legacy numeric panel id.
    pub id: u32,
    pub title: String,
    pub description: String,
    pub plugin_id: String,
    pub placement: GridPlacement,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GridRow {
    pub title: String,
    pub collapsed: bool,
    pub repeat_by_variable: Option<String>,
    pub is_repeat_clone: bool,
    pub y: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RowItem {
    pub title: String,
    pub collapse: bool,
    pub hide_header: bool,
    pub repeat_by_variable: Option<String>,
    pub conditional_rendering: Option<Value>,
    pub is_repeat_clone: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TabItem {
    pub title: String,
    pub repeat_by_variable: Option<String>,
    pub conditional_rendering: Option<Value>,
    pub is_repeat_clone: bool,
}

impl RowItem {
    pub fn titled(title: impl Into<String>) -> Self { RowItem { title: title.into(), ..Default::default() } }
}

impl TabItem {
    pub fn titled(title: impl Into<String>) -> Self { TabItem { title: title.into(), ..Default::default() } }
}

impl From<TabItem> for RowItem {
    fn from(tab: TabItem) -> Self {
        RowItem {
            title: tab.title,
            repeat_by_variable: tab.repeat_by_variable,
            conditional_rendering: tab.conditional_rendering,
            ..Default::default()
        }
    }
}

impl From<RowItem> for TabItem {
    fn from(row: RowItem) -> Self {
        TabItem {
            title: row.title,
            repeat_by_variable: row.repeat_by_variable,
            conditional_rendering: row.conditional_rendering,
            is_repeat_clone: false,
        }
    }
}

impl GroupKind {
    /// Item payload for this group kind with the given title.
    pub fn new_item(self, title: impl Into<String>) -> Element {
        match self {
            GroupKind::Rows => Element::Row(RowItem::titled(title)),
            GroupKind::Tabs => Element::Tab(TabItem::titled(title)),
        }
    }

    /// Re-expresses an item of either kind as an item of this kind.
    pub(crate) fn convert_item(self, item: &Element) -> Option<Element> {
        let converted = match (self, item) {
            (GroupKind::Rows, Element::Row(row)) => Element::Row(row.clone()),
            (GroupKind::Rows, Element::Tab(tab)) => Element::Row(tab.clone().into()),
            (GroupKind::Tabs, Element::Tab(tab)) => Element::Tab(tab.clone()),
            (GroupKind::Tabs, Element::Row(row)) => Element::Tab(row.clone().into()),
            (GroupKind::Rows, Element::GridRow(marker)) => Element::Row(RowItem {
                title: marker.title.clone(),
                collapse: marker.collapsed,
                repeat_by_variable: marker.repeat_by_variable.clone(),
                ..Default::default()
            }),
            (GroupKind::Tabs, Element::GridRow(marker)) => Element::Tab(TabItem {
                title: marker.title.clone(),
                repeat_by_variable: marker.repeat_by_variable.clone(),
                ..Default::default()
            }),
            _ => return None,
        };
        Some(converted)
    }
}
