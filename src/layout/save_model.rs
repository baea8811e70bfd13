//! The persisted `{kind, spec}` form of a dashboard layout.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::common::collections::BTreeMap;
use crate::error::LayoutError;
use crate::layout::LayoutTree;
use crate::layout::element::{Element, GridPlacement, GridRow, Panel, RowItem, TabItem};
use crate::layout::grid::{AutoGridLayout, AutoGridOptions, ColumnWidthMode, RowHeightMode};
use crate::layout::manager::LayoutManager;
use crate::layout::registry::{GroupKind, LayoutKind};
use crate::model::tree::NodeId;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSpec {
    #[serde(default)]
    pub elements: BTreeMap<String, ElementSpec>,
    pub layout: LayoutSpec,
}

impl DashboardSpec {
    /// Reads a saved dashboard. `.ron` files are RON, everything else JSON.
    pub fn read(path: &Path) -> anyhow::Result<DashboardSpec> {
        let buf = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let spec = if is_ron(path) {
            ron::from_str(&buf).with_context(|| format!("parsing {}", path.display()))?
        } else {
            serde_json::from_str(&buf).with_context(|| format!("parsing {}", path.display()))?
        };
        Ok(spec)
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let buf = if is_ron(path) {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?
        } else {
            serde_json::to_string_pretty(self)?
        };
        std::fs::write(path, buf).with_context(|| format!("writing {}", path.display()))
    }
}

fn is_ron(path: &Path) -> bool { path.extension().is_some_and(|ext| ext == "ron") }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "spec")]
pub enum LayoutSpec {
    GridLayout(GridLayoutSpec),
    AutoGridLayout(AutoGridLayoutSpec),
    RowsLayout(RowsLayoutSpec),
    TabsLayout(TabsLayoutSpec),
}

impl LayoutSpec {
    pub fn kind(&self) -> LayoutKind {
        match self {
            LayoutSpec::GridLayout(_) => LayoutKind::GridLayout,
            LayoutSpec::AutoGridLayout(_) => LayoutKind::AutoGridLayout,
            LayoutSpec::RowsLayout(_) => LayoutKind::RowsLayout,
            LayoutSpec::TabsLayout(_) => LayoutKind::TabsLayout,
        }
    }
}

impl Default for LayoutSpec {
    fn default() -> Self { LayoutSpec::GridLayout(GridLayoutSpec::default()) }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GridLayoutSpec {
    #[serde(default)]
    pub items: Vec<GridLayoutEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "spec")]
pub enum GridLayoutEntry {
    GridLayoutItem(GridItemSpec),
    GridLayoutRow(GridRowSpec),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridItemSpec {
    #[serde(default)]
    pub x: u32,
    #[serde(default)]
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub element: ElementReference,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRowSpec {
    #[serde(default)]
    pub y: u32,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<RepeatOptions>,
    #[serde(default)]
    pub elements: Vec<GridLayoutEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementReference {
    #[serde(default = "element_reference_kind")]
    pub kind: String,
    pub name: String,
}

fn element_reference_kind() -> String { "ElementReference".into() }

impl ElementReference {
    pub fn named(name: impl Into<String>) -> Self {
        ElementReference { kind: element_reference_kind(), name: name.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoGridLayoutSpec {
    #[serde(default = "default_max_column_count")]
    pub max_column_count: u32,
    #[serde(default)]
    pub column_width_mode: ColumnWidthMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_width: Option<u32>,
    #[serde(default)]
    pub row_height_mode: RowHeightMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_height: Option<u32>,
    #[serde(default)]
    pub fill_screen: bool,
    #[serde(default)]
    pub items: Vec<AutoGridEntry>,
}

fn default_max_column_count() -> u32 { AutoGridOptions::default().max_column_count }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "spec")]
pub enum AutoGridEntry {
    AutoGridLayoutItem(AutoGridItemSpec),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AutoGridItemSpec {
    pub element: ElementReference,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RowsLayoutSpec {
    #[serde(default)]
    pub rows: Vec<RowEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "spec")]
pub enum RowEntry {
    RowsLayoutRow(RowSpec),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapse: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_header: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<RepeatOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_rendering: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutSpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TabsLayoutSpec {
    #[serde(default)]
    pub tabs: Vec<TabEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "spec")]
pub enum TabEntry {
    TabsLayoutTab(TabSpec),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<RepeatOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_rendering: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutSpec>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatOptions {
    #[serde(default = "repeat_mode")]
    pub mode: String,
    pub value: String,
}

fn repeat_mode() -> String { "variable".into() }

impl RepeatOptions {
    pub fn variable(value: impl Into<String>) -> Self { RepeatOptions { mode: repeat_mode(), value: value.into() } }

    /// The variable binding this describes; an empty value means none.
    pub fn binding(&self) -> Option<String> { (!self.value.is_empty()).then(|| self.value.clone()) }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "spec")]
pub enum ElementSpec {
    Panel(PanelSpec),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelSpec {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub viz_config: VizConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VizConfig {
    #[serde(default = "viz_config_kind")]
    pub kind: String,
    #[serde(default)]
    pub group: String,
}

fn viz_config_kind() -> String { "VizConfig".into() }

impl Default for VizConfig {
    fn default() -> Self { VizConfig { kind: viz_config_kind(), group: String::new() } }
}

impl RowSpec {
    pub(crate) fn into_item(self, default_title: &str) -> (Element, Option<LayoutSpec>) {
        let row = RowItem {
            title: self.title.unwrap_or_else(|| default_title.to_owned()),
            collapse: self.collapse.unwrap_or(false),
            hide_header: self.hide_header.unwrap_or(false),
            repeat_by_variable: self.repeat.as_ref().and_then(RepeatOptions::binding),
            conditional_rendering: self.conditional_rendering,
            is_repeat_clone: false,
        };
        (Element::Row(row), self.layout)
    }
}

impl TabSpec {
    pub(crate) fn into_item(self, default_title: &str) -> (Element, Option<LayoutSpec>) {
        let tab = TabItem {
            title: self.title.unwrap_or_else(|| default_title.to_owned()),
            repeat_by_variable: self.repeat.as_ref().and_then(RepeatOptions::binding),
            conditional_rendering: self.conditional_rendering,
            is_repeat_clone: false,
        };
        (Element::Tab(tab), self.layout)
    }
}

impl LayoutTree {
    /// Save model of the layout at `layout`. Repeat clones are runtime state
    /// and are not written.
    pub fn serialize(&self, layout: NodeId) -> Result<LayoutSpec, LayoutError> {
        let spec = match self.layout(layout)? {
            LayoutManager::Grid(_) => {
                let mut items = Vec::new();
                for child in self.children(layout) {
                    match self.element(child) {
                        Some(Element::Panel(panel)) => items.push(grid_item(panel)),
                        Some(Element::GridRow(marker)) if !marker.is_repeat_clone => {
                            let elements = self
                                .children(child)
                                .into_iter()
                                .filter_map(|p| self.panel(p).map(grid_item))
                                .collect();
                            items.push(GridLayoutEntry::GridLayoutRow(GridRowSpec {
                                y: marker.y,
                                collapsed: marker.collapsed,
                                title: marker.title.clone(),
                                repeat: marker.repeat_by_variable.clone().map(RepeatOptions::variable),
                                elements,
                            }));
                        }
                        _ => (),
                    }
                }
                LayoutSpec::GridLayout(GridLayoutSpec { items })
            }
            LayoutManager::AutoGrid(auto) => {
                let o = &auto.options;
                let items = self
                    .viz_panels(layout)
                    .into_iter()
                    .filter_map(|p| self.panel(p))
                    .map(|p| {
                        AutoGridEntry::AutoGridLayoutItem(AutoGridItemSpec {
                            element: ElementReference::named(&p.name),
                        })
                    })
                    .collect();
                LayoutSpec::AutoGridLayout(AutoGridLayoutSpec {
                    max_column_count: o.max_column_count,
                    column_width_mode: o.column_width_mode,
                    column_width: o.column_width,
                    row_height_mode: o.row_height_mode,
                    row_height: o.row_height,
                    fill_screen: o.fill_screen,
                    items,
                })
            }
            LayoutManager::Rows(_) => {
                let mut rows = Vec::new();
                for item in self.children(layout) {
                    let Some(Element::Row(row)) = self.element(item) else { continue };
                    if row.is_repeat_clone {
                        continue;
                    }
                    rows.push(RowEntry::RowsLayoutRow(RowSpec {
                        title: Some(row.title.clone()),
                        collapse: Some(row.collapse),
                        hide_header: row.hide_header.then_some(true),
                        repeat: row.repeat_by_variable.clone().map(RepeatOptions::variable),
                        conditional_rendering: row.conditional_rendering.clone(),
                        layout: Some(self.serialize(self.inner_layout(item)?)?),
                    }));
                }
                LayoutSpec::RowsLayout(RowsLayoutSpec { rows })
            }
            LayoutManager::Tabs(_) => {
                let mut tabs = Vec::new();
                for item in self.children(layout) {
                    let Some(Element::Tab(tab)) = self.element(item) else { continue };
                    if tab.is_repeat_clone {
                        continue;
                    }
                    tabs.push(TabEntry::TabsLayoutTab(TabSpec {
                        title: Some(tab.title.clone()),
                        repeat: tab.repeat_by_variable.clone().map(RepeatOptions::variable),
                        conditional_rendering: tab.conditional_rendering.clone(),
                        layout: Some(self.serialize(self.inner_layout(item)?)?),
                    }));
                }
                LayoutSpec::TabsLayout(TabsLayoutSpec { tabs })
            }
        };
        Ok(spec)
    }

    /// Panel definitions of every panel under `layout`, keyed by element name.
    pub fn element_specs(&self, layout: NodeId) -> BTreeMap<String, ElementSpec> {
        self.viz_panels(layout)
            .into_iter()
            .filter_map(|n| self.panel(n))
            .map(|p| {
                let spec = PanelSpec {
                    id: p.id,
                    title: p.title.clone(),
                    description: p.description.clone(),
                    viz_config: VizConfig { group: p.plugin_id.clone(), ..Default::default() },
                };
                (p.name.clone(), ElementSpec::Panel(spec))
            })
            .collect()
    }

    /// Builds an unattached layout from its save model. Groups saved without
    /// items get one default item so they are never empty.
    pub fn create_from_save_model(
        &mut self,
        spec: &LayoutSpec,
        elements: &BTreeMap<String, ElementSpec>,
    ) -> NodeId {
        match spec {
            LayoutSpec::GridLayout(grid) => {
                let layout = self.new_empty_layout(LayoutKind::GridLayout);
                for entry in &grid.items {
                    match entry {
                        GridLayoutEntry::GridLayoutItem(item) => {
                            let panel = panel_from_item(item, elements);
                            self.create_under(layout, Element::Panel(panel));
                        }
                        GridLayoutEntry::GridLayoutRow(row) => {
                            let marker = self.create_under(
                                layout,
                                Element::GridRow(GridRow {
                                    title: row.title.clone(),
                                    collapsed: row.collapsed,
                                    repeat_by_variable: row.repeat.as_ref().and_then(RepeatOptions::binding),
                                    is_repeat_clone: false,
                                    y: row.y,
                                }),
                            );
                            for nested in &row.elements {
                                if let GridLayoutEntry::GridLayoutItem(item) = nested {
                                    let panel = panel_from_item(item, elements);
                                    self.create_under(marker, Element::Panel(panel));
                                }
                            }
                        }
                    }
                }
                layout
            }
            LayoutSpec::AutoGridLayout(auto) => {
                let options = AutoGridOptions {
                    max_column_count: auto.max_column_count,
                    column_width_mode: auto.column_width_mode,
                    column_width: auto.column_width,
                    row_height_mode: auto.row_height_mode,
                    row_height: auto.row_height,
                    fill_screen: auto.fill_screen,
                };
                if let Err(err) = options.validate() {
                    warn!(%err, "loading auto grid with invalid options");
                }
                let layout = self.create(Element::Layout(AutoGridLayout { options }.into()));
                for AutoGridEntry::AutoGridLayoutItem(item) in &auto.items {
                    let panel = panel_from_element(&item.element.name, elements);
                    self.create_under(layout, Element::Panel(panel));
                }
                layout
            }
            LayoutSpec::RowsLayout(rows) => {
                let items = rows
                    .rows
                    .iter()
                    .map(|RowEntry::RowsLayoutRow(row)| {
                        row.clone().into_item(&self.settings().default_row_title)
                    })
                    .collect();
                self.group_from_save_model(GroupKind::Rows, items, elements)
            }
            LayoutSpec::TabsLayout(tabs) => {
                let items = tabs
                    .tabs
                    .iter()
                    .map(|TabEntry::TabsLayoutTab(tab)| {
                        tab.clone().into_item(&self.settings().default_tab_title)
                    })
                    .collect();
                self.group_from_save_model(GroupKind::Tabs, items, elements)
            }
        }
    }

    /// Builds the inner layout of an item; a missing layout is an empty
    /// default grid.
    pub(crate) fn item_layout_from_save_model(
        &mut self,
        layout: Option<&LayoutSpec>,
        elements: &BTreeMap<String, ElementSpec>,
    ) -> NodeId {
        match layout {
            Some(spec) => self.create_from_save_model(spec, elements),
            None => self.new_default_grid(),
        }
    }

    fn group_from_save_model(
        &mut self,
        group: GroupKind,
        mut items: Vec<(Element, Option<LayoutSpec>)>,
        elements: &BTreeMap<String, ElementSpec>,
    ) -> NodeId {
        if items.is_empty() {
            debug!(%group, "saved group has no items, adding a default one");
            items.push((group.new_item(self.settings().default_title(group).to_owned()), None));
        }
        let manager = self.new_empty_layout(group.kind());
        for (item, layout) in items {
            let inner = self.item_layout_from_save_model(layout.as_ref(), elements);
            let node = self.new_item(item, inner);
            self.append(node, manager);
        }
        manager
    }
}

fn grid_item(panel: &Panel) -> GridLayoutEntry {
    let p = panel.placement;
    GridLayoutEntry::GridLayoutItem(GridItemSpec {
        x: p.x,
        y: p.y,
        width: p.width,
        height: p.height,
        element: ElementReference::named(&panel.name),
    })
}

fn panel_from_item(item: &GridItemSpec, elements: &BTreeMap<String, ElementSpec>) -> Panel {
    Panel {
        placement: GridPlacement::at(item.x, item.y, item.width, item.height),
        ..panel_from_element(&item.element.name, elements)
    }
}

fn panel_from_element(name: &str, elements: &BTreeMap<String, ElementSpec>) -> Panel {
    match elements.get(name) {
        Some(ElementSpec::Panel(spec)) => Panel {
            name: name.to_owned(),
            id: spec.id,
            title: spec.title.clone(),
            description: spec.description.clone(),
            plugin_id: spec.viz_config.group.clone(),
            placement: GridPlacement::default(),
        },
        None => {
            warn!(name, "layout references an unknown element");
            Panel { name: name.to_owned(), ..Default::default() }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn wire_shape_of_a_rows_layout() {
        let spec: LayoutSpec = serde_json::from_value(json!({
            "kind": "RowsLayout",
            "spec": {"rows": [{
                "kind": "RowsLayoutRow",
                "spec": {
                    "title": "Row 1",
                    "collapse": false,
                    "repeat": {"mode": "variable", "value": "host"},
                    "layout": {"kind": "GridLayout", "spec": {"items": [{
                        "kind": "GridLayoutItem",
                        "spec": {"x": 0, "y": 0, "width": 12, "height": 8,
                                 "element": {"kind": "ElementReference", "name": "panel-1"}}
                    }]}}
                }
            }]}
        }))
        .unwrap();
        let LayoutSpec::RowsLayout(rows) = &spec else { panic!("expected rows") };
        let RowEntry::RowsLayoutRow(row) = &rows.rows[0];
        assert_eq!(Some("host".to_string()), row.repeat.as_ref().and_then(RepeatOptions::binding));
        assert_eq!(Some(LayoutKind::GridLayout), row.layout.as_ref().map(LayoutSpec::kind));
    }

    #[test]
    fn empty_repeat_value_means_no_binding() {
        assert_eq!(None, RepeatOptions::variable("").binding());
        assert_eq!(Some("env".to_string()), RepeatOptions::variable("env").binding());
    }

    #[test]
    fn unknown_layout_kind_is_rejected() {
        let result = serde_json::from_value::<LayoutSpec>(json!({"kind": "Carousel", "spec": {}}));
        assert!(result.is_err());
    }

    #[test]
    fn auto_grid_defaults() {
        let spec: AutoGridLayoutSpec = serde_json::from_value(json!({})).unwrap();
        assert_eq!(3, spec.max_column_count);
        assert_eq!(ColumnWidthMode::Standard, spec.column_width_mode);
        assert!(spec.items.is_empty());
    }

    #[test]
    fn dashboard_files_round_trip_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard.json");
        let spec: DashboardSpec = serde_json::from_value(json!({
            "elements": {"a": {"kind": "Panel", "spec": {"id": 1, "title": "A"}}},
            "layout": {"kind": "AutoGridLayout", "spec": {"items": [
                {"kind": "AutoGridLayoutItem", "spec": {"element": {"kind": "ElementReference", "name": "a"}}}
            ]}}
        }))
        .unwrap();
        spec.write(&path).unwrap();
        assert_eq!(spec, DashboardSpec::read(&path).unwrap());
    }

    #[test]
    fn unreadable_dashboard_files_name_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{").unwrap();
        let err = DashboardSpec::read(&path).unwrap_err();
        assert!(format!("{err}").contains("broken.json"), "{err}");
    }
}
