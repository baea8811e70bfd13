//! The flat v1 panel list: one array of panels positioned on a single grid,
//! with `row` panels standing in for every row and tab.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::collections::HashSet;
use crate::error::LayoutError;
use crate::layout::LayoutTree;
use crate::layout::element::{Element, GridPlacement, GridRow, Panel};
use crate::layout::manager::LayoutManager;
use crate::layout::registry::LayoutKind;
use crate::model::tree::NodeId;

pub const ROW_PANEL_TYPE: &str = "row";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyGridPos {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl From<GridPlacement> for LegacyGridPos {
    fn from(p: GridPlacement) -> Self { LegacyGridPos { x: p.x, y: p.y, w: p.width, h: p.height } }
}

impl From<LegacyGridPos> for GridPlacement {
    fn from(p: LegacyGridPos) -> Self { GridPlacement::at(p.x, p.y, p.w, p.h) }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyPanel {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub grid_pos: LegacyGridPos,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,
    /// Only row panels carry this; it is empty unless the row is collapsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panels: Option<Vec<LegacyPanel>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<String>,
}

impl LegacyPanel {
    pub fn is_row(&self) -> bool { self.kind == ROW_PANEL_TYPE }
}

struct LegacyWriter<'a> {
    tree: &'a LayoutTree,
    /// First free grid row.
    cursor: u32,
    next_row_id: u32,
}

impl LegacyWriter<'_> {
    fn write(&mut self, layout: NodeId, out: &mut Vec<LegacyPanel>) -> Result<(), LayoutError> {
        let tree = self.tree;
        match tree.layout(layout)? {
            LayoutManager::Grid(_) => self.write_grid(layout, out),
            LayoutManager::AutoGrid(auto) => {
                let panels = tree.viz_panels(layout);
                let placements = tree.flow_placements(&auto.options, panels.len());
                let top = self.cursor;
                for (node, placement) in panels.into_iter().zip(placements) {
                    let Some(panel) = tree.panel(node) else { continue };
                    let placement = GridPlacement { y: top + placement.y, ..placement };
                    self.cursor = self.cursor.max(placement.bottom());
                    out.push(viz_panel(panel, placement));
                }
            }
            LayoutManager::Rows(_) => {
                for (index, item) in tree.children(layout).into_iter().enumerate() {
                    let Some(Element::Row(row)) = tree.element(item) else { continue };
                    if row.is_repeat_clone {
                        continue;
                    }
                    let inner = tree.inner_layout(item)?;
                    // A leading headerless row holds the panels that sit above the first row.
                    if index == 0 && row.hide_header && layout == tree.body() {
                        self.write(inner, out)?;
                        continue;
                    }
                    let row_panel = self.row_panel(&row.title, row.collapse, row.repeat_by_variable.clone());
                    self.write_section(row_panel, inner, out)?;
                }
            }
            LayoutManager::Tabs(_) => {
                for item in tree.children(layout) {
                    let Some(Element::Tab(tab)) = tree.element(item) else { continue };
                    if tab.is_repeat_clone {
                        continue;
                    }
                    let inner = tree.inner_layout(item)?;
                    let row_panel = self.row_panel(&tab.title, false, tab.repeat_by_variable.clone());
                    self.write_section(row_panel, inner, out)?;
                }
            }
        }
        Ok(())
    }

    fn write_grid(&mut self, layout: NodeId, out: &mut Vec<LegacyPanel>) {
        let tree = self.tree;
        let top = self.cursor;
        let offset = |p: GridPlacement| GridPlacement { y: top + p.y, ..p };
        for child in tree.children(layout) {
            match tree.element(child) {
                Some(Element::Panel(panel)) => out.push(viz_panel(panel, offset(panel.placement))),
                Some(Element::GridRow(marker)) if !marker.is_repeat_clone => {
                    let mut row_panel =
                        self.row_panel(&marker.title, marker.collapsed, marker.repeat_by_variable.clone());
                    row_panel.grid_pos.y = top + marker.y;
                    let owned = tree
                        .children(child)
                        .into_iter()
                        .filter_map(|p| tree.panel(p))
                        .map(|p| viz_panel(p, offset(p.placement)));
                    if marker.collapsed {
                        row_panel.panels = Some(owned.collect());
                        out.push(row_panel);
                    } else {
                        out.push(row_panel);
                        out.extend(owned);
                    }
                }
                _ => (),
            }
        }
        self.cursor = top + tree.grid_bottom(layout);
    }

    /// Emits a row panel at the cursor followed by the content of `inner`.
    /// A collapsed row takes its content into `panels`; nested rows inside
    /// it have nowhere to go and only their panels are kept.
    fn write_section(
        &mut self,
        mut row_panel: LegacyPanel,
        inner: NodeId,
        out: &mut Vec<LegacyPanel>,
    ) -> Result<(), LayoutError> {
        row_panel.grid_pos.y = self.cursor;
        self.cursor += 1;
        if row_panel.collapsed != Some(true) {
            out.push(row_panel);
            return self.write(inner, out);
        }
        let resume = self.cursor;
        let mut nested = Vec::new();
        self.write(inner, &mut nested)?;
        self.cursor = resume;
        row_panel.panels = Some(nested.into_iter().filter(|p| !p.is_row()).collect());
        out.push(row_panel);
        Ok(())
    }

    fn row_panel(&mut self, title: &str, collapsed: bool, repeat: Option<String>) -> LegacyPanel {
        let id = self.next_row_id;
        self.next_row_id += 1;
        LegacyPanel {
            kind: ROW_PANEL_TYPE.into(),
            id,
            title: title.into(),
            grid_pos: LegacyGridPos { x: 0, y: self.cursor, w: self.tree.settings().column_count, h: 1 },
            collapsed: Some(collapsed),
            panels: Some(Vec::new()),
            repeat,
            ..Default::default()
        }
    }
}

fn viz_panel(panel: &Panel, placement: GridPlacement) -> LegacyPanel {
    LegacyPanel {
        kind: panel.plugin_id.clone(),
        id: panel.id,
        title: panel.title.clone(),
        description: panel.description.clone(),
        grid_pos: placement.into(),
        ..Default::default()
    }
}

impl LayoutTree {
    /// Flattens `layout` into the v1 panel list. Rows and tabs become row
    /// panels; auto grids are laid out with their flow sizing.
    pub fn to_legacy_panels(&self, layout: NodeId) -> Result<Vec<LegacyPanel>, LayoutError> {
        let max_id = self.viz_panels(layout).into_iter().filter_map(|p| self.panel(p)).map(|p| p.id).max();
        let mut writer = LegacyWriter { tree: self, cursor: 0, next_row_id: max_id.unwrap_or(0) + 1 };
        let mut out = Vec::new();
        writer.write(layout, &mut out)?;
        debug!(?layout, panels = out.len(), "exported legacy panels");
        Ok(out)
    }

    /// Builds an unattached grid from a v1 panel list. Each row panel becomes
    /// a row marker owning the panels that follow it (or, when collapsed, the
    /// panels nested in it). Panels before the first row stay loose.
    pub fn from_legacy_panels(&mut self, panels: &[LegacyPanel]) -> NodeId {
        let layout = self.new_empty_layout(LayoutKind::GridLayout);
        let mut taken = self.panel_names();
        let mut current_row: Option<NodeId> = None;
        for legacy in panels {
            if legacy.is_row() {
                let collapsed = legacy.collapsed.unwrap_or(false);
                let marker = self.create_under(
                    layout,
                    Element::GridRow(GridRow {
                        title: legacy.title.clone(),
                        collapsed,
                        repeat_by_variable: legacy.repeat.clone().filter(|r| !r.is_empty()),
                        is_repeat_clone: false,
                        y: legacy.grid_pos.y,
                    }),
                );
                for nested in legacy.panels.iter().flatten().filter(|p| !p.is_row()) {
                    let panel = self.legacy_viz_panel(nested, &mut taken);
                    self.create_under(marker, Element::Panel(panel));
                }
                current_row = (!collapsed).then_some(marker);
                continue;
            }
            let panel = self.legacy_viz_panel(legacy, &mut taken);
            self.create_under(current_row.unwrap_or(layout), Element::Panel(panel));
        }
        layout
    }

    fn legacy_viz_panel(&self, legacy: &LegacyPanel, taken: &mut HashSet<String>) -> Panel {
        let name = format!("panel-{}", legacy.id);
        let (name, id) = if legacy.id != 0 && taken.insert(name.clone()) {
            (name, legacy.id)
        } else {
            self.fresh_panel_identity(taken)
        };
        Panel {
            name,
            id,
            title: legacy.title.clone(),
            description: legacy.description.clone(),
            plugin_id: legacy.kind.clone(),
            placement: legacy.grid_pos.into(),
        }
    }
}
