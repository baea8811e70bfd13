//! The two leaf layout kinds: the free-placement grid and the auto-flowing grid.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::LayoutError;
use crate::layout::LayoutTree;
use crate::layout::element::{Element, GridPlacement};
use crate::layout::manager::LayoutBehavior;
use crate::layout::registry::LayoutKind;
use crate::model::tree::NodeId;

pub const GRID_COLUMN_COUNT: u32 = 24;
pub const GRID_CELL_HEIGHT: u32 = 30;
pub const GRID_CELL_VMARGIN: u32 = 8;
pub const DEFAULT_PANEL_WIDTH: u32 = 12;
pub const DEFAULT_PANEL_HEIGHT: u32 = 8;

pub const MAX_COLUMN_COUNT: u32 = 10;

/// Grid rows needed to show `px` pixels of panel height.
pub fn grid_height_for_px(px: u32) -> u32 { px.div_ceil(GRID_CELL_HEIGHT + GRID_CELL_VMARGIN) }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GridLayout {}

impl LayoutBehavior for GridLayout {
    fn kind(&self) -> LayoutKind { LayoutKind::GridLayout }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoGridLayout {
    pub options: AutoGridOptions,
}

impl LayoutBehavior for AutoGridLayout {
    fn kind(&self) -> LayoutKind { LayoutKind::AutoGridLayout }

    fn label(&self) -> String {
        let o = &self.options;
        format!(
            "AutoGridLayout cols={} width={}px height={}px{}",
            o.max_column_count,
            o.column_width_px(),
            o.row_height_px(),
            if o.fill_screen { " fill" } else { "" },
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnWidthMode {
    Narrow,
    #[default]
    Standard,
    Wide,
    Custom,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowHeightMode {
    Short,
    #[default]
    Standard,
    Tall,
    Custom,
}

impl ColumnWidthMode {
    pub fn preset_px(self) -> Option<u32> {
        match self {
            ColumnWidthMode::Narrow => Some(192),
            ColumnWidthMode::Standard => Some(320),
            ColumnWidthMode::Wide => Some(512),
            ColumnWidthMode::Custom => None,
        }
    }
}

impl RowHeightMode {
    pub fn preset_px(self) -> Option<u32> {
        match self {
            RowHeightMode::Short => Some(168),
            RowHeightMode::Standard => Some(320),
            RowHeightMode::Tall => Some(512),
            RowHeightMode::Custom => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoGridOptions {
    pub max_column_count: u32,
    pub column_width_mode: ColumnWidthMode,
    /// Only meaningful in custom mode.
    pub column_width: Option<u32>,
    pub row_height_mode: RowHeightMode,
    /// Only meaningful in custom mode.
    pub row_height: Option<u32>,
    pub fill_screen: bool,
}

impl Default for AutoGridOptions {
    fn default() -> Self {
        AutoGridOptions {
            max_column_count: 3,
            column_width_mode: ColumnWidthMode::Standard,
            column_width: None,
            row_height_mode: RowHeightMode::Standard,
            row_height: None,
            fill_screen: false,
        }
    }
}

/// Partial update of [`AutoGridOptions`] as sent by mutation commands.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AutoGridOptionsPatch {
    pub max_column_count: Option<u32>,
    pub column_width_mode: Option<ColumnWidthMode>,
    pub column_width: Option<u32>,
    pub row_height_mode: Option<RowHeightMode>,
    pub row_height: Option<u32>,
    pub fill_screen: Option<bool>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PatchOutcome {
    pub options: AutoGridOptions,
    /// Patched fields, keyed by their wire names, before and after.
    pub previous: Map<String, Value>,
    pub updated: Map<String, Value>,
}

impl AutoGridOptions {
    pub fn column_width_px(&self) -> u32 {
        self.column_width_mode
            .preset_px()
            .or(self.column_width)
            .unwrap_or(320)
    }

    pub fn row_height_px(&self) -> u32 {
        self.row_height_mode.preset_px().or(self.row_height).unwrap_or(320)
    }

    /// Width and height, in grid cells, of one flowed panel.
    pub fn cell_size(&self, column_count: u32) -> (u32, u32) {
        let width = column_count / self.max_column_count.clamp(1, MAX_COLUMN_COUNT);
        (width.max(1), grid_height_for_px(self.row_height_px()).max(1))
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        if !(1..=MAX_COLUMN_COUNT).contains(&self.max_column_count) {
            return Err(LayoutError::InvalidOptions(format!(
                "maxColumnCount must be between 1 and {MAX_COLUMN_COUNT}, got {}",
                self.max_column_count
            )));
        }
        if self.column_width_mode == ColumnWidthMode::Custom && !self.column_width.is_some_and(|w| w > 0)
        {
            return Err(LayoutError::InvalidOptions(
                "columnWidth must be a positive pixel value in custom mode".into(),
            ));
        }
        if self.row_height_mode == RowHeightMode::Custom && !self.row_height.is_some_and(|h| h > 0) {
            return Err(LayoutError::InvalidOptions(
                "rowHeight must be a positive pixel value in custom mode".into(),
            ));
        }
        Ok(())
    }

    /// Applies `patch` to a copy of these options. A bare `columnWidth` or
    /// `rowHeight` switches that dimension to custom mode.
    pub fn apply_patch(&self, patch: &AutoGridOptionsPatch) -> Result<PatchOutcome, LayoutError> {
        let mut options = self.clone();
        let mut previous = Map::new();
        let mut updated = Map::new();
        let mut record = |key: &str, before: Value, after: Value| {
            previous.insert(key.to_owned(), before);
            updated.insert(key.to_owned(), after);
        };

        if let Some(count) = patch.max_column_count {
            record("maxColumnCount", json!(self.max_column_count), json!(count));
            options.max_column_count = count;
        }
        if let Some(mode) = patch.column_width_mode {
            record("columnWidthMode", json!(self.column_width_mode), json!(mode));
            options.column_width_mode = mode;
        }
        if let Some(width) = patch.column_width {
            record("columnWidth", json!(self.column_width), json!(width));
            options.column_width = Some(width);
            if patch.column_width_mode.is_none() {
                options.column_width_mode = ColumnWidthMode::Custom;
            }
        }
        if let Some(mode) = patch.row_height_mode {
            record("rowHeightMode", json!(self.row_height_mode), json!(mode));
            options.row_height_mode = mode;
        }
        if let Some(height) = patch.row_height {
            record("rowHeight", json!(self.row_height), json!(height));
            options.row_height = Some(height);
            if patch.row_height_mode.is_none() {
                options.row_height_mode = RowHeightMode::Custom;
            }
        }
        if let Some(fill) = patch.fill_screen {
            record("fillScreen", json!(self.fill_screen), json!(fill));
            options.fill_screen = fill;
        }

        options.validate()?;
        Ok(PatchOutcome { options, previous, updated })
    }
}

impl LayoutTree {
    /// First free grid row below everything in a grid layout.
    pub fn grid_bottom(&self, layout: NodeId) -> u32 {
        layout
            .traverse_preorder(self.map())
            .skip(1)
            .filter_map(|node| match self.element(node)? {
                Element::Panel(panel) => Some(panel.placement.bottom()),
                Element::GridRow(marker) => Some(marker.y + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn set_placement(&mut self, panel: NodeId, placement: GridPlacement) {
        if let Some(Element::Panel(p)) = self.element_mut(panel) {
            p.placement = placement;
        }
    }

    /// Shifts every panel and row marker under `layout` down by `dy` rows.
    pub(crate) fn shift_grid(&mut self, layout: NodeId, dy: i64) {
        let nodes: Vec<_> = layout.traverse_preorder(self.map()).skip(1).collect();
        let shift = |y: u32| (i64::from(y) + dy).max(0) as u32;
        for node in nodes {
            match self.element_mut(node) {
                Some(Element::Panel(panel)) => panel.placement.y = shift(panel.placement.y),
                Some(Element::GridRow(marker)) => marker.y = shift(marker.y),
                _ => (),
            }
        }
    }

    /// Flow positions for `count` panels laid out by `options`.
    pub(crate) fn flow_placements(&self, options: &AutoGridOptions, count: usize) -> Vec<GridPlacement> {
        let columns = options.max_column_count.clamp(1, MAX_COLUMN_COUNT) as usize;
        let (width, height) = options.cell_size(self.settings().column_count);
        (0..count)
            .map(|i| GridPlacement {
                x: (i % columns) as u32 * width,
                y: (i / columns) as u32 * height,
                width,
                height,
            })
            .collect()
    }

    /// Panels of a grid layout in reading order, `(y, x)`, row markers included.
    pub(crate) fn panels_in_reading_order(&self, layout: NodeId) -> Vec<NodeId> {
        let mut panels: Vec<_> = layout
            .traverse_preorder(self.map())
            .filter(|&n| self.panel(n).is_some())
            .collect();
        panels.sort_by_key(|&n| {
            let p = self.panel(n).map(|p| p.placement).unwrap_or_default();
            (p.y, p.x)
        });
        panels
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn row_height_presets_map_to_grid_rows() {
        assert_eq!(9, grid_height_for_px(RowHeightMode::Standard.preset_px().unwrap()));
        assert_eq!(5, grid_height_for_px(RowHeightMode::Short.preset_px().unwrap()));
        assert_eq!(14, grid_height_for_px(RowHeightMode::Tall.preset_px().unwrap()));
        assert_eq!(1, grid_height_for_px(38));
        assert_eq!(2, grid_height_for_px(39));
    }

    #[test]
    fn default_cell_is_a_third_of_the_grid() {
        assert_eq!((8, 9), AutoGridOptions::default().cell_size(GRID_COLUMN_COUNT));
        let wide = AutoGridOptions { max_column_count: 5, ..Default::default() };
        assert_eq!((4, 9), wide.cell_size(GRID_COLUMN_COUNT));
    }

    #[test]
    fn patch_reports_only_touched_fields() {
        let outcome = AutoGridOptions::default()
            .apply_patch(&AutoGridOptionsPatch {
                max_column_count: Some(4),
                fill_screen: Some(true),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(4, outcome.options.max_column_count);
        assert!(outcome.options.fill_screen);
        assert_eq!(
            Value::Object(outcome.previous),
            json!({"maxColumnCount": 3, "fillScreen": false})
        );
        assert_eq!(Value::Object(outcome.updated), json!({"maxColumnCount": 4, "fillScreen": true}));
    }

    #[test]
    fn bare_pixel_value_switches_to_custom() {
        let outcome = AutoGridOptions::default()
            .apply_patch(&AutoGridOptionsPatch { row_height: Some(200), ..Default::default() })
            .unwrap();
        assert_eq!(RowHeightMode::Custom, outcome.options.row_height_mode);
        assert_eq!(200, outcome.options.row_height_px());
    }

    #[test]
    fn invalid_patches_are_rejected() {
        let base = AutoGridOptions::default();
        let too_many = AutoGridOptionsPatch { max_column_count: Some(11), ..Default::default() };
        assert!(matches!(base.apply_patch(&too_many), Err(LayoutError::InvalidOptions(_))));
        let custom_without_px = AutoGridOptionsPatch {
            column_width_mode: Some(ColumnWidthMode::Custom),
            ..Default::default()
        };
        assert!(matches!(base.apply_patch(&custom_without_px), Err(LayoutError::InvalidOptions(_))));
    }

    #[test]
    fn options_wire_names() {
        let patch: AutoGridOptionsPatch =
            serde_json::from_value(json!({"columnWidthMode": "wide", "rowHeightMode": "short"})).unwrap();
        assert_eq!(Some(ColumnWidthMode::Wide), patch.column_width_mode);
        assert_eq!(Some(RowHeightMode::Short), patch.row_height_mode);
        assert!(serde_json::from_value::<AutoGridOptionsPatch>(json!({"gap": 2})).is_err());
    }
}
