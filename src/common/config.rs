use std::path::{Path, PathBuf};

use anyhow::bail;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::layout::grid::{DEFAULT_PANEL_HEIGHT, DEFAULT_PANEL_WIDTH, GRID_COLUMN_COUNT};
use crate::layout::{LayoutKind, NestingPolicy, TreeSettings};

const MAX_HISTORY_LIMIT: usize = 10_000;

pub fn data_dir() -> Option<PathBuf> { dirs::home_dir().map(|home| home.join(".dashlayout")) }

pub fn history_file() -> Option<PathBuf> { data_dir().map(|dir| dir.join("history.ron")) }

pub fn config_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("dashlayout").join("config.toml"))
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub layout: LayoutSettings,
    #[serde(default)]
    pub grid: GridSettings,
    #[serde(default)]
    pub nesting: NestingPolicy,
    #[serde(default)]
    pub history: HistorySettings,
    #[serde(default)]
    pub features: FeatureSettings,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct LayoutSettings {
    #[serde(default = "default_row_title")]
    pub default_row_title: String,
    #[serde(default = "default_tab_title")]
    pub default_tab_title: String,
    /// Layout used for new bodies and new row or tab content.
    #[serde(default = "default_grid")]
    pub default_grid: LayoutKind,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        LayoutSettings {
            default_row_title: default_row_title(),
            default_tab_title: default_tab_title(),
            default_grid: default_grid(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct GridSettings {
    #[serde(default = "default_column_count")]
    pub column_count: u32,
    #[serde(default = "default_panel_width")]
    pub panel_width: u32,
    #[serde(default = "default_panel_height")]
    pub panel_height: u32,
}

impl Default for GridSettings {
    fn default() -> Self {
        GridSettings {
            column_count: default_column_count(),
            panel_width: default_panel_width(),
            panel_height: default_panel_height(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct HistorySettings {
    /// Number of edits that can be undone.
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

impl Default for HistorySettings {
    fn default() -> Self { HistorySettings { limit: default_history_limit() } }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct FeatureSettings {
    #[serde(default = "yes")]
    pub dashboard_new_layouts: bool,
}

impl Default for FeatureSettings {
    fn default() -> Self { FeatureSettings { dashboard_new_layouts: yes() } }
}

fn yes() -> bool { true }

fn default_row_title() -> String { "New row".into() }

fn default_tab_title() -> String { "New tab".into() }

fn default_grid() -> LayoutKind { LayoutKind::GridLayout }

fn default_column_count() -> u32 { GRID_COLUMN_COUNT }

fn default_panel_width() -> u32 { DEFAULT_PANEL_WIDTH }

fn default_panel_height() -> u32 { DEFAULT_PANEL_HEIGHT }

fn default_history_limit() -> usize { 100 }

impl LayoutSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !self.default_grid.is_grid() {
            issues.push(format!(
                "layout.default_grid must be GridLayout or AutoGridLayout, got {}",
                self.default_grid
            ));
        }
        issues
    }
}

impl GridSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.column_count == 0 {
            issues.push("grid.column_count must be at least 1".to_string());
        }
        if self.panel_width == 0 || self.panel_width > self.column_count {
            issues.push(format!(
                "grid.panel_width must be between 1 and column_count ({}), got {}",
                self.column_count, self.panel_width
            ));
        }
        if self.panel_height == 0 {
            issues.push("grid.panel_height must be at least 1".to_string());
        }
        issues
    }
}

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)?;
        Self::parse(&buf)
    }

    pub fn parse(buf: &str) -> anyhow::Result<Config> {
        let config: Config = match toml::from_str(buf) {
            Ok(config) => config,
            Err(e) => bail!("{e}"),
        };
        Ok(config)
    }

    /// Reads the config from its default location, falling back to defaults
    /// when there is no file.
    pub fn load_default() -> anyhow::Result<Config> {
        match config_file() {
            Some(path) if path.exists() => Self::read(&path),
            _ => Ok(Config::default()),
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, toml_string.as_bytes())?;
        Ok(())
    }

    /// Validates the entire configuration and returns a list of issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        issues.extend(self.layout.validate());
        issues.extend(self.grid.validate());

        if self.nesting.max_group_depth == 0 {
            issues.push("nesting.max_group_depth must be at least 1".to_string());
        }

        if self.history.limit > MAX_HISTORY_LIMIT {
            issues.push(format!(
                "history.limit should not exceed {MAX_HISTORY_LIMIT}, got {}",
                self.history.limit
            ));
        }

        issues
    }

    /// Settings for a new layout tree. A group `default_grid` is replaced by
    /// a plain grid; `validate` reports it.
    pub fn tree_settings(&self) -> TreeSettings {
        let default_grid = if self.layout.default_grid.is_grid() {
            self.layout.default_grid
        } else {
            warn!(kind = %self.layout.default_grid, "layout.default_grid is not a grid, using GridLayout");
            LayoutKind::GridLayout
        };
        TreeSettings {
            default_row_title: self.layout.default_row_title.clone(),
            default_tab_title: self.layout.default_tab_title.clone(),
            default_grid,
            column_count: self.grid.column_count,
            panel_width: self.grid.panel_width,
            panel_height: self.grid.panel_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_file_matches_defaults() {
        let parsed = Config::parse(include_str!("../../dashlayout.default.toml")).unwrap();
        assert_eq!(Config::default(), parsed);
        assert!(parsed.validate().is_empty());
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let cfg = Config::parse(
            r#"
            [layout]
            default_row_title = "Section"

            [nesting]
            allow_same_kind = true
            "#,
        )
        .unwrap();
        assert_eq!("Section", cfg.layout.default_row_title);
        assert_eq!("New tab", cfg.layout.default_tab_title);
        assert!(cfg.nesting.allow_same_kind);
        assert_eq!(2, cfg.nesting.max_group_depth);
        assert_eq!(100, cfg.history.limit);
        assert!(cfg.features.dashboard_new_layouts);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::parse("[grid]\ncolumns = 12\n").is_err());
        assert!(Config::parse("[unknown]\n").is_err());
    }

    #[test]
    fn group_default_grid_is_reported() {
        let mut cfg = Config::default();
        cfg.layout.default_grid = LayoutKind::TabsLayout;
        cfg.grid.panel_width = 30;
        let issues = cfg.validate();
        assert!(issues.iter().any(|i| i.contains("layout.default_grid")));
        assert!(issues.iter().any(|i| i.contains("grid.panel_width")));
    }

    #[test]
    fn save_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.history.limit = 7;
        cfg.layout.default_grid = LayoutKind::AutoGridLayout;
        cfg.save(&path).unwrap();
        assert_eq!(cfg, Config::read(&path).unwrap());
    }

    #[test]
    fn tree_settings_follow_config() {
        let mut cfg = Config::default();
        cfg.layout.default_tab_title = "Tab".into();
        cfg.grid.panel_height = 4;
        let settings = cfg.tree_settings();
        assert_eq!("Tab", settings.default_tab_title);
        assert_eq!(4, settings.panel_height);
    }

    #[test]
    fn group_default_grid_becomes_a_grid() {
        let cfg = Config::parse("[layout]\ndefault_grid = \"RowsLayout\"\n").unwrap();
        assert_eq!(LayoutKind::RowsLayout, cfg.layout.default_grid);
        assert_eq!(LayoutKind::GridLayout, cfg.tree_settings().default_grid);

        let cfg = Config::parse("[layout]\ndefault_grid = \"AutoGridLayout\"\n").unwrap();
        assert_eq!(LayoutKind::AutoGridLayout, cfg.tree_settings().default_grid);
    }
}
