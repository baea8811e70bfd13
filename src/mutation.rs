//! JSON command surface over a [`Dashboard`].
//!
//! Every command is checked against the feature and permission gates, then
//! handed to [`MutationHandler`]. Failures never escape as `Err`: they come
//! back as a [`MutationResult`] with `success: false`.

mod handlers;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

pub use self::handlers::MutationHandler;
use crate::dashboard::{Dashboard, DashboardEvent};
use crate::error::LayoutError;
use crate::layout::element::GridPlacement;
use crate::layout::grid::AutoGridOptionsPatch;
use crate::layout::registry::{GroupKind, LayoutKind};
use crate::layout::save_model::{RepeatOptions, RowEntry, TabEntry};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationCommand {
    UpdateLayout(UpdateLayoutPayload),
    AddRow(AddRowPayload),
    AddTab(AddTabPayload),
    RemoveRow(RemoveItemPayload),
    RemoveTab(RemoveItemPayload),
    UpdateRow(UpdateRowPayload),
    UpdateTab(UpdateTabPayload),
    MoveRow(MoveItemPayload),
    MoveTab(MoveItemPayload),
    MovePanel(MovePanelPayload),
    GetLayout(GetLayoutPayload),
}

impl MutationCommand {
    pub fn is_read_only(&self) -> bool { matches!(self, MutationCommand::GetLayout(_)) }

    pub fn name(&self) -> &'static str {
        match self {
            MutationCommand::UpdateLayout(_) => "UPDATE_LAYOUT",
            MutationCommand::AddRow(_) => "ADD_ROW",
            MutationCommand::AddTab(_) => "ADD_TAB",
            MutationCommand::RemoveRow(_) => "REMOVE_ROW",
            MutationCommand::RemoveTab(_) => "REMOVE_TAB",
            MutationCommand::UpdateRow(_) => "UPDATE_ROW",
            MutationCommand::UpdateTab(_) => "UPDATE_TAB",
            MutationCommand::MoveRow(_) => "MOVE_ROW",
            MutationCommand::MoveTab(_) => "MOVE_TAB",
            MutationCommand::MovePanel(_) => "MOVE_PANEL",
            MutationCommand::GetLayout(_) => "GET_LAYOUT",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateLayoutPayload {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_type: Option<LayoutKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<AutoGridOptionsPatch>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddRowPayload {
    pub row: RowEntry,
    pub parent_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddTabPayload {
    pub tab: TabEntry,
    pub parent_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RemoveItemPayload {
    pub path: String,
    /// Where the removed item's panels go instead of being deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_content_to: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateRowPayload {
    pub path: String,
    pub spec: RowUpdate,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RowUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapse: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_header: Option<bool>,
    /// An empty `value` clears the binding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<RepeatOptions>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateTabPayload {
    pub path: String,
    pub spec: TabUpdate,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TabUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<RepeatOptions>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MoveItemPayload {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_position: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_parent: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MovePanelPayload {
    pub element: PanelReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<PanelPosition>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PanelReference {
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PanelPosition {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl From<PanelPosition> for GridPlacement {
    fn from(p: PanelPosition) -> Self { GridPlacement::at(p.x, p.y, p.width, p.height) }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetLayoutPayload {}

/// One observable difference made by a command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub path: String,
    pub previous_value: Value,
    pub new_value: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default)]
    pub changes: Vec<Change>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MutationResult {
    pub fn failure(error: impl Into<String>) -> Self {
        MutationResult { success: false, error: Some(error.into()), ..Default::default() }
    }
}

/// What a successful handler reports back.
#[derive(Debug, Default)]
pub(crate) struct Outcome {
    pub data: Value,
    pub changes: Vec<Change>,
    pub warnings: Vec<String>,
}

impl Outcome {
    pub(crate) fn data(data: Value) -> Self { Outcome { data, ..Default::default() } }

    pub(crate) fn change(mut self, path: impl Into<String>, previous_value: Value, new_value: Value) -> Self {
        self.changes.push(Change { path: path.into(), previous_value, new_value });
        self
    }

    pub(crate) fn warn(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

impl From<Outcome> for MutationResult {
    fn from(outcome: Outcome) -> Self {
        MutationResult {
            success: true,
            data: Some(outcome.data),
            changes: outcome.changes,
            warnings: outcome.warnings,
            error: None,
        }
    }
}

impl Dashboard {
    /// Runs one mutation command.
    pub fn execute(&mut self, command: MutationCommand) -> MutationResult {
        let name = command.name();
        if !self.new_layouts_enabled() {
            return MutationResult::failure(format!(
                "{name} requires the dashboardNewLayouts feature toggle"
            ));
        }
        if !command.is_read_only() && !self.is_editable() {
            return MutationResult::failure("Cannot modify dashboard: insufficient permissions");
        }
        debug!(command = name, "executing mutation");
        let result: Result<Outcome, LayoutError> = match command {
            MutationCommand::UpdateLayout(payload) => MutationHandler::handle_update_layout(self, payload),
            MutationCommand::AddRow(payload) => MutationHandler::handle_add_row(self, payload),
            MutationCommand::AddTab(payload) => MutationHandler::handle_add_tab(self, payload),
            MutationCommand::RemoveRow(payload) => {
                MutationHandler::handle_remove_item(self, GroupKind::Rows, payload)
            }
            MutationCommand::RemoveTab(payload) => {
                MutationHandler::handle_remove_item(self, GroupKind::Tabs, payload)
            }
            MutationCommand::UpdateRow(payload) => MutationHandler::handle_update_row(self, payload),
            MutationCommand::UpdateTab(payload) => MutationHandler::handle_update_tab(self, payload),
            MutationCommand::MoveRow(payload) => {
                MutationHandler::handle_move_item(self, GroupKind::Rows, payload)
            }
            MutationCommand::MoveTab(payload) => {
                MutationHandler::handle_move_item(self, GroupKind::Tabs, payload)
            }
            MutationCommand::MovePanel(payload) => MutationHandler::handle_move_panel(self, payload),
            MutationCommand::GetLayout(_) => MutationHandler::handle_get_layout(self),
        };
        match result {
            Ok(outcome) => {
                for message in &outcome.warnings {
                    self.publish(DashboardEvent::Warning { message: message.clone() });
                }
                outcome.into()
            }
            Err(err) => {
                warn!(command = name, %err, "mutation failed");
                MutationResult::failure(err.to_string())
            }
        }
    }

    /// Parses `json` as a command and runs it. Malformed input is reported as
    /// a failed result.
    pub fn execute_json(&mut self, json: Value) -> MutationResult {
        match serde_json::from_value::<MutationCommand>(json) {
            Ok(command) => self.execute(command),
            Err(err) => MutationResult::failure(format!("invalid command: {err}")),
        }
    }
}
