use serde_json::{Map, Value, json};
use tracing::{debug, info};

use super::{
    AddRowPayload, AddTabPayload, MoveItemPayload, MovePanelPayload, Outcome, RemoveItemPayload,
    UpdateLayoutPayload, UpdateRowPayload, UpdateTabPayload,
};
use crate::common::collections::BTreeMap;
use crate::dashboard::Dashboard;
use crate::error::LayoutError;
use crate::layout::element::Element;
use crate::layout::grid::AutoGridOptions;
use crate::layout::manager::{LayoutBehavior, LayoutManager};
use crate::layout::save_model::{LayoutSpec, RowEntry, TabEntry};
use crate::layout::{GroupKind, LayoutKind, LayoutPath, LayoutTree};
use crate::model::tree::NodeId;

pub struct MutationHandler;

impl MutationHandler {
    pub fn handle_update_layout(
        dashboard: &mut Dashboard,
        payload: UpdateLayoutPayload,
    ) -> Result<Outcome, LayoutError> {
        let path: LayoutPath = payload.path.parse()?;
        let layout = dashboard.tree().resolve(&path)?;
        let current = dashboard.tree().kind_of(layout)?;
        let target = payload.layout_type.unwrap_or(current);
        if payload.options.is_some() && target != LayoutKind::AutoGridLayout {
            return Err(LayoutError::OptionsOnlyForAutoGrid(target));
        }
        let path = path.to_string();
        let outcome = Outcome::data(json!({"path": path, "layoutType": target}));

        if target == current {
            let Some(patch) = payload.options else {
                return Ok(outcome);
            };
            let patched = auto_grid_options(dashboard.tree(), layout)?.apply_patch(&patch)?;
            let options = patched.options;
            dashboard.update_element(layout, move |element| {
                if let Element::Layout(LayoutManager::AutoGrid(auto)) = element {
                    auto.options = options;
                }
            })?;
            info!(%path, "updated auto grid options");
            return Ok(outcome.change(path, Value::Object(patched.previous), Value::Object(patched.updated)));
        }

        let owner = dashboard.tree().owner_of(layout)?;
        let new = dashboard.convert_layout(layout, target)?;
        let mut outcome = outcome.change(path.clone(), json!(current), json!(target));
        if let Some(patch) = payload.options {
            let patched = match auto_grid_options(dashboard.tree(), new).and_then(|o| o.apply_patch(&patch)) {
                Ok(patched) => patched,
                Err(err) => {
                    dashboard.tree.free(new);
                    return Err(err);
                }
            };
            if let Ok(LayoutManager::AutoGrid(auto)) = dashboard.tree.layout_mut(new) {
                auto.options = patched.options;
            }
            outcome = outcome.change(path.clone(), Value::Object(patched.previous), Value::Object(patched.updated));
        }
        dashboard.switch_layout(owner, new, false)?;
        info!(%path, %current, %target, "changed layout type");
        Ok(outcome.warn(format!(
            "layout at {path} changed from {current} to {target}; paths below it may no longer be valid"
        )))
    }

    pub fn handle_add_row(dashboard: &mut Dashboard, payload: AddRowPayload) -> Result<Outcome, LayoutError> {
        let RowEntry::RowsLayoutRow(spec) = payload.row;
        let (item, layout) = spec.into_item(&dashboard.tree().settings().default_row_title);
        add_group_item(dashboard, GroupKind::Rows, item, layout, &payload.parent_path, payload.position)
    }

    pub fn handle_add_tab(dashboard: &mut Dashboard, payload: AddTabPayload) -> Result<Outcome, LayoutError> {
        let TabEntry::TabsLayoutTab(spec) = payload.tab;
        let (item, layout) = spec.into_item(&dashboard.tree().settings().default_tab_title);
        add_group_item(dashboard, GroupKind::Tabs, item, layout, &payload.parent_path, payload.position)
    }

    pub fn handle_remove_item(
        dashboard: &mut Dashboard,
        group: GroupKind,
        payload: RemoveItemPayload,
    ) -> Result<Outcome, LayoutError> {
        let (path, item) = resolve_item(dashboard.tree(), &payload.path, group)?;
        let title = dashboard.tree().title(item).unwrap_or_default().to_owned();
        let target = match &payload.move_content_to {
            Some(raw) => {
                let target_path: LayoutPath = raw.parse()?;
                if target_path == path {
                    return Err(LayoutError::SamePath(raw.clone()));
                }
                let target = first_grid(dashboard.tree(), dashboard.tree().resolve(&target_path)?)?;
                if dashboard.tree().is_descendant(target, item) {
                    return Err(LayoutError::SamePath(raw.clone()));
                }
                Some(target)
            }
            None => None,
        };
        let description = format!("remove {} {path}", group.item_name());
        dashboard.as_one_edit(&description, |dashboard| {
            if let Some(target) = target {
                let panels = dashboard.tree().viz_panels(dashboard.tree().inner_layout(item)?);
                dashboard.move_panels(&panels, target)?;
                debug!(from = %path, ?target, count = panels.len(), "moved content before removal");
            }
            match group {
                GroupKind::Rows => dashboard.remove_row(item, false),
                GroupKind::Tabs => dashboard.remove_tab(item, false),
            }
        })?;
        let path = path.to_string();
        Ok(Outcome::data(json!({"path": path})).change(path, json!({"title": title}), Value::Null))
    }

    pub fn handle_update_row(
        dashboard: &mut Dashboard,
        payload: UpdateRowPayload,
    ) -> Result<Outcome, LayoutError> {
        let (path, item) = resolve_item(dashboard.tree(), &payload.path, GroupKind::Rows)?;
        let Some(Element::Row(before)) = dashboard.tree().element(item).cloned() else {
            return Err(LayoutError::NotAnItem(item));
        };
        let spec = payload.spec;
        let edit = spec.clone();
        dashboard.update_row(item, move |row| {
            if let Some(title) = edit.title {
                row.title = title;
            }
            if let Some(collapse) = edit.collapse {
                row.collapse = collapse;
            }
            if let Some(hide_header) = edit.hide_header {
                row.hide_header = hide_header;
            }
            if let Some(repeat) = edit.repeat {
                row.repeat_by_variable = repeat.binding();
            }
        })?;
        let Some(Element::Row(after)) = dashboard.tree().element(item) else {
            return Err(LayoutError::NotAnItem(item));
        };

        let mut diff = FieldDiff::default();
        if spec.title.is_some() {
            diff.record("title", json!(before.title), json!(after.title));
        }
        if spec.collapse.is_some() {
            diff.record("collapse", json!(before.collapse), json!(after.collapse));
        }
        if spec.hide_header.is_some() {
            diff.record("hideHeader", json!(before.hide_header), json!(after.hide_header));
        }
        if spec.repeat.is_some() {
            diff.record("repeat", json!(before.repeat_by_variable), json!(after.repeat_by_variable));
        }
        Ok(diff.into_outcome(path.to_string()))
    }

    pub fn handle_update_tab(
        dashboard: &mut Dashboard,
        payload: UpdateTabPayload,
    ) -> Result<Outcome, LayoutError> {
        let (path, item) = resolve_item(dashboard.tree(), &payload.path, GroupKind::Tabs)?;
        let Some(Element::Tab(before)) = dashboard.tree().element(item).cloned() else {
            return Err(LayoutError::NotAnItem(item));
        };
        let spec = payload.spec;
        let edit = spec.clone();
        dashboard.update_tab(item, move |tab| {
            if let Some(title) = edit.title {
                tab.title = title;
            }
            if let Some(repeat) = edit.repeat {
                tab.repeat_by_variable = repeat.binding();
            }
        })?;
        let Some(Element::Tab(after)) = dashboard.tree().element(item) else {
            return Err(LayoutError::NotAnItem(item));
        };

        let mut diff = FieldDiff::default();
        if spec.title.is_some() {
            diff.record("title", json!(before.title), json!(after.title));
        }
        if spec.repeat.is_some() {
            diff.record("repeat", json!(before.repeat_by_variable), json!(after.repeat_by_variable));
        }
        Ok(diff.into_outcome(path.to_string()))
    }

    pub fn handle_move_item(
        dashboard: &mut Dashboard,
        group: GroupKind,
        payload: MoveItemPayload,
    ) -> Result<Outcome, LayoutError> {
        let (path, item) = resolve_item(dashboard.tree(), &payload.path, group)?;
        match &payload.to_parent {
            None => {
                let manager = dashboard.tree().manager_of(item)?;
                let from = item.index_in_parent(dashboard.tree().map()).unwrap_or(0);
                let to = payload.to_position.unwrap_or(usize::MAX);
                match group {
                    GroupKind::Rows => dashboard.move_row(manager, from, to)?,
                    GroupKind::Tabs => dashboard.move_tab(manager, from, to)?,
                }
            }
            Some(raw) => {
                let target = dashboard.tree().resolve(&raw.parse()?)?;
                dashboard.move_item_to(item, target, payload.to_position)?;
            }
        }
        let moved_to = dashboard.tree().path_of(item)?.to_string();
        let path = path.to_string();
        Ok(Outcome::data(json!({"path": moved_to})).change(path.clone(), json!(path), json!(moved_to)))
    }

    pub fn handle_move_panel(
        dashboard: &mut Dashboard,
        payload: MovePanelPayload,
    ) -> Result<Outcome, LayoutError> {
        let name = payload.element.name;
        let tree = dashboard.tree();
        let panel = tree.find_panel(&name).ok_or_else(|| LayoutError::PanelNotFound(name.clone()))?;
        let before = json!({
            "parent": tree.path_of(panel)?.to_string(),
            "position": tree.panel(panel).map(|p| p.placement),
        });

        let parent = match &payload.to_parent {
            Some(raw) => {
                let layout = dashboard.tree().resolve(&raw.parse()?)?;
                dashboard.move_panels(&[panel], layout)?;
                raw.clone()
            }
            None => "current".to_owned(),
        };
        if let Some(position) = payload.position {
            dashboard.reposition_panel(panel, position.into())?;
        }

        let outcome = Outcome::data(json!({"element": name, "parent": parent}));
        if payload.to_parent.is_none() && payload.position.is_none() {
            return Ok(outcome);
        }
        let tree = dashboard.tree();
        let after = json!({
            "parent": tree.path_of(panel)?.to_string(),
            "position": tree.panel(panel).map(|p| p.placement),
        });
        Ok(outcome.change(format!("/elements/{name}"), before, after))
    }

    pub fn handle_get_layout(dashboard: &mut Dashboard) -> Result<Outcome, LayoutError> {
        let tree = dashboard.tree();
        let body = tree.body();
        let mut layout = json!(tree.serialize(body)?);
        annotate_paths(&mut layout, &LayoutPath::root());
        let elements = json!(tree.element_specs(body));
        Ok(Outcome::data(json!({"layout": layout, "elements": elements})))
    }
}

/// Adds an item to the group layout at `parent_path`, or wraps any other
/// layout there in a new group holding just this item.
fn add_group_item(
    dashboard: &mut Dashboard,
    group: GroupKind,
    item: Element,
    layout: Option<LayoutSpec>,
    parent_path: &str,
    position: Option<usize>,
) -> Result<Outcome, LayoutError> {
    let parent: LayoutPath = parent_path.parse()?;
    let target = dashboard.tree().resolve(&parent)?;
    let kind = dashboard.tree().kind_of(target)?;

    let (node, warning) = if kind == group.kind() {
        let inner = layout.map(|spec| dashboard.tree.item_layout_from_save_model(Some(&spec), &BTreeMap::default()));
        match dashboard.add_item(target, Some(item), inner, position) {
            Ok(node) => (node, None),
            Err(err) => {
                if let Some(inner) = inner {
                    dashboard.tree.free(inner);
                }
                return Err(err);
            }
        }
    } else {
        let node = dashboard.wrap_in_group(target, group, Some(item))?;
        let mut warning = format!("{kind} at {parent} was wrapped in a new {}; paths below it changed", group.kind());
        if layout.is_some() {
            warning.push_str(&format!("; the new {} keeps the existing content", group.item_name()));
        }
        (node, Some(warning))
    };

    let path = dashboard.tree().path_of(node)?.to_string();
    let title = dashboard.tree().title(node).unwrap_or_default().to_owned();
    let outcome = Outcome::data(json!({"path": path})).change(path, Value::Null, json!({"title": title}));
    Ok(match warning {
        Some(warning) => outcome.warn(warning),
        None => outcome,
    })
}

fn resolve_item(tree: &LayoutTree, raw: &str, group: GroupKind) -> Result<(LayoutPath, NodeId), LayoutError> {
    let path: LayoutPath = raw.parse()?;
    match path.segments().last() {
        Some(segment) if segment.group == group => {
            let item = tree.resolve_item(&path)?;
            Ok((path, item))
        }
        _ => Err(LayoutError::invalid_path(raw, format!("expected a path ending in a {group} segment"))),
    }
}

/// The grid that receives moved content: `layout` itself, or the layout of
/// the first row or tab, recursively.
fn first_grid(tree: &LayoutTree, mut layout: NodeId) -> Result<NodeId, LayoutError> {
    loop {
        let kind = tree.kind_of(layout)?;
        if kind.is_grid() {
            return Ok(layout);
        }
        let first = layout.first_child(tree.map()).ok_or_else(|| LayoutError::EmptyGroup {
            path: tree.path_of(layout).map(|p| p.to_string()).unwrap_or_default(),
            kind,
        })?;
        layout = tree.inner_layout(first)?;
    }
}

fn auto_grid_options(tree: &LayoutTree, layout: NodeId) -> Result<AutoGridOptions, LayoutError> {
    match tree.layout(layout)? {
        LayoutManager::AutoGrid(auto) => Ok(auto.options.clone()),
        other => Err(LayoutError::OptionsOnlyForAutoGrid(other.kind())),
    }
}

/// Adds a `path` field to every row and tab of a serialized layout.
fn annotate_paths(layout: &mut Value, base: &LayoutPath) {
    let (group, key) = match layout.get("kind").and_then(Value::as_str) {
        Some("RowsLayout") => (GroupKind::Rows, "rows"),
        Some("TabsLayout") => (GroupKind::Tabs, "tabs"),
        _ => return,
    };
    let Some(items) = layout.pointer_mut(&format!("/spec/{key}")).and_then(Value::as_array_mut) else {
        return;
    };
    for (index, item) in items.iter_mut().enumerate() {
        let path = base.join(group, index);
        if let Some(inner) = item.pointer_mut("/spec/layout") {
            annotate_paths(inner, &path);
        }
        if let Some(fields) = item.as_object_mut() {
            fields.insert("path".into(), json!(path.to_string()));
        }
    }
}

#[derive(Default)]
struct FieldDiff {
    previous: Map<String, Value>,
    updated: Map<String, Value>,
}

impl FieldDiff {
    fn record(&mut self, key: &str, before: Value, after: Value) {
        self.previous.insert(key.to_owned(), before);
        self.updated.insert(key.to_owned(), after);
    }

    fn into_outcome(self, path: String) -> Outcome {
        let outcome = Outcome::data(json!({"path": path}));
        if self.updated.is_empty() {
            return outcome;
        }
        outcome.change(path, Value::Object(self.previous), Value::Object(self.updated))
    }
}
