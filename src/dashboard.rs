//! The owner of a layout tree: edits go through here so they are tracked for
//! undo and announced on the event bus.

pub mod events;
pub mod history;

use crossbeam_channel::Receiver;
use tracing::{debug, info};

pub use self::events::{DashboardEvent, EventBus};
pub use self::history::{ActionTracker, Command, EditAction, EditKind, Slot, UndoHistory, Untracked};
use crate::common::collections::HashMap;
use crate::common::config::{Config, FeatureSettings};
use crate::error::LayoutError;
use crate::layout::element::{Element, GridPlacement, Panel};
use crate::layout::legacy::LegacyPanel;
use crate::layout::save_model::DashboardSpec;
use crate::layout::{GroupKind, LayoutKind, LayoutTree, NestingPolicy};
use crate::model::tree::NodeId;

pub struct Dashboard {
    pub(crate) tree: LayoutTree,
    pub(crate) history: UndoHistory,
    pub(crate) events: EventBus,
    nesting: NestingPolicy,
    features: FeatureSettings,
    variables: HashMap<String, String>,
    editable: bool,
}

impl Dashboard {
    pub fn new(config: &Config) -> Self {
        Dashboard {
            tree: LayoutTree::new(config.tree_settings()),
            history: UndoHistory::new(config.history.limit),
            events: EventBus::default(),
            nesting: config.nesting.clone(),
            features: config.features.clone(),
            variables: HashMap::default(),
            editable: true,
        }
    }

    /// Loads a saved dashboard. The load itself is not undoable.
    pub fn from_spec(config: &Config, spec: &DashboardSpec) -> Self {
        let mut dashboard = Self::new(config);
        let body = dashboard.tree.create_from_save_model(&spec.layout, &spec.elements);
        dashboard.install_body(body);
        info!(kind = %spec.layout.kind(), panels = spec.elements.len(), "loaded dashboard");
        dashboard
    }

    /// Loads a v1 panel list as a grid dashboard.
    pub fn from_legacy(config: &Config, panels: &[LegacyPanel]) -> Self {
        let mut dashboard = Self::new(config);
        let body = dashboard.tree.from_legacy_panels(panels);
        dashboard.install_body(body);
        info!(panels = panels.len(), "imported legacy dashboard");
        dashboard
    }

    fn install_body(&mut self, body: NodeId) {
        let old = self.tree.body();
        let root = self.tree.root();
        Command::ReplaceLayout { owner: root, old, new: body, origin: None }.apply(&mut self.tree);
        self.tree.free(old);
    }

    pub fn to_legacy(&self) -> Result<Vec<LegacyPanel>, LayoutError> { self.tree.to_legacy_panels(self.body()) }

    pub fn to_spec(&self) -> Result<DashboardSpec, LayoutError> {
        let body = self.tree.body();
        Ok(DashboardSpec {
            elements: self.tree.element_specs(body),
            layout: self.tree.serialize(body)?,
        })
    }

    pub fn tree(&self) -> &LayoutTree { &self.tree }

    pub fn body(&self) -> NodeId { self.tree.body() }

    /// Edits recorded since this dashboard was built. The node ids in it only
    /// mean something for this tree, so a loaded dashboard starts empty.
    pub fn history(&self) -> &UndoHistory { &self.history }

    pub fn nesting(&self) -> &NestingPolicy { &self.nesting }

    pub fn new_layouts_enabled(&self) -> bool { self.features.dashboard_new_layouts }

    pub fn is_editable(&self) -> bool { self.editable }

    pub fn set_editable(&mut self, editable: bool) { self.editable = editable; }

    pub fn variables(&self) -> &HashMap<String, String> { &self.variables }

    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn subscribe(&mut self) -> Receiver<DashboardEvent> { self.events.subscribe() }

    pub(crate) fn publish(&mut self, event: DashboardEvent) { self.events.publish(event) }

    pub fn undo(&mut self) -> bool { self.history.undo(&mut self.tree) }

    pub fn redo(&mut self) -> bool { self.history.redo(&mut self.tree) }

    /// Runs `edit` so that everything it records is undone in one step.
    pub(crate) fn as_one_edit<T>(
        &mut self,
        description: &str,
        edit: impl FnOnce(&mut Self) -> Result<T, LayoutError>,
    ) -> Result<T, LayoutError> {
        let before = self.history.recorded();
        let result = edit(self);
        let count = usize::try_from(self.history.recorded() - before).unwrap_or(usize::MAX);
        self.history.squash(count, description);
        result
    }

    /// Applies `action` through the history, or straight to the tree when
    /// `skip_undo` is set.
    pub(crate) fn perform(&mut self, action: EditAction, skip_undo: bool) {
        let mut untracked = Untracked;
        let tracker: &mut dyn ActionTracker = if skip_undo { &mut untracked } else { &mut self.history };
        match action.kind {
            EditKind::AddElement => tracker.add_element(&mut self.tree, action),
            EditKind::RemoveElement => tracker.remove_element(&mut self.tree, action),
            EditKind::Edit => tracker.edit(&mut self.tree, action),
        }
    }

    /// Replaces the layout held by `owner` with `new` as one edit. `new` may
    /// be unattached or attached elsewhere; undo puts it back.
    pub fn switch_layout(&mut self, owner: NodeId, new: NodeId, skip_undo: bool) -> Result<(), LayoutError> {
        let old = self.tree.inner_layout(owner)?;
        let to = self.tree.kind_of(new)?;
        let from = self.tree.kind_of(old)?;
        let origin = self.tree.parent(new).map(|parent| Slot {
            parent,
            index: new.index_in_parent(self.tree.map()).unwrap_or(0),
        });
        let command = Command::ReplaceLayout { owner, old, new, origin };
        self.perform(EditAction::new(EditKind::Edit, owner, format!("switch {from} to {to}"), command), skip_undo);
        self.publish(DashboardEvent::LayoutSwitched { owner, from, to });
        Ok(())
    }

    /// Builds an unattached copy of `layout` as `target`, after the category
    /// and nesting checks a type switch requires.
    pub(crate) fn convert_layout(&mut self, layout: NodeId, target: LayoutKind) -> Result<NodeId, LayoutError> {
        let from = self.tree.kind_of(layout)?;
        if from.category() != target.category() {
            return Err(LayoutError::CrossCategory { from, to: target });
        }
        if let Some(group) = target.group() {
            let path = self.tree.path_of(layout)?;
            self.nesting.check_convert(&self.tree, &path, layout, group)?;
        }
        target.descriptor().create_from_layout(&mut self.tree, layout)
    }

    /// Switches `layout` to another kind of the same category. Returns the
    /// layout now in its place.
    pub fn change_layout_kind(&mut self, layout: NodeId, target: LayoutKind) -> Result<NodeId, LayoutError> {
        if self.tree.kind_of(layout)? == target {
            return Ok(layout);
        }
        let owner = self.tree.owner_of(layout)?;
        let new = self.convert_layout(layout, target)?;
        self.switch_layout(owner, new, false)?;
        debug!(?layout, ?new, %target, "changed layout kind");
        Ok(new)
    }

    /// Puts `layout` inside a new one-item group. `item` defaults to an item
    /// with the default title. Returns the new item.
    pub fn wrap_in_group(
        &mut self,
        layout: NodeId,
        group: GroupKind,
        item: Option<Element>,
    ) -> Result<NodeId, LayoutError> {
        let path = self.tree.path_of(layout)?;
        self.nesting.check_wrap(&self.tree, &path, layout, group)?;
        let owner = self.tree.owner_of(layout)?;
        let from = self.tree.kind_of(layout)?;
        let element = match item.as_ref().and_then(|item| group.convert_item(item)) {
            Some(element) => element,
            None => group.new_item(self.tree.settings().default_title(group).to_owned()),
        };
        let wrapper = self.tree.new_empty_layout(group.kind());
        let item = self.tree.create(element);
        self.tree.append(item, wrapper);
        let command = Command::Batch(vec![
            Command::ReplaceLayout { owner, old: layout, new: wrapper, origin: None },
            Command::Insert { parent: item, child: layout, index: 0 },
        ]);
        self.perform(
            EditAction::new(EditKind::Edit, layout, format!("wrap {from} in {}", group.kind()), command),
            false,
        );
        self.publish(DashboardEvent::LayoutSwitched { owner, from, to: group.kind() });
        Ok(item)
    }

    /// Adds a panel where `layout` puts new content.
    pub fn add_panel(&mut self, layout: NodeId, panel: Panel) -> Result<NodeId, LayoutError> {
        let (target, panel) = self.tree.place_new_panel(layout, panel)?;
        let description = format!("add panel {}", panel.name);
        let node = self.tree.create(Element::Panel(panel));
        let index = target.child_count(self.tree.map());
        let command = Command::Insert { parent: target, child: node, index };
        self.perform(EditAction::new(EditKind::AddElement, target, description, command), false);
        self.publish(DashboardEvent::NewObjectAdded { node });
        Ok(node)
    }

    /// Moves `panels` as one edit into the layout that takes new content for
    /// `layout`, which is returned. In a grid they keep their relative
    /// placement below what is already there. Panels already in that layout
    /// stay put.
    pub fn move_panels(&mut self, panels: &[NodeId], layout: NodeId) -> Result<NodeId, LayoutError> {
        let target = self.tree.content_target(layout)?;
        let into_grid = self.tree.kind_of(target)? == LayoutKind::GridLayout;
        let top = panels.iter().filter_map(|&p| self.tree.panel(p)).map(|p| p.placement.y).min();
        let bottom = self.tree.grid_bottom(target);
        let (default_width, default_height) = (self.tree.settings().panel_width, self.tree.settings().panel_height);

        let mut len = target.child_count(self.tree.map());
        let mut moved: Vec<(NodeId, usize)> = Vec::new();
        let mut commands = Vec::new();
        for &node in panels {
            let panel = self.tree.panel(node).ok_or_else(|| LayoutError::PanelNotFound(format!("{node:?}")))?;
            let parent = self.tree.parent(node).ok_or(LayoutError::NoOwner(node))?;
            if parent == target {
                continue;
            }
            if into_grid {
                let p = panel.placement;
                let placement = GridPlacement {
                    x: p.x,
                    y: bottom + p.y.saturating_sub(top.unwrap_or(0)),
                    width: if p.width == 0 { default_width } else { p.width },
                    height: if p.height == 0 { default_height } else { p.height },
                };
                if placement != p {
                    let before = Element::Panel(panel.clone());
                    let after = Element::Panel(Panel { placement, ..panel.clone() });
                    commands.push(Command::SetElement { node, before, after });
                }
            }
            // Earlier moves out of the same parent shift this panel's index.
            let original = node.index_in_parent(self.tree.map()).unwrap_or(0);
            let shifted = moved.iter().filter(|&&(p, i)| p == parent && i < original).count();
            let from = Slot { parent, index: original - shifted };
            commands.push(Command::Move { child: node, from, to: Slot { parent: target, index: len } });
            moved.push((parent, original));
            len += 1;
        }
        if commands.is_empty() {
            return Ok(target);
        }
        let description = format!("move {} panels", moved.len());
        self.perform(EditAction::new(EditKind::Edit, target, description, Command::Batch(commands)), false);
        debug!(?target, count = moved.len(), "moved panels");
        self.publish(DashboardEvent::ObjectsReordered { parent: target });
        Ok(target)
    }

    /// Sets a panel's grid placement as one undoable edit.
    pub fn reposition_panel(&mut self, panel: NodeId, placement: GridPlacement) -> Result<(), LayoutError> {
        if self.tree.panel(panel).is_none() {
            return Err(LayoutError::PanelNotFound(format!("{panel:?}")));
        }
        self.update_element(panel, |element| {
            if let Element::Panel(p) = element {
                p.placement = placement;
            }
        })
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) { self.history.clear(&mut self.tree); }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::layout::tests::{dashboard, panel};

    #[test]
    fn switch_is_undoable_and_keeps_identity() {
        let mut dash = dashboard();
        let body = dash.body();
        dash.add_panel(body, panel("a", 0, 0, 12, 8)).unwrap();
        dash.add_panel(body, panel("b", 0, 0, 12, 8)).unwrap();

        let auto = dash.change_layout_kind(body, LayoutKind::AutoGridLayout).unwrap();
        assert_eq!(auto, dash.body());
        assert!(!dash.tree().is_attached(body));

        assert!(dash.undo());
        assert_eq!(body, dash.body());
        assert_eq!(2, dash.tree().viz_panels(body).len());

        assert!(dash.redo());
        assert_eq!(auto, dash.body());
    }

    #[test]
    fn cross_category_switch_leaves_tree_alone() {
        let mut dash = dashboard();
        let body = dash.body();
        let revision = dash.tree().revision();
        assert_eq!(
            Err(LayoutError::CrossCategory { from: LayoutKind::GridLayout, to: LayoutKind::RowsLayout }),
            dash.change_layout_kind(body, LayoutKind::RowsLayout)
        );
        assert_eq!(body, dash.body());
        assert_eq!(revision, dash.tree().revision());
    }

    #[test]
    fn wrap_then_undo_restores_body() {
        let mut dash = dashboard();
        let events = dash.subscribe();
        let body = dash.body();
        dash.add_panel(body, panel("a", 0, 0, 12, 8)).unwrap();
        let item = dash.wrap_in_group(body, GroupKind::Tabs, None).unwrap();
        assert_eq!(Ok(LayoutKind::TabsLayout), dash.tree().kind_of(dash.body()));
        assert_eq!(Ok(body), dash.tree().inner_layout(item));
        assert_eq!(Some("New tab"), dash.tree().title(item));
        assert!(events.try_iter().any(|e| matches!(
            e,
            DashboardEvent::LayoutSwitched { to: LayoutKind::TabsLayout, .. }
        )));

        assert!(dash.undo());
        assert_eq!(body, dash.body());
        assert_eq!(1, dash.tree().viz_panels(body).len());
    }

    #[test]
    fn moved_panels_stack_below_target_and_undo() {
        let (mut dash, rows) = crate::layout::tests::rows_dashboard(&["one", "two"]);
        let [one, two] = [0, 1].map(|i| dash.tree().inner_layout(dash.tree().children(rows)[i]).unwrap());
        let a = dash.add_panel(one, panel("a", 0, 0, 12, 8)).unwrap();
        let b = dash.add_panel(one, panel("b", 0, 0, 12, 8)).unwrap();
        dash.add_panel(two, panel("c", 0, 0, 24, 4)).unwrap();

        assert_eq!(Ok(two), dash.move_panels(&[a, b], two));
        assert_eq!(0, dash.tree().viz_panels(one).len());
        let placements: Vec<_> = [a, b].iter().map(|&p| dash.tree().panel(p).unwrap().placement).collect();
        assert_eq!(vec![GridPlacement::at(0, 4, 12, 8), GridPlacement::at(0, 12, 12, 8)], placements);

        assert!(dash.undo());
        assert_eq!(vec![a, b], dash.tree().children(one));
        assert_eq!(GridPlacement::at(0, 8, 12, 8), dash.tree().panel(b).unwrap().placement);
    }

    #[test]
    fn spec_round_trip() {
        let mut dash = dashboard();
        let body = dash.body();
        dash.add_panel(body, panel("a", 0, 0, 6, 4)).unwrap();
        dash.wrap_in_group(body, GroupKind::Rows, None).unwrap();
        let spec = dash.to_spec().unwrap();
        let loaded = Dashboard::from_spec(&Config::default(), &spec);
        assert_eq!(spec, loaded.to_spec().unwrap());
    }

    #[test]
    fn loaded_dashboards_start_without_history() {
        let (mut dash, rows) = crate::layout::tests::rows_dashboard(&["one"]);
        dash.add_new_row(rows, None).unwrap();
        assert!(dash.history().can_undo());

        let spec = dash.to_spec().unwrap();
        let mut loaded = Dashboard::from_spec(&Config::default(), &spec);
        assert!(!loaded.history().can_undo());
        assert!(!loaded.undo());
        assert_eq!(spec, loaded.to_spec().unwrap());
    }
}
