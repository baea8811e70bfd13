//! Operations shared by rows and tabs managers.

use tracing::debug;

use crate::common::collections::HashSet;
use crate::dashboard::{Command, Dashboard, DashboardEvent, EditAction, EditKind, Slot};
use crate::error::LayoutError;
use crate::layout::LayoutTree;
use crate::layout::element::Element;
use crate::layout::registry::{GroupKind, LayoutKind};
use crate::model::title::{duplicate_titles, generate_unique_title};
use crate::model::tree::NodeId;

impl LayoutTree {
    /// The group kind of a rows or tabs manager.
    pub fn group_of(&self, manager: NodeId) -> Result<GroupKind, LayoutError> {
        let found = self.kind_of(manager)?;
        found.group().ok_or_else(|| LayoutError::KindMismatchAtPath {
            path: self.path_of(manager).map(|p| p.to_string()).unwrap_or_default(),
            expected: LayoutKind::RowsLayout,
            found,
        })
    }

    /// `manager` must be a manager of exactly `group`.
    pub(crate) fn expect_group(&self, manager: NodeId, group: GroupKind) -> Result<(), LayoutError> {
        let found = self.kind_of(manager)?;
        if found != group.kind() {
            return Err(LayoutError::KindMismatchAtPath {
                path: self.path_of(manager).map(|p| p.to_string()).unwrap_or_default(),
                expected: group.kind(),
                found,
            });
        }
        Ok(())
    }

    /// The manager holding the row or tab `item`.
    pub fn manager_of(&self, item: NodeId) -> Result<NodeId, LayoutError> {
        if !self.element(item).is_some_and(Element::is_item) {
            return Err(LayoutError::NotAnItem(item));
        }
        self.parent(item).ok_or(LayoutError::NoOwner(item))
    }

    pub(crate) fn sibling_titles(&self, manager: NodeId, except: Option<NodeId>) -> HashSet<String> {
        self.children(manager)
            .into_iter()
            .filter(|&item| Some(item) != except)
            .filter_map(|item| self.title(item).map(str::to_owned))
            .collect()
    }

    fn out_of_bounds(&self, manager: NodeId, index: usize) -> LayoutError {
        let kind = self.kind_of(manager).unwrap_or(LayoutKind::RowsLayout);
        let path = match (self.path_of(manager), kind.group()) {
            (Ok(path), Some(group)) => path.join(group, index).to_string(),
            (Ok(path), None) => path.to_string(),
            (Err(_), _) => String::new(),
        };
        LayoutError::OutOfBounds { path, index, len: manager.child_count(self.map()), kind }
    }

    pub(crate) fn item_at(&self, manager: NodeId, index: usize) -> Result<NodeId, LayoutError> {
        manager.child_at(self.map(), index).ok_or_else(|| self.out_of_bounds(manager, index))
    }
}

impl Dashboard {
    /// Adds an item to a rows or tabs manager at `index` (the end by default).
    /// The item is converted to the manager's kind and its title made unique
    /// among its new siblings. `inner` defaults to an empty default grid.
    pub fn add_item(
        &mut self,
        manager: NodeId,
        item: Option<Element>,
        inner: Option<NodeId>,
        index: Option<usize>,
    ) -> Result<NodeId, LayoutError> {
        let group = self.tree.group_of(manager)?;
        let path = self.tree.path_of(manager)?;
        match inner {
            Some(inner) => self.nesting().check_move(&self.tree, &path, inner, group)?,
            None => self.nesting().check_insert(&path, group)?,
        }
        let mut element = match item.as_ref().and_then(|item| group.convert_item(item)) {
            Some(element) => element,
            None => group.new_item(self.tree.settings().default_title(group).to_owned()),
        };
        let title = element.title().unwrap_or_default().to_owned();
        element.set_title(generate_unique_title(&title, &self.tree.sibling_titles(manager, None)));

        let inner = match inner {
            Some(inner) => inner,
            None => self.tree.new_default_grid(),
        };
        let len = manager.child_count(self.tree.map());
        let index = index.unwrap_or(len).min(len);
        let node = self.tree.new_item(element, inner);
        let command = Command::Insert { parent: manager, child: node, index };
        let description = format!("add {}", group.item_name());
        self.perform(EditAction::new(EditKind::AddElement, manager, description, command), false);
        debug!(?manager, ?node, index, "added item");
        self.publish(DashboardEvent::NewObjectAdded { node });
        Ok(node)
    }

    /// Removes a row or tab. Removing the last one ungroups the manager: the
    /// item's inner layout takes the manager's place in its owner.
    pub fn remove_item(&mut self, item: NodeId, skip_undo: bool) -> Result<(), LayoutError> {
        let manager = self.tree.manager_of(item)?;
        let group = self.tree.group_of(manager)?;
        let index = item.index_in_parent(self.tree.map()).unwrap_or(0);
        if manager.child_count(self.tree.map()) > 1 {
            let command = Command::Remove { parent: manager, child: item, index };
            let description = format!("remove {}", group.item_name());
            self.perform(EditAction::new(EditKind::RemoveElement, manager, description, command), skip_undo);
            return Ok(());
        }

        let owner = self.tree.owner_of(manager)?;
        let (new, origin) = match self.tree.inner_layout(item) {
            Ok(inner) => (inner, Some(Slot { parent: item, index: 0 })),
            Err(_) => (self.tree.new_default_grid(), None),
        };
        let to = self.tree.kind_of(new)?;
        let command = Command::ReplaceLayout { owner, old: manager, new, origin };
        let description = format!("remove last {} and ungroup", group.item_name());
        self.perform(EditAction::new(EditKind::RemoveElement, manager, description, command), skip_undo);
        debug!(?manager, ?new, "removed last item, ungrouped");
        self.publish(DashboardEvent::LayoutSwitched { owner, from: group.kind(), to });
        Ok(())
    }

    /// Asks for confirmation before removing an item that still has panels.
    /// Returns true if the item was removed right away.
    pub fn request_remove_item(&mut self, item: NodeId) -> Result<bool, LayoutError> {
        let inner = self.tree.inner_layout(item)?;
        if self.tree.viz_panels(inner).is_empty() {
            self.remove_item(item, false)?;
            return Ok(true);
        }
        let group = self.tree.group_of(self.tree.manager_of(item)?)?;
        let name = group.item_name();
        self.publish(DashboardEvent::ConfirmationRequested {
            title: format!("Delete {name}?"),
            body: format!("Are you sure you want to remove this {name} and all its content?"),
            confirm: "Delete".into(),
            dismiss: "Cancel".into(),
        });
        Ok(false)
    }

    /// Deep copy of `item` with fresh panels, added at the end of its manager.
    pub fn duplicate_item(&mut self, item: NodeId) -> Result<NodeId, LayoutError> {
        let manager = self.tree.manager_of(item)?;
        let source = self.tree.inner_layout(item)?;
        let element = self.tree.element(item).cloned().ok_or(LayoutError::NotAnItem(item))?;
        let inner = self.tree.duplicate(source);
        self.add_item(manager, Some(element), Some(inner), None)
    }

    /// Reorders items within their manager. Not undoable.
    pub fn move_item(&mut self, manager: NodeId, from: usize, to: usize) -> Result<(), LayoutError> {
        self.tree.group_of(manager)?;
        let item = self.tree.item_at(manager, from)?;
        let last = manager.child_count(self.tree.map()) - 1;
        self.tree.attach(item, manager, to.min(last));
        self.tree.bump_revision();
        self.publish(DashboardEvent::ObjectsReordered { parent: manager });
        Ok(())
    }

    /// Moves `item` into another manager of the same kind at `index`. The
    /// title is made unique among the new siblings.
    pub fn move_item_to(
        &mut self,
        item: NodeId,
        target: NodeId,
        index: Option<usize>,
    ) -> Result<(), LayoutError> {
        let manager = self.tree.manager_of(item)?;
        let group = self.tree.group_of(manager)?;
        if manager == target {
            let from = item.index_in_parent(self.tree.map()).unwrap_or(0);
            let to = index.unwrap_or(usize::MAX);
            return self.move_item(manager, from, to);
        }
        self.tree.expect_group(target, group)?;
        if manager.child_count(self.tree.map()) == 1 {
            return Err(LayoutError::LastItem {
                path: self.tree.path_of(manager)?.to_string(),
                kind: group.kind(),
            });
        }
        let target_path = self.tree.path_of(target)?;
        if self.tree.is_descendant(target, item) {
            return Err(LayoutError::invalid_path(
                target_path.to_string(),
                "cannot move an item into its own content",
            ));
        }
        let inner = self.tree.inner_layout(item)?;
        self.nesting().check_move(&self.tree, &target_path, inner, group)?;

        let from = Slot { parent: manager, index: item.index_in_parent(self.tree.map()).unwrap_or(0) };
        let len = target.child_count(self.tree.map());
        let to = Slot { parent: target, index: index.unwrap_or(len).min(len) };
        let mut commands = vec![Command::Move { child: item, from, to }];
        let before = self.tree.element(item).cloned().ok_or(LayoutError::NotAnItem(item))?;
        let title = before.title().unwrap_or_default();
        let unique = generate_unique_title(title, &self.tree.sibling_titles(target, None));
        if unique != title {
            let mut after = before.clone();
            after.set_title(unique);
            commands.push(Command::SetElement { node: item, before, after });
        }
        let description = format!("move {}", group.item_name());
        self.perform(EditAction::new(EditKind::Edit, item, description, Command::Batch(commands)), false);
        self.publish(DashboardEvent::ObjectsReordered { parent: manager });
        self.publish(DashboardEvent::ObjectsReordered { parent: target });
        Ok(())
    }

    /// Edits the payload of a row, tab or manager as one undoable step. A
    /// title change is made unique among the item's siblings.
    pub fn update_element(
        &mut self,
        node: NodeId,
        edit: impl FnOnce(&mut Element),
    ) -> Result<(), LayoutError> {
        let before = self.tree.element(node).cloned().ok_or(LayoutError::NotAnItem(node))?;
        let mut after = before.clone();
        edit(&mut after);
        if after.is_item() && after.title() != before.title() {
            if let Some(manager) = self.tree.parent(node) {
                let title = after.title().unwrap_or_default().to_owned();
                after.set_title(generate_unique_title(&title, &self.tree.sibling_titles(manager, Some(node))));
            }
        }
        if after == before {
            return Ok(());
        }
        let command = Command::SetElement { node, before, after };
        self.perform(EditAction::new(EditKind::Edit, node, "update", command), false);
        Ok(())
    }

    /// Titles shared by more than one item of `manager` once variables are
    /// substituted.
    pub fn duplicate_titles(&self, manager: NodeId) -> Result<HashSet<String>, LayoutError> {
        self.tree.group_of(manager)?;
        let titles: Vec<_> = self
            .tree
            .children(manager)
            .into_iter()
            .filter_map(|item| self.tree.title(item))
            .collect();
        Ok(duplicate_titles(titles, self.variables()))
    }
}
