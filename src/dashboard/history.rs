//! Undoable edits as plain command values.
//!
//! A [`Command`] only refers to nodes by id, so the whole history can be
//! written out with ron and read back against the same tree. Nodes a command
//! takes out of the tree are parked, never freed, until no history entry can
//! bring them back.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::common::collections::VecDeque;
use crate::layout::LayoutTree;
use crate::layout::element::Element;
use crate::model::tree::NodeId;

/// A position under a parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub parent: NodeId,
    pub index: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Attach a detached `child` under `parent` at `index`.
    Insert { parent: NodeId, child: NodeId, index: usize },
    /// Park `child`, which sits under `parent` at `index`.
    Remove { parent: NodeId, child: NodeId, index: usize },
    /// Move an attached node between slots.
    Move { child: NodeId, from: Slot, to: Slot },
    /// Swap the single layout held by `owner`. `origin` is where `new` came
    /// from, if it was attached somewhere before.
    ReplaceLayout { owner: NodeId, old: NodeId, new: NodeId, origin: Option<Slot> },
    /// Replace a node's payload.
    SetElement { node: NodeId, before: Element, after: Element },
    Batch(Vec<Command>),
}

impl Command {
    pub fn apply(&self, tree: &mut LayoutTree) {
        match self {
            Command::Insert { parent, child, index } => tree.attach(*child, *parent, *index),
            Command::Remove { child, .. } => tree.park(*child),
            Command::Move { child, to, .. } => tree.attach(*child, to.parent, to.index),
            Command::ReplaceLayout { owner, old, new, .. } => {
                tree.park(*old);
                tree.attach(*new, *owner, 0);
            }
            Command::SetElement { node, after, .. } => tree.set_element(*node, after.clone()),
            Command::Batch(commands) => {
                for command in commands {
                    command.apply(tree);
                }
            }
        }
    }

    pub fn revert(&self, tree: &mut LayoutTree) {
        match self {
            Command::Insert { child, .. } => tree.park(*child),
            Command::Remove { parent, child, index } => tree.attach(*child, *parent, *index),
            Command::Move { child, from, .. } => tree.attach(*child, from.parent, from.index),
            Command::ReplaceLayout { owner, old, new, origin } => {
                match origin {
                    Some(slot) => tree.attach(*new, slot.parent, slot.index),
                    None => tree.park(*new),
                }
                tree.attach(*old, *owner, 0);
            }
            Command::SetElement { node, before, .. } => tree.set_element(*node, before.clone()),
            Command::Batch(commands) => {
                for command in commands.iter().rev() {
                    command.revert(tree);
                }
            }
        }
    }

    /// Nodes this command leaves detached when it is `applied` (or reverted).
    /// They are only candidates: a later step of a batch may have put one back.
    pub fn parked(&self, applied: bool) -> Vec<NodeId> {
        match self {
            Command::Insert { child, .. } if !applied => vec![*child],
            Command::Remove { child, .. } if applied => vec![*child],
            Command::ReplaceLayout { old, .. } if applied => vec![*old],
            Command::ReplaceLayout { new, origin: None, .. } if !applied => vec![*new],
            Command::Batch(commands) => commands.iter().flat_map(|c| c.parked(applied)).collect(),
            _ => vec![],
        }
    }

    pub fn is_empty(&self) -> bool { matches!(self, Command::Batch(commands) if commands.is_empty()) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditKind {
    AddElement,
    RemoveElement,
    Edit,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EditAction {
    pub kind: EditKind,
    /// The node the edit was requested on.
    pub source: NodeId,
    pub description: String,
    pub command: Command,
}

impl EditAction {
    pub fn new(kind: EditKind, source: NodeId, description: impl Into<String>, command: Command) -> Self {
        EditAction { kind, source, description: description.into(), command }
    }
}

/// Applies edits and decides whether they can be taken back.
pub trait ActionTracker {
    fn record(&mut self, tree: &mut LayoutTree, action: EditAction);

    fn add_element(&mut self, tree: &mut LayoutTree, action: EditAction) {
        self.record(tree, EditAction { kind: EditKind::AddElement, ..action })
    }

    fn remove_element(&mut self, tree: &mut LayoutTree, action: EditAction) {
        self.record(tree, EditAction { kind: EditKind::RemoveElement, ..action })
    }

    fn edit(&mut self, tree: &mut LayoutTree, action: EditAction) {
        self.record(tree, EditAction { kind: EditKind::Edit, ..action })
    }
}

/// Applies commands without keeping them.
pub struct Untracked;

impl ActionTracker for Untracked {
    fn record(&mut self, tree: &mut LayoutTree, action: EditAction) {
        trace!(description = %action.description, "applying untracked edit");
        action.command.apply(tree);
        tree.bump_revision();
        release(tree, action.command.parked(true));
    }
}

/// Bounded undo/redo stacks of applied edits.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UndoHistory {
    limit: usize,
    undo: VecDeque<EditAction>,
    redo: Vec<EditAction>,
    /// Edits recorded over the history's lifetime, evicted ones included.
    #[serde(default)]
    recorded: u64,
}

impl UndoHistory {
    pub fn new(limit: usize) -> Self { UndoHistory { limit, ..Default::default() } }

    pub fn limit(&self) -> usize { self.limit }

    pub fn can_undo(&self) -> bool { !self.undo.is_empty() }

    pub fn can_redo(&self) -> bool { !self.redo.is_empty() }

    pub fn undo_stack(&self) -> impl Iterator<Item = &EditAction> { self.undo.iter() }

    /// Reverts the most recent edit. Returns false if there was none.
    pub fn undo(&mut self, tree: &mut LayoutTree) -> bool {
        let Some(action) = self.undo.pop_back() else { return false };
        debug!(description = %action.description, "undo");
        action.command.revert(tree);
        tree.bump_revision();
        self.redo.push(action);
        true
    }

    pub fn redo(&mut self, tree: &mut LayoutTree) -> bool {
        let Some(action) = self.redo.pop() else { return false };
        debug!(description = %action.description, "redo");
        action.command.apply(tree);
        tree.bump_revision();
        self.undo.push_back(action);
        true
    }

    pub fn recorded(&self) -> u64 { self.recorded }

    /// Folds the newest `count` entries into one batch so a single undo takes
    /// them all back.
    pub fn squash(&mut self, count: usize, description: impl Into<String>) {
        let count = count.min(self.undo.len());
        if count < 2 {
            return;
        }
        let entries: Vec<EditAction> = self.undo.drain(self.undo.len() - count..).collect();
        let (Some(first), Some(last)) = (entries.first(), entries.last()) else { return };
        let (source, kind) = (first.source, last.kind);
        let command = Command::Batch(entries.into_iter().map(|action| action.command).collect());
        self.undo.push_back(EditAction::new(kind, source, description, command));
    }

    /// Frees everything the history still holds on to.
    pub fn clear(&mut self, tree: &mut LayoutTree) {
        for action in self.redo.drain(..) {
            release(tree, action.command.parked(false));
        }
        for action in self.undo.drain(..) {
            release(tree, action.command.parked(true));
        }
    }
}

impl ActionTracker for UndoHistory {
    fn record(&mut self, tree: &mut LayoutTree, action: EditAction) {
        debug!(kind = ?action.kind, description = %action.description, "recording edit");
        action.command.apply(tree);
        tree.bump_revision();
        self.recorded += 1;
        for dropped in self.redo.drain(..) {
            release(tree, dropped.command.parked(false));
        }
        self.undo.push_back(action);
        while self.undo.len() > self.limit {
            let Some(evicted) = self.undo.pop_front() else { break };
            trace!(description = %evicted.description, "evicting history entry");
            release(tree, evicted.command.parked(true));
        }
    }
}

/// Frees the candidates that are still detached roots.
fn release(tree: &mut LayoutTree, nodes: Vec<NodeId>) {
    for node in nodes {
        if tree.contains(node) && tree.parent(node).is_none() {
            tree.free(node);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::layout::LayoutKind;
    use crate::layout::element::RowItem;

    fn row(tree: &mut LayoutTree, title: &str) -> NodeId {
        let inner = tree.new_empty_layout(LayoutKind::GridLayout);
        tree.new_item(Element::Row(RowItem::titled(title)), inner)
    }

    fn rows_body(tree: &mut LayoutTree) -> NodeId {
        let rows = tree.new_empty_layout(LayoutKind::RowsLayout);
        let first = row(tree, "first");
        tree.append(first, rows);
        let old = tree.body();
        let root = tree.root();
        Command::ReplaceLayout { owner: root, old, new: rows, origin: None }.apply(tree);
        tree.free(old);
        rows
    }

    #[test]
    fn insert_undo_redo_keeps_identity() {
        let mut tree = LayoutTree::default();
        let rows = rows_body(&mut tree);
        let mut history = UndoHistory::new(10);
        let second = row(&mut tree, "second");
        history.add_element(
            &mut tree,
            EditAction::new(EditKind::Edit, rows, "add row", Command::Insert { parent: rows, child: second, index: 1 }),
        );
        assert_eq!(EditKind::AddElement, history.undo_stack().next().unwrap().kind);
        assert_eq!(Some(1), second.index_in_parent(tree.map()));

        assert!(history.undo(&mut tree));
        assert!(!tree.is_attached(second));
        assert!(tree.contains(second));

        assert!(history.redo(&mut tree));
        assert!(tree.is_attached(second));
        assert_eq!(Some("second"), tree.title(second));
        assert!(!history.redo(&mut tree));
    }

    #[test]
    fn new_edit_frees_redo_nodes() {
        let mut tree = LayoutTree::default();
        let rows = rows_body(&mut tree);
        let mut history = UndoHistory::new(10);
        let second = row(&mut tree, "second");
        history.record(
            &mut tree,
            EditAction::new(EditKind::AddElement, rows, "add", Command::Insert { parent: rows, child: second, index: 1 }),
        );
        history.undo(&mut tree);
        let third = row(&mut tree, "third");
        history.record(
            &mut tree,
            EditAction::new(EditKind::AddElement, rows, "add", Command::Insert { parent: rows, child: third, index: 1 }),
        );
        assert!(!tree.contains(second));
        assert!(!history.can_redo());
    }

    #[test]
    fn eviction_frees_removed_nodes() {
        let mut tree = LayoutTree::default();
        let rows = rows_body(&mut tree);
        let mut history = UndoHistory::new(1);
        let second = row(&mut tree, "second");
        history.record(
            &mut tree,
            EditAction::new(EditKind::AddElement, rows, "add", Command::Insert { parent: rows, child: second, index: 1 }),
        );
        history.record(
            &mut tree,
            EditAction::new(EditKind::RemoveElement, rows, "remove", Command::Remove { parent: rows, child: second, index: 1 }),
        );
        assert!(tree.contains(second));
        let first = tree.children(rows)[0];
        history.record(
            &mut tree,
            EditAction::new(
                EditKind::Edit,
                first,
                "rename",
                Command::SetElement {
                    node: first,
                    before: Element::Row(RowItem::titled("first")),
                    after: Element::Row(RowItem::titled("renamed")),
                },
            ),
        );
        assert!(!tree.contains(second));
        assert_eq!(Some("renamed"), tree.title(first));
        history.undo(&mut tree);
        assert_eq!(Some("first"), tree.title(first));
    }

    #[test]
    fn replace_layout_with_origin_restores_both_positions() {
        let mut tree = LayoutTree::default();
        let rows = rows_body(&mut tree);
        let only = tree.children(rows)[0];
        let inner = tree.inner_layout(only).unwrap();
        let root = tree.root();
        let command = Command::ReplaceLayout {
            owner: root,
            old: rows,
            new: inner,
            origin: Some(Slot { parent: only, index: 0 }),
        };
        command.apply(&mut tree);
        assert_eq!(inner, tree.body());
        assert!(!tree.is_attached(rows));

        command.revert(&mut tree);
        assert_eq!(rows, tree.body());
        assert_eq!(Ok(inner), tree.inner_layout(only));
        assert!(command.parked(false).is_empty());
    }

    #[test]
    fn untracked_frees_immediately() {
        let mut tree = LayoutTree::default();
        let rows = rows_body(&mut tree);
        let second = row(&mut tree, "second");
        tree.append(second, rows);
        let before = tree.revision();
        Untracked.remove_element(
            &mut tree,
            EditAction::new(EditKind::RemoveElement, rows, "remove", Command::Remove { parent: rows, child: second, index: 1 }),
        );
        assert!(!tree.contains(second));
        assert_eq!(before + 1, tree.revision());
    }

    #[test]
    fn squashed_entries_undo_together() {
        let mut tree = LayoutTree::default();
        let rows = rows_body(&mut tree);
        let mut history = UndoHistory::new(10);
        let first = tree.children(rows)[0];
        let second = row(&mut tree, "second");
        history.record(
            &mut tree,
            EditAction::new(EditKind::AddElement, rows, "add", Command::Insert { parent: rows, child: second, index: 1 }),
        );
        history.record(
            &mut tree,
            EditAction::new(EditKind::RemoveElement, rows, "remove", Command::Remove { parent: rows, child: first, index: 0 }),
        );
        assert_eq!(2, history.recorded());
        history.squash(2, "swap rows");
        assert_eq!(1, history.undo_stack().count());
        assert_eq!(vec![second], tree.children(rows));

        assert!(history.undo(&mut tree));
        assert_eq!(vec![first], tree.children(rows));
        assert!(!history.can_undo());
        assert!(history.redo(&mut tree));
        assert_eq!(vec![second], tree.children(rows));
    }

    #[test]
    fn history_round_trips_through_ron() {
        let mut tree = LayoutTree::default();
        let rows = rows_body(&mut tree);
        let mut history = UndoHistory::new(5);
        let second = row(&mut tree, "second");
        history.record(
            &mut tree,
            EditAction::new(EditKind::AddElement, rows, "add", Command::Insert { parent: rows, child: second, index: 1 }),
        );
        let text = ron::ser::to_string(&history).unwrap();
        let mut restored: UndoHistory = ron::de::from_str(&text).unwrap();
        assert_eq!(5, restored.limit());
        assert!(restored.undo(&mut tree));
        assert!(!tree.is_attached(second));
    }
}
