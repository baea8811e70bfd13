use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;
use tracing::trace;

use crate::common::collections::HashSet;
use crate::error::LayoutError;
use crate::layout::element::{Element, Panel};
use crate::layout::manager::{LayoutBehavior, LayoutManager};
use crate::layout::registry::{GroupKind, LayoutKind};
use crate::model::tree::{self, NodeId, NodeMap, OwnedNode, Tree};

/// Defaults used when the tree has to invent titles, sizes or layouts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeSettings {
    pub default_row_title: String,
    pub default_tab_title: String,
    pub default_grid: LayoutKind,
    pub column_count: u32,
    pub panel_width: u32,
    pub panel_height: u32,
}

impl Default for TreeSettings {
    fn default() -> Self {
        TreeSettings {
            default_row_title: "New row".into(),
            default_tab_title: "New tab".into(),
            default_grid: LayoutKind::GridLayout,
            column_count: crate::layout::grid::GRID_COLUMN_COUNT,
            panel_width: crate::layout::grid::DEFAULT_PANEL_WIDTH,
            panel_height: crate::layout::grid::DEFAULT_PANEL_HEIGHT,
        }
    }
}

impl TreeSettings {
    pub fn default_title(&self, group: GroupKind) -> &str {
        match group {
            GroupKind::Rows => &self.default_row_title,
            GroupKind::Tabs => &self.default_tab_title,
        }
    }

    /// The grid kind new content is built as. A group kind here falls back to
    /// a plain grid.
    pub fn grid_kind(&self) -> LayoutKind {
        if self.default_grid.is_grid() { self.default_grid } else { LayoutKind::GridLayout }
    }
}

/// The dashboard's layout forest: structure in a [`Tree`], payloads in a
/// component map kept in sync by the tree's observer.
///
/// The attached tree hangs off a `Root` node. Nodes replaced or removed by an
/// edit are parked as detached roots until their history entry goes away.
#[derive(Serialize, Deserialize)]
pub struct LayoutTree {
    tree: Tree<Components>,
    root: OwnedNode,
    revision: u64,
    settings: TreeSettings,
}

impl Default for LayoutTree {
    fn default() -> Self { Self::new(TreeSettings::default()) }
}

impl Drop for LayoutTree {
    fn drop(&mut self) { self.root.remove(&mut self.tree); }
}

impl LayoutTree {
    /// A tree whose body is an empty layout of the configured default grid kind.
    pub fn new(settings: TreeSettings) -> Self {
        let mut tree = Tree::with_observer(Components::default());
        let root = OwnedNode::new_root_in(&mut tree, "layout_root");
        tree.data.elements.insert(*root, Element::Root);
        let mut this = LayoutTree { tree, root, revision: 0, settings };
        let body = this.new_default_grid();
        this.append(body, this.root());
        this
    }

    pub fn settings(&self) -> &TreeSettings { &self.settings }

    pub fn map(&self) -> &NodeMap { &self.tree.map }

    pub fn root(&self) -> NodeId { *self.root }

    /// The layout directly under the root.
    pub fn body(&self) -> NodeId {
        self.root().first_child(self.map()).expect("root always owns a layout")
    }

    /// Incremented by every applied or reverted edit.
    pub fn revision(&self) -> u64 { self.revision }

    pub(crate) fn bump_revision(&mut self) { self.revision += 1; }

    pub fn contains(&self, node: NodeId) -> bool { self.map().contains(node) }

    /// Whether `node` is reachable from the root.
    pub fn is_attached(&self, node: NodeId) -> bool {
        self.contains(node) && node.ancestors(self.map()).any(|n| n == self.root())
    }

    pub fn element(&self, node: NodeId) -> Option<&Element> { self.tree.data.elements.get(node) }

    pub(crate) fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        self.tree.data.elements.get_mut(node)
    }

    pub(crate) fn set_element(&mut self, node: NodeId, element: Element) {
        if self.contains(node) {
            self.tree.data.elements.insert(node, element);
        }
    }

    pub fn layout(&self, node: NodeId) -> Result<&LayoutManager, LayoutError> {
        self.element(node).and_then(Element::as_layout).ok_or(LayoutError::NotALayout(node))
    }

    pub(crate) fn layout_mut(&mut self, node: NodeId) -> Result<&mut LayoutManager, LayoutError> {
        match self.element_mut(node) {
            Some(Element::Layout(manager)) => Ok(manager),
            _ => Err(LayoutError::NotALayout(node)),
        }
    }

    pub fn kind_of(&self, node: NodeId) -> Result<LayoutKind, LayoutError> {
        self.layout(node).map(|m| m.kind())
    }

    pub fn panel(&self, node: NodeId) -> Option<&Panel> { self.element(node)?.as_panel() }

    pub fn title(&self, node: NodeId) -> Option<&str> { self.element(node)?.title() }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> { node.parent(self.map()) }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> { node.children(self.map()).collect() }

    /// The single layout held by a row, tab or the root.
    pub fn inner_layout(&self, owner: NodeId) -> Result<NodeId, LayoutError> {
        if !self.element(owner).is_some_and(Element::is_owner) {
            return Err(LayoutError::NotAnItem(owner));
        }
        owner
            .first_child(self.map())
            .filter(|&child| self.layout(child).is_ok())
            .ok_or(LayoutError::NotAnItem(owner))
    }

    /// The row, tab or root that holds `layout`.
    pub fn owner_of(&self, layout: NodeId) -> Result<NodeId, LayoutError> {
        self.layout(layout)?;
        self.parent(layout)
            .filter(|&p| self.element(p).is_some_and(Element::is_owner))
            .ok_or(LayoutError::NoOwner(layout))
    }

    /// Number of group levels at and below `layout`.
    pub fn group_depth(&self, layout: NodeId) -> usize {
        match self.kind_of(layout) {
            Ok(kind) if kind.group().is_some() => {
                1 + layout
                    .children(self.map())
                    .filter_map(|item| self.inner_layout(item).ok())
                    .map(|inner| self.group_depth(inner))
                    .max()
                    .unwrap_or(0)
            }
            _ => 0,
        }
    }

    pub fn is_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        node.ancestors(self.map()).any(|n| n == ancestor)
    }

    pub(crate) fn create(&mut self, element: Element) -> NodeId {
        let node = self.tree.mk_node().into_id();
        self.tree.data.elements.insert(node, element);
        node
    }

    pub(crate) fn create_under(&mut self, parent: NodeId, element: Element) -> NodeId {
        let node = self.create(element);
        self.append(node, parent);
        node
    }

    pub(crate) fn new_empty_layout(&mut self, kind: LayoutKind) -> NodeId {
        self.create(Element::Layout(LayoutManager::empty(kind)))
    }

    /// An empty layout of the configured default kind, built through its
    /// descriptor so a misconfigured group kind still yields a grid.
    pub(crate) fn new_default_grid(&mut self) -> NodeId {
        let kind = self.settings.default_grid;
        kind.descriptor().create_empty(self)
    }

    /// Wraps the unattached layout `inner` in a new, unattached row or tab.
    pub(crate) fn new_item(&mut self, item: Element, inner: NodeId) -> NodeId {
        debug_assert!(item.is_item());
        let node = self.create(item);
        self.append(inner, node);
        node
    }

    /// Moves `node` under `parent` so that it ends up at `index` (clamped).
    pub(crate) fn attach(&mut self, node: NodeId, parent: NodeId, index: usize) {
        node.detach(&mut self.tree).insert_at(parent, index);
    }

    pub(crate) fn append(&mut self, node: NodeId, parent: NodeId) {
        node.detach(&mut self.tree).push_back(parent);
    }

    /// Unlinks `node` and keeps it, with its subtree, as a detached root.
    pub(crate) fn park(&mut self, node: NodeId) { node.detach(&mut self.tree).park(); }

    /// Releases a detached subtree. Attached nodes are left alone.
    pub fn free(&mut self, node: NodeId) {
        if node == self.root() {
            return;
        }
        trace!(?node, "freeing detached subtree");
        node.remove_root(&mut self.tree);
    }

    /// Structural copy with fresh node ids and identical payloads.
    pub fn copy_subtree(&mut self, node: NodeId) -> NodeId {
        let (copy, pairs) = node.deep_copy(&mut self.tree);
        for (src, dest) in pairs {
            self.tree.data.dispatch_event(&self.tree.map, TreeEvent::Copied { src, dest });
        }
        copy
    }

    /// The attached panel with the given element name.
    pub fn find_panel(&self, name: &str) -> Option<NodeId> {
        self.root()
            .traverse_preorder(self.map())
            .find(|&n| self.panel(n).is_some_and(|p| p.name == name))
    }

    /// Element names in use anywhere in the forest, parked nodes included.
    pub fn panel_names(&self) -> HashSet<String> {
        self.tree
            .data
            .elements
            .values()
            .filter_map(Element::as_panel)
            .map(|p| p.name.clone())
            .collect()
    }

    /// Hands out `panel-N` names and ids not yet in use.
    pub(crate) fn fresh_panel_identity(&self, taken: &mut HashSet<String>) -> (String, u32) {
        let mut id = self
            .tree
            .data
            .elements
            .values()
            .filter_map(Element::as_panel)
            .map(|p| p.id)
            .max()
            .unwrap_or(0);
        loop {
            id += 1;
            let name = format!("panel-{id}");
            if taken.insert(name.clone()) {
                return (name, id);
            }
        }
    }

    pub fn draw_tree(&self, node: NodeId) -> String {
        let tree = self.get_ascii_tree(node);
        let mut out = String::new();
        ascii_tree::write_tree(&mut out, &tree).expect("writing to a String cannot fail");
        out
    }

    fn get_ascii_tree(&self, node: NodeId) -> ascii_tree::Tree {
        let desc = match self.element(node) {
            Some(element) => element.label(),
            None => format!("{node:?} <no element>"),
        };
        let children: Vec<_> = node.children(self.map()).map(|c| self.get_ascii_tree(c)).collect();
        if children.is_empty() {
            ascii_tree::Tree::Leaf(vec![desc])
        } else {
            ascii_tree::Tree::Node(desc, children)
        }
    }

    #[cfg(test)]
    pub(crate) fn live_nodes(&self) -> usize { self.map().len() }
}

#[derive(Clone, Copy, Debug)]
enum TreeEvent {
    AddedToParent(NodeId),
    RemovingFromParent(NodeId),
    Copied { src: NodeId, dest: NodeId },
    RemovedFromForest(NodeId),
}

#[derive(Default, Serialize, Deserialize)]
struct Components {
    elements: SecondaryMap<NodeId, Element>,
}

impl tree::Observer for Components {
    fn added_to_forest(&mut self, _map: &NodeMap, _node: NodeId) {}

    fn added_to_parent(&mut self, map: &NodeMap, node: NodeId) {
        self.dispatch_event(map, TreeEvent::AddedToParent(node))
    }

    fn removing_from_parent(&mut self, map: &NodeMap, node: NodeId) {
        self.dispatch_event(map, TreeEvent::RemovingFromParent(node))
    }

    fn removed_from_forest(&mut self, map: &NodeMap, node: NodeId) {
        self.dispatch_event(map, TreeEvent::RemovedFromForest(node))
    }
}

impl Components {
    fn dispatch_event(&mut self, map: &NodeMap, event: TreeEvent) {
        match event {
            TreeEvent::AddedToParent(node) => {
                let Some(parent) = node.parent(map) else { return };
                debug_assert!(
                    !matches!(self.elements.get(parent), Some(Element::Panel(_))),
                    "Panels cannot have children: {parent:?}/{node:?}",
                );
                self.children_changed(parent, parent.child_count(map));
            }
            TreeEvent::RemovingFromParent(node) => {
                if let Some(parent) = node.parent(map) {
                    let remaining = parent.child_count(map).saturating_sub(1);
                    self.children_changed(parent, remaining);
                }
            }
            TreeEvent::Copied { src, dest } => {
                if let Some(element) = self.elements.get(src).cloned() {
                    self.elements.insert(dest, element);
                }
            }
            TreeEvent::RemovedFromForest(node) => {
                self.elements.remove(node);
            }
        }
    }

    fn children_changed(&mut self, parent: NodeId, count: usize) {
        if let Some(Element::Layout(manager)) = self.elements.get_mut(parent) {
            manager.children_changed(count);
        }
    }
}
