use std::ops::{Deref, Index, IndexMut};

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

/// Ordered N-ary forest.
///
/// Every node lives in one slot map. Parents are looked up through the map,
/// never held, so a subtree can be detached, parked as a standalone root and
/// later reattached with its identity intact.
#[derive(Serialize, Deserialize)]
pub struct Tree<O> {
    pub map: NodeMap,
    pub data: O,
}

impl<O: Observer> Tree<O> {
    pub fn with_observer(data: O) -> Self { Tree { map: NodeMap::new(), data } }

    pub fn mk_node(&mut self) -> UnattachedNode<'_, O> {
        let id = self.map.map.insert(Node::default());
        self.data.added_to_forest(&self.map, id);
        UnattachedNode { id, tree: self }
    }
}

/// Structural links of every node in the forest.
#[derive(Serialize, Deserialize)]
pub struct NodeMap {
    map: SlotMap<NodeId, Node>,
}

impl NodeMap {
    fn new() -> NodeMap { NodeMap { map: SlotMap::default() } }

    pub fn contains(&self, id: NodeId) -> bool { self.map.contains_key(id) }

    pub fn len(&self) -> usize { self.map.len() }
}

impl Index<NodeId> for NodeMap {
    type Output = Node;

    fn index(&self, index: NodeId) -> &Self::Output { &self.map[index] }
}

impl IndexMut<NodeId> for NodeMap {
    fn index_mut(&mut self, index: NodeId) -> &mut Self::Output { &mut self.map[index] }
}

/// Ownership of a root node.
///
/// Removal needs the tree, so it cannot happen in `Drop`. Dropping an
/// `OwnedNode` that still holds its node panics in debug builds; the name is
/// used in the panic message.
#[must_use]
#[derive(Debug, Serialize, Deserialize)]
pub struct OwnedNode(Option<NodeId>, String);

impl OwnedNode {
    pub fn new_root_in(tree: &mut Tree<impl Observer>, name: &'static str) -> Self {
        let node = tree.mk_node();
        Self::own(node.id, name)
    }

    pub fn own(node: NodeId, name: &'static str) -> Self { OwnedNode(Some(node), name.to_owned()) }

    pub fn id(&self) -> NodeId { self.0.expect("OwnedNode::id called on removed OwnedNode") }

    #[track_caller]
    pub fn remove(&mut self, tree: &mut Tree<impl Observer>) {
        if let Some(id) = self.0.take() {
            UnattachedNode { id, tree }.remove()
        }
    }

    /// Gives up ownership without removing the node.
    pub fn release(mut self) -> Option<NodeId> { self.0.take() }
}

impl Deref for OwnedNode {
    type Target = NodeId;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref().expect("OwnedNode deref on removed OwnedNode")
    }
}

impl Drop for OwnedNode {
    fn drop(&mut self) {
        if cfg!(debug_assertions) {
            if let Some(node) = self.0 {
                panic!(
                    "OwnedNode {name:?} dropped without OwnedNode::remove being called: {node:?}",
                    name = self.1,
                );
            }
        }
    }
}

slotmap::new_key_type! {
    /// Stable identity of a node in the layout forest.
    pub struct NodeId;
}

impl NodeId {
    #[track_caller]
    pub fn detach<'a, O: Observer>(self, tree: &'a mut Tree<O>) -> DetachedNode<'a, O> {
        DetachedNode { id: self, tree }
    }

    pub fn parent(self, map: &NodeMap) -> Option<NodeId> {
        map.map.get(self).and_then(|n| n.parent)
    }

    pub fn children(self, map: &NodeMap) -> impl Iterator<Item = NodeId> + '_ {
        ChildIterator {
            cur: map.map.get(self).and_then(|n| n.first_child),
            map,
        }
    }

    pub fn child_count(self, map: &NodeMap) -> usize { self.children(map).count() }

    pub fn child_at(self, map: &NodeMap, index: usize) -> Option<NodeId> {
        self.children(map).nth(index)
    }

    /// Position of this node among its siblings, or `None` for a root.
    pub fn index_in_parent(self, map: &NodeMap) -> Option<usize> {
        let parent = self.parent(map)?;
        parent.children(map).position(|c| c == self)
    }

    pub fn traverse_preorder(self, map: &NodeMap) -> impl Iterator<Item = NodeId> + '_ {
        PreorderTraversal { top: self, cur: Some(self), map }
    }

    /// Iterates this node and then each of its ancestors up to the root.
    pub fn ancestors(self, map: &NodeMap) -> impl Iterator<Item = NodeId> + '_ {
        let mut next = Some(self);
        std::iter::from_fn(move || {
            let node = next;
            next = node.and_then(|n| map.map.get(n).and_then(|nd| nd.parent));
            node
        })
    }

    /// Creates a structural copy of the subtree rooted at this node.
    ///
    /// Returns the new root together with `(source, copy)` pairs in preorder so
    /// the caller can copy component data across. Observer events are not sent
    /// for the copy.
    #[track_caller]
    pub fn deep_copy<O: Observer>(self, tree: &mut Tree<O>) -> (NodeId, Vec<(NodeId, NodeId)>) {
        let new_root = tree.map.map.insert(Node::default());
        let mut pairs = vec![(self, new_root)];
        let mut stack = vec![(self, new_root)];
        let preorder = self.traverse_preorder(&tree.map).skip(1).collect::<Vec<_>>();
        for old in preorder {
            while old.parent(&tree.map) != stack.last().map(|(oldp, _)| *oldp) {
                stack.pop();
            }
            let Some(&(_, parent)) = stack.last() else {
                break;
            };
            let new = tree.map.map.insert(Node::default());
            new.link_under_back(parent, &mut tree.map);
            stack.push((old, new));
            pairs.push((old, new));
        }
        (new_root, pairs)
    }

    pub fn next_sibling(self, map: &NodeMap) -> Option<NodeId> {
        map.map.get(self).and_then(|n| n.next_sibling)
    }

    pub fn prev_sibling(self, map: &NodeMap) -> Option<NodeId> {
        map.map.get(self).and_then(|n| n.prev_sibling)
    }

    pub fn first_child(self, map: &NodeMap) -> Option<NodeId> {
        map.map.get(self).and_then(|n| n.first_child)
    }

    pub fn last_child(self, map: &NodeMap) -> Option<NodeId> {
        map.map.get(self).and_then(|n| n.last_child)
    }

    pub fn is_empty(self, map: &NodeMap) -> bool {
        map.map.get(self).map(|n| n.first_child.is_none()).unwrap_or(true)
    }

    /// Frees a detached root and its whole subtree. Does nothing for attached
    /// or already freed nodes.
    pub fn remove_root<O: Observer>(self, tree: &mut Tree<O>) {
        if !tree.map.contains(self) || self.parent(&tree.map).is_some() {
            return;
        }
        UnattachedNode { id: self, tree }.remove()
    }
}

/// Receives structural notifications so component maps stay in sync.
pub trait Observer
where Self: Sized {
    fn added_to_forest(&mut self, map: &NodeMap, node: NodeId);
    fn added_to_parent(&mut self, map: &NodeMap, node: NodeId);
    fn removing_from_parent(&mut self, map: &NodeMap, node: NodeId);
    fn removed_from_forest(&mut self, map: &NodeMap, node: NodeId);
}

impl Observer for () {
    fn added_to_forest(&mut self, _map: &NodeMap, _node: NodeId) {}

    fn added_to_parent(&mut self, _map: &NodeMap, _node: NodeId) {}

    fn removing_from_parent(&mut self, _map: &NodeMap, _node: NodeId) {}

    fn removed_from_forest(&mut self, _map: &NodeMap, _node: NodeId) {}
}

#[must_use = "Unattached nodes should be inserted into the tree or kept as a root"]
pub struct UnattachedNode<'a, O> {
    id: NodeId,
    tree: &'a mut Tree<O>,
}

impl<'a, O: Observer> UnattachedNode<'a, O> {
    /// Keeps the node in the forest as a standalone root.
    pub fn into_id(self) -> NodeId { self.id }

    pub fn push_back(self, parent: NodeId) -> NodeId {
        self.attach_with(|this| this.id.link_under_back(parent, &mut this.tree.map))
    }

    pub fn insert_at(self, parent: NodeId, index: usize) -> NodeId {
        self.attach_with(|this| this.id.link_at(parent, index, &mut this.tree.map))
    }

    pub(crate) fn remove(self) {
        debug_assert!(self.id.parent(&self.tree.map).is_none());
        if let Some(node) = self.tree.map.map.remove(self.id) {
            node.delete_recursive(self.tree, self.id);
        }
    }

    fn attach_with(mut self, attach: impl FnOnce(&mut Self)) -> NodeId {
        attach(&mut self);
        self.tree.data.added_to_parent(&self.tree.map, self.id);
        self.id
    }
}

#[must_use = "Detached nodes should be reattached, parked or removed"]
pub struct DetachedNode<'a, O> {
    id: NodeId,
    tree: &'a mut Tree<O>,
}

impl<'a, O: Observer> DetachedNode<'a, O> {
    pub fn push_back(self, parent: NodeId) -> NodeId {
        self.attach_with(|this| this.id.link_under_back(parent, &mut this.tree.map))
    }

    /// Inserts under `parent` so that the node ends up at `index`, clamped to
    /// the end. The index is computed after the node leaves its old position.
    pub fn insert_at(self, parent: NodeId, index: usize) -> NodeId {
        self.attach_with(|this| this.id.link_at(parent, index, &mut this.tree.map))
    }

    /// Unlinks the node and leaves it in the forest as a root, subtree intact.
    pub fn park(self) -> NodeId {
        if self.id.parent(&self.tree.map).is_some() {
            self.tree.data.removing_from_parent(&self.tree.map, self.id);
            self.tree.map.unlink(self.id);
        }
        self.id
    }

    pub fn remove(self) {
        let DetachedNode { id, tree } = self;
        if id.parent(&tree.map).is_some() {
            tree.data.removing_from_parent(&tree.map, id);
            tree.map.unlink(id);
        }
        if let Some(node) = tree.map.map.remove(id) {
            node.delete_recursive(tree, id);
        }
    }

    fn attach_with(mut self, attach: impl FnOnce(&mut Self)) -> NodeId {
        let old_parent = self.id.parent(&self.tree.map);
        if old_parent.is_some() {
            self.tree.data.removing_from_parent(&self.tree.map, self.id);
        }
        self.tree.map.unlink(self.id);
        attach(&mut self);
        self.tree.data.added_to_parent(&self.tree.map, self.id);
        self.id
    }
}

#[derive(Default, PartialEq, Debug, Serialize, Deserialize)]
pub struct Node {
    parent: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
}

impl NodeId {
    fn link_under_back(self, parent: NodeId, map: &mut NodeMap) {
        if self == parent || !map.contains(self) || !map.contains(parent) {
            return;
        }
        let prev_child = {
            let parent_node = &mut map.map[parent];
            parent_node.first_child.get_or_insert(self);
            parent_node.last_child.replace(self)
        };
        map.map[self].parent = Some(parent);
        if let Some(prev) = prev_child {
            map.map[self].prev_sibling = Some(prev);
            map.map[prev].next_sibling = Some(self);
        }
    }

    fn link_at(self, parent: NodeId, index: usize, map: &mut NodeMap) {
        match parent.child_at(map, index) {
            Some(next) if next != self => self.link_before(next, map),
            _ => self.link_under_back(parent, map),
        }
    }

    fn link_before(self, next: NodeId, map: &mut NodeMap) {
        let Some(parent) = next.parent(map) else {
            return;
        };
        if !map.contains(self) {
            return;
        }
        let prev = map.map[next].prev_sibling;
        {
            let node = &mut map.map[self];
            node.parent = Some(parent);
            node.prev_sibling = prev;
            node.next_sibling = Some(next);
        }
        map.map[next].prev_sibling = Some(self);
        match prev {
            Some(prev) => map.map[prev].next_sibling = Some(self),
            None => map.map[parent].first_child = Some(self),
        }
    }
}

impl NodeMap {
    fn unlink(&mut self, id: NodeId) {
        let Some((prev_sibling, next_sibling, parent)) =
            self.map.get(id).map(|n| (n.prev_sibling, n.next_sibling, n.parent))
        else {
            return;
        };
        if let Some(prev) = prev_sibling {
            self.map[prev].next_sibling = next_sibling;
        }
        if let Some(next) = next_sibling {
            self.map[next].prev_sibling = prev_sibling;
        }
        if let Some(parent) = parent {
            let parent_node = &mut self.map[parent];
            if parent_node.first_child == Some(id) {
                parent_node.first_child = next_sibling;
            }
            if parent_node.last_child == Some(id) {
                parent_node.last_child = prev_sibling;
            }
        }
        let node = &mut self.map[id];
        node.prev_sibling = None;
        node.next_sibling = None;
        node.parent = None;
    }
}

impl Node {
    fn delete_recursive(&self, cx: &mut Tree<impl Observer>, id: NodeId) {
        cx.data.removed_from_forest(&cx.map, id);
        let mut iter = self.first_child;
        while let Some(child) = iter {
            let next = cx.map.map.get(child).and_then(|n| n.next_sibling);
            if let Some(node) = cx.map.map.remove(child) {
                node.delete_recursive(cx, child);
            }
            iter = next;
        }
    }
}

struct ChildIterator<'a> {
    cur: Option<NodeId>,
    map: &'a NodeMap,
}

impl<'a> Iterator for ChildIterator<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cur?;
        self.cur = self.map.map.get(id).and_then(|n| n.next_sibling);
        Some(id)
    }
}

struct PreorderTraversal<'a> {
    top: NodeId,
    cur: Option<NodeId>,
    map: &'a NodeMap,
}

impl<'a> Iterator for PreorderTraversal<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.cur?;
        if let Some(child) = node.first_child(self.map) {
            self.cur = Some(child);
        } else {
            self.cur = None;
            for ancestor in node.ancestors(self.map) {
                if ancestor == self.top {
                    break;
                }
                if let Some(sibling) = ancestor.next_sibling(self.map) {
                    self.cur = Some(sibling);
                    break;
                }
            }
        }
        Some(node)
    }
}
