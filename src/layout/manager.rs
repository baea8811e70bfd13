use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::collections::HashSet;
use crate::error::LayoutError;
use crate::layout::LayoutTree;
use crate::layout::element::{Element, GridPlacement, Panel};
use crate::layout::grid::{AutoGridLayout, GridLayout};
use crate::layout::registry::{LayoutDescriptor, LayoutKind};
use crate::layout::rows::RowsLayout;
use crate::layout::tabs::TabsLayout;
use crate::model::title::generate_unique_title;
use crate::model::tree::NodeId;

/// Per-variant state behavior of a layout manager.
#[enum_dispatch]
pub trait LayoutBehavior {
    fn kind(&self) -> LayoutKind;

    fn descriptor(&self) -> &'static LayoutDescriptor { self.kind().descriptor() }

    fn label(&self) -> String { self.kind().to_string() }

    /// Called whenever the manager gains or loses a child.
    fn children_changed(&mut self, _count: usize) {}
}

#[enum_dispatch(LayoutBehavior)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LayoutManager {
    Grid(GridLayout),
    AutoGrid(AutoGridLayout),
    Rows(RowsLayout),
    Tabs(TabsLayout),
}

impl LayoutManager {
    pub fn empty(kind: LayoutKind) -> Self {
        match kind {
            LayoutKind::GridLayout => GridLayout::default().into(),
            LayoutKind::AutoGridLayout => AutoGridLayout::default().into(),
            LayoutKind::RowsLayout => RowsLayout::default().into(),
            LayoutKind::TabsLayout => TabsLayout::default().into(),
        }
    }
}

/// The operations every layout variant supports.
impl LayoutTree {
    /// Adds `panel` where the layout naturally puts new content and returns
    /// the new node.
    pub fn add_panel(&mut self, layout: NodeId, panel: Panel) -> Result<NodeId, LayoutError> {
        let (target, panel) = self.place_new_panel(layout, panel)?;
        debug!(?target, name = %panel.name, "adding panel");
        Ok(self.create_under(target, Element::Panel(panel)))
    }

    /// The layout a new panel goes into, and the panel positioned for it.
    pub(crate) fn place_new_panel(
        &self,
        layout: NodeId,
        mut panel: Panel,
    ) -> Result<(NodeId, Panel), LayoutError> {
        let target = self.content_target(layout)?;
        if self.kind_of(target)? == LayoutKind::GridLayout {
            let width = match panel.placement.width {
                0 => self.settings().panel_width,
                w => w,
            };
            let height = match panel.placement.height {
                0 => self.settings().panel_height,
                h => h,
            };
            panel.placement = GridPlacement { x: 0, y: self.grid_bottom(target), width, height };
        }
        Ok((target, panel))
    }

    /// The grid layout that receives content added to `layout`: the layout
    /// itself for grids, otherwise the first row or the current tab, recursively.
    pub fn content_target(&self, layout: NodeId) -> Result<NodeId, LayoutError> {
        match self.layout(layout)? {
            LayoutManager::Grid(_) | LayoutManager::AutoGrid(_) => Ok(layout),
            LayoutManager::Rows(_) => {
                let first = layout
                    .first_child(self.map())
                    .ok_or_else(|| self.empty_group_error(layout))?;
                self.content_target(self.inner_layout(first)?)
            }
            LayoutManager::Tabs(tabs) => {
                let current = layout
                    .child_at(self.map(), tabs.current_tab)
                    .or_else(|| layout.first_child(self.map()))
                    .ok_or_else(|| self.empty_group_error(layout))?;
                self.content_target(self.inner_layout(current)?)
            }
        }
    }

    fn empty_group_error(&self, layout: NodeId) -> LayoutError {
        LayoutError::EmptyGroup {
            path: self.path_of(layout).map(|p| p.to_string()).unwrap_or_else(|_| "?".into()),
            kind: self.kind_of(layout).unwrap_or(LayoutKind::RowsLayout),
        }
    }

    /// Every panel under `layout`, in preorder.
    pub fn viz_panels(&self, layout: NodeId) -> Vec<NodeId> {
        layout.traverse_preorder(self.map()).filter(|&n| self.panel(n).is_some()).collect()
    }

    /// Direct structural children: panels and row markers, or rows, or tabs.
    pub fn outline_children(&self, layout: NodeId) -> Result<Vec<NodeId>, LayoutError> {
        self.layout(layout)?;
        Ok(self.children(layout))
    }

    /// Deep copy with fresh node ids and fresh panel element names.
    pub fn duplicate(&mut self, node: NodeId) -> NodeId {
        let copy = self.copy_subtree(node);
        let mut taken = self.panel_names();
        for panel in self.viz_panels(copy) {
            let (name, id) = self.fresh_panel_identity(&mut taken);
            if let Some(Element::Panel(p)) = self.element_mut(panel) {
                p.name = name;
                p.id = id;
            }
        }
        copy
    }

    /// Structural copy that keeps panel element names.
    pub fn clone_layout(&mut self, layout: NodeId) -> Result<NodeId, LayoutError> {
        self.layout(layout)?;
        Ok(self.copy_subtree(layout))
    }

    /// Moves all content of `source` into `target`. Both must be the same
    /// variant. `source` is left empty and detached content keeps its ids.
    pub fn merge(&mut self, target: NodeId, source: NodeId) -> Result<(), LayoutError> {
        let target_kind = self.kind_of(target)?;
        let source_kind = self.kind_of(source)?;
        if target_kind != source_kind {
            return Err(LayoutError::MergeMismatch { target: target_kind, source_kind });
        }
        match target_kind {
            LayoutKind::GridLayout => {
                let offset = self.grid_bottom(target);
                self.shift_grid(source, i64::from(offset));
                for child in self.children(source) {
                    self.append(child, target);
                }
            }
            LayoutKind::AutoGridLayout => {
                for child in self.children(source) {
                    self.append(child, target);
                }
            }
            LayoutKind::RowsLayout | LayoutKind::TabsLayout => {
                let mut titles: HashSet<String> = self
                    .children(target)
                    .into_iter()
                    .filter_map(|item| self.title(item).map(str::to_owned))
                    .collect();
                for item in self.children(source) {
                    let title = self.title(item).unwrap_or_default().to_owned();
                    let unique = generate_unique_title(&title, &titles);
                    if unique != title {
                        if let Some(element) = self.element_mut(item) {
                            element.set_title(unique.clone());
                        }
                    }
                    titles.insert(unique);
                    self.append(item, target);
                }
            }
        }
        debug!(?target, ?source, kind = %target_kind, "merged layouts");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::layout::tests::{grid_with_panels, panel, titles};

    #[test]
    fn grid_add_panel_goes_below_content() {
        let mut tree = LayoutTree::default();
        let body = tree.body();
        let first = tree.add_panel(body, panel("a", 0, 0, 24, 4)).unwrap();
        let second = tree.add_panel(body, Panel { name: "b".into(), ..Default::default() }).unwrap();
        assert_eq!(GridPlacement { x: 0, y: 0, width: 24, height: 4 }, tree.panel(first).unwrap().placement);
        assert_eq!(GridPlacement { x: 0, y: 4, width: 12, height: 8 }, tree.panel(second).unwrap().placement);
    }

    #[test]
    fn merge_requires_same_variant() {
        let mut tree = LayoutTree::default();
        let grid = grid_with_panels(&mut tree, &[("a", 0, 0, 12, 8)]);
        let auto = tree.new_empty_layout(LayoutKind::AutoGridLayout);
        assert_eq!(
            Err(LayoutError::MergeMismatch {
                target: LayoutKind::GridLayout,
                source_kind: LayoutKind::AutoGridLayout,
            }),
            tree.merge(grid, auto)
        );
        tree.free(grid);
        tree.free(auto);
    }

    #[test]
    fn merging_grids_stacks_source_below_target() {
        let mut tree = LayoutTree::default();
        let target = grid_with_panels(&mut tree, &[("a", 0, 0, 12, 8), ("b", 12, 0, 12, 6)]);
        let source = grid_with_panels(&mut tree, &[("c", 0, 0, 24, 4), ("d", 0, 4, 6, 2)]);
        tree.merge(target, source).unwrap();
        let ys: Vec<_> = tree
            .viz_panels(target)
            .into_iter()
            .map(|n| (tree.panel(n).unwrap().name.clone(), tree.panel(n).unwrap().placement.y))
            .collect();
        assert_eq!(
            vec![("a".into(), 0), ("b".into(), 0), ("c".into(), 8), ("d".into(), 12)],
            ys
        );
        assert!(tree.children(source).is_empty());
        tree.free(target);
        tree.free(source);
    }

    #[test]
    fn merging_groups_keeps_titles_unique() {
        let mut tree = LayoutTree::default();
        let target = tree.new_empty_layout(LayoutKind::RowsLayout);
        let source = tree.new_empty_layout(LayoutKind::RowsLayout);
        for (manager, title) in [(target, "CPU"), (source, "CPU"), (source, "Memory")] {
            let inner = tree.new_empty_layout(LayoutKind::GridLayout);
            let item = tree.new_item(Element::Row(crate::layout::element::RowItem::titled(title)), inner);
            tree.append(item, manager);
        }
        tree.merge(target, source).unwrap();
        assert_eq!(vec!["CPU", "CPU 1", "Memory"], titles(&tree, target));
        tree.free(target);
        tree.free(source);
    }

    #[test]
    fn duplicate_renames_panels_but_clone_keeps_them() {
        let mut tree = LayoutTree::default();
        let grid = grid_with_panels(&mut tree, &[("panel-1", 0, 0, 12, 8)]);
        let cloned = tree.clone_layout(grid).unwrap();
        let duplicated = tree.duplicate(grid);
        let name_of = |tree: &LayoutTree, layout| tree.panel(tree.viz_panels(layout)[0]).unwrap().name.clone();
        assert_eq!("panel-1", name_of(&tree, cloned));
        assert_eq!("panel-2", name_of(&tree, duplicated));
        for node in [grid, cloned, duplicated] {
            tree.free(node);
        }
    }

    #[test]
    fn content_target_descends_into_groups() {
        let mut tree = LayoutTree::default();
        let tabs = tree.new_empty_layout(LayoutKind::TabsLayout);
        assert!(matches!(tree.content_target(tabs), Err(LayoutError::EmptyGroup { .. })));
        let mut inners = vec![];
        for title in ["one", "two"] {
            let inner = tree.new_empty_layout(LayoutKind::AutoGridLayout);
            let item = tree.new_item(Element::Tab(crate::layout::element::TabItem::titled(title)), inner);
            tree.append(item, tabs);
            inners.push(inner);
        }
        if let Ok(LayoutManager::Tabs(t)) = tree.layout_mut(tabs) {
            t.current_tab = 1;
        }
        assert_eq!(Ok(inners[1]), tree.content_target(tabs));
        tree.free(tabs);
    }
}
