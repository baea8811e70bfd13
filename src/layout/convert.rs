//! Builds a layout of one kind from a layout of another. The source is never
//! modified; the result is an unattached node.

use tracing::debug;

use crate::common::collections::HashSet;
use crate::error::LayoutError;
use crate::layout::LayoutTree;
use crate::layout::element::Element;
use crate::layout::grid::{AutoGridLayout, AutoGridOptions};
use crate::layout::manager::LayoutManager;
use crate::layout::registry::{Category, GroupKind, LayoutKind};
use crate::model::title::generate_unique_title;
use crate::model::tree::NodeId;

/// One group to be produced when partitioning a grid.
struct Partition {
    header: Option<NodeId>,
    panels: Vec<NodeId>,
}

impl LayoutTree {
    pub fn create_from_layout(
        &mut self,
        source: NodeId,
        target: LayoutKind,
    ) -> Result<NodeId, LayoutError> {
        let from = self.kind_of(source)?;
        let node = match (from, target.group()) {
            _ if from == target => self.clone_layout(source)?,
            (LayoutKind::GridLayout, Some(group)) => self.partition_grid(source, group)?,
            (LayoutKind::AutoGridLayout, Some(group)) => self.wrap_copy(source, group),
            (_, Some(group)) => self.regroup(source, group)?,
            (_, None) if from.category() == Category::Group => self.flatten_group(source, target)?,
            (LayoutKind::GridLayout, None) => self.grid_to_auto_grid(source),
            (_, None) => self.auto_grid_to_grid(source)?,
        };
        debug!(?source, %from, %target, ?node, "converted layout");
        Ok(node)
    }

    fn grid_to_auto_grid(&mut self, source: NodeId) -> NodeId {
        let layout = self.create(Element::Layout(
            AutoGridLayout { options: AutoGridOptions::default() }.into(),
        ));
        for panel in self.panels_in_reading_order(source) {
            let copy = self.copy_subtree(panel);
            self.append(copy, layout);
        }
        layout
    }

    fn auto_grid_to_grid(&mut self, source: NodeId) -> Result<NodeId, LayoutError> {
        let LayoutManager::AutoGrid(auto) = self.layout(source)? else {
            return Err(LayoutError::NotALayout(source));
        };
        let options = auto.options.clone();
        let panels = self.viz_panels(source);
        let placements = self.flow_placements(&options, panels.len());
        let layout = self.new_empty_layout(LayoutKind::GridLayout);
        for (panel, placement) in panels.into_iter().zip(placements) {
            let copy = self.copy_subtree(panel);
            self.set_placement(copy, placement);
            self.append(copy, layout);
        }
        Ok(layout)
    }

    /// Splits a grid at its row markers. Loose panels between markers form
    /// their own groups.
    fn partition_grid(&mut self, source: NodeId, group: GroupKind) -> Result<NodeId, LayoutError> {
        let mut partitions = Vec::new();
        let mut pending = Vec::new();
        for child in self.children(source) {
            match self.element(child) {
                Some(Element::Panel(_)) => pending.push(child),
                Some(Element::GridRow(marker)) if marker.is_repeat_clone => (),
                Some(Element::GridRow(_)) => {
                    if !pending.is_empty() {
                        partitions.push(Partition { header: None, panels: std::mem::take(&mut pending) });
                    }
                    partitions.push(Partition { header: Some(child), panels: self.children(child) });
                }
                _ => (),
            }
        }
        if !pending.is_empty() || partitions.is_empty() {
            partitions.push(Partition { header: None, panels: pending });
        }

        let manager = self.new_empty_layout(group.kind());
        let mut titles = HashSet::default();
        for partition in partitions {
            let item = match partition.header.and_then(|h| self.element(h)) {
                Some(marker) => group.convert_item(marker).ok_or(LayoutError::NotAnItem(source))?,
                None => group.new_item(self.settings().default_title(group).to_owned()),
            };
            let inner = self.new_empty_layout(LayoutKind::GridLayout);
            let top = partition
                .panels
                .iter()
                .filter_map(|&p| self.panel(p).map(|p| p.placement.y))
                .min()
                .unwrap_or(0);
            for panel in partition.panels {
                let copy = self.copy_subtree(panel);
                self.append(copy, inner);
            }
            self.shift_grid(inner, -i64::from(top));
            let item = self.new_item(item, inner);
            self.make_title_unique(item, &mut titles);
            self.append(item, manager);
        }
        Ok(manager)
    }

    /// A new one-item group holding a copy of `source`.
    fn wrap_copy(&mut self, source: NodeId, group: GroupKind) -> NodeId {
        let copy = self.copy_subtree(source);
        let manager = self.new_empty_layout(group.kind());
        let item = self.new_item(group.new_item(self.settings().default_title(group).to_owned()), copy);
        self.append(item, manager);
        manager
    }

    /// Rows to tabs and back, item for item. Repeat clones are skipped.
    fn regroup(&mut self, source: NodeId, group: GroupKind) -> Result<NodeId, LayoutError> {
        let manager = self.new_empty_layout(group.kind());
        let mut titles = HashSet::default();
        for item in self.children(source) {
            let Some(element) = self.element(item) else { continue };
            if element.is_repeat_clone() {
                continue;
            }
            let converted = group.convert_item(element).ok_or(LayoutError::NotAnItem(item))?;
            let inner = self.inner_layout(item)?;
            let inner = self.copy_subtree(inner);
            let new_item = self.new_item(converted, inner);
            self.make_title_unique(new_item, &mut titles);
            self.append(new_item, manager);
        }
        if manager.is_empty(self.map()) {
            let inner = self.new_default_grid();
            let item = self.new_item(group.new_item(self.settings().default_title(group).to_owned()), inner);
            self.append(item, manager);
        }
        Ok(manager)
    }

    /// Collapses a group into a single grid of kind `target`: nested groups
    /// first, then every item's layout is converted and merged into the first.
    pub(crate) fn flatten_group(
        &mut self,
        source: NodeId,
        target: LayoutKind,
    ) -> Result<NodeId, LayoutError> {
        debug_assert!(target.is_grid());
        let mut merged: Option<NodeId> = None;
        for item in self.children(source) {
            if self.element(item).is_some_and(Element::is_repeat_clone) {
                continue;
            }
            let inner = self.inner_layout(item)?;
            let normalized = match self.kind_of(inner)? {
                kind if kind.group().is_some() => self.flatten_group(inner, target)?,
                _ => self.create_from_layout(inner, target)?,
            };
            match merged {
                None => merged = Some(normalized),
                Some(into) => {
                    self.merge(into, normalized)?;
                    self.free(normalized);
                }
            }
        }
        Ok(merged.unwrap_or_else(|| self.new_empty_layout(target)))
    }

    fn make_title_unique(&mut self, item: NodeId, titles: &mut HashSet<String>) {
        let title = self.title(item).unwrap_or_default().to_owned();
        let unique = generate_unique_title(&title, titles);
        if unique != title {
            if let Some(element) = self.element_mut(item) {
                element.set_title(unique.clone());
            }
        }
        titles.insert(unique);
    }

    /// Every leaf kind found below `layout`, in registry order.
    pub fn find_all_grid_types(&self, layout: NodeId) -> Vec<LayoutKind> {
        let mut kinds: Vec<_> = layout
            .traverse_preorder(self.map())
            .filter_map(|n| self.kind_of(n).ok())
            .filter(|k| k.is_grid())
            .collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }
}
