use serde::{Deserialize, Serialize};

use crate::dashboard::Dashboard;
use crate::error::LayoutError;
use crate::layout::element::{Element, TabItem};
use crate::layout::manager::{LayoutBehavior, LayoutManager};
use crate::layout::registry::{GroupKind, LayoutKind};
use crate::layout::ungroup::UngroupOutcome;
use crate::model::tree::NodeId;

/// One visible tab at a time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TabsLayout {
    /// Index of the selected tab; kept in range as tabs come and go.
    pub current_tab: usize,
}

impl LayoutBehavior for TabsLayout {
    fn kind(&self) -> LayoutKind { LayoutKind::TabsLayout }

    fn label(&self) -> String { format!("TabsLayout current={}", self.current_tab) }

    fn children_changed(&mut self, count: usize) {
        self.current_tab = self.current_tab.min(count.saturating_sub(1));
    }
}

impl Dashboard {
    pub fn add_new_tab(&mut self, tabs: NodeId, tab: Option<TabItem>) -> Result<NodeId, LayoutError> {
        self.tree.expect_group(tabs, GroupKind::Tabs)?;
        self.add_item(tabs, tab.map(Element::Tab), None, None)
    }

    pub fn add_tab_at(
        &mut self,
        tabs: NodeId,
        tab: Option<TabItem>,
        index: usize,
    ) -> Result<NodeId, LayoutError> {
        self.tree.expect_group(tabs, GroupKind::Tabs)?;
        self.add_item(tabs, tab.map(Element::Tab), None, Some(index))
    }

    pub fn remove_tab(&mut self, tab: NodeId, skip_undo: bool) -> Result<(), LayoutError> {
        self.expect_tab(tab)?;
        self.remove_item(tab, skip_undo)
    }

    pub fn duplicate_tab(&mut self, tab: NodeId) -> Result<NodeId, LayoutError> {
        self.expect_tab(tab)?;
        self.duplicate_item(tab)
    }

    pub fn move_tab(&mut self, tabs: NodeId, from: usize, to: usize) -> Result<(), LayoutError> {
        self.tree.expect_group(tabs, GroupKind::Tabs)?;
        self.move_item(tabs, from, to)
    }

    pub fn update_tab(&mut self, tab: NodeId, edit: impl FnOnce(&mut TabItem)) -> Result<(), LayoutError> {
        self.expect_tab(tab)?;
        self.update_element(tab, |element| {
            if let Element::Tab(item) = element {
                edit(item);
            }
        })
    }

    /// Makes the tab at `index` the current one.
    pub fn select_tab(&mut self, tabs: NodeId, index: usize) -> Result<(), LayoutError> {
        self.tree.expect_group(tabs, GroupKind::Tabs)?;
        self.tree.item_at(tabs, index)?;
        self.update_element(tabs, |element| {
            if let Element::Layout(LayoutManager::Tabs(t)) = element {
                t.current_tab = index;
            }
        })
    }

    pub fn current_tab(&self, tabs: NodeId) -> Result<usize, LayoutError> {
        match self.tree.layout(tabs)? {
            LayoutManager::Tabs(t) => Ok(t.current_tab),
            other => Err(LayoutError::KindMismatchAtPath {
                path: self.tree.path_of(tabs).map(|p| p.to_string()).unwrap_or_default(),
                expected: LayoutKind::TabsLayout,
                found: other.kind(),
            }),
        }
    }

    pub fn ungroup_tabs(
        &mut self,
        tabs: NodeId,
        choice: Option<LayoutKind>,
    ) -> Result<UngroupOutcome, LayoutError> {
        self.tree.expect_group(tabs, GroupKind::Tabs)?;
        self.ungroup(tabs, choice)
    }

    fn expect_tab(&self, tab: NodeId) -> Result<(), LayoutError> {
        match self.tree.element(tab) {
            Some(Element::Tab(_)) => Ok(()),
            _ => Err(LayoutError::NotAnItem(tab)),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::layout::tests::{tabs_dashboard, titles};

    #[test]
    fn selection_is_undoable_and_clamped() {
        let (mut dash, tabs) = tabs_dashboard(&["one", "two", "three"]);
        dash.select_tab(tabs, 2).unwrap();
        assert_eq!(Ok(2), dash.current_tab(tabs));
        assert!(matches!(dash.select_tab(tabs, 3), Err(LayoutError::OutOfBounds { .. })));

        let last = dash.tree().children(tabs)[2];
        dash.remove_tab(last, false).unwrap();
        assert_eq!(Ok(1), dash.current_tab(tabs));

        dash.undo();
        dash.undo();
        assert_eq!(Ok(0), dash.current_tab(tabs));
        assert_eq!(vec!["one", "two", "three"], titles(dash.tree(), tabs));
    }

    #[test]
    fn new_tabs_and_positions() {
        let (mut dash, tabs) = tabs_dashboard(&["New tab"]);
        dash.add_new_tab(tabs, None).unwrap();
        dash.add_tab_at(tabs, Some(TabItem::titled("First")), 0).unwrap();
        assert_eq!(vec!["First", "New tab", "New tab 1"], titles(dash.tree(), tabs));
        dash.move_tab(tabs, 0, 5).unwrap();
        assert_eq!(vec!["New tab", "New tab 1", "First"], titles(dash.tree(), tabs));
    }

    #[test]
    fn tab_edits() {
        let (mut dash, tabs) = tabs_dashboard(&["a"]);
        let tab = dash.tree().children(tabs)[0];
        dash.update_tab(tab, |t| t.repeat_by_variable = Some("region".into())).unwrap();
        assert!(matches!(
            dash.tree().element(tab),
            Some(Element::Tab(t)) if t.repeat_by_variable.as_deref() == Some("region")
        ));
        let copy = dash.duplicate_tab(tab).unwrap();
        assert_eq!(Some("a 1"), dash.tree().title(copy));
    }
}
