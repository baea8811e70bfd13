use serde::{Deserialize, Serialize};

use crate::dashboard::Dashboard;
use crate::error::LayoutError;
use crate::layout::element::{Element, RowItem};
use crate::layout::manager::LayoutBehavior;
use crate::layout::registry::{GroupKind, LayoutKind};
use crate::layout::ungroup::UngroupOutcome;
use crate::model::tree::NodeId;

/// Vertically stacked, collapsible rows.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RowsLayout {}

impl LayoutBehavior for RowsLayout {
    fn kind(&self) -> LayoutKind { LayoutKind::RowsLayout }
}

impl Dashboard {
    pub fn add_new_row(&mut self, rows: NodeId, row: Option<RowItem>) -> Result<NodeId, LayoutError> {
        self.tree.expect_group(rows, GroupKind::Rows)?;
        self.add_item(rows, row.map(Element::Row), None, None)
    }

    pub fn add_row_at(
        &mut self,
        rows: NodeId,
        row: Option<RowItem>,
        index: usize,
    ) -> Result<NodeId, LayoutError> {
        self.tree.expect_group(rows, GroupKind::Rows)?;
        self.add_item(rows, row.map(Element::Row), None, Some(index))
    }

    pub fn remove_row(&mut self, row: NodeId, skip_undo: bool) -> Result<(), LayoutError> {
        self.expect_row(row)?;
        self.remove_item(row, skip_undo)
    }

    pub fn duplicate_row(&mut self, row: NodeId) -> Result<NodeId, LayoutError> {
        self.expect_row(row)?;
        self.duplicate_item(row)
    }

    pub fn move_row(&mut self, rows: NodeId, from: usize, to: usize) -> Result<(), LayoutError> {
        self.tree.expect_group(rows, GroupKind::Rows)?;
        self.move_item(rows, from, to)
    }

    pub fn set_row_collapse(&mut self, row: NodeId, collapse: bool) -> Result<(), LayoutError> {
        self.update_row(row, |r| r.collapse = collapse)
    }

    pub fn update_row(&mut self, row: NodeId, edit: impl FnOnce(&mut RowItem)) -> Result<(), LayoutError> {
        self.expect_row(row)?;
        self.update_element(row, |element| {
            if let Element::Row(item) = element {
                edit(item);
            }
        })
    }

    pub fn ungroup_rows(
        &mut self,
        rows: NodeId,
        choice: Option<LayoutKind>,
    ) -> Result<UngroupOutcome, LayoutError> {
        self.tree.expect_group(rows, GroupKind::Rows)?;
        self.ungroup(rows, choice)
    }

    fn expect_row(&self, row: NodeId) -> Result<(), LayoutError> {
        match self.tree.element(row) {
            Some(Element::Row(_)) => Ok(()),
            _ => Err(LayoutError::NotAnItem(row)),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::dashboard::DashboardEvent;
    use crate::layout::tests::{dashboard, panel, rows_dashboard, titles};

    #[test]
    fn new_rows_get_unique_default_titles() {
        let (mut dash, rows) = rows_dashboard(&["New row"]);
        let events = dash.subscribe();
        let second = dash.add_new_row(rows, None).unwrap();
        dash.add_new_row(rows, None).unwrap();
        assert_eq!(vec!["New row", "New row 1", "New row 2"], titles(dash.tree(), rows));
        assert_eq!(Ok(DashboardEvent::NewObjectAdded { node: second }), events.try_recv());
    }

    #[test]
    fn add_remove_undo_restores_position() {
        let (mut dash, rows) = rows_dashboard(&["a", "b", "c"]);
        let b = dash.tree().children(rows)[1];
        dash.remove_row(b, false).unwrap();
        assert_eq!(vec!["a", "c"], titles(dash.tree(), rows));
        assert!(dash.undo());
        assert_eq!(vec!["a", "b", "c"], titles(dash.tree(), rows));
        assert_eq!(b, dash.tree().children(rows)[1]);
    }

    #[test]
    fn removing_last_row_ungroups_into_its_layout() {
        let (mut dash, rows) = rows_dashboard(&["only"]);
        let row = dash.tree().children(rows)[0];
        let inner = dash.tree().inner_layout(row).unwrap();
        dash.remove_row(row, false).unwrap();
        assert_eq!(inner, dash.body());
        assert!(dash.undo());
        assert_eq!(rows, dash.body());
        assert_eq!(Ok(inner), dash.tree().inner_layout(row));
    }

    #[test]
    fn skip_undo_leaves_no_history() {
        let (mut dash, rows) = rows_dashboard(&["a", "b"]);
        let undo_depth = dash.history().undo_stack().count();
        let a = dash.tree().children(rows)[0];
        dash.remove_row(a, true).unwrap();
        assert_eq!(undo_depth, dash.history().undo_stack().count());
        assert!(!dash.tree().contains(a));
    }

    #[test]
    fn duplicate_row_copies_panels_with_fresh_names() {
        let (mut dash, rows) = rows_dashboard(&["CPU"]);
        let row = dash.tree().children(rows)[0];
        let inner = dash.tree().inner_layout(row).unwrap();
        dash.add_panel(inner, panel("panel-1", 0, 0, 12, 8)).unwrap();
        let copy = dash.duplicate_row(row).unwrap();
        assert_eq!(vec!["CPU", "CPU 1"], titles(dash.tree(), rows));
        let copied_inner = dash.tree().inner_layout(copy).unwrap();
        let names: Vec<_> = dash
            .tree()
            .viz_panels(copied_inner)
            .into_iter()
            .map(|p| dash.tree().panel(p).unwrap().name.clone())
            .collect();
        assert_eq!(vec!["panel-2"], names);
    }

    #[test]
    fn move_row_reorders_without_history() {
        let (mut dash, rows) = rows_dashboard(&["a", "b", "c"]);
        let events = dash.subscribe();
        let undo_depth = dash.history().undo_stack().count();
        dash.move_row(rows, 0, 2).unwrap();
        assert_eq!(vec!["b", "c", "a"], titles(dash.tree(), rows));
        assert_eq!(undo_depth, dash.history().undo_stack().count());
        assert_eq!(Ok(DashboardEvent::ObjectsReordered { parent: rows }), events.try_recv());
        assert!(matches!(dash.move_row(rows, 5, 0), Err(LayoutError::OutOfBounds { .. })));
    }

    #[test]
    fn collapse_is_undoable() {
        let (mut dash, rows) = rows_dashboard(&["a"]);
        let row = dash.tree().children(rows)[0];
        dash.set_row_collapse(row, true).unwrap();
        assert!(matches!(dash.tree().element(row), Some(Element::Row(r)) if r.collapse));
        dash.undo();
        assert!(matches!(dash.tree().element(row), Some(Element::Row(r)) if !r.collapse));
    }

    #[test]
    fn renaming_keeps_titles_unique() {
        let (mut dash, rows) = rows_dashboard(&["a", "b"]);
        let b = dash.tree().children(rows)[1];
        dash.update_row(b, |r| r.title = "a".into()).unwrap();
        assert_eq!(vec!["a", "a 1"], titles(dash.tree(), rows));
    }

    #[test]
    fn duplicate_titles_resolve_variables() {
        let (mut dash, rows) = rows_dashboard(&["$host", "web-1", "db"]);
        dash.set_variable("host", "web-1");
        let dupes = dash.duplicate_titles(rows).unwrap();
        assert_eq!(1, dupes.len());
        assert!(dupes.contains("web-1"));
    }

    #[test]
    fn row_ops_reject_other_managers() {
        let mut dash = dashboard();
        let body = dash.body();
        assert!(matches!(
            dash.add_new_row(body, None),
            Err(LayoutError::KindMismatchAtPath { expected: LayoutKind::RowsLayout, .. })
        ));
    }
}
