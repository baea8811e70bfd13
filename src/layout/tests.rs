use pretty_assertions::assert_eq;
use test_log::test;

use crate::common::collections::HashSet;
use crate::common::config::Config;
use crate::dashboard::{Dashboard, DashboardEvent};
use crate::error::LayoutError;
use crate::layout::element::{Element, GridPlacement, Panel, RowItem, TabItem};
use crate::layout::registry::kinds;
use crate::layout::{GroupKind, LayoutKind, LayoutTree, TreeSettings, UngroupOutcome};
use crate::model::title::generate_unique_title;
use crate::model::tree::NodeId;

pub(crate) fn panel(name: &str, x: u32, y: u32, width: u32, height: u32) -> Panel {
    Panel {
        name: name.into(),
        title: format!("Panel {name}"),
        placement: GridPlacement { x, y, width, height },
        ..Default::default()
    }
}

/// An unattached grid holding the given panels.
pub(crate) fn grid_with_panels(tree: &mut LayoutTree, panels: &[(&str, u32, u32, u32, u32)]) -> NodeId {
    let grid = tree.new_empty_layout(LayoutKind::GridLayout);
    for &(name, x, y, w, h) in panels {
        tree.create_under(grid, Element::Panel(panel(name, x, y, w, h)));
    }
    grid
}

pub(crate) fn titles(tree: &LayoutTree, manager: NodeId) -> Vec<String> {
    tree.children(manager)
        .into_iter()
        .map(|item| tree.title(item).unwrap_or_default().to_owned())
        .collect()
}

pub(crate) fn panel_names(tree: &LayoutTree, layout: NodeId) -> Vec<String> {
    tree.viz_panels(layout).into_iter().map(|p| tree.panel(p).unwrap().name.clone()).collect()
}

pub(crate) fn dashboard() -> Dashboard { Dashboard::new(&Config::default()) }

/// A dashboard whose body is a group of `group` built from `(title, inner)`
/// pairs, installed without history.
pub(crate) fn group_dashboard(
    group: GroupKind,
    build: impl FnOnce(&mut LayoutTree) -> Vec<(String, NodeId)>,
) -> (Dashboard, NodeId) {
    let mut dash = dashboard();
    let items = build(&mut dash.tree);
    let manager = dash.tree.new_empty_layout(group.kind());
    for (title, inner) in items {
        let item = dash.tree.new_item(group.new_item(title), inner);
        dash.tree.append(item, manager);
    }
    let root = dash.tree.root();
    dash.switch_layout(root, manager, true).unwrap();
    (dash, manager)
}

fn empty_items<'a>(titles: &'a [&'a str]) -> impl FnOnce(&mut LayoutTree) -> Vec<(String, NodeId)> + 'a {
    move |tree| {
        titles
            .iter()
            .map(|t| (t.to_string(), tree.new_empty_layout(LayoutKind::GridLayout)))
            .collect()
    }
}

pub(crate) fn rows_dashboard(titles: &[&str]) -> (Dashboard, NodeId) {
    group_dashboard(GroupKind::Rows, empty_items(titles))
}

pub(crate) fn tabs_dashboard(titles: &[&str]) -> (Dashboard, NodeId) {
    group_dashboard(GroupKind::Tabs, empty_items(titles))
}

/// Rows "one" (grid: a, b) and "two" (auto grid: c).
pub(crate) fn mixed_rows_dashboard() -> (Dashboard, NodeId) {
    group_dashboard(GroupKind::Rows, |tree| {
        let grid = grid_with_panels(tree, &[("a", 0, 0, 12, 8), ("b", 12, 0, 12, 8)]);
        let auto = tree.new_empty_layout(LayoutKind::AutoGridLayout);
        tree.create_under(auto, Element::Panel(panel("c", 0, 0, 0, 0)));
        vec![("one".into(), grid), ("two".into(), auto)]
    })
}

fn sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names
}

/// Every rows or tabs manager reachable from the root has at least one item.
fn assert_no_empty_groups(dash: &Dashboard) {
    let tree = dash.tree();
    for node in tree.root().traverse_preorder(tree.map()) {
        if tree.kind_of(node).is_ok_and(|k| k.group().is_some()) {
            assert!(!node.is_empty(tree.map()), "empty group at {:?}", tree.path_of(node));
        }
    }
}

#[test]
fn unique_titles_never_collide() {
    let candidates = ["", "New row", "Row 9", "Row 18446744073709551615", "CPU 1", "a b 2"];
    let sets: [&[&str]; 4] = [
        &[],
        &["New row", "New row 1", "Row 9", "Row 10"],
        &["", " 1", "CPU 1", "CPU 2", "Row 18446744073709551615"],
        &["a b 2", "a b 3", "a b 4"],
    ];
    for set in sets {
        for candidate in candidates {
            let mut existing: HashSet<String> = set.iter().map(|s| s.to_string()).collect();
            let first = generate_unique_title(candidate, &existing);
            assert!(!existing.contains(&first), "{candidate:?} -> {first:?} in {set:?}");
            assert_eq!(first, generate_unique_title(&first, &existing));

            existing.insert(first.clone());
            let second = generate_unique_title(candidate, &existing);
            assert!(!existing.contains(&second));
            assert_ne!(first, second);
            assert_ne!(candidate, second);
        }
    }
}

#[test]
fn groups_never_end_up_empty() {
    let (mut dash, rows) = rows_dashboard(&["a", "b", "c"]);
    let inner = dash.tree().inner_layout(dash.tree().children(rows)[0]).unwrap();
    dash.wrap_in_group(inner, GroupKind::Tabs, None).unwrap();
    assert_no_empty_groups(&dash);

    for _ in 0..2 {
        let first = dash.tree().children(rows)[0];
        dash.remove_row(first, false).unwrap();
        assert_no_empty_groups(&dash);
    }
    let last = dash.tree().children(rows)[0];
    dash.remove_row(last, false).unwrap();
    assert!(!dash.tree().is_attached(rows));
    assert_no_empty_groups(&dash);

    while dash.undo() {
        assert_no_empty_groups(&dash);
    }
    assert_eq!(rows, dash.body());
    assert_eq!(vec!["a", "b", "c"], titles(dash.tree(), rows));
}

#[test]
fn switching_succeeds_only_within_a_category() {
    for from in kinds() {
        for to in kinds() {
            let (mut dash, layout) = match from.group() {
                Some(group) => group_dashboard(group, empty_items(&["x"])),
                None => {
                    let mut dash = dashboard();
                    let body = dash.body();
                    let layout = dash.change_layout_kind(body, from).unwrap();
                    (dash, layout)
                }
            };
            let before = dash.to_spec().unwrap();
            let revision = dash.tree().revision();
            let result = dash.change_layout_kind(layout, to);
            if from.category() == to.category() {
                let new = result.unwrap_or_else(|e| panic!("{from} -> {to}: {e}"));
                assert_eq!(Ok(to), dash.tree().kind_of(new));
                assert_eq!(new, dash.body());
            } else {
                assert_eq!(Err(LayoutError::CrossCategory { from, to }), result);
                assert_eq!(revision, dash.tree().revision());
                assert_eq!(before, dash.to_spec().unwrap());
            }
        }
    }
}

#[test]
fn grid_auto_grid_round_trip_keeps_panels() {
    let mut dash = dashboard();
    let body = dash.body();
    for (name, w, h) in [("a", 6, 4), ("b", 18, 4), ("c", 24, 9), ("d", 12, 2)] {
        dash.add_panel(body, Panel { name: name.into(), ..panel(name, 0, 0, w, h) }).unwrap();
    }
    let original = sorted(panel_names(dash.tree(), body));

    let auto = dash.change_layout_kind(body, LayoutKind::AutoGridLayout).unwrap();
    assert_eq!(original, sorted(panel_names(dash.tree(), auto)));
    let grid = dash.change_layout_kind(auto, LayoutKind::GridLayout).unwrap();
    assert_eq!(original, sorted(panel_names(dash.tree(), grid)));

    let placements: Vec<_> = dash
        .tree()
        .viz_panels(grid)
        .into_iter()
        .map(|p| dash.tree().panel(p).unwrap().placement)
        .collect();
    assert_eq!(
        vec![
            GridPlacement::at(0, 0, 8, 9),
            GridPlacement::at(8, 0, 8, 9),
            GridPlacement::at(16, 0, 8, 9),
            GridPlacement::at(0, 9, 8, 9),
        ],
        placements
    );
}

#[test]
fn same_kind_nesting_is_rejected() {
    let (mut dash, rows) = rows_dashboard(&["outer"]);
    let row = dash.tree().children(rows)[0];
    let inner = dash.tree().inner_layout(row).unwrap();

    assert!(matches!(
        dash.wrap_in_group(inner, GroupKind::Rows, None),
        Err(LayoutError::SameTypeNesting { kind: LayoutKind::RowsLayout, .. })
    ));

    let tab = dash.wrap_in_group(inner, GroupKind::Tabs, None).unwrap();
    assert_eq!("/rows/0/tabs/0", dash.tree().path_of(tab).unwrap().to_string());
    assert_eq!(Ok(inner), dash.tree().resolve(&"/rows/0/tabs/0".parse().unwrap()));

    let tabs = dash.tree().manager_of(tab).unwrap();
    let err = dash.change_layout_kind(tabs, LayoutKind::RowsLayout).unwrap_err();
    assert!(err.to_string().contains("same-type nesting"), "{err}");
    assert_eq!(Ok(LayoutKind::TabsLayout), dash.tree().kind_of(tabs));
}

#[test]
fn add_remove_undo_scenario() {
    let mut dash = dashboard();
    let rows = dash.tree.new_empty_layout(LayoutKind::RowsLayout);
    let root = dash.tree().root();
    dash.switch_layout(root, rows, true).unwrap();

    let row1 = dash.add_new_row(rows, None).unwrap();
    assert_eq!(vec!["New row"], titles(dash.tree(), rows));
    let row2 = dash.add_new_row(rows, Some(RowItem::titled("New row"))).unwrap();
    assert_eq!(vec!["New row", "New row 1"], titles(dash.tree(), rows));

    dash.remove_row(row1, false).unwrap();
    assert_eq!(vec![row2], dash.tree().children(rows));
    assert_eq!(Some("New row 1"), dash.tree().title(row2));

    assert!(dash.undo());
    assert_eq!(vec![row1, row2], dash.tree().children(rows));
}

#[test]
fn removing_last_row_with_tabs_inside_promotes_the_tabs() {
    let (mut dash, rows) = group_dashboard(GroupKind::Rows, |tree| {
        let tabs = tree.new_empty_layout(LayoutKind::TabsLayout);
        let inner = tree.new_empty_layout(LayoutKind::GridLayout);
        let tab = tree.new_item(Element::Tab(TabItem::titled("inside")), inner);
        tree.append(tab, tabs);
        vec![("only".into(), tabs)]
    });
    let row = dash.tree().children(rows)[0];
    let tabs = dash.tree().inner_layout(row).unwrap();
    dash.remove_row(row, false).unwrap();
    assert_eq!(tabs, dash.body());
    assert_eq!(vec!["inside"], titles(dash.tree(), tabs));
    assert!(!dash.tree().is_attached(rows));
    assert_no_empty_groups(&dash);
}

#[test]
fn mixed_ungroup_scenario() {
    let (mut dash, rows) = group_dashboard(GroupKind::Rows, |tree| {
        let first = grid_with_panels(tree, &[("a", 0, 0, 24, 4)]);
        let auto = tree.new_empty_layout(LayoutKind::AutoGridLayout);
        tree.create_under(auto, Element::Panel(panel("b", 0, 0, 0, 0)));
        tree.create_under(auto, Element::Panel(panel("c", 0, 0, 0, 0)));
        let third = grid_with_panels(tree, &[("d", 0, 0, 12, 3)]);
        vec![("one".into(), first), ("two".into(), auto), ("three".into(), third)]
    });
    let UngroupOutcome::NeedsDisambiguation(pending) = dash.ungroup_rows(rows, None).unwrap() else {
        panic!("expected a choice between grid kinds")
    };
    assert_eq!(&[LayoutKind::GridLayout, LayoutKind::AutoGridLayout], pending.options());

    let merged = pending.resume(&mut dash, LayoutKind::GridLayout).unwrap();
    assert_eq!(merged, dash.body());
    assert_eq!(Ok(LayoutKind::GridLayout), dash.tree().kind_of(merged));
    assert!(dash.tree().find_all_grid_types(merged) == vec![LayoutKind::GridLayout]);

    let placed: Vec<_> = dash
        .tree()
        .viz_panels(merged)
        .into_iter()
        .map(|p| {
            let p = dash.tree().panel(p).unwrap();
            (p.name.clone(), p.placement)
        })
        .collect();
    assert_eq!(
        vec![
            ("a".to_string(), GridPlacement::at(0, 0, 24, 4)),
            ("b".to_string(), GridPlacement::at(0, 4, 8, 9)),
            ("c".to_string(), GridPlacement::at(8, 4, 8, 9)),
            ("d".to_string(), GridPlacement::at(0, 13, 12, 3)),
        ],
        placed
    );
}

#[test]
fn grid_with_row_markers_becomes_rows() {
    let mut tree = LayoutTree::default();
    let grid = grid_with_panels(&mut tree, &[("loose", 0, 0, 24, 2)]);
    let marker = tree.create_under(
        grid,
        Element::GridRow(crate::layout::element::GridRow {
            title: "CPU".into(),
            collapsed: true,
            y: 2,
            ..Default::default()
        }),
    );
    tree.create_under(marker, Element::Panel(panel("cpu", 0, 3, 12, 8)));
    tree.create_under(grid, Element::Panel(panel("tail", 0, 11, 12, 4)));

    let rows = tree.create_from_layout(grid, LayoutKind::RowsLayout).unwrap();
    assert_eq!(vec!["New row", "CPU", "New row 1"], titles(&tree, rows));
    let cpu_row = tree.children(rows)[1];
    assert!(matches!(tree.element(cpu_row), Some(Element::Row(r)) if r.collapse));
    let cpu_inner = tree.inner_layout(cpu_row).unwrap();
    assert_eq!(GridPlacement::at(0, 0, 12, 8), tree.panel(tree.viz_panels(cpu_inner)[0]).unwrap().placement);
    assert_eq!(3, tree.viz_panels(grid).len());
    tree.free(rows);
    tree.free(grid);
}

#[test]
fn group_default_grid_never_builds_empty_groups() {
    let tree = LayoutTree::new(TreeSettings { default_grid: LayoutKind::RowsLayout, ..Default::default() });
    assert_eq!(Ok(LayoutKind::GridLayout), tree.kind_of(tree.body()));

    let mut config = Config::default();
    config.layout.default_grid = LayoutKind::RowsLayout;
    let mut dash = Dashboard::new(&config);
    assert_eq!(Ok(LayoutKind::GridLayout), dash.tree().kind_of(dash.body()));

    let body = dash.body();
    let row = dash.wrap_in_group(body, GroupKind::Rows, None).unwrap();
    let rows = dash.tree().manager_of(row).unwrap();
    let added = dash.add_new_row(rows, None).unwrap();
    assert_eq!(Ok(LayoutKind::GridLayout), dash.tree().kind_of(dash.tree().inner_layout(added).unwrap()));
    assert_no_empty_groups(&dash);
}

#[test]
fn request_remove_drops_an_empty_item_at_once() {
    let (mut dash, rows) = rows_dashboard(&["a", "b"]);
    let events = dash.subscribe();
    let a = dash.tree().children(rows)[0];
    assert_eq!(Ok(true), dash.request_remove_item(a));
    assert_eq!(vec!["b"], titles(dash.tree(), rows));
    assert!(!events.try_iter().any(|e| matches!(e, DashboardEvent::ConfirmationRequested { .. })));

    assert!(dash.undo());
    assert_eq!(vec!["a", "b"], titles(dash.tree(), rows));
}

#[test]
fn request_remove_asks_before_dropping_panels() {
    let (mut dash, tabs) = tabs_dashboard(&["a", "b"]);
    let b = dash.tree().children(tabs)[1];
    let inner = dash.tree().inner_layout(b).unwrap();
    dash.add_panel(inner, panel("p", 0, 0, 12, 8)).unwrap();
    let events = dash.subscribe();
    let revision = dash.tree().revision();

    assert_eq!(Ok(false), dash.request_remove_item(b));
    assert_eq!(
        vec![DashboardEvent::ConfirmationRequested {
            title: "Delete tab?".into(),
            body: "Are you sure you want to remove this tab and all its content?".into(),
            confirm: "Delete".into(),
            dismiss: "Cancel".into(),
        }],
        events.try_iter().collect::<Vec<_>>()
    );
    assert_eq!(revision, dash.tree().revision());
    assert_eq!(vec!["a", "b"], titles(dash.tree(), tabs));
    assert_eq!(vec!["p"], panel_names(dash.tree(), inner));
}
