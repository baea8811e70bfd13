//! Flattening a rows or tabs manager back into a single grid.
//!
//! When the content below a manager uses more than one grid kind the caller
//! has to pick the kind of the result. The request then comes back as a
//! [`PendingUngroup`] that remembers what the tree looked like; resuming it
//! after the tree has changed is an error.

use tracing::{debug, info};

use crate::dashboard::{Command, Dashboard, DashboardEvent, EditAction, EditKind};
use crate::error::LayoutError;
use crate::layout::registry::LayoutKind;
use crate::model::tree::NodeId;

#[derive(Debug, PartialEq)]
#[must_use]
pub enum UngroupOutcome {
    /// The manager was replaced by this layout.
    Applied(NodeId),
    NeedsDisambiguation(PendingUngroup),
}

#[derive(Debug, Clone, PartialEq)]
#[must_use = "a pending ungroup does nothing until it is resumed"]
pub struct PendingUngroup {
    manager: NodeId,
    options: Vec<LayoutKind>,
    revision: u64,
}

impl PendingUngroup {
    pub fn manager(&self) -> NodeId { self.manager }

    /// The grid kinds found below the manager, in registry order.
    pub fn options(&self) -> &[LayoutKind] { &self.options }

    pub fn resume(self, dashboard: &mut Dashboard, choice: LayoutKind) -> Result<NodeId, LayoutError> {
        let tree = dashboard.tree();
        let still_group = tree.is_attached(self.manager)
            && tree.kind_of(self.manager).is_ok_and(|k| k.group().is_some());
        if tree.revision() != self.revision
            || !still_group
            || tree.find_all_grid_types(self.manager) != self.options
        {
            debug!(manager = ?self.manager, "stale ungroup request");
            return Err(LayoutError::StaleDisambiguation);
        }
        if !self.options.contains(&choice) {
            return Err(LayoutError::InvalidChoice {
                choice,
                options: join_kinds(&self.options),
            });
        }
        dashboard.ungroup_into(self.manager, choice)
    }

    pub fn cancel(self) {
        debug!(manager = ?self.manager, "ungroup cancelled");
    }
}

impl Dashboard {
    /// Replaces a rows or tabs manager with one grid holding all of its
    /// panels. If the panels sit in grids of different kinds and no `choice`
    /// is given, nothing changes and the caller gets a [`PendingUngroup`].
    pub fn ungroup(
        &mut self,
        manager: NodeId,
        choice: Option<LayoutKind>,
    ) -> Result<UngroupOutcome, LayoutError> {
        self.tree.group_of(manager)?;
        let options = self.tree.find_all_grid_types(manager);
        let target = match choice {
            Some(choice) if !options.is_empty() && !options.contains(&choice) => {
                return Err(LayoutError::InvalidChoice { choice, options: join_kinds(&options) });
            }
            Some(choice) if !choice.is_grid() => {
                return Err(LayoutError::InvalidChoice { choice, options: join_kinds(&options) });
            }
            Some(choice) => choice,
            None if options.len() > 1 => {
                debug!(?manager, ?options, "ungroup needs a layout choice");
                self.publish(DashboardEvent::DisambiguationRequested { manager, options: options.clone() });
                return Ok(UngroupOutcome::NeedsDisambiguation(PendingUngroup {
                    manager,
                    options,
                    revision: self.tree.revision(),
                }));
            }
            None => options.first().copied().unwrap_or(self.tree.settings().grid_kind()),
        };
        self.ungroup_into(manager, target).map(UngroupOutcome::Applied)
    }

    pub(crate) fn ungroup_into(&mut self, manager: NodeId, target: LayoutKind) -> Result<NodeId, LayoutError> {
        let owner = self.tree.owner_of(manager)?;
        let from = self.tree.kind_of(manager)?;
        let merged = self.tree.flatten_group(manager, target)?;
        let command = Command::ReplaceLayout { owner, old: manager, new: merged, origin: None };
        self.perform(EditAction::new(EditKind::Edit, manager, format!("ungroup {from}"), command), false);
        info!(?manager, ?merged, %target, "ungrouped");
        self.publish(DashboardEvent::LayoutSwitched { owner, from, to: target });
        Ok(merged)
    }
}

fn join_kinds(kinds: &[LayoutKind]) -> String {
    kinds.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
