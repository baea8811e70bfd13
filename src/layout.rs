mod convert;
pub mod element;
pub mod grid;
mod group;
mod layout_tree;
pub mod legacy;
pub mod manager;
pub mod nesting;
pub mod path;
pub mod registry;
pub mod rows;
pub mod save_model;
pub mod tabs;
pub mod ungroup;

pub use element::{Element, GridPlacement, Panel};
pub use layout_tree::{LayoutTree, TreeSettings};
pub use manager::{LayoutBehavior, LayoutManager};
pub use nesting::NestingPolicy;
pub use path::LayoutPath;
pub use registry::{Category, GroupKind, LayoutKind};
pub use save_model::{DashboardSpec, LayoutSpec};
pub use ungroup::{PendingUngroup, UngroupOutcome};

#[cfg(test)]
pub(crate) mod tests;
