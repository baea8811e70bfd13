pub mod common;
pub mod dashboard;
pub mod error;
pub mod layout;
pub mod model;
pub mod mutation;

pub use dashboard::Dashboard;
pub use error::LayoutError;
