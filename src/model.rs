pub mod title;
pub mod tree;
