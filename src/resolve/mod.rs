//! Resolution: raw document views + customization context → resolved trees.

pub mod context;
pub mod resolver;
pub mod tree;
