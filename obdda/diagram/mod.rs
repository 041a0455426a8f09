//! Decision diagrams with finest conjunctions: decision nodes on single
//! variables and decomposable conjunction nodes, kept canonical for a fixed
//! variable order.
mod count;
mod manager;
mod node;

pub use crate::diagram::manager::*;
pub use crate::diagram::node::*;
