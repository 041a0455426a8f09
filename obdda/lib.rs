//! Compiles CNF formulas into decision-decomposition diagrams and counts
//! their (weighted) models, both by a component-caching search.
pub mod cache;
pub mod cnf;
pub mod component;
pub mod count;
pub mod diagram;
pub(crate) mod dot_writer;
pub mod error;
pub mod literal;
pub mod order;
pub mod search;
pub(crate) mod util;

pub use error::{Error, Result};
pub use search::{compile, count, Outcome};
