//! Propositional formulas in conjunctive normal form: the input side of the compiler.
#![allow(clippy::module_inception)]
mod cnf;

pub mod dimacs;
pub(crate) mod formula;
pub mod preprocess;

pub use crate::cnf::cnf::*;
pub use crate::cnf::formula::ClauseId;
