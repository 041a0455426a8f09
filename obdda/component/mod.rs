//! Connected components of the residual formula and their cache signatures.
#![allow(clippy::module_inception)]
mod component;

pub mod signature;

pub use crate::component::component::*;
pub use crate::component::signature::{PackingContext, Signature};
