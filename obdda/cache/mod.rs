//! Component cache keyed by packed signatures.
#![allow(clippy::module_inception)]
mod cache;

pub use crate::cache::cache::*;
