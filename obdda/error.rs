use thiserror::Error;

/// Errors reported by the compiler and the counter.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("component cache uses {used} bytes, exceeding the limit of {limit} bytes")]
    MemoryLimitExceeded { used: usize, limit: usize },

    #[error("diagram has {nodes} nodes after compaction, exceeding the limit of {limit}")]
    NodeLimitExceeded { nodes: usize, limit: usize },

    #[error("literal {literal} does not refer to a variable in 1..={num_vars}")]
    InvalidLiteral { literal: i64, num_vars: u32 },

    #[error("expected {expected} variables but got {found}")]
    VariableCountMismatch { expected: u32, found: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;
