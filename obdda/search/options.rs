use std::time::Duration;

use bon::Builder;
use clap::ValueEnum;

/// How literals implied by the current assignment are discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImplicationStrategy {
    /// Unit propagation over binary and long clauses.
    Bcp,
    /// Unit propagation plus failed-literal probing on the component's variables.
    FailedLiteral,
}

#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Clone, Builder)]
pub struct SearchOptions {
    /// Cache size in bytes above which the cache is cleared down to the
    /// entries still in use.
    #[builder(default = 1 << 30)]
    pub cache_memory_budget: usize,

    /// Hard cap on the cache size in bytes. Exceeding it even after a clear
    /// aborts the search.
    pub memory_limit: Option<usize>,

    /// Factor applied to the clearing threshold after every clear.
    #[builder(default = 0.75)]
    pub cache_shrink_factor: f64,

    /// Diagram size triggering compaction of unreachable nodes.
    #[builder(default = 1_000_000)]
    pub node_removal_trigger: usize,

    /// Factor the compaction trigger grows by when a compaction frees less
    /// than half of the nodes.
    #[builder(default = 2.0)]
    pub node_growth_factor: f64,

    /// Hard cap on the number of diagram nodes.
    pub node_limit: Option<usize>,

    /// Components found deeper than this many decisions are not cached.
    pub max_cache_depth: Option<usize>,

    #[builder(default = ImplicationStrategy::Bcp)]
    pub implication: ImplicationStrategy,

    /// Wall-clock budget. The search reports a timeout once it is spent.
    pub timeout: Option<Duration>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions::builder().build()
    }
}
