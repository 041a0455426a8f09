use std::fmt::Display;
use std::time::Duration;

use tabled::{builder::Builder, settings::Style};

use crate::cache::CacheStatistics;

/// Counters collected during one search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statistics {
    pub decisions: usize,
    pub conflicts: usize,
    pub backjumps: usize,
    /// Levels popped by backjumps beyond the one that conflicted.
    pub levels_skipped: usize,
    /// Literals assigned because the opposite branch turned out false.
    pub failed_branches: usize,
    pub max_depth: usize,
    pub components: usize,
    pub cache: CacheStatistics,
    pub cache_entries: usize,
    pub cache_peak_bytes: usize,
    pub compactions: usize,
    pub nodes_removed: usize,
    pub diagram_nodes: Option<usize>,
    pub elapsed: Duration,
}

impl Display for Statistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut builder = Builder::default();
        builder.push_record(["statistic", "value"]);

        let mut row = |name: &str, value: String| {
            builder.push_record([name.to_owned(), value]);
        };
        row("time", format!("{:.2?}", self.elapsed));
        row("decisions", self.decisions.to_string());
        row("conflicts", self.conflicts.to_string());
        row("backjumps", self.backjumps.to_string());
        row("levels skipped", self.levels_skipped.to_string());
        row("failed branches", self.failed_branches.to_string());
        row("max depth", self.max_depth.to_string());
        row("components", self.components.to_string());
        row("cache lookups", self.cache.lookups.to_string());
        row("cache hits", self.cache.hits.to_string());
        row("cache misses", self.cache.misses.to_string());
        row("cache erasures", self.cache.erasures.to_string());
        row("cache clears", self.cache.clears.to_string());
        row("cache entries", self.cache_entries.to_string());
        row("cache peak bytes", self.cache_peak_bytes.to_string());
        row("compactions", self.compactions.to_string());
        row("nodes removed", self.nodes_removed.to_string());
        if let Some(nodes) = self.diagram_nodes {
            row("diagram nodes", nodes.to_string());
        }

        let output = builder.build().with(Style::psql()).to_string();
        write!(f, "{output}")
    }
}

#[cfg(test)]
mod test {
    use super::Statistics;
    use crate::cache::CacheStatistics;

    #[test]
    fn renders_table() {
        let statistics = Statistics {
            decisions: 12,
            cache: CacheStatistics {
                misses: 7,
                ..Default::default()
            },
            diagram_nodes: Some(40),
            ..Default::default()
        };
        let table = statistics.to_string();

        assert!(table.contains("decisions"));
        assert!(table.contains("12"));
        assert!(table.contains("diagram nodes"));
        assert!(table
            .lines()
            .any(|line| line.contains("cache misses") && line.contains('7')));
    }
}
