//! Iterative component-caching search shared by compilation and counting.
//!
//! Each level of the search owns a slice of the trail, of the component
//! stack, of the free variables and of the result stack. A level solves its
//! sibling components one after another, branching on the lowest-ranked
//! variable of each; the branches run as child levels. When every sibling is
//! solved, the level conjoins its implied literals, free variables and
//! sibling values and hands the result to its parent.
use std::time::Instant;

use rustc_hash::FxHashSet;

use crate::cache::{CacheLoc, ComponentCache, Erasure};
use crate::cnf::formula::Formula;
use crate::component::{Component, Decomposer, PackingContext};
use crate::error::{Error, Result};
use crate::literal::{Literal, Variable};
use crate::order::VariableOrder;
use crate::search::combinator::Combinator;
use crate::search::options::SearchOptions;
use crate::search::propagation::{oracle, Conflict, ImpliedLiterals};
use crate::search::statistics::Statistics;
use crate::search::trail::{Reason, Trail};
use crate::search::Outcome;

/// How often, in steps, the clock is consulted.
const TIMEOUT_CHECK_INTERVAL: u64 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LevelState {
    /// Propagate, then split the target component into siblings.
    Preparing,
    /// Pick the next unsolved sibling and descend into its negative branch.
    Branching,
    /// The negative branch returned; descend into the positive one or, if
    /// the negative branch failed, assign the positive literal here.
    NegativeBranch,
    /// Both branches returned; combine them into the sibling's value.
    Combining,
}

#[derive(Debug, Clone)]
struct Level {
    state: LevelState,
    /// Component this level solves a branch of.
    comp: usize,
    decision: Option<Literal>,
    trail_start: usize,
    comp_start: usize,
    free_start: usize,
    result_base: usize,
    /// Next sibling to solve.
    active: usize,
    /// Component decomposed by the next `Preparing` step.
    target: usize,
    propagate_from: usize,
    branch_var: Option<Variable>,
}

pub(crate) struct Engine<'a, C: Combinator> {
    formula: &'a Formula,
    order: &'a VariableOrder,
    options: &'a SearchOptions,
    combinator: C,
    oracle: Box<dyn ImpliedLiterals>,
    decomposer: Decomposer,
    cache: ComponentCache<C::Value>,
    /// Link pending cache entries to the entry of their parent component.
    linked: bool,
    trail: Trail,
    comps: Vec<Component>,
    free: Vec<Variable>,
    levels: Vec<Level>,
    results: Vec<C::Value>,
    /// Deepest level below the last failed level that its conflict depended
    /// on. Consumed by the parent of the failed level.
    failure_dependency: Option<usize>,
    cache_trigger: usize,
    statistics: Statistics,
    started: Instant,
    steps: u64,
}

impl<'a, C: Combinator> Engine<'a, C> {
    pub(crate) fn new(
        formula: &'a Formula,
        order: &'a VariableOrder,
        options: &'a SearchOptions,
        combinator: C,
        linked: bool,
    ) -> Self {
        let ctx = PackingContext::new(formula.num_vars(), formula.num_long_clauses());
        Engine {
            formula,
            order,
            options,
            combinator,
            oracle: oracle(options.implication),
            decomposer: Decomposer::new(formula.num_vars(), formula.num_long_clauses()),
            cache: ComponentCache::new(ctx),
            linked,
            trail: Trail::new(formula.num_vars()),
            comps: Vec::new(),
            free: Vec::new(),
            levels: Vec::new(),
            results: Vec::new(),
            failure_dependency: None,
            cache_trigger: options.cache_memory_budget,
            statistics: Statistics::default(),
            started: Instant::now(),
            steps: 0,
        }
    }

    /// Run the search to completion or until the time budget is spent.
    pub(crate) fn run(&mut self) -> Result<Outcome<C::Value>> {
        self.started = Instant::now();
        if !self.start() {
            tracing::debug!("formula refuted before the search");
            return Ok(Outcome::Finished(self.combinator.contradiction()));
        }

        while !self.levels.is_empty() {
            if self.out_of_time() {
                tracing::info!(
                    decisions = self.statistics.decisions,
                    "search timed out"
                );
                self.abandon();
                return Ok(Outcome::TimedOut);
            }
            self.step()?;
        }

        debug_assert_eq!(self.results.len(), 1);
        let value = self
            .results
            .pop()
            .unwrap_or_else(|| self.combinator.contradiction());
        tracing::debug!(
            decisions = self.statistics.decisions,
            conflicts = self.statistics.conflicts,
            cache_entries = self.cache.len(),
            "search finished"
        );
        Ok(Outcome::Finished(value))
    }

    /// Set up the root level. Returns false if the formula is refuted by its units.
    fn start(&mut self) -> bool {
        if !self.formula.is_satisfiable() {
            return false;
        }

        for &unit in self.formula.units() {
            match self.trail.value(unit) {
                Some(false) => return false,
                Some(true) => {}
                None => self.trail.push(unit),
            }
        }

        self.comps.push(Component::new(
            self.formula.variables().collect(),
            self.formula.clause_ids().collect(),
        ));
        self.levels.push(Level {
            state: LevelState::Preparing,
            comp: 0,
            decision: None,
            trail_start: 0,
            comp_start: 1,
            free_start: 0,
            result_base: 0,
            active: 1,
            target: 0,
            propagate_from: 0,
            branch_var: None,
        });
        true
    }

    fn out_of_time(&mut self) -> bool {
        let check = self.steps % TIMEOUT_CHECK_INTERVAL == 0;
        self.steps += 1;
        check
            && self
                .options
                .timeout
                .is_some_and(|timeout| self.started.elapsed() >= timeout)
    }

    /// Advance the state machine of the deepest level by one transition.
    pub(crate) fn step(&mut self) -> Result<()> {
        let Some(level) = self.levels.last() else {
            return Ok(());
        };

        match level.state {
            LevelState::Preparing => {
                self.prepare();
                Ok(())
            }
            LevelState::Branching => self.branch(),
            LevelState::NegativeBranch => {
                self.negative_branch();
                Ok(())
            }
            LevelState::Combining => self.combine(),
        }
    }

    fn prepare(&mut self) {
        let depth = self.levels.len() - 1;
        let Level {
            comp,
            target,
            propagate_from,
            ..
        } = self.levels[depth];

        if let Err(conflict) =
            self.oracle
                .imply(self.formula, &self.comps[target], &mut self.trail, propagate_from)
        {
            self.statistics.conflicts += 1;
            match self.analyze(&conflict) {
                Some((failed, dependency)) => {
                    tracing::trace!(depth, failed, dependency, "conflict");
                    self.fail_from(failed.min(depth), Some(dependency));
                }
                None => {
                    tracing::trace!(depth, "conflict");
                    self.fail_level();
                }
            }
            return;
        }

        let decomposition =
            self.decomposer
                .decompose(&self.comps[target], self.formula, self.trail.assignment());
        self.free.extend(decomposition.free);

        let cacheable =
            !matches!(self.options.max_cache_depth, Some(max_depth) if depth > max_depth);
        let parent = self.comps[comp].caching_loc();

        for mut component in decomposition.components {
            self.statistics.components += 1;
            if cacheable {
                let loc = self.cache.hit_or_insert(&mut component);
                if self.linked && !self.cache.is_known(loc) && self.cache.parent(loc).is_none() {
                    if let Some(parent) = parent.filter(|&parent| parent != loc) {
                        self.cache.connect_child(parent, loc);
                    }
                }
            }
            self.comps.push(component);
        }

        self.levels[depth].state = LevelState::Branching;
    }

    fn branch(&mut self) -> Result<()> {
        let depth = self.levels.len() - 1;
        loop {
            let active = self.levels[depth].active;
            if active >= self.comps.len() {
                return self.finish_level();
            }

            let cached = self.comps[active]
                .caching_loc()
                .and_then(|loc| self.cache.value(loc));
            if let Some(value) = cached {
                if self.combinator.is_contradiction(value) {
                    self.fail_level();
                    return Ok(());
                }

                let value = value.clone();
                self.results.push(value);
                self.levels[depth].active += 1;
                continue;
            }

            let var = self
                .order
                .first_of(self.comps[active].vars())
                .unwrap_or_else(|| unreachable!("components have at least one variable"));
            let level = &mut self.levels[depth];
            level.branch_var = Some(var);
            level.state = LevelState::NegativeBranch;
            self.push_level(active, var.negative());
            return Ok(());
        }
    }

    fn push_level(&mut self, comp: usize, decision: Literal) {
        let trail_start = self.trail.len();
        self.trail.assign(decision, Reason::Decision);
        self.levels.push(Level {
            state: LevelState::Preparing,
            comp,
            decision: Some(decision),
            trail_start,
            comp_start: self.comps.len(),
            free_start: self.free.len(),
            result_base: self.results.len(),
            active: self.comps.len(),
            target: comp,
            propagate_from: trail_start,
            branch_var: None,
        });

        self.statistics.decisions += 1;
        self.statistics.max_depth = self.statistics.max_depth.max(self.levels.len() - 1);
    }

    fn branch_var(&self, depth: usize) -> Variable {
        self.levels[depth]
            .branch_var
            .unwrap_or_else(|| unreachable!("level {depth} has not branched"))
    }

    fn negative_branch(&mut self) {
        let depth = self.levels.len() - 1;
        let active = self.levels[depth].active;
        let var = self.branch_var(depth);
        let dependency = self.failure_dependency.take();

        let failed = self
            .results
            .last()
            .is_some_and(|value| self.combinator.is_contradiction(value));
        if !failed {
            self.levels[depth].state = LevelState::Combining;
            self.push_level(active, var.positive());
            return;
        }

        // Only the positive branch is left: assign it on this level and
        // split what remains of the sibling.
        self.results.pop();
        self.statistics.failed_branches += 1;
        if let Some(loc) = self.comps[active].take_caching_loc() {
            self.erase(loc);
        }

        let propagate_from = self.trail.len();
        self.trail.assign(
            var.positive(),
            Reason::FailedBranch(dependency.map(|level| level.min(depth))),
        );
        let level = &mut self.levels[depth];
        level.target = active;
        level.propagate_from = propagate_from;
        level.active = active + 1;
        level.branch_var = None;
        level.state = LevelState::Preparing;
    }

    fn combine(&mut self) -> Result<()> {
        let depth = self.levels.len() - 1;
        let active = self.levels[depth].active;
        let var = self.branch_var(depth);
        self.failure_dependency = None;

        let high = self.results.pop();
        let low = self.results.pop();
        let (Some(low), Some(high)) = (low, high) else {
            unreachable!("both branches of {var} must have returned");
        };

        let value = self.combinator.decide(var, low, high);
        if let Some(loc) = self.comps[active].caching_loc() {
            if self.linked {
                self.cache.set_isolated(loc);
            }
            self.cache.store(loc, value.clone());
        }
        self.results.push(value);

        let level = &mut self.levels[depth];
        level.active += 1;
        level.branch_var = None;
        level.state = LevelState::Branching;

        self.govern_cache()?;
        self.collect_if_needed()
    }

    /// Conjoin everything the deepest level found and return to its parent.
    fn finish_level(&mut self) -> Result<()> {
        let Some(level) = self.levels.pop() else {
            return Ok(());
        };

        let children = self.results.split_off(level.result_base);
        let skip = usize::from(level.decision.is_some());
        let implied = &self.trail.literals()[level.trail_start + skip..];
        let free = &self.free[level.free_start..];
        let value = self.combinator.conjoin(implied, free, children);

        self.trail.truncate(level.trail_start);
        self.comps.truncate(level.comp_start);
        self.free.truncate(level.free_start);
        self.results.push(value);

        self.collect_if_needed()
    }

    /// The deepest level is unsatisfiable: drop it and report a contradiction.
    fn fail_level(&mut self) {
        self.fail_from(self.levels.len() - 1, None);
    }

    /// Level `failed` is unsatisfiable: drop it with every level above it and
    /// report a contradiction to its parent. `dependency` is the deepest
    /// level below `failed` the contradiction rests on, if it is known.
    fn fail_from(&mut self, failed: usize, dependency: Option<usize>) {
        let depth = self.levels.len() - 1;
        if failed < depth {
            tracing::trace!(from = depth, to = failed, "backjump");
            self.statistics.levels_skipped += depth - failed;
        }
        self.backjump(failed);
        self.results.push(self.combinator.contradiction());
        self.failure_dependency = dependency;
        self.statistics.backjumps += 1;
    }

    /// Trace the conflict back through the trail to the decisions and failed
    /// branches it rests on. Returns the deepest level involved, which the
    /// conflict makes unsatisfiable, and the deepest level below it the
    /// conflict still depends on. `None` if a failed branch it rests on did
    /// not come from a conflict.
    fn analyze(&self, conflict: &Conflict) -> Option<(usize, usize)> {
        let mut seen = FxHashSet::default();
        let mut pending = conflict.antecedents.clone();
        // Levels whose decision is involved, and levels whose whole prefix
        // of the trail is.
        let mut decisions = Vec::new();
        let mut prefixes = Vec::new();

        while let Some(lit) = pending.pop() {
            let var = lit.variable();
            if !seen.insert(var) {
                continue;
            }
            let Some((position, reason)) = self.trail.reason(var) else {
                continue;
            };
            match reason {
                Reason::Decision => decisions.push(self.level_at(position)),
                Reason::Assumed => prefixes.push(self.level_at(position)),
                Reason::FailedBranch(dependency) => prefixes.push(dependency?),
                Reason::Implication(source) => pending.push(source),
                Reason::Clause(clause) => pending.extend(
                    self.formula
                        .clause(clause)
                        .iter()
                        .filter(|other| other.variable() != var)
                        .map(|&other| !other),
                ),
            }
        }

        let failed = decisions.iter().chain(&prefixes).copied().max()?;
        let below = decisions
            .iter()
            .copied()
            .filter(|&level| level < failed)
            .chain(
                prefixes
                    .iter()
                    .map(|&level| if level == failed { failed.saturating_sub(1) } else { level }),
            )
            .max()
            .unwrap_or(0);
        Some((failed, below))
    }

    /// Level whose slice of the trail holds `position`.
    fn level_at(&self, position: usize) -> usize {
        self.levels
            .partition_point(|level| level.trail_start <= position)
            .saturating_sub(1)
    }

    /// Pop every level from `target` on, restoring the trail, component,
    /// free-variable and result stacks to where `target` found them. Pending
    /// cache entries of the abandoned components are erased.
    pub(crate) fn backjump(&mut self, target: usize) {
        let Some(level) = self.levels.get(target) else {
            return;
        };
        let (trail_start, comp_start, free_start, result_base) = (
            level.trail_start,
            level.comp_start,
            level.free_start,
            level.result_base,
        );

        let mut abandoned: Vec<CacheLoc> = self.comps[comp_start..]
            .iter()
            .filter_map(Component::caching_loc)
            .filter(|&loc| !self.cache.is_known(loc))
            .collect();

        self.trail.truncate(trail_start);
        self.comps.truncate(comp_start);
        self.free.truncate(free_start);
        self.results.truncate(result_base);
        self.levels.truncate(target);

        while let Some(loc) = abandoned.pop() {
            for erasure in self.erase(loc) {
                abandoned = abandoned
                    .into_iter()
                    .filter_map(|pending| erasure.relocate(pending))
                    .collect();
            }
        }
    }

    /// Erase a pending entry, with its linked subtree in linked mode, and
    /// update the components pointing into the cache.
    fn erase(&mut self, loc: CacheLoc) -> Vec<Erasure> {
        let erasures = if self.linked {
            self.cache.reset_subtree(loc)
        } else {
            vec![self.cache.erase(loc)]
        };

        for erasure in &erasures {
            for comp in &mut self.comps {
                if let Some(current) = comp.caching_loc() {
                    comp.set_caching_loc(erasure.relocate(current));
                }
            }
        }

        erasures
    }

    /// Drop everything but the search stack from the cache once it grows
    /// past its budget.
    fn govern_cache(&mut self) -> Result<()> {
        let used = self.cache.memory_bytes();
        self.statistics.cache_peak_bytes = self.statistics.cache_peak_bytes.max(used);
        if used <= self.cache_trigger {
            return Ok(());
        }

        let keep: Vec<CacheLoc> = self
            .comps
            .iter()
            .filter_map(Component::caching_loc)
            .collect();
        let mut kept = self.cache.clear_keeping(&keep).into_iter();
        for comp in &mut self.comps {
            if comp.caching_loc().is_some() {
                comp.set_caching_loc(kept.next());
            }
        }

        let used = self.cache.memory_bytes();
        self.cache_trigger =
            ((self.cache_trigger as f64 * self.options.cache_shrink_factor) as usize).max(2 * used);
        tracing::warn!(used, trigger = self.cache_trigger, "cleared component cache");

        self.collect_garbage()?;

        match self.options.memory_limit {
            Some(limit) if used > limit => Err(Error::MemoryLimitExceeded { used, limit }),
            _ => Ok(()),
        }
    }

    fn collect_if_needed(&mut self) -> Result<()> {
        if self.combinator.wants_collection() {
            self.collect_garbage()
        } else {
            Ok(())
        }
    }

    /// Let the combinator release storage not reachable from the result
    /// stack or from known cache values.
    fn collect_garbage(&mut self) -> Result<()> {
        let mut live: Vec<&mut C::Value> = self.results.iter_mut().collect();
        live.extend(self.cache.values_mut());
        let removed = self.combinator.collect_garbage(&mut live)?;

        if removed > 0 {
            self.statistics.compactions += 1;
            self.statistics.nodes_removed += removed;
        }
        Ok(())
    }

    /// Unwind every level after a timeout.
    fn abandon(&mut self) {
        self.backjump(0);
        self.results.clear();
    }

    pub(crate) fn statistics(&self) -> Statistics {
        Statistics {
            cache: self.cache.statistics(),
            cache_entries: self.cache.len(),
            elapsed: self.started.elapsed(),
            ..self.statistics.clone()
        }
    }

    pub(crate) fn into_combinator(self) -> C {
        self.combinator
    }
}
