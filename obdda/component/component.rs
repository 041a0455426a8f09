use std::fmt::Display;

use crate::cache::CacheLoc;
use crate::cnf::{formula::Formula, ClauseId};
use crate::component::PackingContext;
use crate::literal::Variable;
use crate::search::trail::Assignment;

/// Residual subproblem: unassigned variables and unsatisfied long clauses
/// that are connected through the clause graph. Both lists are strictly
/// increasing. Equality ignores where the component is cached.
#[derive(Debug, Clone, Eq)]
pub struct Component {
    vars: Vec<Variable>,
    clauses: Vec<ClauseId>,
    caching_loc: Option<CacheLoc>,
}

impl Component {
    #[must_use]
    pub fn new(vars: Vec<Variable>, clauses: Vec<ClauseId>) -> Self {
        debug_assert!(vars.windows(2).all(|w| w[0] < w[1]));
        debug_assert!(clauses.windows(2).all(|w| w[0] < w[1]));
        Component {
            vars,
            clauses,
            caching_loc: None,
        }
    }

    #[must_use]
    pub fn vars(&self) -> &[Variable] {
        &self.vars
    }

    #[must_use]
    pub fn clauses(&self) -> &[ClauseId] {
        &self.clauses
    }

    #[must_use]
    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// Whether the signature of this component packs into the fixed-width
    /// representation under `ctx`.
    #[must_use]
    pub fn is_trivial(&self, ctx: &PackingContext) -> bool {
        ctx.is_small(self.vars.len(), self.clauses.len())
    }

    #[must_use]
    pub fn caching_loc(&self) -> Option<CacheLoc> {
        self.caching_loc
    }

    pub(crate) fn set_caching_loc(&mut self, loc: Option<CacheLoc>) {
        self.caching_loc = loc;
    }

    pub(crate) fn take_caching_loc(&mut self) -> Option<CacheLoc> {
        self.caching_loc.take()
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.vars == other.vars && self.clauses == other.clauses
    }
}

impl Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let vars: Vec<_> = self.vars.iter().map(ToString::to_string).collect();
        let clauses: Vec<_> = self.clauses.iter().map(ToString::to_string).collect();
        write!(f, "{{{}}} [{}]", vars.join(", "), clauses.join(", "))
    }
}

/// Result of splitting a component under the current assignment.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Decomposition {
    pub components: Vec<Component>,
    /// Unassigned variables occurring in no active clause.
    pub free: Vec<Variable>,
}

/// Splits components into connected parts. Keeps stamped scratch buffers so
/// that a call costs time proportional to the parent, not the formula.
#[derive(Debug)]
pub struct Decomposer {
    stamp: u32,
    var_seen: Vec<u32>,
    clause_seen: Vec<u32>,
    queue: Vec<Variable>,
}

impl Decomposer {
    pub(crate) fn new(num_vars: u32, num_clauses: u32) -> Self {
        Decomposer {
            stamp: 0,
            var_seen: vec![0; num_vars as usize + 1],
            clause_seen: vec![0; num_clauses as usize],
            queue: Vec::new(),
        }
    }

    fn next_stamp(&mut self) -> u32 {
        if self.stamp == u32::MAX {
            self.var_seen.fill(0);
            self.clause_seen.fill(0);
            self.stamp = 0;
        }
        self.stamp += 1;
        self.stamp
    }

    /// Partition the unassigned variables of `parent` into components.
    /// Binary clauses only connect variables. A long clause is active while
    /// none of its literals is true and it joins all of its open variables.
    /// Variables touched by no active clause are reported as free.
    pub(crate) fn decompose(
        &mut self,
        parent: &Component,
        formula: &Formula,
        assignment: &Assignment,
    ) -> Decomposition {
        let stamp = self.next_stamp();
        let mut decomposition = Decomposition::default();

        for &root in parent.vars() {
            if assignment.is_assigned(root) || self.var_seen[root.index()] == stamp {
                continue;
            }

            self.var_seen[root.index()] = stamp;
            self.queue.clear();
            self.queue.push(root);
            let mut vars = vec![root];
            let mut clauses = Vec::new();

            while let Some(var) = self.queue.pop() {
                for lit in [var.positive(), var.negative()] {
                    for &implied in formula.implications(lit) {
                        let other = implied.variable();
                        if !assignment.is_assigned(other) && self.var_seen[other.index()] != stamp {
                            self.var_seen[other.index()] = stamp;
                            self.queue.push(other);
                            vars.push(other);
                        }
                    }
                }

                for &clause in formula.var_clauses(var) {
                    if self.clause_seen[clause.index()] == stamp {
                        continue;
                    }
                    self.clause_seen[clause.index()] = stamp;

                    let literals = formula.clause(clause);
                    if literals.iter().any(|&lit| assignment.is_true(lit)) {
                        continue;
                    }
                    debug_assert!(
                        parent.clauses().binary_search(&clause).is_ok(),
                        "active clause {clause} escapes its component"
                    );

                    clauses.push(clause);
                    for lit in literals {
                        let other = lit.variable();
                        if !assignment.is_assigned(other) && self.var_seen[other.index()] != stamp {
                            self.var_seen[other.index()] = stamp;
                            self.queue.push(other);
                            vars.push(other);
                        }
                    }
                }
            }

            if vars.len() == 1 && clauses.is_empty() {
                decomposition.free.push(root);
            } else {
                vars.sort_unstable();
                clauses.sort_unstable();
                decomposition.components.push(Component::new(vars, clauses));
            }
        }

        decomposition
    }
}
