//! Variable orders steering the branching of the search.
use std::collections::BTreeSet;

use clap::ValueEnum;

use crate::cnf::Cnf;
use crate::error::{Error, Result};
use crate::literal::Variable;

/// How to construct the [`VariableOrder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrderStrategy {
    /// Branch on variables by increasing index.
    Lexicographic,
    /// Reverse of a greedy min-fill elimination order of the primal graph.
    MinFill,
}

/// Total order on the variables of a formula. Every diagram and every
/// branching decision respects this order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableOrder {
    order: Vec<Variable>,
    /// `rank[v]` is the position of `v` in `order`. Index 0 is unused.
    rank: Vec<u32>,
}

impl VariableOrder {
    #[must_use]
    pub fn lexicographic(num_vars: u32) -> VariableOrder {
        let order = (1..=num_vars).map(Variable).collect();
        VariableOrder::from_sequence(order)
    }

    #[must_use]
    pub fn build(strategy: OrderStrategy, cnf: &Cnf) -> VariableOrder {
        match strategy {
            OrderStrategy::Lexicographic => VariableOrder::lexicographic(cnf.num_vars()),
            OrderStrategy::MinFill => VariableOrder::min_fill(cnf),
        }
    }

    /// Order given explicitly. It must be a permutation of `1..=num_vars`.
    pub fn from_variables(num_vars: u32, order: Vec<Variable>) -> Result<VariableOrder> {
        let mut seen = vec![false; num_vars as usize + 1];
        for var in &order {
            if var.id() == 0 || var.id() > num_vars || seen[var.index()] {
                return Err(Error::InvalidLiteral {
                    literal: i64::from(var.id()),
                    num_vars,
                });
            }
            seen[var.index()] = true;
        }

        if order.len() != num_vars as usize {
            return Err(Error::VariableCountMismatch {
                expected: num_vars,
                found: order.len() as u32,
            });
        }

        Ok(VariableOrder::from_sequence(order))
    }

    fn from_sequence(order: Vec<Variable>) -> VariableOrder {
        let mut rank = vec![u32::MAX; order.len() + 1];
        for (position, var) in order.iter().enumerate() {
            rank[var.index()] = position as u32;
        }
        VariableOrder { order, rank }
    }

    /// Greedy min-fill elimination on the primal graph of `cnf`. Ties are
    /// broken by degree and then by index. Variables eliminated last come
    /// first in the order.
    #[tracing::instrument(skip_all, fields(vars = cnf.num_vars()))]
    #[must_use]
    pub fn min_fill(cnf: &Cnf) -> VariableOrder {
        let n = cnf.num_vars() as usize;
        let mut graph: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n + 1];
        for clause in cnf.clauses() {
            for (i, a) in clause.iter().enumerate() {
                for b in &clause[i + 1..] {
                    if a.variable() != b.variable() {
                        graph[a.variable().index()].insert(b.variable().index());
                        graph[b.variable().index()].insert(a.variable().index());
                    }
                }
            }
        }

        let mut eliminated = vec![false; n + 1];
        let mut elimination = Vec::with_capacity(n);
        for _ in 0..n {
            let Some(next) = (1..=n)
                .filter(|&v| !eliminated[v])
                .min_by_key(|&v| (fill_in(&graph, v), graph[v].len(), v))
            else {
                break;
            };

            let neighbours: Vec<usize> = graph[next].iter().copied().collect();
            for (i, &a) in neighbours.iter().enumerate() {
                graph[a].remove(&next);
                for &b in &neighbours[i + 1..] {
                    graph[a].insert(b);
                    graph[b].insert(a);
                }
            }
            graph[next].clear();
            eliminated[next] = true;
            elimination.push(Variable(next as u32));
        }

        elimination.reverse();
        VariableOrder::from_sequence(elimination)
    }

    #[must_use]
    pub fn rank(&self, var: Variable) -> u32 {
        self.rank[var.index()]
    }

    #[must_use]
    pub fn variables(&self) -> &[Variable] {
        &self.order
    }

    #[must_use]
    pub fn len(&self) -> u32 {
        self.order.len() as u32
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Variable of lowest rank among `vars`.
    pub(crate) fn first_of(&self, vars: &[Variable]) -> Option<Variable> {
        vars.iter().copied().min_by_key(|&var| self.rank(var))
    }
}

/// Number of edges missing among the neighbours of `v`.
fn fill_in(graph: &[BTreeSet<usize>], v: usize) -> usize {
    let neighbours: Vec<usize> = graph[v].iter().copied().collect();
    let mut missing = 0;
    for (i, a) in neighbours.iter().enumerate() {
        for b in &neighbours[i + 1..] {
            if !graph[*a].contains(b) {
                missing += 1;
            }
        }
    }
    missing
}

#[cfg(test)]
mod test {
    use super::VariableOrder;
    use crate::cnf::Cnf;
    use crate::literal::Variable;
    use pretty_assertions::assert_eq;

    #[test]
    fn lexicographic_ranks() {
        let order = VariableOrder::lexicographic(3);
        assert_eq!(order.rank(Variable::new(1)), 0);
        assert_eq!(order.rank(Variable::new(3)), 2);
        assert_eq!(
            order.first_of(&[Variable::new(3), Variable::new(2)]),
            Some(Variable::new(2))
        );
    }

    #[test]
    fn min_fill_is_a_permutation() {
        let cnf = Cnf::from_dimacs_clauses(
            5,
            &[vec![1, 2], vec![2, 3, -4], vec![4, 5], vec![-1, 5]],
        )
        .unwrap();
        let order = VariableOrder::min_fill(&cnf);

        let mut vars = order.variables().to_vec();
        vars.sort();
        assert_eq!(vars, (1..=5).map(Variable::new).collect::<Vec<_>>());
        for (position, var) in order.variables().iter().enumerate() {
            assert_eq!(order.rank(*var) as usize, position);
        }
    }

    #[test]
    fn min_fill_eliminates_leaves_first() {
        // A path 1 - 2 - 3: the endpoints have no fill-in, so 1 goes first
        // and the middle variable ends up before the leaf eliminated first.
        let cnf = Cnf::from_dimacs_clauses(3, &[vec![1, 2], vec![2, 3]]).unwrap();
        let order = VariableOrder::min_fill(&cnf);

        assert_eq!(*order.variables().last().unwrap(), Variable::new(1));
    }

    #[test]
    fn explicit_order_validation() {
        assert!(VariableOrder::from_variables(2, vec![Variable::new(2), Variable::new(1)]).is_ok());
        assert!(VariableOrder::from_variables(2, vec![Variable::new(2), Variable::new(2)]).is_err());
        assert!(VariableOrder::from_variables(3, vec![Variable::new(1)]).is_err());
    }
}
