//! Compilation and counting entry points.
pub mod combinator;
mod engine;
pub mod options;
mod propagation;
pub mod statistics;
pub(crate) mod trail;

use num_bigint::BigUint;

use crate::cnf::formula::Formula;
use crate::cnf::preprocess::{Preprocess, Preprocessed, UnitSimplifier};
use crate::cnf::Cnf;
use crate::count::{LiteralWeights, Weight};
use crate::diagram::{DiagramManager, NodeId};
use crate::error::{Error, Result};
use crate::order::VariableOrder;
use combinator::{DiagramBuilder, WeightedCounter};
use engine::Engine;
use options::SearchOptions;
use statistics::Statistics;

/// Result of a search that may run out of time. A timeout is never a count
/// of zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Finished(T),
    TimedOut,
}

impl<T> Outcome<T> {
    #[must_use]
    pub fn finished(self) -> Option<T> {
        match self {
            Outcome::Finished(value) => Some(value),
            Outcome::TimedOut => None,
        }
    }

    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Outcome::TimedOut)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Finished(value) => Outcome::Finished(f(value)),
            Outcome::TimedOut => Outcome::TimedOut,
        }
    }
}

/// A compiled diagram together with the manager owning its nodes.
#[derive(Debug)]
pub struct Compilation {
    pub manager: DiagramManager,
    pub root: NodeId,
    pub statistics: Statistics,
}

impl Compilation {
    #[must_use]
    pub fn model_count(&self) -> BigUint {
        self.manager.count(self.root)
    }
}

#[derive(Debug, Clone)]
pub struct Counted<W> {
    pub count: W,
    pub statistics: Statistics,
}

/// Compile `cnf` into a diagram over `order`.
#[tracing::instrument(skip_all, fields(vars = cnf.num_vars(), clauses = cnf.num_clauses()))]
pub fn compile(
    cnf: &Cnf,
    order: &VariableOrder,
    options: &SearchOptions,
) -> Result<Outcome<Compilation>> {
    check_variables(cnf.num_vars(), order.len())?;
    compile_preprocessed(&UnitSimplifier.preprocess(cnf), order, options)
}

/// Compile a formula that went through a [`Preprocess`] pass.
#[tracing::instrument(skip_all)]
pub fn compile_preprocessed(
    preprocessed: &Preprocessed,
    order: &VariableOrder,
    options: &SearchOptions,
) -> Result<Outcome<Compilation>> {
    check_variables(preprocessed.cnf.num_vars(), order.len())?;
    let formula = Formula::from_preprocessed(preprocessed);
    let builder = DiagramBuilder::new(DiagramManager::new(order), options);

    let mut engine = Engine::new(&formula, order, options, builder, false);
    let outcome = engine.run()?;
    let mut statistics = engine.statistics();
    let manager = engine.into_combinator().into_manager();

    Ok(outcome.map(|root| {
        let nodes = manager.size(root);
        statistics.diagram_nodes = Some(nodes);
        tracing::info!(
            nodes,
            decisions = statistics.decisions,
            "compiled"
        );
        Compilation {
            manager,
            root,
            statistics,
        }
    }))
}

/// Weighted model count of `cnf`, branching along `order`.
#[tracing::instrument(skip_all, fields(vars = cnf.num_vars(), clauses = cnf.num_clauses()))]
pub fn count<W: Weight>(
    cnf: &Cnf,
    order: &VariableOrder,
    weights: &LiteralWeights<W>,
    options: &SearchOptions,
) -> Result<Outcome<Counted<W>>> {
    check_variables(cnf.num_vars(), order.len())?;
    count_preprocessed(&UnitSimplifier.preprocess(cnf), order, weights, options)
}

#[tracing::instrument(skip_all)]
pub fn count_preprocessed<W: Weight>(
    preprocessed: &Preprocessed,
    order: &VariableOrder,
    weights: &LiteralWeights<W>,
    options: &SearchOptions,
) -> Result<Outcome<Counted<W>>> {
    let num_vars = preprocessed.cnf.num_vars();
    check_variables(num_vars, order.len())?;
    check_variables(num_vars, weights.num_vars())?;

    let formula = Formula::from_preprocessed(preprocessed);
    let mut engine = Engine::new(&formula, order, options, WeightedCounter::new(weights), true);
    let outcome = engine.run()?;
    let statistics = engine.statistics();
    tracing::info!(
        decisions = statistics.decisions,
        timed_out = outcome.is_timed_out(),
        "counted"
    );

    Ok(outcome.map(|count| Counted { count, statistics }))
}

fn check_variables(expected: u32, found: u32) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::VariableCountMismatch { expected, found })
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::{compile, count, Outcome};
    use crate::cnf::Cnf;
    use crate::count::LiteralWeights;
    use crate::error::Error;
    use crate::literal::Literal;
    use crate::order::{OrderStrategy, VariableOrder};
    use crate::search::options::{ImplicationStrategy, SearchOptions};
    use crate::util::{brute_force_count, random_cnf};
    use num_bigint::BigUint;
    use pretty_assertions::assert_eq;

    fn skewed_weights(num_vars: u32) -> LiteralWeights<f64> {
        (1..=num_vars as i32).fold(LiteralWeights::unweighted(num_vars), |weights, var| {
            let positive = f64::from(var % 4 + 1) / 8.0;
            weights
                .with(Literal::from_dimacs(var), positive)
                .with(Literal::from_dimacs(-var), 1.0 - positive)
        })
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1e-9 * expected.abs().max(1.0),
            "{actual} != {expected}"
        );
    }

    #[test]
    fn implication_pair() {
        let cnf = Cnf::from_dimacs_clauses(2, &[vec![1, 2], vec![-1, 2]]).unwrap();
        let order = VariableOrder::lexicographic(2);
        let options = SearchOptions::default();

        let compilation = compile(&cnf, &order, &options).unwrap().finished().unwrap();
        assert_eq!(compilation.model_count(), BigUint::from(2u32));

        let weights = LiteralWeights::unweighted(2)
            .with(Literal::from_dimacs(1), 0.5)
            .with(Literal::from_dimacs(-1), 0.5)
            .with(Literal::from_dimacs(2), 1.0)
            .with(Literal::from_dimacs(-2), 0.0);
        let counted = count(&cnf, &order, &weights, &options)
            .unwrap()
            .finished()
            .unwrap();
        assert_eq!(counted.count, 1.0);
        assert_eq!(
            compilation.manager.weighted_count(compilation.root, &weights),
            1.0
        );
    }

    #[test]
    fn independent_parts_multiply() {
        let cnf = Cnf::from_dimacs_clauses(3, &[vec![1], vec![2, 3]]).unwrap();
        let order = VariableOrder::lexicographic(3);
        let options = SearchOptions::default();

        let compilation = compile(&cnf, &order, &options).unwrap().finished().unwrap();
        assert_eq!(compilation.model_count(), BigUint::from(3u32));

        let left = Cnf::from_dimacs_clauses(3, &[vec![1]]).unwrap();
        let right = Cnf::from_dimacs_clauses(3, &[vec![2, 3]]).unwrap();
        let exact = LiteralWeights::<BigUint>::exact(3);
        let part = |cnf: &Cnf| {
            count(cnf, &order, &exact, &options)
                .unwrap()
                .finished()
                .unwrap()
                .count
        };
        // Each part counts the other part's variables as free.
        assert_eq!(
            part(&left) * part(&right),
            compilation.model_count() * BigUint::from(8u32)
        );
    }

    #[test]
    fn disjoint_long_clauses_split() {
        let cnf = Cnf::from_dimacs_clauses(6, &[vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
        let order = VariableOrder::lexicographic(6);
        let compilation = compile(&cnf, &order, &SearchOptions::default())
            .unwrap()
            .finished()
            .unwrap();

        assert_eq!(compilation.model_count(), BigUint::from(49u32));
        assert!(compilation
            .manager
            .node(compilation.root)
            .is_conjunction());
        assert_eq!(compilation.statistics.components, 4);
    }

    #[test]
    fn unsatisfiable_formulas() {
        let order = VariableOrder::lexicographic(2);
        let options = SearchOptions::default();
        let exact = LiteralWeights::<BigUint>::exact(2);
        for clauses in [
            vec![vec![1], vec![-1]],
            vec![vec![1, 2], vec![1, -2], vec![-1, 2], vec![-1, -2]],
        ] {
            let cnf = Cnf::from_dimacs_clauses(2, &clauses).unwrap();
            let compilation = compile(&cnf, &order, &options).unwrap().finished().unwrap();
            assert!(compilation.root.is_false());

            let counted = count(&cnf, &order, &exact, &options).unwrap();
            assert_eq!(counted.finished().map(|c| c.count), Some(BigUint::from(0u32)));
        }
    }

    #[test]
    fn empty_formula_counts_every_assignment() {
        let cnf = Cnf::new(4);
        let order = VariableOrder::lexicographic(4);
        let compilation = compile(&cnf, &order, &SearchOptions::default())
            .unwrap()
            .finished()
            .unwrap();

        assert!(compilation.root.is_true());
        assert_eq!(compilation.model_count(), BigUint::from(16u32));
    }

    #[test]
    fn compilation_and_counting_agree_with_enumeration() {
        let strategies = [ImplicationStrategy::Bcp, ImplicationStrategy::FailedLiteral];
        for seed in 1..=24 {
            let num_vars = 6 + (seed % 5) as u32;
            let cnf = random_cnf(seed, num_vars, 2 + (seed % 7) as usize * 3);
            let unweighted = LiteralWeights::<f64>::unweighted(num_vars);
            let weighted = skewed_weights(num_vars);
            let order = VariableOrder::build(
                if seed % 2 == 0 {
                    OrderStrategy::MinFill
                } else {
                    OrderStrategy::Lexicographic
                },
                &cnf,
            );
            let options = SearchOptions::builder()
                .implication(strategies[(seed % 2) as usize])
                .node_removal_trigger(32)
                .build();

            let compilation = compile(&cnf, &order, &options).unwrap().finished().unwrap();
            let expected = brute_force_count(&cnf, &unweighted);
            assert_eq!(
                compilation.model_count(),
                BigUint::from(expected as u64),
                "seed {seed}"
            );
            assert!(compilation.manager.is_canonical(compilation.root));

            let exact = count(&cnf, &order, &LiteralWeights::exact(num_vars), &options)
                .unwrap()
                .finished()
                .unwrap();
            assert_eq!(exact.count, compilation.model_count(), "seed {seed}");

            let expected = brute_force_count(&cnf, &weighted);
            let counted = count(&cnf, &order, &weighted, &options)
                .unwrap()
                .finished()
                .unwrap();
            assert_close(counted.count, expected);
            assert_close(
                compilation.manager.weighted_count(compilation.root, &weighted),
                expected,
            );
        }
    }

    #[test]
    fn small_cache_budget_agrees() {
        let options = SearchOptions::builder().cache_memory_budget(0).build();
        for seed in 30..36 {
            let cnf = random_cnf(seed, 9, 14);
            let order = VariableOrder::lexicographic(9);
            let expected = brute_force_count(&cnf, &LiteralWeights::unweighted(9));

            let compilation = compile(&cnf, &order, &options).unwrap().finished().unwrap();
            assert_eq!(compilation.model_count(), BigUint::from(expected as u64));
            let counted = count(&cnf, &order, &LiteralWeights::<f64>::unweighted(9), &options)
                .unwrap()
                .finished()
                .unwrap();
            assert_eq!(counted.count, expected);
        }
    }

    #[test]
    fn timeout_is_not_a_count() {
        let cnf = Cnf::from_dimacs_clauses(8, &[vec![1, 2, 3], vec![-3, 4, 5], vec![6, -7, 8]])
            .unwrap();
        let order = VariableOrder::lexicographic(8);
        let options = SearchOptions::builder().timeout(Duration::ZERO).build();

        let outcome = count(&cnf, &order, &LiteralWeights::<f64>::unweighted(8), &options).unwrap();
        assert!(outcome.is_timed_out());
        assert!(compile(&cnf, &order, &options).unwrap().is_timed_out());
    }

    #[test]
    fn mismatched_inputs() {
        let cnf = Cnf::new(3);
        let options = SearchOptions::default();

        assert_eq!(
            compile(&cnf, &VariableOrder::lexicographic(2), &options).err(),
            Some(Error::VariableCountMismatch {
                expected: 3,
                found: 2
            })
        );
        assert_eq!(
            count(
                &cnf,
                &VariableOrder::lexicographic(3),
                &LiteralWeights::<f64>::unweighted(4),
                &options
            )
            .err(),
            Some(Error::VariableCountMismatch {
                expected: 3,
                found: 4
            })
        );
    }

    #[test]
    fn node_limit_is_enforced() {
        let cnf = Cnf::from_dimacs_clauses(4, &[vec![1, 2, 3], vec![-1, 3, 4]]).unwrap();
        let order = VariableOrder::lexicographic(4);
        let options = SearchOptions::builder()
            .node_removal_trigger(0)
            .node_limit(0)
            .build();

        assert!(matches!(
            compile(&cnf, &order, &options),
            Err(Error::NodeLimitExceeded { .. })
        ));
    }

    #[test]
    fn outcome_helpers() {
        assert_eq!(Outcome::Finished(2).map(|x| x * 3), Outcome::Finished(6));
        assert_eq!(Outcome::<u8>::TimedOut.finished(), None);
    }
}
