//! Literal weights for weighted model counting.
use std::fmt::Debug;

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::literal::{Literal, Variable};

/// Values forming a commutative semiring that counts can be computed in.
/// Implemented by `f64` for probabilities and by [`BigUint`] for exact counts.
pub trait Weight: Clone + Debug + PartialEq + Zero + One {}

impl<T> Weight for T where T: Clone + Debug + PartialEq + Zero + One {}

/// Weight of every literal, indexed by the literal's code.
#[derive(Debug, Clone, PartialEq)]
pub struct LiteralWeights<W> {
    num_vars: u32,
    weights: Vec<W>,
}

impl<W: Weight> LiteralWeights<W> {
    /// Every literal weighs one, which turns weighted counting into model counting.
    #[must_use]
    pub fn unweighted(num_vars: u32) -> Self {
        LiteralWeights {
            num_vars,
            weights: vec![W::one(); 2 * (num_vars as usize + 1)],
        }
    }

    pub fn set(&mut self, literal: Literal, weight: W) {
        assert!(
            literal.variable().id() >= 1 && literal.variable().id() <= self.num_vars,
            "literal {literal} out of range"
        );
        self.weights[literal.index()] = weight;
    }

    #[must_use]
    pub fn with(mut self, literal: Literal, weight: W) -> Self {
        self.set(literal, weight);
        self
    }

    #[must_use]
    pub fn weight(&self, literal: Literal) -> &W {
        &self.weights[literal.index()]
    }

    /// Factor contributed by a variable that is left unconstrained: `w(x) + w(¬x)`.
    #[must_use]
    pub fn smoothing(&self, variable: Variable) -> W {
        self.weight(variable.positive()).clone() + self.weight(variable.negative()).clone()
    }

    #[must_use]
    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }
}

impl LiteralWeights<BigUint> {
    /// Unit weights in exact arithmetic.
    #[must_use]
    pub fn exact(num_vars: u32) -> Self {
        LiteralWeights::unweighted(num_vars)
    }
}

#[cfg(test)]
mod test {
    use super::LiteralWeights;
    use crate::literal::Variable;
    use pretty_assertions::assert_eq;

    #[test]
    fn smoothing_sums_both_polarities() {
        let x2 = Variable::new(2);
        let weights = LiteralWeights::<f64>::unweighted(3)
            .with(x2.positive(), 0.25)
            .with(x2.negative(), 0.5);

        assert_eq!(weights.smoothing(x2), 0.75);
        assert_eq!(weights.smoothing(Variable::new(1)), 2.0);
        assert_eq!(*weights.weight(x2.negative()), 0.5);
    }
}
