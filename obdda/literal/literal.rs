use derive_more::derive::From;
use std::fmt::Display;

/// Index of a propositional variable. Variables are numbered from 1 as in DIMACS.
#[derive(PartialEq, Eq, Clone, PartialOrd, Ord, Debug, Copy, Hash, From)]
pub struct Variable(pub(crate) u32);

impl Variable {
    #[must_use]
    pub fn new(idx: u32) -> Variable {
        assert_ne!(idx, 0, "variables are numbered from 1");
        Variable(idx)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub fn id(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn literal(self, polarity: Polarity) -> Literal {
        Literal::new(self, polarity)
    }

    #[must_use]
    pub fn positive(self) -> Literal {
        Literal::new(self, Polarity::Positive)
    }

    #[must_use]
    pub fn negative(self) -> Literal {
        Literal::new(self, Polarity::Negative)
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// Polarity of a variable.
#[derive(Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Copy, Hash)]
pub enum Polarity {
    Positive,
    Negative,
}

impl From<bool> for Polarity {
    fn from(item: bool) -> Self {
        if item {
            Polarity::Positive
        } else {
            Polarity::Negative
        }
    }
}

impl std::ops::Not for Polarity {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            Polarity::Positive => Polarity::Negative,
            Polarity::Negative => Polarity::Positive,
        }
    }
}

/// Literal packed into a single integer as `2 * variable + sign`, where the
/// sign bit is set for positive literals. The code doubles as the index of
/// per-literal tables and as the id of the literal's diagram node.
#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
pub struct Literal(pub(crate) u32);

impl Literal {
    #[must_use]
    pub fn new(variable: Variable, polarity: Polarity) -> Literal {
        Literal(variable.0 << 1 | u32::from(polarity == Polarity::Positive))
    }

    /// Create a literal from its DIMACS form, e.g. `-3` for `¬x3`.
    #[must_use]
    pub fn from_dimacs(value: i32) -> Literal {
        assert_ne!(value, 0, "0 is the DIMACS clause terminator, not a literal");
        Literal::new(Variable(value.unsigned_abs()), Polarity::from(value > 0))
    }

    #[must_use]
    pub fn to_dimacs(self) -> i64 {
        let var = i64::from(self.variable().0);
        if self.is_positive() {
            var
        } else {
            -var
        }
    }

    #[must_use]
    pub fn variable(self) -> Variable {
        Variable(self.0 >> 1)
    }

    #[must_use]
    pub fn polarity(self) -> Polarity {
        Polarity::from(self.is_positive())
    }

    #[must_use]
    pub fn is_positive(self) -> bool {
        self.0 & 1 == 1
    }

    #[must_use]
    pub fn code(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::ops::Not for Literal {
    type Output = Self;

    fn not(self) -> Self::Output {
        Literal(self.0 ^ 1)
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_positive() {
            write!(f, "{}", self.variable())
        } else {
            write!(f, "¬{}", self.variable())
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Literal, Polarity, Variable};
    use pretty_assertions::assert_eq;

    #[test]
    fn literal_encoding() {
        let x3 = Variable::new(3);
        assert_eq!(x3.positive().code(), 7);
        assert_eq!(x3.negative().code(), 6);
        assert_eq!(!x3.positive(), x3.negative());
        assert_eq!(x3.negative().polarity(), Polarity::Negative);
        assert_eq!(x3.positive().variable(), x3);
    }

    #[test]
    fn dimacs_literals() {
        let lit = Literal::from_dimacs(-5);
        assert_eq!(lit, Variable::new(5).negative());
        assert_eq!(lit.to_dimacs(), -5);
        assert_eq!(Literal::from_dimacs(2).to_dimacs(), 2);
        assert_eq!(lit.to_string(), "¬x5");
    }
}
