use crate::error::{Error, Result};
use crate::literal::{Literal, Variable};

/// Formula in conjunctive normal form over variables `1..=num_vars`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cnf {
    num_vars: u32,
    clauses: Vec<Vec<Literal>>,
}

impl Cnf {
    #[must_use]
    pub fn new(num_vars: u32) -> Cnf {
        Cnf {
            num_vars,
            clauses: Vec::new(),
        }
    }

    /// Build a formula from clauses written as DIMACS integers.
    pub fn from_dimacs_clauses<C: AsRef<[i32]>>(num_vars: u32, clauses: &[C]) -> Result<Cnf> {
        let mut cnf = Cnf::new(num_vars);
        for clause in clauses {
            cnf.add_dimacs_clause(clause.as_ref())?;
        }
        Ok(cnf)
    }

    pub fn add_dimacs_clause(&mut self, clause: &[i32]) -> Result<()> {
        for &literal in clause {
            if literal == 0 || literal.unsigned_abs() > self.num_vars {
                return Err(Error::InvalidLiteral {
                    literal: i64::from(literal),
                    num_vars: self.num_vars,
                });
            }
        }

        self.clauses
            .push(clause.iter().map(|&lit| Literal::from_dimacs(lit)).collect());
        Ok(())
    }

    pub fn add_clause(&mut self, clause: Vec<Literal>) -> Result<()> {
        if let Some(invalid) = clause
            .iter()
            .find(|lit| lit.variable().id() == 0 || lit.variable().id() > self.num_vars)
        {
            return Err(Error::InvalidLiteral {
                literal: invalid.to_dimacs(),
                num_vars: self.num_vars,
            });
        }

        self.clauses.push(clause);
        Ok(())
    }

    /// Add a clause whose literals come from a formula over the same
    /// variables.
    pub(crate) fn push_clause(&mut self, clause: Vec<Literal>) {
        debug_assert!(
            clause
                .iter()
                .all(|lit| (1..=self.num_vars).contains(&lit.variable().id())),
            "clause over variables outside 1..={}",
            self.num_vars
        );
        self.clauses.push(clause);
    }

    #[must_use]
    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    #[must_use]
    pub fn clauses(&self) -> &[Vec<Literal>] {
        &self.clauses
    }

    #[must_use]
    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    pub fn variables(&self) -> impl Iterator<Item = Variable> {
        (1..=self.num_vars).map(Variable)
    }

    /// Evaluate the formula under a total assignment.
    #[must_use]
    pub fn evaluate(&self, assignment: impl Fn(Variable) -> bool) -> bool {
        self.clauses.iter().all(|clause| {
            clause
                .iter()
                .any(|lit| assignment(lit.variable()) == lit.is_positive())
        })
    }
}

/// Sort and deduplicate the literals of a clause. Returns `None` for tautologies.
pub(crate) fn normalize_clause(clause: &[Literal]) -> Option<Vec<Literal>> {
    let mut clause = clause.to_vec();
    clause.sort_unstable();
    clause.dedup();

    // Complementary literals have adjacent codes.
    if clause
        .windows(2)
        .any(|pair| pair[0].variable() == pair[1].variable())
    {
        return None;
    }

    Some(clause)
}

#[cfg(test)]
mod test {
    use super::{normalize_clause, Cnf};
    use crate::error::Error;
    use crate::literal::Literal;
    use pretty_assertions::assert_eq;

    #[test]
    fn rejects_out_of_range_literals() {
        let err = Cnf::from_dimacs_clauses(2, &[vec![1, -3]]).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidLiteral {
                literal: -3,
                num_vars: 2
            }
        ));
    }

    #[test]
    fn literal_clauses() {
        let mut cnf = Cnf::new(3);
        cnf.add_clause(vec![Literal::from_dimacs(1), Literal::from_dimacs(-3)])
            .unwrap();
        assert!(cnf.add_clause(vec![Literal::from_dimacs(4)]).is_err());
        cnf.push_clause(vec![Literal::from_dimacs(2)]);

        assert_eq!(
            cnf,
            Cnf::from_dimacs_clauses(3, &[vec![1, -3], vec![2]]).unwrap()
        );
    }

    #[test]
    fn normalization() {
        let lits = |raw: &[i32]| raw.iter().map(|&l| Literal::from_dimacs(l)).collect::<Vec<_>>();

        assert_eq!(normalize_clause(&lits(&[3, -1, 3])), Some(lits(&[-1, 3])));
        assert_eq!(normalize_clause(&lits(&[2, 1, -2])), None);
    }

    #[test]
    fn evaluation() {
        let cnf = Cnf::from_dimacs_clauses(2, &[vec![1, 2], vec![-1, 2]]).unwrap();
        assert!(cnf.evaluate(|var| var.id() == 2));
        assert!(!cnf.evaluate(|var| var.id() == 1));
    }
}
