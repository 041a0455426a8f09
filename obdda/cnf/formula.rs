//! Clause database used by the search: binary clauses as implication lists,
//! longer clauses by id with occurrence lists.
use std::fmt::Display;

use derive_more::derive::From;

use crate::cnf::{normalize_clause, preprocess::Preprocessed, Cnf};
use crate::literal::{Literal, Variable};

/// Id of a clause with at least three literals.
#[derive(PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Debug, Hash, From)]
pub struct ClauseId(pub(crate) u32);

impl ClauseId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for ClauseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Formula {
    num_vars: u32,
    satisfiable: bool,
    clauses: Vec<Box<[Literal]>>,
    /// `implications[l]` holds the literals forced by binary clauses once `l` is true.
    implications: Vec<Vec<Literal>>,
    /// `occurrences[l]` holds the long clauses containing `l`.
    occurrences: Vec<Vec<ClauseId>>,
    var_clauses: Vec<Vec<ClauseId>>,
    units: Vec<Literal>,
}

impl Formula {
    pub(crate) fn new(cnf: &Cnf, implied: &[Literal]) -> Formula {
        let num_vars = cnf.num_vars();
        let literal_slots = 2 * (num_vars as usize + 1);

        let mut formula = Formula {
            num_vars,
            satisfiable: true,
            clauses: Vec::new(),
            implications: vec![Vec::new(); literal_slots],
            occurrences: vec![Vec::new(); literal_slots],
            var_clauses: vec![Vec::new(); num_vars as usize + 1],
            units: implied.to_vec(),
        };

        for clause in cnf.clauses() {
            let Some(clause) = normalize_clause(clause) else {
                continue;
            };

            match clause.as_slice() {
                [] => formula.satisfiable = false,
                [unit] => formula.units.push(*unit),
                [a, b] => {
                    formula.implications[(!*a).index()].push(*b);
                    formula.implications[(!*b).index()].push(*a);
                }
                _ => {
                    let id = ClauseId(formula.clauses.len() as u32);
                    for lit in &clause {
                        formula.occurrences[lit.index()].push(id);
                        formula.var_clauses[lit.variable().index()].push(id);
                    }
                    formula.clauses.push(clause.into_boxed_slice());
                }
            }
        }

        tracing::debug!(
            vars = num_vars,
            long_clauses = formula.clauses.len(),
            units = formula.units.len(),
            "built clause database"
        );

        formula
    }

    pub(crate) fn from_preprocessed(preprocessed: &Preprocessed) -> Formula {
        let mut formula = Formula::new(&preprocessed.cnf, &preprocessed.implied);
        formula.satisfiable &= preprocessed.satisfiable;
        formula
    }

    pub(crate) fn num_vars(&self) -> u32 {
        self.num_vars
    }

    pub(crate) fn num_long_clauses(&self) -> u32 {
        self.clauses.len() as u32
    }

    /// False when an empty clause was seen or preprocessing refuted the formula.
    pub(crate) fn is_satisfiable(&self) -> bool {
        self.satisfiable
    }

    pub(crate) fn clause(&self, id: ClauseId) -> &[Literal] {
        &self.clauses[id.index()]
    }

    pub(crate) fn clause_ids(&self) -> impl Iterator<Item = ClauseId> {
        (0..self.num_long_clauses()).map(ClauseId)
    }

    pub(crate) fn implications(&self, lit: Literal) -> &[Literal] {
        &self.implications[lit.index()]
    }

    pub(crate) fn occurrences(&self, lit: Literal) -> &[ClauseId] {
        &self.occurrences[lit.index()]
    }

    pub(crate) fn var_clauses(&self, var: Variable) -> &[ClauseId] {
        &self.var_clauses[var.index()]
    }

    pub(crate) fn units(&self) -> &[Literal] {
        &self.units
    }

    pub(crate) fn variables(&self) -> impl Iterator<Item = Variable> {
        (1..=self.num_vars).map(Variable)
    }
}

#[cfg(test)]
mod test {
    use super::{ClauseId, Formula};
    use crate::cnf::Cnf;
    use crate::literal::{Literal, Variable};
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_clauses_by_length() {
        let cnf = Cnf::from_dimacs_clauses(4, &[vec![1], vec![1, -2], vec![2, 3, -4], vec![3, -3]])
            .unwrap();
        let formula = Formula::new(&cnf, &[]);

        assert!(formula.is_satisfiable());
        assert_eq!(formula.units(), &[Literal::from_dimacs(1)]);
        assert_eq!(formula.num_long_clauses(), 1);
        // (x1 ∨ ¬x2): ¬x1 forces ¬x2 and x2 forces x1.
        assert_eq!(
            formula.implications(Literal::from_dimacs(-1)),
            &[Literal::from_dimacs(-2)]
        );
        assert_eq!(
            formula.implications(Literal::from_dimacs(2)),
            &[Literal::from_dimacs(1)]
        );
        assert_eq!(formula.occurrences(Literal::from_dimacs(-4)), &[ClauseId(0)]);
        assert_eq!(formula.var_clauses(Variable::new(3)), &[ClauseId(0)]);
    }

    #[test]
    fn empty_clause_is_unsatisfiable() {
        let cnf = Cnf::from_dimacs_clauses(1, &[vec![1], Vec::new()]).unwrap();
        assert!(!Formula::new(&cnf, &[]).is_satisfiable());
    }
}
