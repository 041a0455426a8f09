//! Simplifications applied to the formula before the search starts.
use crate::cnf::{normalize_clause, Cnf};
use crate::literal::Literal;

/// Result of preprocessing. When `satisfiable` is false, the remaining fields
/// are meaningless and the search reports a contradiction right away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preprocessed {
    pub satisfiable: bool,
    /// Simplified formula over the same variables.
    pub cnf: Cnf,
    /// Literals entailed by the original formula, removed from `cnf`.
    pub implied: Vec<Literal>,
}

pub trait Preprocess {
    fn preprocess(&mut self, cnf: &Cnf) -> Preprocessed;
}

/// Unit propagation to a fixpoint. Satisfied clauses are dropped and false
/// literals are removed from the rest.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnitSimplifier;

impl Preprocess for UnitSimplifier {
    #[tracing::instrument(skip_all, fields(vars = cnf.num_vars(), clauses = cnf.num_clauses()))]
    fn preprocess(&mut self, cnf: &Cnf) -> Preprocessed {
        let mut values: Vec<Option<bool>> = vec![None; cnf.num_vars() as usize + 1];
        let value = |values: &[Option<bool>], lit: Literal| {
            values[lit.variable().index()].map(|positive| positive == lit.is_positive())
        };

        let mut implied = Vec::new();
        let mut clauses: Vec<Vec<Literal>> = cnf
            .clauses()
            .iter()
            .filter_map(|clause| normalize_clause(clause))
            .collect();

        loop {
            let mut changed = false;
            let mut remaining = Vec::with_capacity(clauses.len());

            for clause in clauses {
                if clause.iter().any(|&lit| value(&values, lit) == Some(true)) {
                    continue;
                }

                let open: Vec<_> = clause
                    .into_iter()
                    .filter(|&lit| value(&values, lit).is_none())
                    .collect();

                match open.as_slice() {
                    [] => {
                        tracing::debug!("unit propagation refuted the formula");
                        return Preprocessed {
                            satisfiable: false,
                            cnf: Cnf::new(cnf.num_vars()),
                            implied: Vec::new(),
                        };
                    }
                    [unit] => {
                        values[unit.variable().index()] = Some(unit.is_positive());
                        implied.push(*unit);
                        changed = true;
                    }
                    _ => remaining.push(open),
                }
            }

            clauses = remaining;
            if !changed {
                break;
            }
        }

        let mut simplified = Cnf::new(cnf.num_vars());
        for clause in clauses {
            simplified.push_clause(clause);
        }

        tracing::debug!(
            implied = implied.len(),
            clauses = simplified.num_clauses(),
            "preprocessing done"
        );

        Preprocessed {
            satisfiable: true,
            cnf: simplified,
            implied,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Preprocess, UnitSimplifier};
    use crate::cnf::Cnf;
    use crate::literal::Literal;
    use pretty_assertions::assert_eq;

    fn lits(raw: &[i32]) -> Vec<Literal> {
        raw.iter().map(|&lit| Literal::from_dimacs(lit)).collect()
    }

    #[test]
    fn propagates_units_to_fixpoint() {
        let cnf = Cnf::from_dimacs_clauses(
            4,
            &[vec![1], vec![-1, 2], vec![-2, 3, 4], vec![-3, -4, 1]],
        )
        .unwrap();
        let result = UnitSimplifier.preprocess(&cnf);

        assert!(result.satisfiable);
        assert_eq!(result.implied, lits(&[1, 2]));
        assert_eq!(result.cnf.clauses(), &[lits(&[3, 4])]);
    }

    #[test]
    fn detects_conflicting_units() {
        let cnf = Cnf::from_dimacs_clauses(2, &[vec![1], vec![-1, 2], vec![-2]]).unwrap();
        let result = UnitSimplifier.preprocess(&cnf);

        assert!(!result.satisfiable);
    }

    #[test]
    fn keeps_formula_without_units() {
        let cnf = Cnf::from_dimacs_clauses(3, &[vec![1, 2], vec![-2, 3]]).unwrap();
        let result = UnitSimplifier.preprocess(&cnf);

        assert!(result.satisfiable);
        assert!(result.implied.is_empty());
        assert_eq!(result.cnf, cnf);
    }
}
