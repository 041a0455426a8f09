//! Oracles extending the trail with literals implied by the current assignment.
use crate::cnf::formula::Formula;
use crate::component::Component;
use crate::search::options::ImplicationStrategy;
use crate::literal::Literal;
use crate::search::trail::{Reason, Trail};

/// Some clause is falsified by the current assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Conflict {
    /// Trail literals that together falsify the clause.
    pub(crate) antecedents: Vec<Literal>,
}

pub(crate) trait ImpliedLiterals {
    /// Append to `trail` literals implied by the literals at `from..`.
    /// `scope` is the component the new literals were assigned in.
    fn imply(
        &mut self,
        formula: &Formula,
        scope: &Component,
        trail: &mut Trail,
        from: usize,
    ) -> Result<(), Conflict>;
}

pub(crate) fn oracle(strategy: ImplicationStrategy) -> Box<dyn ImpliedLiterals> {
    match strategy {
        ImplicationStrategy::Bcp => Box::new(Bcp),
        ImplicationStrategy::FailedLiteral => Box::new(FailedLiteral),
    }
}

/// Unit propagation.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Bcp;

impl ImpliedLiterals for Bcp {
    fn imply(
        &mut self,
        formula: &Formula,
        _scope: &Component,
        trail: &mut Trail,
        from: usize,
    ) -> Result<(), Conflict> {
        propagate(formula, trail, from)
    }
}

fn propagate(formula: &Formula, trail: &mut Trail, from: usize) -> Result<(), Conflict> {
    let mut head = from;
    while head < trail.len() {
        let lit = trail.literals()[head];
        head += 1;

        for &implied in formula.implications(lit) {
            match trail.value(implied) {
                Some(true) => {}
                Some(false) => {
                    return Err(Conflict {
                        antecedents: vec![lit, !implied],
                    })
                }
                None => trail.assign(implied, Reason::Implication(lit)),
            }
        }

        for &clause in formula.occurrences(!lit) {
            let mut open = None;
            let mut open_count = 0;
            let mut satisfied = false;
            for &other in formula.clause(clause) {
                match trail.value(other) {
                    Some(true) => {
                        satisfied = true;
                        break;
                    }
                    Some(false) => {}
                    None => {
                        open_count += 1;
                        open = Some(other);
                    }
                }
            }

            if satisfied {
                continue;
            }
            match (open_count, open) {
                (0, _) => {
                    return Err(Conflict {
                        antecedents: formula.clause(clause).iter().map(|&other| !other).collect(),
                    })
                }
                (1, Some(unit)) => trail.assign(unit, Reason::Clause(clause)),
                _ => {}
            }
        }
    }

    Ok(())
}

/// Unit propagation followed by probing: a literal whose propagation
/// conflicts is failed, and its complement is implied. Probing repeats until
/// no variable of the scope fails.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct FailedLiteral;

impl ImpliedLiterals for FailedLiteral {
    fn imply(
        &mut self,
        formula: &Formula,
        scope: &Component,
        trail: &mut Trail,
        from: usize,
    ) -> Result<(), Conflict> {
        propagate(formula, trail, from)?;

        let mut changed = true;
        while changed {
            changed = false;
            for &var in scope.vars() {
                if trail.assignment().is_assigned(var) {
                    continue;
                }

                for candidate in [var.negative(), var.positive()] {
                    let mark = trail.len();
                    trail.assign(candidate, Reason::Decision);
                    let failed = propagate(formula, trail, mark).is_err();
                    trail.truncate(mark);

                    if failed {
                        tracing::trace!(%candidate, "failed literal");
                        trail.assign(!candidate, Reason::Assumed);
                        propagate(formula, trail, mark)?;
                        changed = true;
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{Bcp, Conflict, FailedLiteral, ImpliedLiterals};
    use crate::cnf::{formula::Formula, Cnf};
    use crate::component::Component;
    use crate::literal::{Literal, Variable};
    use crate::search::trail::{Reason, Trail};
    use pretty_assertions::assert_eq;

    fn setup(num_vars: u32, clauses: &[Vec<i32>]) -> (Formula, Component, Trail) {
        let cnf = Cnf::from_dimacs_clauses(num_vars, clauses).unwrap();
        let formula = Formula::new(&cnf, &[]);
        let scope = Component::new(formula.variables().collect(), formula.clause_ids().collect());
        (formula, scope, Trail::new(num_vars))
    }

    fn lits(raw: &[i32]) -> Vec<Literal> {
        raw.iter().map(|&lit| Literal::from_dimacs(lit)).collect()
    }

    #[test]
    fn bcp_chains_binary_and_long_clauses() {
        let (formula, scope, mut trail) = setup(4, &[vec![-1, 2], vec![-2, -3, 4], vec![3, 1]]);
        trail.push(Literal::from_dimacs(1));
        trail.push(Literal::from_dimacs(3));

        assert_eq!(Bcp.imply(&formula, &scope, &mut trail, 0), Ok(()));
        assert_eq!(trail.literals(), lits(&[1, 3, 2, 4]).as_slice());
    }

    #[test]
    fn bcp_conflict() {
        let (formula, scope, mut trail) = setup(3, &[vec![-1, 2], vec![-1, 3], vec![-2, -3]]);
        trail.push(Literal::from_dimacs(1));

        let Err(Conflict { antecedents }) = Bcp.imply(&formula, &scope, &mut trail, 0) else {
            panic!("x1 forces both x2 and x3");
        };
        assert_eq!(antecedents.len(), 2);
        assert!(lits(&[2, 3]).iter().all(|lit| antecedents.contains(lit)));
    }

    #[test]
    fn failed_literal_probing() {
        // ¬x1 forces both x2 and ¬x2, so x1 is implied without any decision.
        let (formula, scope, mut trail) = setup(3, &[vec![1, 2], vec![1, -2, 3], vec![1, -2, -3]]);

        assert_eq!(Bcp.imply(&formula, &scope, &mut trail, 0), Ok(()));
        assert!(trail.literals().is_empty());

        assert_eq!(FailedLiteral.imply(&formula, &scope, &mut trail, 0), Ok(()));
        assert_eq!(trail.literals().first(), Some(&Literal::from_dimacs(1)));
    }

    #[test]
    fn implied_literals_remember_their_clause() {
        let (formula, scope, mut trail) = setup(4, &[vec![-1, 2], vec![-2, -3, 4]]);
        trail.assign(Literal::from_dimacs(1), Reason::Decision);
        trail.assign(Literal::from_dimacs(3), Reason::Decision);

        assert_eq!(Bcp.imply(&formula, &scope, &mut trail, 0), Ok(()));
        assert_eq!(
            trail.reason(Variable::new(2)),
            Some((2, Reason::Implication(Literal::from_dimacs(1))))
        );
        let Some((3, Reason::Clause(clause))) = trail.reason(Variable::new(4)) else {
            panic!("x4 is the last open literal of the long clause");
        };
        assert_eq!(formula.clause(clause), lits(&[-2, -3, 4]).as_slice());
    }

    #[test]
    fn long_clause_conflict_lists_falsifying_literals() {
        let (formula, scope, mut trail) = setup(3, &[vec![1, 2, 3], vec![-3, 1]]);
        trail.push(Literal::from_dimacs(-1));
        trail.push(Literal::from_dimacs(-2));

        let Err(conflict) = Bcp.imply(&formula, &scope, &mut trail, 0) else {
            panic!("x1 ∨ x2 ∨ x3 is falsified");
        };
        assert!(conflict.antecedents.contains(&Literal::from_dimacs(-1)));
    }
}
