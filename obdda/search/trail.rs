use crate::cnf::formula::ClauseId;
use crate::literal::{Literal, Variable};

/// Current partial assignment, indexed by variable.
#[derive(Debug, Clone)]
pub(crate) struct Assignment {
    values: Vec<Option<bool>>,
}

impl Assignment {
    pub(crate) fn new(num_vars: u32) -> Self {
        Assignment {
            values: vec![None; num_vars as usize + 1],
        }
    }

    pub(crate) fn value(&self, lit: Literal) -> Option<bool> {
        self.values[lit.variable().index()].map(|positive| positive == lit.is_positive())
    }

    pub(crate) fn is_true(&self, lit: Literal) -> bool {
        self.value(lit) == Some(true)
    }

    pub(crate) fn is_assigned(&self, var: Variable) -> bool {
        self.values[var.index()].is_some()
    }
}

/// Why a literal is on the trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reason {
    /// Branching decision of the level it was assigned on.
    Decision,
    /// Holds under everything assigned up to and including its own level:
    /// units of the formula and complements of failed literals.
    Assumed,
    /// Implied through a binary clause by the given literal.
    Implication(Literal),
    /// Last open literal of a long clause.
    Clause(ClauseId),
    /// Complement of a branch that failed. Holds the deepest level the
    /// failure depended on, or `None` if the failure was not a conflict.
    FailedBranch(Option<usize>),
}

/// Assigned literals in assignment order. Levels of the search remember the
/// trail length they started at and truncate back to it.
#[derive(Debug, Clone)]
pub(crate) struct Trail {
    literals: Vec<Literal>,
    reasons: Vec<Reason>,
    /// Trail position of each assigned variable.
    positions: Vec<usize>,
    assignment: Assignment,
}

impl Trail {
    pub(crate) fn new(num_vars: u32) -> Self {
        Trail {
            literals: Vec::new(),
            reasons: Vec::new(),
            positions: vec![0; num_vars as usize + 1],
            assignment: Assignment::new(num_vars),
        }
    }

    pub(crate) fn push(&mut self, lit: Literal) {
        self.assign(lit, Reason::Assumed);
    }

    pub(crate) fn assign(&mut self, lit: Literal, reason: Reason) {
        debug_assert!(
            !self.assignment.is_assigned(lit.variable()),
            "{lit} is already assigned"
        );
        self.assignment.values[lit.variable().index()] = Some(lit.is_positive());
        self.positions[lit.variable().index()] = self.literals.len();
        self.literals.push(lit);
        self.reasons.push(reason);
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.reasons.truncate(len);
        for lit in self.literals.drain(len..) {
            self.assignment.values[lit.variable().index()] = None;
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.literals.len()
    }

    pub(crate) fn literals(&self) -> &[Literal] {
        &self.literals
    }

    pub(crate) fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    pub(crate) fn value(&self, lit: Literal) -> Option<bool> {
        self.assignment.value(lit)
    }

    /// Trail position and reason of an assigned variable.
    pub(crate) fn reason(&self, var: Variable) -> Option<(usize, Reason)> {
        if !self.assignment.is_assigned(var) {
            return None;
        }
        let position = self.positions[var.index()];
        Some((position, self.reasons[position]))
    }
}

#[cfg(test)]
mod test {
    use super::{Reason, Trail};
    use crate::literal::{Literal, Variable};
    use pretty_assertions::assert_eq;

    #[test]
    fn truncate_unassigns() {
        let mut trail = Trail::new(3);
        trail.push(Literal::from_dimacs(1));
        trail.push(Literal::from_dimacs(-3));

        assert_eq!(trail.value(Literal::from_dimacs(3)), Some(false));
        trail.truncate(1);
        assert_eq!(trail.len(), 1);
        assert_eq!(trail.value(Literal::from_dimacs(3)), None);
        assert!(trail.assignment().is_true(Literal::from_dimacs(1)));
    }

    #[test]
    fn reasons_follow_positions() {
        let mut trail = Trail::new(3);
        trail.assign(Literal::from_dimacs(2), Reason::Decision);
        trail.assign(
            Literal::from_dimacs(-1),
            Reason::Implication(Literal::from_dimacs(2)),
        );

        assert_eq!(
            trail.reason(Variable::new(1)),
            Some((1, Reason::Implication(Literal::from_dimacs(2))))
        );
        assert_eq!(trail.reason(Variable::new(3)), None);

        trail.truncate(1);
        assert_eq!(trail.reason(Variable::new(1)), None);
        trail.assign(Literal::from_dimacs(3), Reason::FailedBranch(Some(0)));
        assert_eq!(
            trail.reason(Variable::new(3)),
            Some((1, Reason::FailedBranch(Some(0))))
        );
    }
}
