use bitvec::prelude::*;
use rustc_hash::FxHashMap;

use crate::count::{LiteralWeights, Weight};
use crate::diagram::manager::DiagramManager;
use crate::diagram::node::{Node, NodeId};
use crate::literal::Variable;

impl DiagramManager {
    /// Weighted model count of `root` over all variables of the manager.
    ///
    /// Every node is evaluated over its own support. Where a decision branch
    /// does not mention a variable of the other branch, that variable is
    /// smoothed in with the factor `w(x) + w(¬x)`. Variables missing from the
    /// support of the root are smoothed in at the end.
    #[tracing::instrument(skip_all, fields(root = %root))]
    pub fn weighted_count<W: Weight>(&self, root: NodeId, weights: &LiteralWeights<W>) -> W {
        assert_eq!(
            weights.num_vars(),
            self.num_vars(),
            "weights are over a different number of variables"
        );

        let n = self.num_vars() as usize + 1;
        let smooth = |support: &BitVec, without: &BitVec, skip: Option<usize>| {
            support
                .iter_ones()
                .filter(|&var| !without[var] && Some(var) != skip)
                .fold(W::one(), |acc, var| acc * weights.smoothing(Variable(var as u32)))
        };

        let mut values: FxHashMap<NodeId, (W, BitVec)> = FxHashMap::default();
        for id in self.reachable([root]) {
            let value = match self.node(id) {
                Node::False => (W::zero(), bitvec![0; n]),
                Node::True => (W::one(), bitvec![0; n]),
                Node::Literal(lit) => {
                    let mut support = bitvec![0; n];
                    support.set(lit.variable().index(), true);
                    (weights.weight(*lit).clone(), support)
                }
                Node::Decision { var, low, high } => {
                    let (low_value, low_support) = &values[low];
                    let (high_value, high_support) = &values[high];

                    let mut support = low_support.clone();
                    for other in high_support.iter_ones() {
                        support.set(other, true);
                    }
                    support.set(var.index(), true);

                    let low_branch = weights.weight(var.negative()).clone()
                        * low_value.clone()
                        * smooth(&support, low_support, Some(var.index()));
                    let high_branch = weights.weight(var.positive()).clone()
                        * high_value.clone()
                        * smooth(&support, high_support, Some(var.index()));
                    (low_branch + high_branch, support)
                }
                Node::Conjunction(children) => {
                    let mut support = bitvec![0; n];
                    let mut product = W::one();
                    for child in children.iter() {
                        let (value, child_support) = &values[child];
                        product = product * value.clone();
                        for var in child_support.iter_ones() {
                            support.set(var, true);
                        }
                    }
                    (product, support)
                }
            };
            values.insert(id, value);
        }

        let Some((value, support)) = values.remove(&root) else {
            return W::zero();
        };

        let mut all = bitvec![1; n];
        all.set(0, false);
        value * smooth(&all, &support, None)
    }
}

#[cfg(test)]
mod test {
    use crate::count::LiteralWeights;
    use crate::diagram::{DiagramManager, NodeId};
    use crate::literal::{Literal, Variable};
    use crate::order::VariableOrder;
    use num_bigint::BigUint;
    use pretty_assertions::assert_eq;

    #[test]
    fn unit_weights_match_count() {
        let mut manager = DiagramManager::new(&VariableOrder::lexicographic(3));
        let x2 = manager.literal(Literal::from_dimacs(2));
        let not_x3 = manager.literal(Literal::from_dimacs(-3));
        let conj = manager.add_conjunction([x2, not_x3]);
        let root = manager.add_decision(Variable::new(1), conj, not_x3);

        let exact = manager.weighted_count(root, &LiteralWeights::<BigUint>::exact(3));
        assert_eq!(exact, manager.count(root));
        assert_eq!(exact, BigUint::from(3u32));
    }

    #[test]
    fn smoothing_across_branches() {
        let mut manager = DiagramManager::new(&VariableOrder::lexicographic(3));
        let x1 = Variable::new(1);
        let x2 = Variable::new(2);
        let not_x2 = manager.literal(x2.negative());
        let weights = LiteralWeights::<f64>::unweighted(3)
            .with(x1.positive(), 0.5)
            .with(x1.negative(), 0.5)
            .with(x2.positive(), 0.25)
            .with(x2.negative(), 0.75);

        // ¬x1 ? ¬x2 : ⊤, with x3 left unconstrained.
        let root = manager.add_decision(x1, not_x2, NodeId::TRUE);
        let expected = (0.5 * 0.75 + 0.5 * 1.0) * 2.0;
        assert_eq!(manager.weighted_count(root, &weights), expected);
    }

    #[test]
    fn constants() {
        let manager = DiagramManager::new(&VariableOrder::lexicographic(2));
        let weights = LiteralWeights::<f64>::unweighted(2).with(Literal::from_dimacs(1), 3.0);

        assert_eq!(manager.weighted_count(NodeId::FALSE, &weights), 0.0);
        assert_eq!(manager.weighted_count(NodeId::TRUE, &weights), 8.0);
    }
}
