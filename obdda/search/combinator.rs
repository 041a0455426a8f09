//! What the search builds out of the values of solved components.
use crate::count::{LiteralWeights, Weight};
use crate::diagram::{DiagramManager, NodeId};
use crate::error::{Error, Result};
use crate::literal::{Literal, Variable};
use crate::search::options::SearchOptions;

/// Algebra the search evaluates components in.
pub trait Combinator {
    type Value: Clone + std::fmt::Debug;

    fn contradiction(&self) -> Self::Value;

    fn is_contradiction(&self, value: &Self::Value) -> bool;

    /// Value of a component after branching on `var`.
    fn decide(&mut self, var: Variable, low: Self::Value, high: Self::Value) -> Self::Value;

    /// Value of a decision level: its implied literals, its free variables
    /// and the values of its independent sub-components.
    fn conjoin(
        &mut self,
        implied: &[Literal],
        free: &[Variable],
        children: Vec<Self::Value>,
    ) -> Self::Value;

    /// Whether the storage behind values should be compacted now.
    fn wants_collection(&self) -> bool {
        false
    }

    /// Release storage not reachable from `live`, rewriting the live values
    /// in place. Returns how much was released.
    fn collect_garbage(&mut self, _live: &mut [&mut Self::Value]) -> Result<usize> {
        Ok(0)
    }
}

/// Builds a diagram: decisions become decision nodes, levels become conjunctions.
#[derive(Debug)]
pub struct DiagramBuilder {
    manager: DiagramManager,
    trigger: usize,
    growth: f64,
    limit: Option<usize>,
}

impl DiagramBuilder {
    #[must_use]
    pub fn new(manager: DiagramManager, options: &SearchOptions) -> Self {
        DiagramBuilder {
            manager,
            trigger: options.node_removal_trigger,
            growth: options.node_growth_factor,
            limit: options.node_limit,
        }
    }

    #[must_use]
    pub fn manager(&self) -> &DiagramManager {
        &self.manager
    }

    #[must_use]
    pub fn into_manager(self) -> DiagramManager {
        self.manager
    }
}

impl Combinator for DiagramBuilder {
    type Value = NodeId;

    fn contradiction(&self) -> NodeId {
        self.manager.contradiction()
    }

    fn is_contradiction(&self, value: &NodeId) -> bool {
        value.is_false()
    }

    fn decide(&mut self, var: Variable, low: NodeId, high: NodeId) -> NodeId {
        self.manager.add_decision(var, low, high)
    }

    fn conjoin(&mut self, implied: &[Literal], _free: &[Variable], children: Vec<NodeId>) -> NodeId {
        let literals: Vec<NodeId> = implied.iter().map(|&lit| NodeId::literal(lit)).collect();
        self.manager
            .add_conjunction(literals.into_iter().chain(children))
    }

    fn wants_collection(&self) -> bool {
        let nodes = self.manager.num_nodes();
        nodes > self.trigger || self.limit.is_some_and(|limit| nodes > limit)
    }

    fn collect_garbage(&mut self, live: &mut [&mut NodeId]) -> Result<usize> {
        let before = self.manager.num_nodes();
        let roots: Vec<NodeId> = live.iter().map(|value| **value).collect();
        let remap = self.manager.compact(&roots);
        for value in live.iter_mut() {
            **value = remap.get(**value).unwrap_or(NodeId::FALSE);
        }

        let nodes = self.manager.num_nodes();
        if remap.removed() * 2 < before {
            self.trigger = (self.trigger as f64 * self.growth) as usize;
        }
        self.trigger = self.trigger.max(nodes);
        tracing::debug!(
            removed = remap.removed(),
            nodes,
            trigger = self.trigger,
            "compacted diagram during search"
        );

        if let Some(limit) = self.limit {
            if nodes > limit {
                return Err(Error::NodeLimitExceeded { nodes, limit });
            }
        }

        Ok(remap.removed())
    }
}

/// Evaluates weighted model counts directly. A zero weight behaves like a
/// contradiction, which only prunes branches contributing nothing.
#[derive(Debug)]
pub struct WeightedCounter<'a, W> {
    weights: &'a LiteralWeights<W>,
}

impl<'a, W: Weight> WeightedCounter<'a, W> {
    #[must_use]
    pub fn new(weights: &'a LiteralWeights<W>) -> Self {
        WeightedCounter { weights }
    }
}

impl<W: Weight> Combinator for WeightedCounter<'_, W> {
    type Value = W;

    fn contradiction(&self) -> W {
        W::zero()
    }

    fn is_contradiction(&self, value: &W) -> bool {
        value.is_zero()
    }

    fn decide(&mut self, var: Variable, low: W, high: W) -> W {
        self.weights.weight(var.negative()).clone() * low
            + self.weights.weight(var.positive()).clone() * high
    }

    fn conjoin(&mut self, implied: &[Literal], free: &[Variable], children: Vec<W>) -> W {
        let literals = implied
            .iter()
            .fold(W::one(), |acc, &lit| acc * self.weights.weight(lit).clone());
        let free = free
            .iter()
            .fold(W::one(), |acc, &var| acc * self.weights.smoothing(var));
        children
            .into_iter()
            .fold(literals * free, |acc, child| acc * child)
    }
}
