use num_bigint::BigUint;
use num_traits::{One, Zero};
use rustc_hash::FxHashMap;

use crate::diagram::node::{Node, NodeId};
use crate::dot_writer::{DotWriter, Edge, NodeType};
use crate::literal::{Literal, Variable};
use crate::order::VariableOrder;

/// Old-to-new id mapping produced by [`DiagramManager::compact`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRemap {
    map: Vec<Option<NodeId>>,
    removed: usize,
}

impl NodeRemap {
    /// New id of a node that survived compaction.
    #[must_use]
    pub fn get(&self, old: NodeId) -> Option<NodeId> {
        self.map.get(old.index()).copied().flatten()
    }

    #[must_use]
    pub fn removed(&self) -> usize {
        self.removed
    }
}

/// Arena of hash-consed nodes of decision diagrams with finest conjunctions.
///
/// Nodes are never mutated. Structurally equal nodes share one id, and the
/// constructors keep every diagram in canonical form for the variable order
/// the manager was built with.
#[derive(Debug, Clone)]
pub struct DiagramManager {
    num_vars: u32,
    /// Rank of every variable, index 0 unused.
    rank: Vec<u32>,
    nodes: Vec<Node>,
    /// Lowest rank of a variable the node depends on, `u32::MAX` for constants.
    min_rank: Vec<u32>,
    unique_table: FxHashMap<Node, NodeId>,
}

impl DiagramManager {
    #[must_use]
    pub fn new(order: &VariableOrder) -> DiagramManager {
        let num_vars = order.len();
        let mut rank = vec![u32::MAX; num_vars as usize + 1];
        for var in order.variables() {
            rank[var.index()] = order.rank(*var);
        }

        let mut manager = DiagramManager {
            num_vars,
            rank,
            nodes: Vec::with_capacity(2 * num_vars as usize + 2),
            min_rank: Vec::with_capacity(2 * num_vars as usize + 2),
            unique_table: FxHashMap::default(),
        };

        manager.push(Node::False);
        manager.push(Node::True);
        for code in 2..2 * num_vars + 2 {
            manager.push(Node::Literal(Literal(code)));
        }

        manager
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let min_rank = self.compute_min_rank(&node);
        self.nodes.push(node);
        self.min_rank.push(min_rank);
        id
    }

    fn compute_min_rank(&self, node: &Node) -> u32 {
        match node {
            Node::False | Node::True => u32::MAX,
            Node::Literal(lit) => self.rank[lit.variable().index()],
            Node::Decision { var, low, high } => self.rank[var.index()]
                .min(self.min_rank[low.index()])
                .min(self.min_rank[high.index()]),
            Node::Conjunction(children) => children
                .iter()
                .map(|child| self.min_rank[child.index()])
                .min()
                .unwrap_or(u32::MAX),
        }
    }

    /// Number of fixed nodes: both constants and every literal.
    fn num_fixed(&self) -> usize {
        2 * self.num_vars as usize + 2
    }

    #[must_use]
    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn contradiction(&self) -> NodeId {
        NodeId::FALSE
    }

    #[must_use]
    pub fn literal(&self, literal: Literal) -> NodeId {
        assert!(
            literal.variable().id() >= 1 && literal.variable().id() <= self.num_vars,
            "literal {literal} out of range"
        );
        NodeId::literal(literal)
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    fn insert(&mut self, node: Node) -> NodeId {
        if let Some(&id) = self.unique_table.get(&node) {
            return id;
        }

        let id = self.push(node.clone());
        debug_assert!(node.successors().iter().all(|child| *child < id));
        self.unique_table.insert(node, id);
        id
    }

    /// Node for `(¬var ∧ low) ∨ (var ∧ high)`.
    ///
    /// Both children must be built over variables ranked after `var`. The
    /// result is reduced: equal children collapse, a false branch turns into
    /// a conjunction with the other literal, and conjuncts shared by both
    /// branches are pulled out of the decision.
    pub fn add_decision(&mut self, var: Variable, low: NodeId, high: NodeId) -> NodeId {
        debug_assert!(low.index() < self.nodes.len() && high.index() < self.nodes.len());
        debug_assert!(
            self.rank[var.index()] < self.min_rank[low.index()]
                && self.rank[var.index()] < self.min_rank[high.index()],
            "decision on {var} over children mentioning earlier variables"
        );

        if low == high {
            return low;
        }
        if low.is_false() {
            return self.add_conjunction([NodeId::literal(var.positive()), high]);
        }
        if high.is_false() {
            return self.add_conjunction([NodeId::literal(var.negative()), low]);
        }

        let low_parts = self.conjuncts(low);
        let high_parts = self.conjuncts(high);
        let shared: Vec<NodeId> = low_parts
            .iter()
            .copied()
            .filter(|part| high_parts.contains(part))
            .collect();

        if !shared.is_empty() {
            let low_rest: Vec<_> = low_parts
                .into_iter()
                .filter(|part| !shared.contains(part))
                .collect();
            let high_rest: Vec<_> = high_parts
                .into_iter()
                .filter(|part| !shared.contains(part))
                .collect();

            let low = self.add_conjunction(low_rest);
            let high = self.add_conjunction(high_rest);
            let decision = self.add_decision(var, low, high);
            tracing::trace!(%var, shared = shared.len(), "factored shared conjuncts out of decision");
            return self.add_conjunction(shared.into_iter().chain([decision]));
        }

        self.insert(Node::Decision { var, low, high })
    }

    /// Children of a conjunction, the node itself otherwise.
    fn conjuncts(&self, id: NodeId) -> Vec<NodeId> {
        match self.node(id) {
            Node::Conjunction(children) => children.to_vec(),
            Node::True => Vec::new(),
            _ => vec![id],
        }
    }

    /// Node for the conjunction of `children`, which must be over pairwise
    /// disjoint variables. Nested conjunctions are flattened and true
    /// children dropped; any false child, or a literal next to its
    /// complement, makes the result false.
    pub fn add_conjunction(&mut self, children: impl IntoIterator<Item = NodeId>) -> NodeId {
        let mut flat = Vec::new();
        for child in children {
            match self.node(child) {
                Node::False => return NodeId::FALSE,
                Node::True => {}
                Node::Conjunction(nested) => flat.extend_from_slice(nested),
                Node::Literal(_) | Node::Decision { .. } => flat.push(child),
            }
        }

        flat.sort_unstable_by_key(|child| (self.min_rank[child.index()], *child));
        flat.dedup();

        for pair in flat.windows(2) {
            if let (Node::Literal(a), Node::Literal(b)) = (self.node(pair[0]), self.node(pair[1])) {
                if *a == !*b {
                    return NodeId::FALSE;
                }
            }
        }
        debug_assert!(
            flat.windows(2)
                .all(|pair| self.min_rank[pair[0].index()] < self.min_rank[pair[1].index()]),
            "conjunction over overlapping variables"
        );

        match flat.as_slice() {
            [] => NodeId::TRUE,
            [single] => *single,
            _ => self.insert(Node::Conjunction(flat.into_boxed_slice())),
        }
    }

    /// Ids reachable from `roots` in increasing order.
    pub(crate) fn reachable(&self, roots: impl IntoIterator<Item = NodeId>) -> Vec<NodeId> {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack: Vec<NodeId> = roots.into_iter().collect();
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut visited[id.index()], true) {
                continue;
            }
            stack.extend(self.node(id).successors());
        }

        visited
            .iter()
            .enumerate()
            .filter(|(_, seen)| **seen)
            .map(|(idx, _)| NodeId(idx as u32))
            .collect()
    }

    /// Number of nodes reachable from `root`, constants excluded.
    #[must_use]
    pub fn size(&self, root: NodeId) -> usize {
        self.reachable([root])
            .into_iter()
            .filter(|id| !id.is_constant())
            .count()
    }

    /// Number of models of `root` over all variables of the manager.
    ///
    /// Every node stores its count over all `n` variables: a literal has
    /// `2^(n-1)` models, a decision averages its branches and a conjunction
    /// of `k` children divides the product by `2^(n(k-1))`.
    #[tracing::instrument(skip_all, fields(root = %root))]
    #[must_use]
    pub fn count(&self, root: NodeId) -> BigUint {
        let n = self.num_vars as usize;
        let mut counts: FxHashMap<NodeId, BigUint> = FxHashMap::default();

        for id in self.reachable([root]) {
            let count = match self.node(id) {
                Node::False => BigUint::zero(),
                Node::True => BigUint::one() << n,
                Node::Literal(_) => BigUint::one() << (n - 1),
                Node::Decision { low, high, .. } => (&counts[low] + &counts[high]) >> 1,
                Node::Conjunction(children) => {
                    let product = children
                        .iter()
                        .fold(BigUint::one(), |acc, child| acc * &counts[child]);
                    product >> (n * (children.len() - 1))
                }
            };
            counts.insert(id, count);
        }

        counts.remove(&root).unwrap_or_default()
    }

    /// Drop every node unreachable from `roots`. Fixed nodes keep their ids,
    /// surviving nodes keep their relative order.
    #[tracing::instrument(skip_all, fields(nodes = self.nodes.len()))]
    pub fn compact(&mut self, roots: &[NodeId]) -> NodeRemap {
        let fixed = self.num_fixed();
        let mut alive = vec![false; self.nodes.len()];
        alive[..fixed].fill(true);
        for id in self.reachable(roots.iter().copied()) {
            alive[id.index()] = true;
        }

        let old = std::mem::take(&mut self.nodes);
        let mut map = vec![None; old.len()];
        self.min_rank.clear();
        self.unique_table.clear();

        for (idx, node) in old.into_iter().enumerate() {
            if !alive[idx] {
                continue;
            }

            let node = node.remapped(|child| map[child.index()].unwrap_or(NodeId::FALSE));
            let id = self.push(node.clone());
            if idx >= fixed {
                self.unique_table.insert(node, id);
            }
            map[idx] = Some(id);
        }

        let removed = map.len() - self.nodes.len();
        tracing::debug!(removed, alive = self.nodes.len(), "compacted diagram");
        NodeRemap { map, removed }
    }

    /// Check that every reachable decision respects the variable order and
    /// that no node has an equal twin.
    #[must_use]
    pub fn is_canonical(&self, root: NodeId) -> bool {
        let mut seen = FxHashMap::default();
        self.reachable([root]).into_iter().all(|id| {
            let node = self.node(id);
            let ordered = match node {
                Node::Decision { var, low, high } => {
                    low != high
                        && !low.is_false()
                        && !high.is_false()
                        && self.rank[var.index()] < self.min_rank[low.index()]
                        && self.rank[var.index()] < self.min_rank[high.index()]
                }
                Node::Conjunction(children) => {
                    children.len() >= 2
                        && children.windows(2).all(|pair| {
                            self.min_rank[pair[0].index()] < self.min_rank[pair[1].index()]
                        })
                        && children.iter().all(|child| {
                            !child.is_constant() && !self.node(*child).is_conjunction()
                        })
                }
                _ => true,
            };
            ordered && seen.insert(node.clone(), id).is_none()
        })
    }

    /// Render the diagram rooted at `root` in the DOT format.
    ///
    /// # Errors
    /// Function returns an error if the writing to a file or flushing fails.
    pub fn draw(&self, writer: &mut dyn std::io::Write, root: NodeId) -> std::io::Result<()> {
        let mut dot = DotWriter::new(String::from("diagram"), false);
        for id in self.reachable([root]) {
            let idx = id.index();
            match self.node(id) {
                Node::False => dot.add_node(idx, NodeType::Box(String::from("⊥"))),
                Node::True => dot.add_node(idx, NodeType::Box(String::from("⊤"))),
                Node::Literal(lit) => dot.add_node(idx, NodeType::Box(lit.to_string())),
                Node::Decision { var, low, high } => {
                    dot.add_node(idx, NodeType::Circle(var.to_string()));
                    dot.add_edge(Edge::Low(idx, low.index()));
                    dot.add_edge(Edge::High(idx, high.index()));
                }
                Node::Conjunction(children) => {
                    dot.add_node(idx, NodeType::Conjunction);
                    for child in children.iter() {
                        dot.add_edge(Edge::Simple(idx, child.index()));
                    }
                }
            }
        }

        dot.write(writer)
    }
}
