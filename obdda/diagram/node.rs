use std::fmt::Display;

use derive_more::derive::From;

use crate::literal::{Literal, Variable};

/// Index of a node in the [`crate::diagram::DiagramManager`].
///
/// The first ids are fixed: `0` is false, `1` is true and every literal
/// uses its own code as id. Other nodes get increasing ids as they are
/// created, so children always have smaller ids than their parents.
#[derive(PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Debug, Hash, From)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub const FALSE: NodeId = NodeId(0);
    pub const TRUE: NodeId = NodeId(1);

    #[must_use]
    pub fn literal(literal: Literal) -> NodeId {
        NodeId(literal.code())
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub fn is_false(self) -> bool {
        self == NodeId::FALSE
    }

    #[must_use]
    pub fn is_true(self) -> bool {
        self == NodeId::TRUE
    }

    #[must_use]
    pub fn is_constant(self) -> bool {
        self.is_false() || self.is_true()
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    False,
    True,
    Literal(Literal),
    /// `(¬var ∧ low) ∨ (var ∧ high)`. Neither child mentions `var`.
    Decision {
        var: Variable,
        low: NodeId,
        high: NodeId,
    },
    /// Conjunction of children over pairwise disjoint variables, sorted by
    /// their lowest-ranked variable.
    Conjunction(Box<[NodeId]>),
}

impl Node {
    /// Every node this node points to.
    pub(crate) fn successors(&self) -> Vec<NodeId> {
        match self {
            Node::False | Node::True | Node::Literal(_) => Vec::new(),
            Node::Decision { low, high, .. } => vec![*low, *high],
            Node::Conjunction(children) => children.to_vec(),
        }
    }

    #[must_use]
    pub fn is_conjunction(&self) -> bool {
        matches!(self, Node::Conjunction(_))
    }

    /// Copy of the node with every successor passed through `remap`.
    pub(crate) fn remapped(&self, remap: impl Fn(NodeId) -> NodeId) -> Node {
        match self {
            Node::Decision { var, low, high } => Node::Decision {
                var: *var,
                low: remap(*low),
                high: remap(*high),
            },
            Node::Conjunction(children) => {
                Node::Conjunction(children.iter().map(|&child| remap(child)).collect())
            }
            other => other.clone(),
        }
    }
}
