//! Nodes of an execution graph.

use std::fmt;

use crate::emulation::{ExecutionState, Value};

/// Index of a node in its graph's arena.
///
/// Identifiers are assigned sequentially from 0 in creation order, so they also
/// record the order in which the worklist discovered paths.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Wraps a raw arena index.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// The raw arena index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// What executing a node's op did to its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    /// Queued, not executed yet
    Pending,
    /// Every outcome continued into child nodes
    Continued,
    /// A `return*` ended the path
    Returned,
    /// At least one outcome was an exception no handler caught; other outcomes may
    /// still have continued into children
    Threw,
}

impl NodeOutcome {
    /// Returns `true` for outcomes that end a path.
    #[must_use]
    pub fn is_terminating(self) -> bool {
        matches!(self, NodeOutcome::Returned | NodeOutcome::Threw)
    }
}

/// One point of one explored path.
#[derive(Debug, Clone)]
pub struct ExecutionNode {
    pub(crate) id: NodeId,
    pub(crate) address: u32,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) state: ExecutionState,
    pub(crate) exception: Option<Value>,
    pub(crate) outcome: NodeOutcome,
}

impl ExecutionNode {
    pub(crate) fn new(
        id: NodeId,
        address: u32,
        parent: Option<NodeId>,
        state: ExecutionState,
    ) -> Self {
        ExecutionNode {
            id,
            address,
            parent,
            children: Vec::new(),
            state,
            exception: None,
            outcome: NodeOutcome::Pending,
        }
    }

    /// This node's identifier.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Address of the instruction the node executed.
    #[must_use]
    pub fn address(&self) -> u32 {
        self.address
    }

    /// The node this path came from, `None` for the entry node.
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Successor nodes, one per continued outcome.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The path's state after the node's op executed.
    #[must_use]
    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    /// The uncaught exception this node raised.
    ///
    /// If several outcomes of the node raised, this is their consensus.
    #[must_use]
    pub fn exception(&self) -> Option<&Value> {
        self.exception.as_ref()
    }

    /// What executing the node did.
    #[must_use]
    pub fn outcome(&self) -> NodeOutcome {
        self.outcome
    }

    /// Returns `true` if a path ends at this node.
    #[must_use]
    pub fn is_terminating(&self) -> bool {
        self.outcome.is_terminating()
    }

    pub(crate) fn record_exception(&mut self, thrown: Value) {
        self.exception = Some(match self.exception.take() {
            Some(previous) => previous.meet(&thrown),
            None => thrown,
        });
        self.outcome = NodeOutcome::Threw;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulation::ThrownException;

    #[test]
    fn node_id_formats() {
        let id = NodeId::new(7);
        assert_eq!(id.index(), 7);
        assert_eq!(id.to_string(), "n7");
        assert_eq!(format!("{id:?}"), "NodeId(7)");
    }

    #[test]
    fn several_exceptions_meet() {
        let mut node = ExecutionNode::new(NodeId::new(0), 0, None, ExecutionState::new(0));
        assert!(!node.is_terminating());
        let npe = Value::throwable(ThrownException::new("Ljava/lang/NullPointerException;", None));
        node.record_exception(npe.clone());
        assert_eq!(node.exception(), Some(&npe));
        assert_eq!(node.outcome(), NodeOutcome::Threw);

        node.record_exception(Value::throwable(ThrownException::new(
            "Ljava/lang/ArithmeticException;",
            None,
        )));
        assert!(node.exception().is_some_and(Value::is_unknown));
        assert!(node.is_terminating());
    }
}
