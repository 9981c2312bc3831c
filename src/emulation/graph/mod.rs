//! The execution graph of one method and its consensus queries.
//!
//! An [`ExecutionGraph`] owns every node created while exploring one method as an arena
//! indexed by [`NodeId`]. Nodes refer to their parent and children by identifier only.
//! Nodes that reached the same instruction address on different paths form that
//! address's *node pile*.
//!
//! # Consensus
//!
//! The `terminating_*` queries look only at nodes where a path ended, with a `return*`
//! or an uncaught exception. For each such node the queried register or field is read
//! from the node's final state and the values are merged with
//! [`consensus`](crate::emulation::consensus):
//!
//! - every path agrees: that value,
//! - paths disagree, or some path holds an unknown: unknown of the first-seen type,
//! - some terminating path never assigned it while others did: unknown,
//! - no terminating path assigned it: `None`.
//!
//! Queries never mutate the graph and return the same answer on every call.
//!
//! # Example
//!
//! ```rust
//! use smaliscope::{
//!     assembly::{MethodAssembler, Opcode},
//!     emulation::{Value, VirtualMachine, VmConfig},
//!     metadata::{AccessFlags, ClassManagerBuilder, MethodRef, VirtualClass, VirtualMethod},
//! };
//!
//! let mut asm = MethodAssembler::new(2);
//! asm.if_testz(Opcode::IfEqz, 1, "zero")?
//!     .const_int(0, 1)?
//!     .return_value(Opcode::Return, 0)?
//!     .label("zero")?
//!     .const_int(0, 1)?
//!     .return_value(Opcode::Return, 0)?;
//! let method = VirtualMethod::new(MethodRef::parse("LMain;->f(I)I")?, AccessFlags::STATIC)
//!     .with_implementation(asm.finish()?);
//! let classes = ClassManagerBuilder::new()
//!     .add_class(VirtualClass::new("LMain;").with_method(method))
//!     .build();
//!
//! let vm = VirtualMachine::new(classes, VmConfig::default());
//! let graph = vm.execute("LMain;", "f(I)I")?;
//! assert_eq!(graph.terminating_nodes().count(), 2);
//! assert_eq!(graph.terminating_register_consensus(0), Some(Value::int(1)));
//! # Ok::<(), smaliscope::Error>(())
//! ```

mod node;

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    emulation::{consensus, ExecutionState, FieldKey, Value},
    metadata::VirtualMethod,
};

pub use node::{ExecutionNode, NodeId, NodeOutcome};

/// All paths explored through one method.
#[derive(Debug, Clone)]
pub struct ExecutionGraph {
    method: Arc<VirtualMethod>,
    nodes: Vec<ExecutionNode>,
    piles: BTreeMap<u32, Vec<NodeId>>,
    addresses: Vec<u32>,
}

impl ExecutionGraph {
    pub(crate) fn new(method: Arc<VirtualMethod>, addresses: Vec<u32>) -> Self {
        ExecutionGraph {
            method,
            nodes: Vec::new(),
            piles: BTreeMap::new(),
            addresses,
        }
    }

    /// Adds a pending node and links it below `parent`.
    pub(crate) fn add_node(
        &mut self,
        address: u32,
        parent: Option<NodeId>,
        state: ExecutionState,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(ExecutionNode::new(id, address, parent, state));
        self.piles.entry(address).or_default().push(id);
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(p.0)) {
            parent.children.push(id);
        }
        id
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut ExecutionNode> {
        self.nodes.get_mut(id.0)
    }

    /// The explored method.
    #[must_use]
    pub fn method(&self) -> &Arc<VirtualMethod> {
        &self.method
    }

    /// A node by identifier.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&ExecutionNode> {
        self.nodes.get(id.0)
    }

    /// The entry node.
    #[must_use]
    pub fn root(&self) -> Option<&ExecutionNode> {
        self.nodes.first()
    }

    /// Every node in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &ExecutionNode> {
        self.nodes.iter()
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if nothing was explored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes that reached `address`, in creation order.
    #[must_use]
    pub fn node_pile(&self, address: u32) -> Vec<&ExecutionNode> {
        self.piles
            .get(&address)
            .map(|ids| ids.iter().filter_map(|id| self.node(*id)).collect())
            .unwrap_or_default()
    }

    /// Every instruction address of the method, reached or not.
    #[must_use]
    pub fn addresses(&self) -> &[u32] {
        &self.addresses
    }

    /// Returns `true` if any path reached `address`.
    #[must_use]
    pub fn was_address_reached(&self, address: u32) -> bool {
        self.piles.contains_key(&address)
    }

    /// Instruction addresses no path reached.
    pub fn unreached_addresses(&self) -> impl Iterator<Item = u32> + '_ {
        self.addresses
            .iter()
            .copied()
            .filter(|address| !self.was_address_reached(*address))
    }

    /// Nodes where a path ended.
    pub fn terminating_nodes(&self) -> impl Iterator<Item = &ExecutionNode> {
        self.nodes.iter().filter(|node| node.is_terminating())
    }

    /// Consensus of `register` over every terminating path.
    #[must_use]
    pub fn terminating_register_consensus(&self, register: u16) -> Option<Value> {
        merge_observed(
            self.terminating_nodes()
                .map(|node| node.state.peek_register(register)),
        )
    }

    /// Consensus of a static field over every terminating path.
    ///
    /// Accepts a [`FieldKey`], a [`FieldRef`](crate::metadata::FieldRef) or a
    /// `(class, name)` pair.
    #[must_use]
    pub fn terminating_field_consensus(&self, field: impl Into<FieldKey>) -> Option<Value> {
        let key = field.into();
        merge_observed(
            self.terminating_nodes()
                .map(|node| node.state.read_field(&key)),
        )
    }

    /// Consensus of the return value over the paths that returned.
    #[must_use]
    pub fn terminating_return_consensus(&self) -> Option<Value> {
        merge_observed(
            self.terminating_nodes()
                .filter(|node| node.outcome == NodeOutcome::Returned)
                .map(|node| node.state.return_value()),
        )
    }

    /// Consensus of the uncaught exceptions over the paths that threw.
    #[must_use]
    pub fn terminating_exception_consensus(&self) -> Option<Value> {
        consensus(self.terminating_nodes().filter_map(ExecutionNode::exception))
    }

    /// Consensus of `register` over every node that reached `address`, after the
    /// instruction there executed.
    #[must_use]
    pub fn register_consensus_at(&self, address: u32, register: u16) -> Option<Value> {
        merge_observed(
            self.node_pile(address)
                .into_iter()
                .map(|node| node.state.peek_register(register)),
        )
    }
}

/// Merges per-path observations, treating a path without a value as disagreeing.
fn merge_observed<'a>(observed: impl IntoIterator<Item = Option<&'a Value>>) -> Option<Value> {
    let mut values = Vec::new();
    let mut missing = false;
    for value in observed {
        match value {
            Some(value) => values.push(value),
            None => missing = true,
        }
    }
    let merged = consensus(values)?;
    if missing {
        Some(Value::unknown(merged.ty()))
    } else {
        Some(merged)
    }
}
