//! Graph Nodes
//!
//! This module defines the node types that live in a computation graph.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::execution::Value;

/// Stable identifier for a node in a computation graph.
///
/// Assigned once when the node is constructed and never changed. Two
/// references carrying the same id denote the same logical node, however
/// many parents reach it.
///
/// Ids only come from a process-wide counter, so ids minted anywhere in the
/// process never collide. They serialize for front ends but cannot be
/// constructed from raw numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Address of one graph input inside the submitted [`Inputs`](crate::execution::Inputs).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputKey {
    /// Positional argument.
    Index(usize),
    /// Named argument.
    Key(String),
}

impl fmt::Display for InputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKey::Index(i) => write!(f, "[{i}]"),
            InputKey::Key(k) => write!(f, "[{k:?}]"),
        }
    }
}

/// The kind of node in a computation graph.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A raw input. These are roots of the graph and never have children.
    Input(InputKey),

    /// A bound literal, such as a constructor argument. Also a leaf.
    Constant(Value),

    /// Applies the function named by the node label to its children's
    /// values, in child order.
    Call,
}

/// A node in a computation graph.
///
/// Children are the nodes this node depends on, kept in construction order
/// so traversals are reproducible.
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique identifier for this node.
    id: NodeId,

    /// Display name; for [`NodeKind::Call`] also the function to invoke.
    label: String,

    /// What kind of node this is.
    kind: NodeKind,

    /// Direct dependencies.
    children: SmallVec<[NodeId; 4]>,
}

impl Node {
    /// Create a node with a fresh identity.
    pub fn new(label: impl Into<String>, kind: NodeKind, children: &[NodeId]) -> Self {
        Self::with_id(NodeId::new(), label, kind, children)
    }

    /// Create a node with an explicit identity.
    pub fn with_id(
        id: NodeId,
        label: impl Into<String>,
        kind: NodeKind,
        children: &[NodeId],
    ) -> Self {
        Self {
            id,
            label: label.into(),
            kind,
            children: SmallVec::from_slice(children),
        }
    }

    /// Create a new input node.
    pub fn input(key: InputKey) -> Self {
        Self::new(format!("input{key}"), NodeKind::Input(key), &[])
    }

    /// Create a new constant node.
    pub fn constant(label: impl Into<String>, value: Value) -> Self {
        Self::new(label, NodeKind::Constant(value), &[])
    }

    /// Create a new call node.
    pub fn call(function: impl Into<String>, children: &[NodeId]) -> Self {
        Self::new(function, NodeKind::Call, children)
    }

    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Get the node's kind.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Get the direct dependencies in construction order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_input(&self) -> bool {
        matches!(self.kind, NodeKind::Input(_))
    }

    /// Check if the node has no dependencies.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_unique() {
        let id1 = NodeId::new();
        let id2 = NodeId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn node_ids_are_unique_across_threads() {
        let ids: Vec<NodeId> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| (0..1000).map(|_| NodeId::new()).collect::<Vec<_>>()))
                .collect();
            workers
                .into_iter()
                .flat_map(|worker| worker.join().unwrap())
                .collect()
        });

        let distinct: std::collections::HashSet<_> = ids.iter().copied().collect();
        assert_eq!(distinct.len(), ids.len());
    }

    #[test]
    fn input_node_is_leaf() {
        let node = Node::input(InputKey::Index(0));
        assert!(node.is_input());
        assert!(node.is_leaf());
        assert_eq!(node.kind(), &NodeKind::Input(InputKey::Index(0)));
        assert_eq!(node.label(), "input[0]");
    }

    #[test]
    fn children_keep_construction_order() {
        let a = NodeId::new();
        let b = NodeId::new();
        let c = NodeId::new();

        let node = Node::call("combine", &[c, a, b]);
        assert_eq!(node.children(), &[c, a, b]);
        assert!(!node.is_leaf());
    }

    #[test]
    fn equality_is_by_identity() {
        let id = NodeId::new();
        let first = Node::with_id(id, "f", NodeKind::Call, &[]);
        let second = Node::with_id(id, "g", NodeKind::Constant(Value::from(1)), &[]);
        assert_eq!(first, second);

        let other = Node::call("f", &[]);
        assert_ne!(first, other);
    }

    #[test]
    fn input_keys_display() {
        assert_eq!(InputKey::Index(2).to_string(), "[2]");
        assert_eq!(InputKey::Key("key".into()).to_string(), "[\"key\"]");
    }
}
