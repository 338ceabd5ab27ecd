//! Computation Graph
//!
//! A [`Graph`] is the set of nodes reachable from one terminal node. It is
//! immutable once built and cheap to share behind an `Arc`.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::debug;

use super::node::{InputKey, Node, NodeId, NodeKind};
use crate::error::{Error, Result};
use crate::execution::Value;

/// A static computation DAG with a single terminal node.
#[derive(Debug, Clone)]
pub struct Graph {
    /// Reachable nodes, in the order they were supplied.
    nodes: IndexMap<NodeId, Node>,

    /// The node whose value is the result of the whole graph.
    terminal: NodeId,
}

impl Graph {
    /// Build a graph from an arbitrary node set.
    ///
    /// Checks that the terminal and every child reference exist and that
    /// input and constant nodes are leaves. Nodes not reachable from the
    /// terminal are dropped. Acyclicity is not checked here; depth
    /// resolution reports cycles.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>, terminal: NodeId) -> Result<Self> {
        let mut all: IndexMap<NodeId, Node> = IndexMap::new();
        for node in nodes {
            if !matches!(node.kind(), NodeKind::Call) && !node.is_leaf() {
                return Err(Error::InvalidGraph(format!(
                    "{} ({}) is not a call but has children",
                    node.id(),
                    node.label()
                )));
            }
            if all.insert(node.id(), node).is_some() {
                return Err(Error::InvalidGraph("duplicate node identity".into()));
            }
        }

        if !all.contains_key(&terminal) {
            return Err(Error::InvalidGraph(format!("terminal {terminal} is not a node")));
        }

        // Mark everything reachable from the terminal.
        let mut reachable = HashSet::new();
        let mut stack = vec![terminal];
        while let Some(id) = stack.pop() {
            if !reachable.insert(id) {
                continue;
            }
            let node = all.get(&id).ok_or_else(|| {
                Error::InvalidGraph(format!("dangling child reference to {id}"))
            })?;
            stack.extend(node.children().iter().copied());
        }

        let total = all.len();
        all.retain(|id, _| reachable.contains(id));
        if all.len() < total {
            debug!(pruned = total - all.len(), "dropped unreachable nodes");
        }

        Ok(Self {
            nodes: all,
            terminal,
        })
    }

    /// Get the terminal node's ID.
    pub fn terminal(&self) -> NodeId {
        self.terminal
    }

    /// Get a reference to a node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Whether the identity is reachable in this graph.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// The input nodes reachable from the terminal.
    pub fn inputs(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|node| node.is_input())
    }

    /// Iterate over all reachable nodes.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get the total number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Incremental graph construction.
///
/// Every child must be added before the node that references it, so a
/// builder can never produce a cycle.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    known: HashSet<NodeId>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input node.
    pub fn input(&mut self, key: InputKey) -> NodeId {
        self.push(Node::input(key))
    }

    /// Add a positional input node.
    pub fn arg(&mut self, index: usize) -> NodeId {
        self.input(InputKey::Index(index))
    }

    /// Add a named input node.
    pub fn kwarg(&mut self, name: &str) -> NodeId {
        self.input(InputKey::Key(name.to_owned()))
    }

    /// Add a constant node.
    pub fn constant(&mut self, label: impl Into<String>, value: impl Into<Value>) -> NodeId {
        self.push(Node::constant(label, value.into()))
    }

    /// Add a call node depending on `children`.
    pub fn call(&mut self, function: impl Into<String>, children: &[NodeId]) -> Result<NodeId> {
        if let Some(missing) = children.iter().find(|id| !self.known.contains(id)) {
            return Err(Error::InvalidGraph(format!(
                "child {missing} was not added to this builder"
            )));
        }
        Ok(self.push(Node::call(function, children)))
    }

    /// Finish the graph with `terminal` as its result node.
    pub fn build(self, terminal: NodeId) -> Result<Graph> {
        Graph::from_nodes(self.nodes, terminal)
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.known.insert(id);
        self.nodes.push(node);
        id
    }
}
