//! Depth Resolution
//!
//! Computes, for every node reachable from the terminal, its depth: the
//! length in nodes of the longest path from any leaf up to that node.
//!
//! # Algorithm
//!
//! A depth-first traversal starts at the terminal and descends into
//! children in construction order:
//!
//! 1. A node that already has a recorded depth returns it. A node's depth
//!    depends only on its descendants, so the first completed visit already
//!    holds the maximum over every path through it.
//! 2. A node that is on the active path is part of a cycle; the traversal
//!    stops with [`Error::CycleDetected`].
//! 3. Otherwise the node is pushed onto the path, its children are visited,
//!    and its depth becomes `1 + max(child depths)`, or 1 for a leaf.
//!
//! All state lives in a [`Traversal`] owned by one call, so concurrent
//! resolutions over the same graph never share anything. The active path is
//! an explicit stack of frames, so very deep graphs do not exhaust the call
//! stack.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::trace;

use super::dag::Graph;
use super::node::{Node, NodeId};
use crate::error::{Error, Result};

/// Depth assigned to leaves (inputs, constants, childless calls).
pub const LEAF_DEPTH: usize = 1;

/// Depths of every node reachable in one graph.
///
/// Iteration follows the order in which nodes finished their visit, which
/// is stable for a fixed graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthTable {
    depths: IndexMap<NodeId, usize>,
}

impl DepthTable {
    /// Get the depth of a node.
    pub fn get(&self, id: NodeId) -> Option<usize> {
        self.depths.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.depths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depths.is_empty()
    }

    /// The largest depth in the table (the terminal's depth).
    pub fn max_depth(&self) -> usize {
        self.depths.values().copied().max().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, usize)> + '_ {
        self.depths.iter().map(|(id, depth)| (*id, *depth))
    }

    /// Nodes grouped by depth; `levels()[0]` holds the depth-1 nodes.
    pub fn levels(&self) -> Vec<Vec<NodeId>> {
        let mut levels = vec![Vec::new(); self.max_depth()];
        for (id, depth) in self.iter() {
            levels[depth - LEAF_DEPTH].push(id);
        }
        levels
    }
}

/// Resolve the depth of every node reachable from the graph's terminal.
pub fn resolve_depths(graph: &Graph) -> Result<DepthTable> {
    let mut traversal = Traversal::new(graph);
    traversal.visit(graph.terminal())?;
    Ok(DepthTable {
        depths: traversal.depths,
    })
}

/// Visitation state for one depth resolution.
struct Traversal<'g> {
    graph: &'g Graph,

    /// Completed nodes and their depths.
    depths: IndexMap<NodeId, usize>,

    /// Active path from the terminal to the node being visited.
    path: Vec<Frame<'g>>,
    on_path: HashSet<NodeId>,
}

/// A node on the active path.
struct Frame<'g> {
    node: &'g Node,

    /// Index of the next child to visit.
    next: usize,

    /// Deepest value seen so far among the visited children.
    depth: usize,
}

impl<'g> Traversal<'g> {
    fn new(graph: &'g Graph) -> Self {
        Self {
            graph,
            depths: IndexMap::with_capacity(graph.len()),
            path: Vec::new(),
            on_path: HashSet::new(),
        }
    }

    /// Visit `root` and everything below it without recursing, so the
    /// depth of the graph is bounded by memory rather than the call stack.
    fn visit(&mut self, root: NodeId) -> Result<usize> {
        if let Some(&depth) = self.depths.get(&root) {
            return Ok(depth);
        }
        self.enter(root)?;

        while let Some(frame) = self.path.last_mut() {
            if let Some(&child) = frame.node.children().get(frame.next) {
                frame.next += 1;
                match self.depths.get(&child).copied() {
                    Some(depth) => frame.depth = frame.depth.max(depth + 1),
                    None => self.enter(child)?,
                }
                continue;
            }

            let Some(done) = self.path.pop() else { break };
            let id = done.node.id();
            self.on_path.remove(&id);
            trace!(
                node = %id,
                label = done.node.label(),
                depth = done.depth,
                "resolved depth"
            );
            self.depths.insert(id, done.depth);

            if let Some(parent) = self.path.last_mut() {
                parent.depth = parent.depth.max(done.depth + 1);
            }
        }

        self.depths.get(&root).copied().ok_or(Error::UnknownNode(root))
    }

    /// Push a node onto the active path, failing if it is already there.
    fn enter(&mut self, id: NodeId) -> Result<()> {
        if self.on_path.contains(&id) {
            let start = self
                .path
                .iter()
                .position(|frame| frame.node.id() == id)
                .unwrap_or(0);
            let mut cycle: Vec<NodeId> = self.path[start..]
                .iter()
                .map(|frame| frame.node.id())
                .collect();
            cycle.push(id);
            return Err(Error::CycleDetected { node: id, path: cycle });
        }

        let node = self.graph.node(id).ok_or(Error::UnknownNode(id))?;
        self.on_path.insert(id);
        self.path.push(Frame {
            node,
            next: 0,
            depth: LEAF_DEPTH,
        });
        Ok(())
    }
}
