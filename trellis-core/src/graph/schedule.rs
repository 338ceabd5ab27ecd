//! Execution Order
//!
//! Determines the order in which an in-process runtime evaluates nodes.
//! Dependencies always come before the nodes that read them.
//!
//! # Algorithm
//!
//! Kahn's algorithm over the reachable graph:
//!
//! 1. Count each node's distinct children (its in-degree)
//! 2. Seed the queue with the leaves, in graph order
//! 3. Pop a node, emit it, and decrement each dependent's count
//! 4. A dependent whose count reaches zero joins the queue
//!
//! If some nodes are never emitted the graph has a cycle; the depth
//! resolver is asked to name it.

use std::collections::{HashMap, HashSet, VecDeque};

use super::dag::Graph;
use super::depth::resolve_depths;
use super::node::NodeId;
use crate::error::{Error, Result};

/// Compute a topological order of every node in the graph.
pub fn execution_order(graph: &Graph) -> Result<Vec<NodeId>> {
    let mut in_degree: HashMap<NodeId, usize> = HashMap::with_capacity(graph.len());
    let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    let mut queue = VecDeque::new();

    for node in graph.iter() {
        // A node may list the same child twice; count the edge once.
        let distinct: HashSet<NodeId> = node.children().iter().copied().collect();
        for &child in node.children() {
            let entry = dependents.entry(child).or_default();
            if !entry.contains(&node.id()) {
                entry.push(node.id());
            }
        }
        in_degree.insert(node.id(), distinct.len());
        if distinct.is_empty() {
            queue.push_back(node.id());
        }
    }

    let mut order = Vec::with_capacity(graph.len());
    while let Some(id) = queue.pop_front() {
        order.push(id);

        for dependent in dependents.get(&id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    queue.push_back(*dependent);
                }
            }
        }
    }

    if order.len() < graph.len() {
        return Err(resolve_depths(graph).err().unwrap_or_else(|| {
            Error::InvalidGraph(format!(
                "{} nodes could not be ordered",
                graph.len() - order.len()
            ))
        }));
    }

    Ok(order)
}
