//! Computation Graph
//!
//! This module implements the static DAG that an execution runs over, and
//! the analyses performed on it before anything executes.
//!
//! # Overview
//!
//! - Nodes are computation steps with a stable [`NodeId`] and an ordered
//!   list of children (the nodes they read from)
//! - A child may be shared by several parents; it is the same node, not a
//!   copy, so anything computed for it is keyed by its id
//! - A [`Graph`] is everything reachable from one terminal node
//!
//! # Design Decisions
//!
//! 1. Identity is a value type assigned at construction. Nothing relies on
//!    pointer equality, so nodes can be cloned and moved freely.
//!
//! 2. The graph is indexed by node ID for O(1) lookups, and keeps insertion
//!    order so every analysis is deterministic.
//!
//! 3. Analyses (depth, execution order, layout) own their working state and
//!    borrow the graph immutably, so they can run concurrently.

mod dag;
mod depth;
mod layout;
mod node;
mod schedule;

pub use dag::{Graph, GraphBuilder};
pub use depth::{resolve_depths, DepthTable, LEAF_DEPTH};
pub use layout::{Block, BlockKind, Layout};
pub use node::{InputKey, Node, NodeId, NodeKind};
pub use schedule::execution_order;
