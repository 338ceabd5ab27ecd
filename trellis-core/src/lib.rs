//! Trellis Core
//!
//! This crate provides the core of the Trellis graph inspector. Given a
//! computation DAG whose nodes may be shared by several parents, it
//! implements:
//!
//! - Stable node identity and an immutable graph model
//! - Depth resolution that merges every path through a shared node
//! - Single execution per trigger with a per-node result cache
//! - Concurrent, non-polling waits for individual node results
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: Nodes, graphs, depth resolution, execution order and layout
//! - `execution`: Runtime contract, result cache, handles and dispatcher
//! - `session`: Submit/fetch contract used by front ends
//! - `config`: Dispatcher settings
//! - `error`: The crate-wide error type
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use trellis_core::{
//!     Dispatcher, DispatcherConfig, GraphBuilder, Inputs, LocalRuntime, TriggerId,
//! };
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let mut builder = GraphBuilder::new();
//! let x = builder.arg(0);
//! let double = builder.call("double", &[x]).unwrap();
//! let graph = builder.build(double).unwrap();
//!
//! let runtime = LocalRuntime::new()
//!     .with_function("double", |args| Ok(json!(args[0].as_i64().unwrap_or(0) * 2)));
//! let dispatcher = Dispatcher::new(graph, runtime, DispatcherConfig::default()).unwrap();
//!
//! let run = dispatcher.submit(TriggerId::new(1), Inputs::new().arg(21)).unwrap();
//! assert_eq!(dispatcher.result_for(&run, double).await.unwrap(), json!(42));
//! # });
//! ```

pub mod config;
pub mod error;
pub mod execution;
pub mod graph;
pub mod session;

pub use config::DispatcherConfig;
pub use error::{Error, Result};
pub use execution::{
    Dispatcher, ExecutionHandle, ExecutionRuntime, Inputs, LocalRuntime, RunEvent, RunId,
    RunState, TriggerId, Value,
};
pub use graph::{resolve_depths, DepthTable, Graph, GraphBuilder, Layout, Node, NodeId, NodeKind};
pub use session::{FetchRequest, FetchResponse, Session, SubmitRequest};
