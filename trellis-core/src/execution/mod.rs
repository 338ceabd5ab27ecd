//! Execution
//!
//! This module runs a graph once per trigger and lets any number of
//! concurrent readers wait for individual node results.
//!
//! # Concepts
//!
//! ## Runtimes
//!
//! An [`ExecutionRuntime`] evaluates nodes and reports each outcome as a
//! [`RunEvent`]. The crate ships [`LocalRuntime`], which evaluates in
//! process; distributed runtimes implement the same trait.
//!
//! ## Handles
//!
//! Every run is represented by an [`ExecutionHandle`]. A handle owns a
//! [`ResultCache`] holding one write-once slot per node, and tracks the
//! run's [`RunState`].
//!
//! ## Dispatcher
//!
//! The [`Dispatcher`] guarantees at most one run per [`TriggerId`] and
//! hands out handles. Readers call `result_for`, which suspends only the
//! calling task until that node settles.
//!
//! # Failure Propagation
//!
//! A failed node fails only its own slot (and, in the local runtime, its
//! dependents). A run-wide failure, a timeout or a cancellation fails every
//! slot still pending, so no reader is left waiting.

mod cache;
mod dispatcher;
mod handle;
mod local;
mod runtime;

pub use cache::{ResultCache, Slot};
pub use dispatcher::Dispatcher;
pub use handle::{ExecutionHandle, RunId, RunState, TriggerId};
pub use local::{Function, LocalRuntime};
pub use runtime::{ExecutionRuntime, Inputs, RunEvent, Value};
