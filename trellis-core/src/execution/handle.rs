//! Execution Handles
//!
//! An [`ExecutionHandle`] represents one triggered run of a graph. It owns
//! the run's [`ResultCache`] and its state:
//!
//! ```text
//! Submitted -> Running -> Completed
//!                      \-> Failed
//! ```
//!
//! Cloning a handle is cheap; every clone observes the same run.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::cache::{ResultCache, Slot};
use super::runtime::{RunEvent, Value};
use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId};

/// Unique identifier for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(u64);

impl RunId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run#{}", self.0)
    }
}

/// Identifier of the external event that requested a run.
///
/// Submitting the same trigger twice yields the same run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerId(u64);

impl TriggerId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trigger#{}", self.0)
    }
}

/// Lifecycle of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    /// Created, driver not started yet.
    Submitted,

    /// The runtime is producing results.
    Running,

    /// Every node has a value.
    Completed,

    /// The run ended with at least one node unresolved or failed.
    Failed(Error),
}

impl RunState {
    /// Check if the run has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed(_))
    }
}

/// Handle to one run of a graph.
#[derive(Clone)]
pub struct ExecutionHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    id: RunId,
    trigger: TriggerId,
    graph: Arc<Graph>,
    cache: ResultCache,
    state: watch::Sender<RunState>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl ExecutionHandle {
    pub(crate) fn new(trigger: TriggerId, graph: Arc<Graph>) -> Self {
        let cache = ResultCache::new(graph.iter().map(|node| node.id()));
        let (state, _) = watch::channel(RunState::Submitted);
        Self {
            inner: Arc::new(HandleInner {
                id: RunId::next(),
                trigger,
                graph,
                cache,
                state,
                driver: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> RunId {
        self.inner.id
    }

    pub fn trigger(&self) -> TriggerId {
        self.inner.trigger
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.inner.graph
    }

    /// Get the current state.
    pub fn state(&self) -> RunState {
        self.inner.state.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.inner.state.borrow().is_terminal()
    }

    /// Wait until the run completes or fails and return the final state.
    pub async fn finished(&self) -> RunState {
        let mut rx = self.inner.state.subscribe();
        let state = match rx.wait_for(RunState::is_terminal).await {
            Ok(state) => state.clone(),
            Err(_) => RunState::Failed(Error::Cancelled),
        };
        state
    }

    /// Wait for a node's value in this run.
    ///
    /// Fails immediately with [`Error::UnknownNode`] if the node is not
    /// part of the graph. Once a node is settled, every later call returns
    /// the same outcome without waiting.
    pub async fn result_for(&self, node: NodeId) -> Result<Value> {
        if !self.inner.graph.contains(node) {
            return Err(Error::UnknownNode(node));
        }
        trace!(run = %self.id(), %node, "waiting for node result");
        self.inner.cache.wait(node).await
    }

    /// A node's outcome if it is already settled.
    pub fn try_result(&self, node: NodeId) -> Result<Option<Result<Value>>> {
        self.inner.cache.peek(node)
    }

    /// Number of nodes still waiting for a result.
    pub fn pending(&self) -> usize {
        self.inner.cache.pending()
    }

    /// Stop the run and release every waiter with [`Error::Cancelled`].
    ///
    /// Returns false if the run had already finished.
    pub fn cancel(&self) -> bool {
        if let Some(driver) = self.inner.driver.lock().take() {
            driver.abort();
        }
        let cancelled = self.finish(Err(Error::Cancelled));
        if cancelled {
            info!(run = %self.id(), trigger = %self.trigger(), "run cancelled");
        }
        cancelled
    }

    pub(crate) fn attach(&self, driver: JoinHandle<()>) {
        *self.inner.driver.lock() = Some(driver);
    }

    pub(crate) fn mark_running(&self) {
        self.inner.state.send_if_modified(|state| {
            if *state == RunState::Submitted {
                *state = RunState::Running;
                true
            } else {
                false
            }
        });
    }

    /// Record one runtime event. Returns the run error for a run-wide
    /// failure.
    pub(crate) fn apply(&self, event: RunEvent) -> Option<Error> {
        match event {
            RunEvent::Resolved { node, value } => {
                if !self.inner.cache.resolve(node, value) {
                    debug!(run = %self.id(), %node, "ignored result for settled or unknown node");
                }
                None
            }
            RunEvent::NodeFailed { node, reason } => {
                warn!(run = %self.id(), %node, %reason, "node failed");
                let err = Error::NodeFailed { node, reason };
                if !self.inner.cache.fail(node, err) {
                    debug!(run = %self.id(), %node, "ignored failure for settled or unknown node");
                }
                None
            }
            RunEvent::RunFailed { reason } => Some(Error::RunFailed(reason)),
        }
    }

    /// Settle every remaining slot and move to a terminal state.
    ///
    /// Returns false if the run was already terminal.
    pub(crate) fn finish(&self, outcome: Result<()>) -> bool {
        let cache = &self.inner.cache;
        let final_state = match outcome {
            Err(err) => {
                let released = cache.fail_pending(&err);
                debug!(run = %self.id(), released, %err, "released pending waiters");
                RunState::Failed(err)
            }
            Ok(()) => {
                let unfinished = Error::RunFailed("runtime finished without a result".into());
                if cache.fail_pending(&unfinished) > 0 {
                    RunState::Failed(unfinished)
                } else {
                    self.first_failure()
                        .map_or(RunState::Completed, RunState::Failed)
                }
            }
        };

        let changed = self.inner.state.send_if_modified(|state| {
            if state.is_terminal() {
                false
            } else {
                *state = final_state.clone();
                true
            }
        });

        if changed {
            match &final_state {
                RunState::Failed(err) => {
                    warn!(run = %self.id(), trigger = %self.trigger(), %err, "run failed")
                }
                _ => info!(run = %self.id(), trigger = %self.trigger(), "run completed"),
            }
        }
        changed
    }

    /// First failed node in graph order.
    fn first_failure(&self) -> Option<Error> {
        let snapshot = self.inner.cache.snapshot();
        self.inner.graph.iter().find_map(|node| match snapshot.get(&node.id()) {
            Some(Slot::Failed(err)) => Some(err.clone()),
            _ => None,
        })
    }
}

impl fmt::Debug for ExecutionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionHandle")
            .field("id", &self.inner.id)
            .field("trigger", &self.inner.trigger)
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish()
    }
}
