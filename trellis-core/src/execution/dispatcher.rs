//! Dispatcher
//!
//! The dispatcher bridges one execution of a graph to many independent
//! readers. Each [`submit`](Dispatcher::submit) with a new trigger starts
//! exactly one run on the runtime; readers then wait on individual nodes
//! of that run through its [`ExecutionHandle`].
//!
//! # How a Run Proceeds
//!
//! 1. `submit` creates a handle with a pending slot per node and asks the
//!    runtime for its event stream, all under the run table lock, so two
//!    submissions of one trigger can never both launch.
//!
//! 2. A driver task consumes the stream and settles slots as events arrive,
//!    optionally bounded by the configured run timeout.
//!
//! 3. When the stream ends (or fails, panics, or times out) every slot
//!    still pending is failed, so no reader waits forever.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{BoxStream, StreamExt};
use futures_util::FutureExt;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::handle::{ExecutionHandle, TriggerId};
use super::runtime::{ExecutionRuntime, Inputs, RunEvent, Value};
use crate::config::DispatcherConfig;
use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId};

/// Launches runs of one graph and serves their results.
pub struct Dispatcher {
    graph: Arc<Graph>,
    runtime: Arc<dyn ExecutionRuntime>,
    config: DispatcherConfig,

    /// Retained runs, oldest first.
    runs: Mutex<IndexMap<TriggerId, ExecutionHandle>>,
}

impl Dispatcher {
    /// Create a dispatcher for `graph` backed by `runtime`.
    pub fn new<R>(graph: impl Into<Arc<Graph>>, runtime: R, config: DispatcherConfig) -> Result<Self>
    where
        R: ExecutionRuntime + 'static,
    {
        config.validate()?;
        Ok(Self {
            graph: graph.into(),
            runtime: Arc::new(runtime),
            config,
            runs: Mutex::new(IndexMap::new()),
        })
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Start a run for `trigger`, or return the run it already started.
    ///
    /// Only retained runs are deduplicated: once a trigger has been evicted
    /// (see [`DispatcherConfig::retained_runs()`]), submitting it again starts
    /// a fresh run.
    ///
    /// Must be called from within a tokio runtime, which drives the run.
    pub fn submit(&self, trigger: TriggerId, inputs: Inputs) -> Result<ExecutionHandle> {
        let executor =
            tokio::runtime::Handle::try_current().map_err(|_| Error::RuntimeUnavailable)?;

        let mut runs = self.runs.lock();
        if let Some(existing) = runs.get(&trigger) {
            debug!(%trigger, run = %existing.id(), "duplicate submission, reusing run");
            return Ok(existing.clone());
        }

        let handle = ExecutionHandle::new(trigger, Arc::clone(&self.graph));
        let events = self.runtime.run(Arc::clone(&self.graph), inputs);
        let driver = executor.spawn(drive(handle.clone(), events, self.config.run_timeout()));
        handle.attach(driver);

        runs.insert(trigger, handle.clone());
        while runs.len() > self.config.retained_runs() {
            if let Some((evicted, _)) = runs.shift_remove_index(0) {
                debug!(trigger = %evicted, "evicted retained run");
            }
        }

        info!(
            %trigger,
            run = %handle.id(),
            nodes = self.graph.len(),
            "submitted run"
        );
        Ok(handle)
    }

    /// Wait for a node's value in the given run.
    pub async fn result_for(&self, handle: &ExecutionHandle, node: NodeId) -> Result<Value> {
        handle.result_for(node).await
    }

    /// The retained run for a trigger.
    pub fn handle(&self, trigger: TriggerId) -> Option<ExecutionHandle> {
        self.runs.lock().get(&trigger).cloned()
    }

    /// The most recently started run still retained.
    pub fn latest(&self) -> Option<ExecutionHandle> {
        self.runs.lock().last().map(|(_, handle)| handle.clone())
    }

    /// Number of retained runs.
    pub fn run_count(&self) -> usize {
        self.runs.lock().len()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("nodes", &self.graph.len())
            .field("config", &self.config)
            .field("runs", &self.run_count())
            .finish()
    }
}

/// Consume a runtime's events into a handle until the run ends.
async fn drive(
    handle: ExecutionHandle,
    mut events: BoxStream<'static, RunEvent>,
    timeout: Option<Duration>,
) {
    handle.mark_running();

    let pump = async {
        while let Some(event) = events.next().await {
            if let Some(err) = handle.apply(event) {
                return Err(err);
            }
        }
        Ok(())
    };
    let consume = async {
        match AssertUnwindSafe(pump).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => Err(Error::RunFailed(format!(
                "runtime panicked: {}",
                panic_message(payload.as_ref())
            ))),
        }
    };

    let outcome = match timeout {
        Some(limit) => tokio::time::timeout(limit, consume)
            .await
            .unwrap_or(Err(Error::TimedOut(limit))),
        None => consume.await,
    };

    handle.finish(outcome);
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{LocalRuntime, RunState};
    use crate::graph::GraphBuilder;
    use serde_json::json;

    fn identity_graph() -> (Graph, NodeId, NodeId) {
        let mut builder = GraphBuilder::new();
        let x = builder.arg(0);
        let f = builder.call("id", &[x]).unwrap();
        (builder.build(f).unwrap(), x, f)
    }

    fn identity_runtime() -> LocalRuntime {
        LocalRuntime::new().with_function("id", |args| Ok(args[0].clone()))
    }

    #[test]
    fn submit_outside_runtime_is_an_error() {
        let (graph, _, _) = identity_graph();
        let dispatcher =
            Dispatcher::new(graph, identity_runtime(), DispatcherConfig::default()).unwrap();

        assert_eq!(
            dispatcher
                .submit(TriggerId::new(1), Inputs::new().arg(1))
                .unwrap_err(),
            Error::RuntimeUnavailable
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let (graph, _, _) = identity_graph();
        let config = DispatcherConfig::default().with_retained_runs(0);
        assert!(matches!(
            Dispatcher::new(graph, identity_runtime(), config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn same_trigger_reuses_run() {
        let (graph, _, f) = identity_graph();
        let dispatcher =
            Dispatcher::new(graph, identity_runtime(), DispatcherConfig::default()).unwrap();

        let first = dispatcher.submit(TriggerId::new(7), Inputs::new().arg(1)).unwrap();
        let second = dispatcher.submit(TriggerId::new(7), Inputs::new().arg(99)).unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(dispatcher.run_count(), 1);
        assert_eq!(dispatcher.result_for(&second, f).await, Ok(json!(1)));
    }

    #[tokio::test]
    async fn oldest_runs_are_evicted() {
        let (graph, _, f) = identity_graph();
        let config = DispatcherConfig::default().with_retained_runs(2);
        let dispatcher = Dispatcher::new(graph, identity_runtime(), config).unwrap();

        let first = dispatcher.submit(TriggerId::new(1), Inputs::new().arg(1)).unwrap();
        dispatcher.submit(TriggerId::new(2), Inputs::new().arg(2)).unwrap();
        let third = dispatcher.submit(TriggerId::new(3), Inputs::new().arg(3)).unwrap();

        assert_eq!(dispatcher.run_count(), 2);
        assert!(dispatcher.handle(TriggerId::new(1)).is_none());
        assert_eq!(dispatcher.latest().map(|h| h.id()), Some(third.id()));

        // An evicted run keeps serving whoever still holds it.
        assert_eq!(first.result_for(f).await, Ok(json!(1)));
        assert_eq!(first.finished().await, RunState::Completed);
    }

    #[tokio::test]
    async fn evicted_trigger_starts_a_fresh_run() {
        let (graph, _, f) = identity_graph();
        let config = DispatcherConfig::default().with_retained_runs(1);
        let dispatcher = Dispatcher::new(graph, identity_runtime(), config).unwrap();

        let first = dispatcher.submit(TriggerId::new(1), Inputs::new().arg(1)).unwrap();
        dispatcher.submit(TriggerId::new(2), Inputs::new().arg(2)).unwrap();
        let again = dispatcher.submit(TriggerId::new(1), Inputs::new().arg(10)).unwrap();

        assert_ne!(first.id(), again.id());
        assert_eq!(first.result_for(f).await, Ok(json!(1)));
        assert_eq!(again.result_for(f).await, Ok(json!(10)));
    }

    #[tokio::test]
    async fn panicking_function_fails_the_run() {
        let (graph, x, f) = identity_graph();
        let runtime = LocalRuntime::new().with_function("id", |args| Ok(args[5].clone()));
        let dispatcher = Dispatcher::new(graph, runtime, DispatcherConfig::default()).unwrap();

        let run = dispatcher.submit(TriggerId::new(1), Inputs::new().arg(1)).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(2), dispatcher.result_for(&run, f))
            .await
            .expect("waiter released");

        match result {
            Err(Error::RunFailed(reason)) => assert!(reason.starts_with("runtime panicked")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(run.result_for(x).await, Ok(json!(1)));
        assert!(matches!(
            run.finished().await,
            RunState::Failed(Error::RunFailed(_))
        ));
    }
}
