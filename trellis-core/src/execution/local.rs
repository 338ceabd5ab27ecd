//! In-process runtime
//!
//! [`LocalRuntime`] evaluates a graph on the polling task, one node at a
//! time in topological order, looking up call nodes in a registry of named
//! functions. It exists so the dispatcher can be used and tested without a
//! distributed runtime.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use futures_util::stream::{self, BoxStream, StreamExt};
use parking_lot::RwLock;
use tracing::debug;

use super::runtime::{ExecutionRuntime, Inputs, RunEvent, Value};
use crate::graph::{execution_order, Graph, NodeId, NodeKind};

/// A function a call node can invoke. Receives its children's values in
/// child order.
pub type Function = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// Runtime that evaluates nodes in the current process.
#[derive(Clone, Default)]
pub struct LocalRuntime {
    functions: Arc<RwLock<HashMap<String, Function>>>,
}

impl LocalRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under the label call nodes use.
    ///
    /// Replaces any function previously registered under that name.
    pub fn register<F>(&self, name: impl Into<String>, function: F)
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.functions.write().insert(name.into(), Arc::new(function));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_function<F>(self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.register(name, function);
        self
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.read().contains_key(name)
    }
}

impl fmt::Debug for LocalRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let functions = self.functions.read();
        f.debug_struct("LocalRuntime")
            .field("functions", &functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ExecutionRuntime for LocalRuntime {
    fn run(&self, graph: Arc<Graph>, inputs: Inputs) -> BoxStream<'static, RunEvent> {
        let order = match execution_order(&graph) {
            Ok(order) => order,
            Err(err) => {
                return stream::once(async move {
                    RunEvent::RunFailed {
                        reason: err.to_string(),
                    }
                })
                .boxed();
            }
        };

        let evaluation = Evaluation {
            graph,
            inputs,
            functions: Arc::clone(&self.functions),
            pending: order.into(),
            values: HashMap::new(),
            failed: HashSet::new(),
        };

        stream::unfold(evaluation, |mut evaluation| async move {
            let id = evaluation.pending.pop_front()?;
            let event = evaluation.step(id);
            // Let readers observe each value before the next node runs.
            tokio::task::yield_now().await;
            Some((event, evaluation))
        })
        .boxed()
    }
}

/// State of one local run.
struct Evaluation {
    graph: Arc<Graph>,
    inputs: Inputs,
    functions: Arc<RwLock<HashMap<String, Function>>>,
    pending: VecDeque<NodeId>,
    values: HashMap<NodeId, Value>,
    failed: HashSet<NodeId>,
}

impl Evaluation {
    fn step(&mut self, id: NodeId) -> RunEvent {
        match self.evaluate(id) {
            Ok(value) => {
                self.values.insert(id, value.clone());
                RunEvent::Resolved { node: id, value }
            }
            Err(reason) => {
                debug!(node = %id, %reason, "local node failed");
                self.failed.insert(id);
                RunEvent::NodeFailed { node: id, reason }
            }
        }
    }

    fn evaluate(&self, id: NodeId) -> Result<Value, String> {
        let node = self
            .graph
            .node(id)
            .ok_or_else(|| format!("{id} is not part of the graph"))?;

        match node.kind() {
            NodeKind::Input(key) => self
                .inputs
                .get(key)
                .cloned()
                .ok_or_else(|| format!("missing input {key}")),
            NodeKind::Constant(value) => Ok(value.clone()),
            NodeKind::Call => {
                let mut args = Vec::with_capacity(node.children().len());
                for child in node.children() {
                    if self.failed.contains(child) {
                        return Err(format!("upstream {child} failed"));
                    }
                    let value = self
                        .values
                        .get(child)
                        .ok_or_else(|| format!("upstream {child} has no value"))?;
                    args.push(value.clone());
                }

                let function = self
                    .functions
                    .read()
                    .get(node.label())
                    .cloned()
                    .ok_or_else(|| format!("no function registered as {:?}", node.label()))?;

                function(&args)
            }
        }
    }
}
