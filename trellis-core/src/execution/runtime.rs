//! Runtime contract
//!
//! The dispatcher does not evaluate nodes itself. It hands the graph and
//! the submitted inputs to an [`ExecutionRuntime`] and listens to the
//! stream of per-node outcomes it produces.

use std::sync::Arc;

use futures_util::stream::BoxStream;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::graph::{Graph, InputKey, NodeId};

/// A node's computed value.
pub type Value = serde_json::Value;

/// Concrete values for a graph's inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inputs {
    /// Positional inputs, addressed by [`InputKey::Index`].
    #[serde(default)]
    pub args: Vec<Value>,

    /// Named inputs, addressed by [`InputKey::Key`].
    #[serde(default)]
    pub kwargs: IndexMap<String, Value>,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional inputs only.
    pub fn positional(args: impl IntoIterator<Item = Value>) -> Self {
        Self {
            args: args.into_iter().collect(),
            kwargs: IndexMap::new(),
        }
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    /// Look up the value for an input node.
    pub fn get(&self, key: &InputKey) -> Option<&Value> {
        match key {
            InputKey::Index(i) => self.args.get(*i),
            InputKey::Key(k) => self.kwargs.get(k),
        }
    }
}

/// One outcome reported by a runtime while a run progresses.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// A node produced its value.
    Resolved { node: NodeId, value: Value },

    /// A node could not be computed.
    NodeFailed { node: NodeId, reason: String },

    /// The whole run failed; no further events follow.
    RunFailed { reason: String },
}

/// Something that can execute a graph.
///
/// `run` starts computing every node and returns a stream of outcomes. The
/// stream ends when the runtime has nothing more to report. Each node
/// should be reported at most once; later reports are ignored.
pub trait ExecutionRuntime: Send + Sync {
    fn run(&self, graph: Arc<Graph>, inputs: Inputs) -> BoxStream<'static, RunEvent>;
}

impl<R: ExecutionRuntime + ?Sized> ExecutionRuntime for Arc<R> {
    fn run(&self, graph: Arc<Graph>, inputs: Inputs) -> BoxStream<'static, RunEvent> {
        (**self).run(graph, inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inputs_resolve_positional_and_named() {
        let inputs = Inputs::new().arg(1).kwarg("key", 2);

        assert_eq!(inputs.get(&InputKey::Index(0)), Some(&json!(1)));
        assert_eq!(inputs.get(&InputKey::Key("key".into())), Some(&json!(2)));
        assert_eq!(inputs.get(&InputKey::Index(1)), None);
        assert_eq!(inputs.get(&InputKey::Key("other".into())), None);
    }

    #[test]
    fn inputs_deserialize_with_defaults() {
        let inputs: Inputs = serde_json::from_str(r#"{"args": [1, "a"]}"#).unwrap();
        assert_eq!(inputs, Inputs::positional([json!(1), json!("a")]));
    }
}
