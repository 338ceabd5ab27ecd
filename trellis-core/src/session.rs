//! Submit/fetch contract
//!
//! A [`Session`] is what a front end talks to. One submit request carries
//! a trigger and the input values and makes that run current; each fetch
//! request names a block of the [`Layout`] and waits for its node's value
//! on the run that was current when the fetch started.
//!
//! Transport is left to the caller: requests and responses are plain serde
//! types.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::error::{Error, Result};
use crate::execution::{Dispatcher, ExecutionHandle, Inputs, RunId, TriggerId, Value};
use crate::graph::{resolve_depths, Layout, NodeId};

/// Start (or join) the run for a trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub trigger: TriggerId,
    #[serde(flatten)]
    pub inputs: Inputs,
}

/// Ask for the value shown in one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub block: usize,
}

/// A single-element payload holding the block's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub data: Vec<Value>,
}

/// Front-end facing wrapper around a [`Dispatcher`].
#[derive(Debug)]
pub struct Session {
    dispatcher: Dispatcher,
    layout: Layout,
    current: watch::Sender<Option<ExecutionHandle>>,
}

impl Session {
    /// Resolve depths and lay out the dispatcher's graph.
    ///
    /// Fails if the graph contains a cycle.
    pub fn new(dispatcher: Dispatcher) -> Result<Self> {
        let depths = resolve_depths(dispatcher.graph())?;
        let layout = Layout::new(dispatcher.graph(), &depths);
        let (current, _) = watch::channel(None);
        Ok(Self {
            dispatcher,
            layout,
            current,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The run fetches currently read from.
    pub fn current(&self) -> Option<ExecutionHandle> {
        self.current.borrow().clone()
    }

    /// Submit inputs and make the resulting run current.
    pub fn submit(&self, request: SubmitRequest) -> Result<RunId> {
        let handle = self.dispatcher.submit(request.trigger, request.inputs)?;
        let run = handle.id();
        self.current.send_replace(Some(handle));
        debug!(%run, "current run replaced");
        Ok(run)
    }

    /// Wait for the value of one block.
    pub async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let block = self
            .layout
            .block(request.block)
            .ok_or(Error::UnknownBlock(request.block))?;
        let value = self.fetch_node(block.node).await?;
        Ok(FetchResponse { data: vec![value] })
    }

    /// Wait for a node's value on the current run.
    ///
    /// If nothing was submitted yet, waits for the first submission.
    pub async fn fetch_node(&self, node: NodeId) -> Result<Value> {
        if !self.dispatcher.graph().contains(node) {
            return Err(Error::UnknownNode(node));
        }
        let handle = self.current_or_next().await?;
        handle.result_for(node).await
    }

    async fn current_or_next(&self) -> Result<ExecutionHandle> {
        let mut rx = self.current.subscribe();
        let current = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| Error::Cancelled)?;
        current.clone().ok_or(Error::Cancelled)
    }
}
