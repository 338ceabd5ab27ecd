//! Result Cache
//!
//! One write-once slot per node identity, created for every reachable node
//! when a run is submitted. Readers wait on a slot without polling; the
//! run's driver is the only writer.
//!
//! # How Slots Work
//!
//! 1. Every slot starts `Pending`.
//!
//! 2. The first write moves it to `Ready` or `Failed`. Any later write is
//!    refused, so every reader of a slot observes the same outcome.
//!
//! 3. A waiter subscribes to the slot's watch channel and suspends until the
//!    slot leaves `Pending`. Waiters arriving after that return at once.

use std::collections::HashMap;

use dashmap::DashMap;
use tokio::sync::watch;

use super::runtime::Value;
use crate::error::{Error, Result};
use crate::graph::NodeId;

/// State of one node's result.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Pending,
    Ready(Value),
    Failed(Error),
}

impl Slot {
    pub fn is_pending(&self) -> bool {
        matches!(self, Slot::Pending)
    }

    fn outcome(&self) -> Option<Result<Value>> {
        match self {
            Slot::Pending => None,
            Slot::Ready(value) => Some(Ok(value.clone())),
            Slot::Failed(err) => Some(Err(err.clone())),
        }
    }
}

/// Per-node results of one execution.
#[derive(Debug)]
pub struct ResultCache {
    slots: DashMap<NodeId, watch::Sender<Slot>>,
}

impl ResultCache {
    /// Create a pending slot for every node.
    pub fn new(nodes: impl IntoIterator<Item = NodeId>) -> Self {
        let slots = DashMap::new();
        for id in nodes {
            let (tx, _) = watch::channel(Slot::Pending);
            slots.insert(id, tx);
        }
        Self { slots }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Store a node's value. Returns false if the slot was already settled
    /// or does not exist.
    pub fn resolve(&self, id: NodeId, value: Value) -> bool {
        self.settle(id, Slot::Ready(value))
    }

    /// Record a node's failure. Returns false if the slot was already
    /// settled or does not exist.
    pub fn fail(&self, id: NodeId, err: Error) -> bool {
        self.settle(id, Slot::Failed(err))
    }

    /// Fail every slot that is still pending. Returns how many were failed.
    pub fn fail_pending(&self, err: &Error) -> usize {
        let mut failed = 0;
        for entry in self.slots.iter() {
            if Self::settle_slot(entry.value(), Slot::Failed(err.clone())) {
                failed += 1;
            }
        }
        failed
    }

    /// The outcome of a slot if it is settled, without waiting.
    pub fn peek(&self, id: NodeId) -> Result<Option<Result<Value>>> {
        let slot = self.slots.get(&id).ok_or(Error::UnknownNode(id))?;
        let outcome = slot.borrow().outcome();
        Ok(outcome)
    }

    /// Wait until a node's slot is settled and return its outcome.
    pub async fn wait(&self, id: NodeId) -> Result<Value> {
        // Subscribe before releasing the map guard; never await while holding it.
        let mut rx = self
            .slots
            .get(&id)
            .ok_or(Error::UnknownNode(id))?
            .subscribe();

        let slot = rx
            .wait_for(|slot| !slot.is_pending())
            .await
            .map_err(|_| Error::Cancelled)?;

        slot.outcome().unwrap_or(Err(Error::Cancelled))
    }

    /// Number of slots not yet settled.
    pub fn pending(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| entry.value().borrow().is_pending())
            .count()
    }

    /// Settled values, for reporting.
    pub fn snapshot(&self) -> HashMap<NodeId, Slot> {
        self.slots
            .iter()
            .map(|entry| (*entry.key(), entry.value().borrow().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn settle(&self, id: NodeId, next: Slot) -> bool {
        match self.slots.get(&id) {
            Some(tx) => Self::settle_slot(tx.value(), next),
            None => false,
        }
    }

    fn settle_slot(tx: &watch::Sender<Slot>, next: Slot) -> bool {
        tx.send_if_modified(|slot| {
            if slot.is_pending() {
                *slot = next;
                true
            } else {
                false
            }
        })
    }
}
