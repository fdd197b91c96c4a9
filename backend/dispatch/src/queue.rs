//! Trigger queue processor.
//!
//! A trigger is appended to one FIFO queue. If no drain is active the caller
//! becomes the drain loop and serves requests until the queue is empty;
//! otherwise the call returns at once and the active drain picks the request
//! up later. Listeners that trigger further events therefore never grow the
//! stack, and nested events are delivered breadth-first in the order raised.

use std::collections::VecDeque;
use std::sync::Mutex;

use chatterbus_core::Channel;
use tracing::{debug, trace, warn};

use crate::dispatcher::{Shared, lock};
use crate::error::DispatchError;
use crate::types::{Callback, Deliver, EventKey, ListenerId};

/// One pending publish.
pub(crate) struct TriggerRequest {
    pub(crate) event: String,
    pub(crate) channel: Option<Channel>,
    pub(crate) deliver: Deliver,
}

#[derive(Default)]
pub(crate) struct TriggerQueue {
    pending: VecDeque<TriggerRequest>,
    busy: bool,
}

impl TriggerQueue {
    /// Enqueue a request. Returns true when the caller claimed the drain.
    pub(crate) fn push(&mut self, request: TriggerRequest) -> bool {
        self.pending.push_back(request);
        if self.busy {
            return false;
        }
        self.busy = true;
        true
    }

    /// Pop the next request, releasing the drain when the queue is empty.
    pub(crate) fn next_or_release(&mut self) -> Option<TriggerRequest> {
        let next = self.pending.pop_front();
        if next.is_none() {
            self.busy = false;
        }
        next
    }

    /// Drop everything still pending and release the drain.
    pub(crate) fn abort(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.busy = false;
        dropped
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.busy
    }
}

/// Releases the drain if the loop exits early through an error or a panic.
struct DrainGuard<'a> {
    queue: &'a Mutex<TriggerQueue>,
    armed: bool,
}

impl<'a> DrainGuard<'a> {
    fn new(queue: &'a Mutex<TriggerQueue>) -> Self {
        Self { queue, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let dropped = lock(self.queue).abort();
        if dropped > 0 {
            warn!(dropped, "[Dispatch] Discarded queued triggers after aborted drain");
        }
    }
}

impl Shared {
    pub(crate) fn trigger(
        &self,
        event: &str,
        channel: Option<&Channel>,
        deliver: Deliver,
    ) -> Result<(), DispatchError> {
        let request = TriggerRequest {
            event: event.to_string(),
            channel: channel.cloned(),
            deliver,
        };

        {
            let mut queue = lock(&self.queue);
            if !queue.push(request) {
                trace!(event, pending = queue.len(), "[Dispatch] Queued nested trigger");
                return Ok(());
            }
        }

        let guard = DrainGuard::new(&self.queue);
        let mut served = 0usize;
        let mut warned = false;

        loop {
            let (next, pending) = {
                let mut queue = lock(&self.queue);
                let next = queue.next_or_release();
                (next, queue.len())
            };
            let Some(request) = next else { break };

            served += 1;
            if served > self.drain_limit {
                return Err(DispatchError::DrainLimitExceeded {
                    limit: self.drain_limit,
                });
            }
            if !warned && pending >= self.queue_warn_depth {
                warn!(pending, event = %request.event, "[Dispatch] Trigger queue is backing up");
                warned = true;
            }

            for (key, snapshot) in self.snapshot_request(&request) {
                run_listeners(&key, snapshot, &request.deliver)?;
            }
        }

        guard.disarm();
        debug!(event, served, "[Dispatch] Drain complete");
        Ok(())
    }

    /// Listener lists for one request, copied under a single registry lock.
    ///
    /// Global listeners fire for every channel and come first; scoped ones
    /// only fire for theirs.
    fn snapshot_request(&self, request: &TriggerRequest) -> Vec<(EventKey, Snapshot)> {
        let mut keys = vec![EventKey::global(&request.event)];
        if let Some(channel) = &request.channel {
            keys.push(EventKey::scoped(&request.event, channel));
        }
        let registry = lock(&self.registry);
        keys.into_iter()
            .map(|key| {
                let snapshot = registry.snapshot(&key);
                (key, snapshot)
            })
            .collect()
    }
}

type Snapshot = Vec<(ListenerId, Callback)>;

fn run_listeners(
    key: &EventKey,
    snapshot: Snapshot,
    deliver: &Deliver,
) -> Result<(), DispatchError> {
    for (id, callback) in snapshot {
        trace!(key = %key, listener = %id, "[Dispatch] Delivering");
        deliver(&callback).map_err(|source| DispatchError::Delivery {
            key: key.clone(),
            listener: id,
            source,
        })?;
    }
    Ok(())
}
