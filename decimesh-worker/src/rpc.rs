//! Correlated request/response channel to the worker
//!
//! Every call gets a fresh [`CorrelationId`] and a pending entry holding the
//! sender half of a oneshot. A dispatch task reads worker responses and settles
//! the matching entry, removing it in the same step so no call can be settled
//! twice. Responses for ids that are not pending are dropped.

use crate::error::{DecimateError, Result};
use crate::protocol::{
    CorrelationId, DecimationResult, RequestKind, WorkerReply, WorkerRequest, WorkerResponse,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

#[derive(Default)]
struct PendingCalls {
    calls: HashMap<CorrelationId, oneshot::Sender<WorkerReply>>,
    /// Set once the worker's response stream has ended
    closed: bool,
}

type Pending = Arc<Mutex<PendingCalls>>;

/// Unregisters a call when its future finishes, fails or is dropped
struct PendingGuard<'a> {
    pending: &'a Mutex<PendingCalls>,
    id: CorrelationId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().calls.remove(&self.id);
    }
}

pub struct RpcChannel {
    outbound: flume::Sender<WorkerRequest>,
    pending: Pending,
    next_id: AtomicU64,
    timeout: Option<Duration>,
    dispatcher: JoinHandle<()>,
}

impl RpcChannel {
    /// Connect to a worker through its request queue and response stream.
    ///
    /// Spawns the dispatch task, so this must be called within a tokio runtime.
    pub fn connect(
        outbound: flume::Sender<WorkerRequest>,
        inbound: flume::Receiver<WorkerResponse>,
        timeout: Option<Duration>,
    ) -> Self {
        let pending = Pending::default();
        let dispatcher = tokio::spawn(dispatch(inbound, pending.clone()));
        Self {
            outbound,
            pending,
            next_id: AtomicU64::new(1),
            timeout,
            dispatcher,
        }
    }

    /// Send one request and wait for its reply.
    ///
    /// The request (and the buffer inside it) moves into the worker queue.
    /// A worker-side failure resolves to [`DecimateError::Worker`] carrying the
    /// worker's message.
    pub async fn call(&self, kind: RequestKind) -> Result<DecimationResult> {
        let id = CorrelationId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self.pending.lock();
            if pending.closed {
                return Err(DecimateError::Disconnected);
            }
            pending.calls.insert(id, tx);
        }
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        self.outbound
            .send(WorkerRequest { id, kind })
            .map_err(|_| DecimateError::Disconnected)?;
        log::trace!("sent request {}", id);

        let reply = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, rx)
                .await
                .map_err(|_| DecimateError::Timeout(limit))?,
            None => rx.await,
        };

        reply
            .map_err(|_| DecimateError::Disconnected)?
            .map_err(|message| DecimateError::Worker { message })
    }

    /// Number of calls waiting for a reply
    pub fn pending_count(&self) -> usize {
        self.pending.lock().calls.len()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Drop for RpcChannel {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

async fn dispatch(inbound: flume::Receiver<WorkerResponse>, pending: Pending) {
    while let Ok(WorkerResponse { id, reply }) = inbound.recv_async().await {
        let waiter = pending.lock().calls.remove(&id);
        match waiter {
            Some(tx) => {
                if tx.send(reply).is_err() {
                    log::trace!("caller of {} went away before its reply", id);
                }
            }
            None => log::trace!("dropping response for unknown id {}", id),
        }
    }

    let mut pending = pending.lock();
    pending.closed = true;
    if !pending.calls.is_empty() {
        log::warn!("worker disconnected with {} calls outstanding", pending.calls.len());
    }
    pending.calls.clear();
}
