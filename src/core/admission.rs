//! Bounded admission queue shared by every producer.

use std::sync::Arc;
use std::time::Duration;

use flume::{Receiver, Selector, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::core::record::Record;
use crate::core::state::StateCell;
use crate::metrics::ServiceStats;

/// Outcome of handing a record to the gate.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The record is in the queue and will be delivered (best effort).
    Queued,
    /// The queue stayed full past the caller's timeout; the record was dropped.
    TimedOut,
    /// Shutdown has begun; the record was dropped without waiting.
    Discarded,
}

/// Fixed-capacity multi-producer queue feeding the delivery loop.
///
/// Closing the gate drops the only long-lived sender. The loop keeps
/// draining whatever was queued and sees the disconnect afterwards.
/// Producers still waiting for space race their send against the close
/// signal and are discarded as soon as the gate closes.
#[derive(Debug)]
pub struct AdmissionGate {
    state: Arc<StateCell>,
    stats: Arc<ServiceStats>,
    sender: RwLock<Option<Sender<Record>>>,
    // Never sent on; dropping the sender disconnects `closed`.
    closing: Mutex<Option<Sender<()>>>,
    closed: Receiver<()>,
    capacity: usize,
}

impl AdmissionGate {
    pub fn new(
        capacity: usize,
        state: Arc<StateCell>,
        stats: Arc<ServiceStats>,
    ) -> (Self, Receiver<Record>) {
        let (tx, rx) = flume::bounded(capacity);
        let (closing, closed) = flume::bounded(1);
        let gate = Self {
            state,
            stats,
            sender: RwLock::new(Some(tx)),
            closing: Mutex::new(Some(closing)),
            closed,
            capacity,
        };
        (gate, rx)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of records waiting for the delivery loop.
    pub fn queued(&self) -> usize {
        self.sender.read().as_ref().map_or(0, Sender::len)
    }

    fn open_sender(&self) -> Option<Sender<Record>> {
        if self.state.load().rejects_admission() {
            return None;
        }
        self.sender.read().clone()
    }

    /// Blocks the calling thread for at most `timeout` while the queue is full.
    pub fn admit(&self, record: Record, timeout: Duration) -> Admission {
        let Some(sender) = self.open_sender() else {
            return self.discard();
        };
        // close signal registered first so it wins over free space
        let outcome = Selector::new()
            .recv(&self.closed, |_| Admission::Discarded)
            .send(&sender, record, |sent| match sent {
                Ok(()) => Admission::Queued,
                Err(_) => Admission::Discarded,
            })
            .wait_timeout(timeout);
        match outcome {
            Ok(Admission::Queued) => self.queued_ok(),
            Ok(_) => self.discard(),
            Err(_) => self.timed_out(timeout),
        }
    }

    /// Async twin of [`admit`](Self::admit): suspends the task instead of the thread.
    pub async fn admit_async(&self, record: Record, timeout: Duration) -> Admission {
        let Some(sender) = self.open_sender() else {
            return self.discard();
        };
        tokio::select! {
            biased;
            _ = self.closed.recv_async() => self.discard(),
            sent = tokio::time::timeout(timeout, sender.send_async(record)) => match sent {
                Ok(Ok(())) => self.queued_ok(),
                Ok(Err(_)) => self.discard(),
                Err(_) => self.timed_out(timeout),
            },
        }
    }

    /// Drops the gate's sender and wakes every producer still waiting for
    /// space. Idempotent.
    pub fn close(&self) {
        let signalled = self.closing.lock().take().is_some();
        if self.sender.write().take().is_some() || signalled {
            trace!("admission gate closed");
        }
    }

    #[inline]
    fn queued_ok(&self) -> Admission {
        self.stats.inc_admitted();
        Admission::Queued
    }

    fn timed_out(&self, timeout: Duration) -> Admission {
        self.stats.inc_timed_out();
        trace!(timeout_ms = timeout.as_millis() as u64, "admission timed out, record dropped");
        Admission::TimedOut
    }

    fn discard(&self) -> Admission {
        self.stats.inc_discarded();
        trace!("service stopping, record discarded");
        Admission::Discarded
    }
}
