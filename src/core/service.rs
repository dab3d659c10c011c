//! Delivery service: admission gate, delivery loop and the start/stop lifecycle.
//!
//! ```text
//!    ┌──────────────┐
//!    │  Producers   │ admit / admit_async (bounded, with timeout)
//!    └──────┬───────┘
//!           │ flume::bounded(capacity)
//!           v
//!    ┌──────────────┐
//!    │ Delivery     │ single task, owns the batch
//!    │ Loop         │ flush on size, interval or shutdown
//!    └──────┬───────┘
//!           │ spawn_blocking
//!           v
//!    ┌──────────────┐
//!    │ RemoteWriter │
//!    └──────────────┘
//! ```
//!
//! `stop` closes the gate, lets the loop drain whatever was already queued,
//! waits (bounded) for the final forced flush and reports the outcome.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::core::admission::{Admission, AdmissionGate};
use crate::core::batch::FlushPolicy;
use crate::core::delivery::DeliveryLoop;
use crate::core::error::ServiceError;
use crate::core::record::Record;
use crate::core::state::{ServiceState, StateCell};
use crate::core::writer::RemoteWriter;
use crate::metrics::{ServiceStats, StatsSnapshot};

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_ADMISSION_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(3);

/// Construction-time settings. The batch size threshold equals the queue capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    pub queue_capacity: usize,
    pub admission_timeout: Duration,
    pub flush_interval: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            admission_timeout: DEFAULT_ADMISSION_TIMEOUT,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

// Everything the loop needs, held until `start` hands it over.
struct PendingLoop {
    receiver: flume::Receiver<Record>,
    done: watch::Sender<bool>,
}

pub struct DeliveryService {
    config: ServiceConfig,
    state: Arc<StateCell>,
    stats: Arc<ServiceStats>,
    gate: AdmissionGate,
    writer: Arc<dyn RemoteWriter>,
    pending: Mutex<Option<PendingLoop>>,
    done: watch::Receiver<bool>,
}

impl DeliveryService {
    pub fn new<W: RemoteWriter>(config: ServiceConfig, writer: W) -> Self {
        Self::with_shared_writer(config, Arc::new(writer))
    }

    pub fn with_shared_writer(config: ServiceConfig, writer: Arc<dyn RemoteWriter>) -> Self {
        let state = Arc::new(StateCell::new());
        let stats = Arc::new(ServiceStats::new());
        let (gate, receiver) =
            AdmissionGate::new(config.queue_capacity, Arc::clone(&state), Arc::clone(&stats));
        let (done_tx, done_rx) = watch::channel(false);

        Self {
            config,
            state,
            stats,
            gate,
            writer,
            pending: Mutex::new(Some(PendingLoop {
                receiver,
                done: done_tx,
            })),
            done: done_rx,
        }
    }

    #[inline]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    #[inline]
    pub fn state(&self) -> ServiceState {
        self.state.load()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Prometheus-style text rendering of the counters.
    pub fn render_stats(&self) -> String {
        self.stats.render()
    }

    /// Spawns the delivery loop on the current tokio runtime.
    ///
    /// Must be called from within a runtime context.
    pub fn start(&self) -> Result<(), ServiceError> {
        if !self
            .state
            .transition(ServiceState::Created, ServiceState::Running)
        {
            return Err(ServiceError::AlreadyStarted);
        }
        let Some(PendingLoop { receiver, done }) = self.pending.lock().take() else {
            return Err(ServiceError::AlreadyStarted);
        };

        let delivery = DeliveryLoop {
            receiver,
            writer: Arc::clone(&self.writer),
            policy: FlushPolicy::new(self.config.queue_capacity, self.config.flush_interval),
            state: Arc::clone(&self.state),
            stats: Arc::clone(&self.stats),
            done,
        };
        tokio::spawn(delivery.run());
        Ok(())
    }

    /// Admits with the configured admission timeout.
    pub fn push(&self, record: Record) -> Admission {
        self.gate.admit(record, self.config.admission_timeout)
    }

    pub fn admit(&self, record: Record, timeout: Duration) -> Admission {
        self.gate.admit(record, timeout)
    }

    pub async fn admit_async(&self, record: Record, timeout: Duration) -> Admission {
        self.gate.admit_async(record, timeout).await
    }

    /// Records currently waiting in the admission queue.
    pub fn queued(&self) -> usize {
        self.gate.queued()
    }

    /// Begins shutdown (once) and waits up to `timeout` for the final flush.
    ///
    /// Concurrent and repeated calls all wait on the same completion signal.
    /// On `DeadlineExceeded` the loop is left running and still finishes its
    /// drain in the background.
    pub async fn stop(&self, timeout: Duration) -> Result<(), ServiceError> {
        loop {
            match self.state.load() {
                ServiceState::Created => {
                    if self
                        .state
                        .transition(ServiceState::Created, ServiceState::Stopping)
                    {
                        self.abandon_unstarted();
                        return Ok(());
                    }
                }
                ServiceState::Running => {
                    if self
                        .state
                        .transition(ServiceState::Running, ServiceState::Stopping)
                    {
                        info!(queued = self.gate.queued(), "stopping delivery service");
                        self.gate.close();
                        break;
                    }
                }
                ServiceState::Stopping | ServiceState::Stopped => break,
            }
        }

        let mut done = self.done.clone();
        let waited = tokio::time::timeout(timeout, done.wait_for(|finished| *finished))
            .await
            .map(|signal| signal.map(|_| ()));
        match waited {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(ServiceError::LoopAborted),
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "delivery loop still draining after shutdown deadline"
                );
                Err(ServiceError::DeadlineExceeded)
            }
        }
    }

    // No loop was ever spawned: nothing will drain the queue.
    fn abandon_unstarted(&self) {
        self.gate.close();
        if let Some(PendingLoop { receiver, done }) = self.pending.lock().take() {
            let dropped = receiver.drain().count();
            if dropped > 0 {
                warn!(records = dropped, "service stopped before start, queued records dropped");
            }
            self.state
                .transition(ServiceState::Stopping, ServiceState::Stopped);
            done.send_replace(true);
        }
    }
}

impl std::fmt::Debug for DeliveryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryService")
            .field("config", &self.config)
            .field("state", &self.state.load())
            .field("queued", &self.gate.queued())
            .finish()
    }
}
