//! The single background task that drains the admission queue, batches
//! records and hands batches to the writer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use flume::Receiver;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::core::batch::{Batch, FlushPolicy};
use crate::core::record::Record;
use crate::core::state::{ServiceState, StateCell};
use crate::core::writer::RemoteWriter;
use crate::metrics::ServiceStats;

/// Fraction of the flush interval used as the poll tick.
pub const POLL_DIVISOR: u32 = 10;

const MIN_POLL: Duration = Duration::from_millis(1);

/// Poll tick for a given flush interval; never zero.
pub fn poll_interval(flush_interval: Duration) -> Duration {
    (flush_interval / POLL_DIVISOR).max(MIN_POLL)
}

pub(crate) struct DeliveryLoop {
    pub(crate) receiver: Receiver<Record>,
    pub(crate) writer: Arc<dyn RemoteWriter>,
    pub(crate) policy: FlushPolicy,
    pub(crate) state: Arc<StateCell>,
    pub(crate) stats: Arc<ServiceStats>,
    pub(crate) done: watch::Sender<bool>,
}

impl DeliveryLoop {
    pub(crate) async fn run(self) {
        let DeliveryLoop {
            receiver,
            writer,
            policy,
            state,
            stats,
            done,
        } = self;

        info!(
            capacity = policy.capacity(),
            interval_ms = policy.interval().as_millis() as u64,
            "delivery loop started"
        );

        let mut batch = Batch::new(policy, Instant::now());
        let mut ticker = interval(poll_interval(policy.interval()));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                received = receiver.recv_async() => match received {
                    Ok(record) => {
                        batch.push(record);
                        try_flush(&mut batch, &writer, &stats, false).await;
                    }
                    // gate closed and queue drained
                    Err(_) => break,
                },
                _ = ticker.tick() => {
                    try_flush(&mut batch, &writer, &stats, false).await;
                }
            }
        }

        try_flush(&mut batch, &writer, &stats, true).await;

        state.transition(ServiceState::Stopping, ServiceState::Stopped);
        done.send_replace(true);
        info!("delivery loop stopped");
    }
}

async fn try_flush(
    batch: &mut Batch,
    writer: &Arc<dyn RemoteWriter>,
    stats: &ServiceStats,
    force: bool,
) {
    let Some(trigger) = batch.due(Instant::now(), force) else {
        return;
    };

    let records = batch.take();
    let size = records.len();
    let started = Instant::now();
    let writer = Arc::clone(writer);

    // Blocking pool keeps slow sinks off the runtime workers and turns a
    // writer panic into a JoinError instead of killing the loop.
    let outcome = tokio::task::spawn_blocking(move || writer.deliver(&records)).await;
    batch.mark_flushed(Instant::now());

    match outcome {
        Ok(Ok(())) => {
            stats.record_flush(trigger, size);
            debug!(
                records = size,
                trigger = ?trigger,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "flushed batch"
            );
        }
        Ok(Err(e)) => {
            stats.record_failure(size);
            warn!(records = size, trigger = ?trigger, error = %e, "failed to flush batch, records dropped");
        }
        Err(e) if e.is_panic() => {
            stats.record_failure(size);
            error!(records = size, trigger = ?trigger, "writer panicked during flush, records dropped");
        }
        Err(e) => {
            stats.record_failure(size);
            error!(records = size, error = %e, "flush task did not complete, records dropped");
        }
    }
}
