#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

use logbatch::{DeliveryError, Record, RemoteWriter};
use parking_lot::Mutex;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        logbatch::logging::init_logging();
    });
}

pub fn record(n: usize) -> Record {
    Record::now(HashMap::from([("n".to_string(), n.to_string())]))
}

pub fn numbers(batch: &[Record]) -> Vec<usize> {
    batch
        .iter()
        .filter_map(|r| r.get("n").and_then(|n| n.parse().ok()))
        .collect()
}

/// Writer that remembers every batch it was handed.
#[derive(Clone, Default)]
pub struct RecordingWriter {
    batches: Arc<Mutex<Vec<Vec<Record>>>>,
    calls: Arc<AtomicUsize>,
    delay: Duration,
    failures: Arc<AtomicUsize>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps this long inside every delivery.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Rejects the first `n` deliveries.
    pub fn failing_first(self, n: usize) -> Self {
        self.failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn batches(&self) -> Vec<Vec<Record>> {
        self.batches.lock().clone()
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.batches.lock().iter().map(Vec::len).collect()
    }

    pub fn delivered(&self) -> usize {
        self.batches.lock().iter().map(Vec::len).sum()
    }

    /// Deliveries attempted so far, including rejected ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RemoteWriter for RecordingWriter {
    fn deliver(&self, records: &[Record]) -> Result<(), DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let rejected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(DeliveryError::rejected("sink unavailable"));
        }
        self.batches.lock().push(records.to_vec());
        Ok(())
    }
}

/// Polls `check` until it holds or `timeout` elapses.
pub async fn eventually<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
