use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::batch::FlushTrigger;

// Per-service counters (low overhead, relaxed ordering). Coarse-grained and
// only meant for reporting, never for coordination.
#[derive(Debug, Default)]
pub struct ServiceStats {
    admitted: AtomicU64,
    timed_out: AtomicU64,
    discarded: AtomicU64,
    flush_by_size: AtomicU64,
    flush_by_interval: AtomicU64,
    flush_forced: AtomicU64,
    delivered_records: AtomicU64,
    failed_flushes: AtomicU64,
    failed_records: AtomicU64,
}

/// Point-in-time copy of [`ServiceStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub admitted: u64,
    pub timed_out: u64,
    pub discarded: u64,
    pub flush_by_size: u64,
    pub flush_by_interval: u64,
    pub flush_forced: u64,
    pub delivered_records: u64,
    pub failed_flushes: u64,
    pub failed_records: u64,
}

impl StatsSnapshot {
    /// Successful flushes, regardless of trigger.
    pub fn flushes(&self) -> u64 {
        self.flush_by_size + self.flush_by_interval + self.flush_forced
    }
}

impl ServiceStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inc_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn inc_timed_out(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn inc_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self, trigger: FlushTrigger, records: usize) {
        let counter = match trigger {
            FlushTrigger::Size => &self.flush_by_size,
            FlushTrigger::Interval => &self.flush_by_interval,
            FlushTrigger::Forced => &self.flush_forced,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.delivered_records
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self, records: usize) {
        self.failed_flushes.fetch_add(1, Ordering::Relaxed);
        self.failed_records
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            admitted: self.admitted.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            flush_by_size: self.flush_by_size.load(Ordering::Relaxed),
            flush_by_interval: self.flush_by_interval.load(Ordering::Relaxed),
            flush_forced: self.flush_forced.load(Ordering::Relaxed),
            delivered_records: self.delivered_records.load(Ordering::Relaxed),
            failed_flushes: self.failed_flushes.load(Ordering::Relaxed),
            failed_records: self.failed_records.load(Ordering::Relaxed),
        }
    }

    pub fn render(&self) -> String {
        // Simple text format (Prometheus-style without HELP/TYPE lines)
        let s = self.snapshot();
        format!(
            "logbatch_admitted {}\nlogbatch_timed_out {}\nlogbatch_discarded {}\nlogbatch_flush_by_size {}\nlogbatch_flush_by_interval {}\nlogbatch_flush_forced {}\nlogbatch_delivered_records {}\nlogbatch_failed_flushes {}\nlogbatch_failed_records {}\n",
            s.admitted,
            s.timed_out,
            s.discarded,
            s.flush_by_size,
            s.flush_by_interval,
            s.flush_forced,
            s.delivered_records,
            s.failed_flushes,
            s.failed_records,
        )
    }
}
