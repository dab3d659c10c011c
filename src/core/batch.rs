//! Batch accumulation and the flush decision.
//!
//! A [`Batch`] lives inside the delivery loop only. It collects admitted
//! records in admission order and asks its [`FlushPolicy`] whether the
//! current contents should be handed to the writer.

use std::time::{Duration, Instant};

use crate::core::record::Record;

/// Why a flush was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// The batch reached the configured capacity.
    Size,
    /// The flush interval elapsed since the last flush attempt.
    Interval,
    /// Unconditional flush during shutdown.
    Forced,
}

/// Size and time thresholds for flushing.
#[derive(Debug, Clone, Copy)]
pub struct FlushPolicy {
    capacity: usize,
    interval: Duration,
}

impl FlushPolicy {
    pub fn new(capacity: usize, interval: Duration) -> Self {
        Self { capacity, interval }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the trigger if a batch of `len` records should be flushed now.
    ///
    /// An empty batch never flushes, even when forced.
    pub fn decide(&self, len: usize, since_last_flush: Duration, force: bool) -> Option<FlushTrigger> {
        if len == 0 {
            return None;
        }
        if force {
            return Some(FlushTrigger::Forced);
        }
        if len >= self.capacity {
            return Some(FlushTrigger::Size);
        }
        if since_last_flush >= self.interval {
            return Some(FlushTrigger::Interval);
        }
        None
    }
}

/// Records accumulated between two flush attempts.
#[derive(Debug)]
pub struct Batch {
    policy: FlushPolicy,
    records: Vec<Record>,
    last_flush: Instant,
}

impl Batch {
    pub fn new(policy: FlushPolicy, now: Instant) -> Self {
        Self {
            records: Vec::with_capacity(policy.capacity()),
            policy,
            last_flush: now,
        }
    }

    #[inline]
    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn due(&self, now: Instant, force: bool) -> Option<FlushTrigger> {
        let since = now.saturating_duration_since(self.last_flush);
        self.policy.decide(self.records.len(), since, force)
    }

    /// Hands out the accumulated records in admission order, leaving the batch empty.
    pub fn take(&mut self) -> Vec<Record> {
        std::mem::replace(&mut self.records, Vec::with_capacity(self.policy.capacity()))
    }

    /// Resets the flush clock. Called after every attempt, successful or not.
    #[inline]
    pub fn mark_flushed(&mut self, now: Instant) {
        self.last_flush = now;
    }
}
