//! Instrumentation counters for the feed/send paths.
//!
//! All counters are atomics so a host statistics task can read them from
//! another thread without touching engine state. The engine only ever
//! increments; readers take snapshots.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters exposed to the host.
#[derive(Debug, Default)]
pub struct Stats {
    /// Number of `feed` calls.
    pub feed_calls: AtomicU64,
    /// Total bytes consumed by `feed`.
    pub feed_bytes: AtomicU64,
    /// Nanoseconds spent inside `feed`.
    pub feed_nanos: AtomicU64,
    /// Number of responses emitted through the host `send` callback.
    pub responses: AtomicU64,
    /// Total response bytes emitted.
    pub response_bytes: AtomicU64,
    /// Largest single feed chunk seen (input backlog high-water mark).
    pub backlog_high_water: AtomicU64,
}

/// A point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub feed_calls: u64,
    pub feed_bytes: u64,
    pub feed_nanos: u64,
    pub responses: u64,
    pub response_bytes: u64,
    pub backlog_high_water: u64,
}

impl Stats {
    pub(crate) fn record_feed(&self, bytes: usize, nanos: u64) {
        self.feed_calls.fetch_add(1, Ordering::Relaxed);
        self.feed_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        self.feed_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.backlog_high_water
            .fetch_max(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_response(&self, bytes: usize) {
        self.responses.fetch_add(1, Ordering::Relaxed);
        self.response_bytes
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Take a consistent-enough snapshot for display.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            feed_calls: self.feed_calls.load(Ordering::Relaxed),
            feed_bytes: self.feed_bytes.load(Ordering::Relaxed),
            feed_nanos: self.feed_nanos.load(Ordering::Relaxed),
            responses: self.responses.load(Ordering::Relaxed),
            response_bytes: self.response_bytes.load(Ordering::Relaxed),
            backlog_high_water: self.backlog_high_water.load(Ordering::Relaxed),
        }
    }
}
