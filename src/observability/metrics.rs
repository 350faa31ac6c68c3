//! Metrics collection.
//!
//! Atomic counters for local tracking of the renewal and replay paths.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Thread-safe atomic counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Thread-safe atomic gauge.
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Counters for the authentication path of a client.
#[derive(Debug, Default)]
pub struct AuthMetrics {
    pub requests: Counter,
    pub renewals_started: Counter,
    pub renewals_succeeded: Counter,
    pub renewals_failed: Counter,
    pub callers_queued: Counter,
    pub replays: Counter,
    pub double_failures: Counter,
    pub logouts_signalled: Counter,
    /// Callers currently suspended on an in-flight renewal.
    pub waiting: Gauge,
}

impl AuthMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> AuthMetricsSnapshot {
        AuthMetricsSnapshot {
            requests: self.requests.get(),
            renewals_started: self.renewals_started.get(),
            renewals_succeeded: self.renewals_succeeded.get(),
            renewals_failed: self.renewals_failed.get(),
            callers_queued: self.callers_queued.get(),
            replays: self.replays.get(),
            double_failures: self.double_failures.get(),
            logouts_signalled: self.logouts_signalled.get(),
            waiting: self.waiting.get(),
        }
    }
}

/// Point-in-time copy of [`AuthMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AuthMetricsSnapshot {
    pub requests: u64,
    pub renewals_started: u64,
    pub renewals_succeeded: u64,
    pub renewals_failed: u64,
    pub callers_queued: u64,
    pub replays: u64,
    pub double_failures: u64,
    pub logouts_signalled: u64,
    pub waiting: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new();
        counter.inc();
        counter.add(4);
        assert_eq!(counter.get(), 5);
    }

    #[test]
    fn test_gauge() {
        let gauge = Gauge::new();
        gauge.inc();
        gauge.inc();
        gauge.dec();
        assert_eq!(gauge.get(), 1);
        gauge.set(-3);
        assert_eq!(gauge.get(), -3);
    }

    #[test]
    fn test_snapshot() {
        let metrics = AuthMetrics::new();
        metrics.renewals_started.inc();
        metrics.replays.add(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.renewals_started, 1);
        assert_eq!(snapshot.replays, 3);
        assert_eq!(snapshot.renewals_failed, 0);
    }
}
