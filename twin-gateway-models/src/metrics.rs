use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free gateway counters, incremented from the engine worker and the
/// notification hub.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    pub commands_executed: AtomicU64,
    pub updates_applied: AtomicU64,
    pub updates_dropped: AtomicU64,
    pub updates_failed: AtomicU64,
    pub events_delivered: AtomicU64,
    pub sessions_created: AtomicU64,
    pub sessions_expired: AtomicU64,
}

/// Point-in-time copy of [`GatewayMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub commands_executed: u64,
    pub updates_applied: u64,
    pub updates_dropped: u64,
    pub updates_failed: u64,
    pub events_delivered: u64,
    pub sessions_created: u64,
    pub sessions_expired: u64,
}

impl GatewayMetrics {
    #[inline]
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commands_executed: self.commands_executed.load(Ordering::Relaxed),
            updates_applied: self.updates_applied.load(Ordering::Relaxed),
            updates_dropped: self.updates_dropped.load(Ordering::Relaxed),
            updates_failed: self.updates_failed.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            sessions_expired: self.sessions_expired.load(Ordering::Relaxed),
        }
    }
}
