//! Service counters
//!
//! Lightweight atomic counters exported on `/metrics` for Prometheus-style
//! scraping. The log stream is the primary observability surface; these
//! cover the handful of rates worth graphing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Core metrics for the aggregation service.
#[derive(Default)]
pub struct ServiceMetrics {
    // Refresh pipeline
    pub refresh_cycles: AtomicU64,
    pub refresh_skipped_empty: AtomicU64,
    pub snapshots_published: AtomicU64,
    pub fetch_failures: AtomicU64,

    // Query surface
    pub queries_served: AtomicU64,

    // Fan-out
    pub connected_sessions: AtomicU64,
    pub messages_broadcast: AtomicU64,
    pub broadcast_drops: AtomicU64,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one refresh cycle starting.
    pub fn record_refresh_cycle(&self) {
        self.refresh_cycles.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a refresh skipped because every source came back empty.
    pub fn record_skipped_empty(&self) {
        self.refresh_skipped_empty.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a changed snapshot being published.
    pub fn record_snapshot_published(&self) {
        self.snapshots_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one source failing (or contributing nothing) in a cycle.
    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a query served from the snapshot.
    pub fn record_query(&self) {
        self.queries_served.fetch_add(1, Ordering::Relaxed);
    }

    /// Update the connected session gauge.
    pub fn set_connected_sessions(&self, count: u64) {
        self.connected_sessions.store(count, Ordering::Relaxed);
    }

    /// Record one message handed to a session outbox.
    pub fn record_broadcast(&self) {
        self.messages_broadcast.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message dropped because a session outbox was full.
    pub fn record_broadcast_drop(&self) {
        self.broadcast_drops.fetch_add(1, Ordering::Relaxed);
    }

    /// Export metrics as a BTreeMap for Prometheus-style exposition.
    pub fn export(&self) -> BTreeMap<String, u64> {
        let mut m = BTreeMap::new();
        m.insert(
            "refresh_cycles".to_string(),
            self.refresh_cycles.load(Ordering::Relaxed),
        );
        m.insert(
            "refresh_skipped_empty".to_string(),
            self.refresh_skipped_empty.load(Ordering::Relaxed),
        );
        m.insert(
            "snapshots_published".to_string(),
            self.snapshots_published.load(Ordering::Relaxed),
        );
        m.insert(
            "fetch_failures".to_string(),
            self.fetch_failures.load(Ordering::Relaxed),
        );
        m.insert(
            "queries_served".to_string(),
            self.queries_served.load(Ordering::Relaxed),
        );
        m.insert(
            "connected_sessions".to_string(),
            self.connected_sessions.load(Ordering::Relaxed),
        );
        m.insert(
            "messages_broadcast".to_string(),
            self.messages_broadcast.load(Ordering::Relaxed),
        );
        m.insert(
            "broadcast_drops".to_string(),
            self.broadcast_drops.load(Ordering::Relaxed),
        );
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = ServiceMetrics::new();

        metrics.record_refresh_cycle();
        metrics.record_refresh_cycle();
        metrics.record_snapshot_published();
        metrics.record_fetch_failure();
        metrics.set_connected_sessions(3);

        let exported = metrics.export();
        assert_eq!(exported["refresh_cycles"], 2);
        assert_eq!(exported["snapshots_published"], 1);
        assert_eq!(exported["fetch_failures"], 1);
        assert_eq!(exported["connected_sessions"], 3);
        assert_eq!(exported["queries_served"], 0);
    }

    #[test]
    fn test_export_lists_all_counters() {
        let exported = ServiceMetrics::new().export();
        assert_eq!(exported.len(), 8);
        assert!(exported.values().all(|&v| v == 0));
    }
}
