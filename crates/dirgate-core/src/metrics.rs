//! Per-service operation metrics
//!
//! A lightweight recorder each service instance updates per operation.
//! Shared behind `Arc`, so counters are atomic; reads produce a consistent
//! point-in-time snapshot for logging or scraping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters recorded by a directory service.
#[derive(Debug, Default)]
pub struct DirectoryMetrics {
    queries_executed: AtomicU64,
    entities_returned: AtomicU64,
    errors: AtomicU64,
    connections_established: AtomicU64,
    connections_failed: AtomicU64,
    query_time_micros: AtomicU64,
}

impl DirectoryMetrics {
    /// Create a fresh recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed query and its latency.
    pub fn record_query(&self, latency: Duration, entities: usize) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
        self.entities_returned
            .fetch_add(entities as u64, Ordering::Relaxed);
        self.query_time_micros
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a failed operation.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful connection establishment.
    pub fn record_connection(&self) {
        self.connections_established.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed connection establishment.
    pub fn record_connection_failure(&self) {
        self.connections_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Read a point-in-time snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            entities_returned: self.entities_returned.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            connections_established: self.connections_established.load(Ordering::Relaxed),
            connections_failed: self.connections_failed.load(Ordering::Relaxed),
            query_time_micros: self.query_time_micros.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a service's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queries_executed: u64,
    pub entities_returned: u64,
    pub errors: u64,
    pub connections_established: u64,
    pub connections_failed: u64,
    pub query_time_micros: u64,
}

impl MetricsSnapshot {
    /// Mean query latency, if any query completed.
    pub fn mean_query_latency(&self) -> Option<Duration> {
        if self.queries_executed == 0 {
            return None;
        }
        Some(Duration::from_micros(
            self.query_time_micros / self.queries_executed,
        ))
    }
}
