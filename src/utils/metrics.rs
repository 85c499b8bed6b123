//! Relay Metrics
//!
//! Atomic counters shared by the server loops and the dispatcher. One
//! `Arc<Metrics>` is created per server and handed to everything that
//! records into it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Counters for relay activity
#[derive(Debug)]
pub struct Metrics {
    /// Total TCP connections accepted
    pub connections_total: AtomicU64,
    /// Currently open TCP connections
    pub connections_active: AtomicU64,
    /// Datagrams received
    pub datagrams_received: AtomicU64,
    /// Completed handshakes
    pub handshakes: AtomicU64,
    /// Requests handled (any outcome)
    pub requests: AtomicU64,
    /// Requests answered with a domain error
    pub domain_errors: AtomicU64,
    /// Hash or signature failures
    pub integrity_failures: AtomicU64,
    /// Framing and schema errors
    pub protocol_errors: AtomicU64,
    /// Units skipped because their tag does not start a request
    pub units_skipped: AtomicU64,
    pub bytes_received: AtomicU64,
    pub bytes_sent: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            datagrams_received: AtomicU64::new(0),
            handshakes: AtomicU64::new(0),
            requests: AtomicU64::new(0),
            domain_errors: AtomicU64::new(0),
            integrity_failures: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            units_skipped: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn datagram_received(&self, byte_count: u64) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn bytes_in(&self, byte_count: u64) {
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn response_sent(&self, byte_count: u64) {
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn handshake(&self) {
        self.handshakes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn domain_error(&self) {
        self.domain_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn integrity_failure(&self) {
        self.integrity_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unit_skipped(&self) {
        self.units_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            handshakes: self.handshakes.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            domain_errors: self.domain_errors.load(Ordering::Relaxed),
            integrity_failures: self.integrity_failures.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            units_skipped: self.units_skipped.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let s = self.snapshot();
        info!(
            connections_total = s.connections_total,
            connections_active = s.connections_active,
            datagrams_received = s.datagrams_received,
            handshakes = s.handshakes,
            requests = s.requests,
            domain_errors = s.domain_errors,
            integrity_failures = s.integrity_failures,
            protocol_errors = s.protocol_errors,
            units_skipped = s.units_skipped,
            bytes_received = s.bytes_received,
            bytes_sent = s.bytes_sent,
            uptime_seconds = s.uptime_seconds,
            "Relay metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub datagrams_received: u64,
    pub handshakes: u64,
    pub requests: u64,
    pub domain_errors: u64,
    pub integrity_failures: u64,
    pub protocol_errors: u64,
    pub units_skipped: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = Metrics::new();
        metrics.connection_established();
        metrics.connection_established();
        metrics.connection_closed();
        metrics.datagram_received(40);
        metrics.response_sent(67);
        metrics.integrity_failure();

        let s = metrics.snapshot();
        assert_eq!(s.connections_total, 2);
        assert_eq!(s.connections_active, 1);
        assert_eq!(s.datagrams_received, 1);
        assert_eq!(s.bytes_received, 40);
        assert_eq!(s.bytes_sent, 67);
        assert_eq!(s.integrity_failures, 1);
    }
}
