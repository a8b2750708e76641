//! Thread-safe operational counters
//!
//! Atomic counters for the message pipelines plus a mutex-guarded map for
//! per-reason handshake failures. All counters are monotonic; `snapshot()`
//! produces a serializable view.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Global metrics collector instance
pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

/// Get a reference to the global metrics collector
pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

#[derive(Default)]
pub struct MetricsCollector {
    control_messages_received: AtomicU64,
    data_messages_received: AtomicU64,
    reconnects_sent: AtomicU64,
    publish_failures: AtomicU64,
    kafka_writes: AtomicU64,
    kafka_write_failures: AtomicU64,
    sources_register_failures: AtomicU64,
    handshake_failures: Mutex<HashMap<String, u64>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn control_message_received(&self) {
        self.control_messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn data_message_received(&self) {
        self.data_messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reconnect_sent(&self) {
        self.reconnects_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn publish_failed(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn kafka_write_succeeded(&self) {
        self.kafka_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn kafka_write_failed(&self) {
        self.kafka_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sources_register_failed(&self) {
        self.sources_register_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_failed(&self, reason: &str) {
        if let Ok(mut failures) = self.handshake_failures.lock() {
            *failures.entry(reason.to_string()).or_insert(0) += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let handshake_failures = self
            .handshake_failures
            .lock()
            .map(|failures| failures.clone())
            .unwrap_or_default();

        MetricsSnapshot {
            control_messages_received: self.control_messages_received.load(Ordering::Relaxed),
            data_messages_received: self.data_messages_received.load(Ordering::Relaxed),
            reconnects_sent: self.reconnects_sent.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            kafka_writes: self.kafka_writes.load(Ordering::Relaxed),
            kafka_write_failures: self.kafka_write_failures.load(Ordering::Relaxed),
            sources_register_failures: self.sources_register_failures.load(Ordering::Relaxed),
            handshake_failures,
        }
    }

    /// Reset all counters (useful for testing).
    pub fn reset(&self) {
        self.control_messages_received.store(0, Ordering::Relaxed);
        self.data_messages_received.store(0, Ordering::Relaxed);
        self.reconnects_sent.store(0, Ordering::Relaxed);
        self.publish_failures.store(0, Ordering::Relaxed);
        self.kafka_writes.store(0, Ordering::Relaxed);
        self.kafka_write_failures.store(0, Ordering::Relaxed);
        self.sources_register_failures.store(0, Ordering::Relaxed);
        if let Ok(mut failures) = self.handshake_failures.lock() {
            failures.clear();
        }
    }
}

/// Serializable view of all counters
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub control_messages_received: u64,
    pub data_messages_received: u64,
    pub reconnects_sent: u64,
    pub publish_failures: u64,
    pub kafka_writes: u64,
    pub kafka_write_failures: u64,
    pub sources_register_failures: u64,
    pub handshake_failures: HashMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_message_counters() {
        let collector = MetricsCollector::new();

        collector.control_message_received();
        collector.control_message_received();
        collector.data_message_received();

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.control_messages_received, 2);
        assert_eq!(snapshot.data_messages_received, 1);
    }

    #[test]
    fn test_handshake_failure_reasons() {
        let collector = MetricsCollector::new();

        collector.handshake_failed("authentication");
        collector.handshake_failed("authentication");
        collector.handshake_failed("registration");

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.handshake_failures.get("authentication"), Some(&2));
        assert_eq!(snapshot.handshake_failures.get("registration"), Some(&1));
    }

    #[test]
    fn test_thread_safety() {
        let collector = Arc::new(MetricsCollector::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let collector = Arc::clone(&collector);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    collector.control_message_received();
                    collector.kafka_write_succeeded();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.control_messages_received, 800);
        assert_eq!(snapshot.kafka_writes, 800);
    }

    #[test]
    fn test_reset() {
        let collector = MetricsCollector::new();
        collector.reconnect_sent();
        collector.handshake_failed("authentication");

        collector.reset();

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.reconnects_sent, 0);
        assert!(snapshot.handshake_failures.is_empty());
    }

    #[test]
    fn test_snapshot_serializes() {
        let collector = MetricsCollector::new();
        collector.sources_register_failed();

        let json = serde_json::to_string(&collector.snapshot()).unwrap();
        assert!(json.contains("\"sources_register_failures\":1"));
    }
}
