use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Global runtime counters for the bot connection.
///
/// Purpose:
/// - Track outbound throughput (sent / queued / dropped)
/// - Track inbound frames
/// - Track connection churn (attempts, failed handshakes, closes)
///
/// Design:
/// - Lock-free (Atomics)
/// - Safe in async + multithreaded contexts
#[derive(Default)]
pub struct RuntimeMetrics {
    // Outbound
    pub messages_sent: AtomicUsize,
    pub messages_queued: AtomicUsize,
    pub messages_dropped: AtomicUsize,

    // Inbound
    pub frames_received: AtomicUsize,

    // Connection lifecycle
    pub connect_attempts: AtomicUsize,
    pub connect_failures: AtomicUsize,
    pub connections_closed: AtomicUsize,
}

impl RuntimeMetrics {
    /// One-line summary for the periodic reporter.
    pub fn summary(&self) -> String {
        format!(
            "sent={} queued={} dropped={} recv={} attempts={} connect_failed={} closed={}",
            self.messages_sent.load(Ordering::Relaxed),
            self.messages_queued.load(Ordering::Relaxed),
            self.messages_dropped.load(Ordering::Relaxed),
            self.frames_received.load(Ordering::Relaxed),
            self.connect_attempts.load(Ordering::Relaxed),
            self.connect_failures.load(Ordering::Relaxed),
            self.connections_closed.load(Ordering::Relaxed),
        )
    }
}

/// Global metrics registry (singleton)
pub static METRICS: Lazy<Arc<RuntimeMetrics>> =
    Lazy::new(|| Arc::new(RuntimeMetrics::default()));
