//! Gateway metrics.
//!
//! Plain atomic counters, exposed as JSON on the administrative route.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Ticket gateway metrics
#[derive(Default)]
pub struct GatewayMetrics {
    // Request counters
    pub requests_total: AtomicU64,
    pub requests_success: AtomicU64,
    pub requests_error: AtomicU64,

    // Access gate counters
    pub denied_banned: AtomicU64,
    pub denied_maintenance: AtomicU64,
    pub policy_read_failures: AtomicU64,

    // Provisioning counters
    pub tickets_created: AtomicU64,
    pub ticket_failures: AtomicU64,
    pub rollbacks: AtomicU64,

    // Teardown counters
    pub teardowns_scheduled: AtomicU64,
    pub teardowns_completed: AtomicU64,
    pub teardown_failures: AtomicU64,

    // Latency tracking
    pub total_latency_ms: AtomicU64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished request
    pub fn record_request(&self, success: bool, latency_ms: u64) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        if success {
            self.requests_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_error.fetch_add(1, Ordering::Relaxed);
        }

        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
    }

    pub fn record_banned(&self) {
        self.denied_banned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_maintenance(&self) {
        self.denied_maintenance.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_policy_read_failure(&self) {
        self.policy_read_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ticket_created(&self) {
        self.tickets_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ticket_failure(&self, rolled_back: bool) {
        self.ticket_failures.fetch_add(1, Ordering::Relaxed);
        if rolled_back {
            self.rollbacks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_teardown_scheduled(&self) {
        self.teardowns_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_teardown_finished(&self, success: bool) {
        if success {
            self.teardowns_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.teardown_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get average latency in milliseconds
    pub fn avg_latency_ms(&self) -> f64 {
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        let count = self.requests_total.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }

    /// Export metrics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "requests": {
                "total": self.requests_total.load(Ordering::Relaxed),
                "success": self.requests_success.load(Ordering::Relaxed),
                "error": self.requests_error.load(Ordering::Relaxed),
                "avg_latency_ms": self.avg_latency_ms(),
            },
            "gate": {
                "denied_banned": self.denied_banned.load(Ordering::Relaxed),
                "denied_maintenance": self.denied_maintenance.load(Ordering::Relaxed),
                "policy_read_failures": self.policy_read_failures.load(Ordering::Relaxed),
            },
            "tickets": {
                "created": self.tickets_created.load(Ordering::Relaxed),
                "failed": self.ticket_failures.load(Ordering::Relaxed),
                "rolled_back": self.rollbacks.load(Ordering::Relaxed),
            },
            "teardown": {
                "scheduled": self.teardowns_scheduled.load(Ordering::Relaxed),
                "completed": self.teardowns_completed.load(Ordering::Relaxed),
                "failed": self.teardown_failures.load(Ordering::Relaxed),
            }
        })
    }
}

/// Request timer for latency measurement
pub struct RequestTimer {
    start: Instant,
    metrics: Arc<GatewayMetrics>,
}

impl RequestTimer {
    pub fn new(metrics: Arc<GatewayMetrics>) -> Self {
        Self {
            start: Instant::now(),
            metrics,
        }
    }

    pub fn finish(self, success: bool) {
        let latency_ms = self.start.elapsed().as_millis() as u64;
        self.metrics.record_request(success, latency_ms);
    }
}
