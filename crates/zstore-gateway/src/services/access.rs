//! Access policy evaluated before every request.
//!
//! Ban check first, then the global maintenance flag. Policy store read
//! failures are counted and, unless the gate is configured fail-closed,
//! let the request through.

use crate::domain::config::GateConfig;
use crate::domain::types::{AccessDecision, DenyReason};
use crate::middleware::metrics::GatewayMetrics;
use crate::ports::PolicyStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of evaluating the gate for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Decision made from the policy documents (or fail-open fallback)
    Decided(AccessDecision),
    /// Policy store unreadable and the gate is fail-closed
    Unavailable,
}

impl GateOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateOutcome::Decided(d) if d.allowed)
    }
}

/// Whether `path` addresses the administrative page.
///
/// Matches when the first path segment equals `marker` or `marker.html`.
pub fn is_admin_path(path: &str, marker: &str) -> bool {
    if marker.is_empty() {
        return false;
    }
    let first = path
        .trim_start_matches('/')
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    first == marker || first.strip_suffix(".html") == Some(marker)
}

/// Ban and maintenance policy backed by a `PolicyStore`.
pub struct AccessPolicy {
    store: Arc<dyn PolicyStore>,
    admin_path: String,
    fail_open: bool,
    metrics: Arc<GatewayMetrics>,
}

impl AccessPolicy {
    pub fn new(store: Arc<dyn PolicyStore>, config: &GateConfig, metrics: Arc<GatewayMetrics>) -> Self {
        Self {
            store,
            admin_path: config.admin_path.trim_matches('/').to_string(),
            fail_open: config.fail_open,
            metrics,
        }
    }

    /// Evaluate the gate for a requester identity and path.
    pub async fn evaluate(&self, identity: &str, path: &str) -> GateOutcome {
        match self.store.is_banned(identity).await {
            Ok(true) => {
                self.metrics.record_banned();
                debug!(client_ip = %identity, path, "Banned identity rejected");
                return GateOutcome::Decided(AccessDecision::deny(DenyReason::Banned));
            }
            Ok(false) => {}
            Err(e) => {
                self.metrics.record_policy_read_failure();
                warn!(client_ip = %identity, error = %e, "Ban lookup failed");
                // Skip the maintenance lookup as well
                return self.read_failure_outcome();
            }
        }

        if is_admin_path(path, &self.admin_path) {
            return GateOutcome::Decided(AccessDecision::ALLOW);
        }

        match self.store.store_config().await {
            Ok(Some(config)) if !config.is_open() => {
                self.metrics.record_maintenance();
                debug!(path, "Store closed for maintenance");
                GateOutcome::Decided(AccessDecision::deny(DenyReason::Maintenance))
            }
            Ok(_) => GateOutcome::Decided(AccessDecision::ALLOW),
            Err(e) => {
                self.metrics.record_policy_read_failure();
                warn!(error = %e, "Store config lookup failed");
                self.read_failure_outcome()
            }
        }
    }

    fn read_failure_outcome(&self) -> GateOutcome {
        if self.fail_open {
            GateOutcome::Decided(AccessDecision::ALLOW)
        } else {
            GateOutcome::Unavailable
        }
    }
}
