//! Middleware stack for the ticket gateway.
//!
//! Layer order: Request → IpProtection → Tracing → AccessGate → Handler

pub mod access_gate;
pub mod ip_protection;
pub mod metrics;
pub mod tracing;

pub use access_gate::AccessGateLayer;
pub use ip_protection::{ClientIp, IpProtectionLayer, TrustedProxyConfig};
pub use metrics::{GatewayMetrics, RequestTimer};
pub use tracing::TracingLayer;

use crate::domain::config::GatewayConfig;
use crate::services::access::AccessPolicy;
use std::sync::Arc;

/// Middleware stack builder
pub struct MiddlewareStack {
    pub ip_protection: IpProtectionLayer,
    pub tracing: TracingLayer,
    pub access_gate: AccessGateLayer,
}

impl MiddlewareStack {
    /// Create middleware stack from gateway config
    pub fn from_config(
        config: &GatewayConfig,
        policy: Arc<AccessPolicy>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            ip_protection: IpProtectionLayer::new(TrustedProxyConfig::from(&config.security)),
            tracing: TracingLayer::new(metrics),
            access_gate: AccessGateLayer::new(policy),
        }
    }
}
