// Allow missing docs for internal items in development
#![allow(missing_docs)]

//! ZStore ticket gateway - access gate and transaction channel lifecycle.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       TICKET GATEWAY                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │                  Middleware Stack                         │  │
//! │  │      IpProtection → Tracing → AccessGate                  │  │
//! │  └──────────────────────────┬────────────────────────────────┘  │
//! │                             │                                   │
//! │  ┌──────────────────┐  ┌────┴─────────────┐  ┌──────────────┐   │
//! │  │ /api/create-     │  │ /api/close-      │  │ /health      │   │
//! │  │  ticket          │  │  ticket          │  │ /{admin}/... │   │
//! │  └────────┬─────────┘  └────────┬─────────┘  └──────────────┘   │
//! │           │                     │                               │
//! │  ┌────────┴─────────┐  ┌────────┴─────────┐                     │
//! │  │ChannelProvisioner│  │ ChannelTeardown  │                     │
//! │  └────────┬─────────┘  └────────┬─────────┘                     │
//! └───────────┼─────────────────────┼───────────────────────────────┘
//!             │                     │
//!             ▼                     ▼
//!       ChatPlatform (Discord REST)      PolicyStore (Firestore REST)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use zstore_gateway::{DiscordClient, FirestoreClient, GatewayConfig, TicketGatewayService};
//!
//! let platform = Arc::new(DiscordClient::new(&config.discord)?);
//! let store = Arc::new(FirestoreClient::new(&config.store)?);
//! let service = TicketGatewayService::new(config, platform, store)?;
//! service.start().await?;
//! ```
//!
//! # Access policy
//!
//! - Banned client IPs are rejected on every path (403)
//! - While the store is closed every path except the admin page answers 503
//! - Policy store read failures let requests through unless `gate.fail_open` is off

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod domain;
pub mod middleware;
pub mod ports;
pub mod router;
pub mod service;
pub mod services;

// Re-exports for public API
pub use adapters::{DiscordClient, FirestoreClient, InMemoryChatPlatform, InMemoryPolicyStore};
pub use domain::config::GatewayConfig;
pub use domain::error::{ApiError, ApiResult, GatewayError};
pub use domain::types::*;
pub use middleware::GatewayMetrics;
pub use ports::{ChatPlatform, PolicyStore};
pub use service::TicketGatewayService;
pub use services::{Ack, AccessPolicy, ChannelProvisioner, ChannelTeardown};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
