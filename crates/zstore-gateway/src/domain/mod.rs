//! Domain types for the ticket gateway.
//!
//! This module contains the core types, configuration, and error handling.
//! Remote I/O lives in the adapters layer.

pub mod config;
pub mod error;
pub mod ticket;
pub mod types;

// Re-exports for convenience
pub use config::{ConfigError, GatewayConfig};
pub use error::{
    ApiError, ApiResult, GatewayError, PlatformError, PolicyStoreError, ProvisionError,
    TeardownError, TicketValidationError,
};
pub use ticket::{channel_name, format_rupiah};
pub use types::*;
