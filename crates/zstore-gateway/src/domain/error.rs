//! Error types for the ticket gateway.
//!
//! Remote failures are typed per collaborator; handlers convert them to a
//! fixed `ApiError` so platform internals never reach the caller.

use super::types::{DenyReason, InvalidPlatformId, PlatformId};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Fixed user-facing messages.
pub mod messages {
    pub const BANNED_HTML: &str = "<h1>AKSES DITOLAK</h1><p>IP Anda telah diblokir secara permanen oleh sistem ZStore karena terindikasi penipuan.</p>";
    pub const MAINTENANCE_HTML: &str = "<h1>MAINTENANCE</h1><p>ZStore sedang dalam pemeliharaan rutin. Silahkan kembali nanti.</p>";
    pub const GATE_UNAVAILABLE_HTML: &str = "<h1>LAYANAN TIDAK TERSEDIA</h1><p>Sistem keamanan ZStore tidak dapat diverifikasi. Silahkan coba beberapa saat lagi.</p>";
    pub const TICKET_FAILED: &str = "Gagal membuat tiket Discord.";
    pub const CLOSE_FAILED: &str = "Gagal menutup tiket.";
}

/// How an `ApiError` body is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorFormat {
    /// `{"error": message}`
    Json,
    /// Plain text
    Text,
    /// HTML fragment
    Html,
}

/// Error returned to HTTP callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status code
    pub status: u16,
    /// Body text
    pub message: String,
    /// Body rendering
    pub format: ErrorFormat,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>, format: ErrorFormat) -> Self {
        Self {
            status,
            message: message.into(),
            format,
        }
    }

    /// Gate rejection for the given reason.
    pub fn access_denied(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Banned => Self::new(403, messages::BANNED_HTML, ErrorFormat::Html),
            DenyReason::Maintenance | DenyReason::None => {
                Self::new(503, messages::MAINTENANCE_HTML, ErrorFormat::Html)
            }
        }
    }

    /// Gate could not read the policy store and is configured fail-closed.
    pub fn gate_unavailable() -> Self {
        Self::new(503, messages::GATE_UNAVAILABLE_HTML, ErrorFormat::Html)
    }

    /// Ticket creation failed downstream.
    pub fn ticket_failed() -> Self {
        Self::new(500, messages::TICKET_FAILED, ErrorFormat::Json)
    }

    /// Ticket request body rejected before any remote call.
    pub fn invalid_ticket(details: impl fmt::Display) -> Self {
        Self::new(400, format!("Data tiket tidak valid: {}", details), ErrorFormat::Json)
    }

    /// Ticket close failed downstream.
    pub fn close_failed() -> Self {
        Self::new(500, messages::CLOSE_FAILED, ErrorFormat::Text)
    }

    /// Close request body rejected before any remote call.
    pub fn invalid_close(details: impl fmt::Display) -> Self {
        Self::new(400, format!("Permintaan tidak valid: {}", details), ErrorFormat::Text)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
}

/// Result type for HTTP handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Chat platform failures.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// Transport failure (connect, timeout, TLS)
    #[error("platform transport error: {0}")]
    Http(String),

    /// Non-success status with the platform's error body
    #[error("platform returned {status} (code {code}): {message}")]
    Status {
        status: u16,
        code: u64,
        message: String,
    },

    /// 429 from the platform; not retried
    #[error("platform rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Response body could not be decoded
    #[error("platform response decode error: {0}")]
    Decode(String),
}

/// Policy store failures.
#[derive(Debug, thiserror::Error)]
pub enum PolicyStoreError {
    #[error("policy store transport error: {0}")]
    Http(String),

    #[error("policy store returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("policy store decode error: {0}")]
    Decode(String),

    /// Credentials could not be loaded or a token could not be minted
    #[error("policy store authentication failed: {0}")]
    Auth(String),
}

/// Ticket request that fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TicketValidationError {
    #[error("missing field `{0}`")]
    Missing(&'static str),

    #[error("field `{0}` is empty")]
    Empty(&'static str),

    #[error("price must be a non-negative integer, got {0}")]
    NegativePrice(i64),

    #[error(transparent)]
    InvalidId(#[from] InvalidPlatformId),
}

/// Channel provisioning failures.
///
/// Every variant except `Orphaned` guarantees no ticket channel was left behind.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// Guild lookup or channel creation failed; nothing was created
    #[error("channel creation failed: {0}")]
    CreationFailed(#[source] PlatformError),

    /// Channel was created but not fully configured, then deleted again
    #[error("channel {channel_id} rolled back: {reason}")]
    RolledBack {
        channel_id: PlatformId,
        reason: String,
    },

    /// Rollback delete failed; the channel may still exist
    #[error("channel {channel_id} orphaned after {reason}: {source}")]
    Orphaned {
        channel_id: PlatformId,
        reason: String,
        #[source]
        source: PlatformError,
    },
}

/// Channel teardown failures.
#[derive(Debug, thiserror::Error)]
pub enum TeardownError {
    /// Channel lookup failed for a reason other than "not found"
    #[error("channel lookup failed: {0}")]
    LookupFailed(#[source] PlatformError),

    /// Warning message could not be posted; nothing scheduled
    #[error("closing notice failed: {0}")]
    NotifyFailed(#[source] PlatformError),
}

/// Gateway-level errors (internal use)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Chat platform unreachable at startup
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<super::config::ConfigError> for GatewayError {
    fn from(e: super::config::ConfigError) -> Self {
        GatewayError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_denied_status() {
        let banned = ApiError::access_denied(DenyReason::Banned);
        assert_eq!(banned.status, 403);
        assert_eq!(banned.format, ErrorFormat::Html);
        assert!(banned.message.contains("AKSES DITOLAK"));

        let maintenance = ApiError::access_denied(DenyReason::Maintenance);
        assert_eq!(maintenance.status, 503);
        assert!(maintenance.message.contains("MAINTENANCE"));
    }

    #[test]
    fn test_handler_errors_are_generic() {
        let err = ApiError::ticket_failed();
        assert_eq!(err.status, 500);
        assert_eq!(err.message, messages::TICKET_FAILED);
        assert_eq!(err.format, ErrorFormat::Json);

        let err = ApiError::close_failed();
        assert_eq!(err.format, ErrorFormat::Text);
    }

    #[test]
    fn test_validation_message() {
        let err = ApiError::invalid_ticket(TicketValidationError::Missing("buyerName"));
        assert_eq!(err.status, 400);
        assert!(err.message.contains("buyerName"));
    }

    #[test]
    fn test_provision_error_display() {
        let err = ProvisionError::RolledBack {
            channel_id: PlatformId::parse("77").unwrap(),
            reason: "summary message failed".into(),
        };
        assert!(err.to_string().contains("77"));
    }
}
