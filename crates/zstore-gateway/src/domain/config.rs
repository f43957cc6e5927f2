//! Gateway configuration with validation.

use super::types::PlatformId;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server configuration
    pub http: HttpConfig,
    /// Chat platform (Discord) configuration
    pub discord: DiscordConfig,
    /// Policy store (Firestore) configuration
    pub store: PolicyStoreConfig,
    /// Access gate behaviour
    pub gate: GateConfig,
    /// Channel teardown timing
    pub teardown: TeardownConfig,
    /// Client IP resolution
    pub security: SecurityConfig,
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.max_body_bytes == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_body_bytes cannot be 0".into(),
            ));
        }

        for (name, value) in [
            ("discord.guild_id", &self.discord.guild_id),
            ("discord.category_id", &self.discord.category_id),
            ("discord.owner_id", &self.discord.owner_id),
        ] {
            PlatformId::parse(value)
                .map_err(|_| ConfigError::InvalidId(format!("{name} = {value:?}")))?;
        }

        if self.discord.token.trim().is_empty() {
            return Err(ConfigError::MissingSecret("discord.token"));
        }

        if self.store.project_id.trim().is_empty() {
            return Err(ConfigError::Invalid("store.project_id cannot be empty".into()));
        }

        if self.discord.request_timeout.is_zero() || self.store.request_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "request timeouts cannot be 0".into(),
            ));
        }

        if self.teardown.delay.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "teardown delay cannot be 0".into(),
            ));
        }

        // The closing notice announces the delay in whole seconds
        if self.teardown.delay.subsec_nanos() != 0 {
            return Err(ConfigError::InvalidTimeout(format!(
                "teardown delay must be whole seconds, got {:?}",
                self.teardown.delay
            )));
        }

        let admin = self.gate.admin_path.trim_matches('/');
        if admin.is_empty() || admin.contains('/') {
            return Err(ConfigError::Invalid(
                "gate.admin_path must be a single path segment".into(),
            ));
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }

    /// Guild id, parsed. Only meaningful after `validate()`.
    pub fn guild_id(&self) -> Result<PlatformId, ConfigError> {
        parse_id("discord.guild_id", &self.discord.guild_id)
    }

    pub fn category_id(&self) -> Result<PlatformId, ConfigError> {
        parse_id("discord.category_id", &self.discord.category_id)
    }

    pub fn owner_id(&self) -> Result<PlatformId, ConfigError> {
        parse_id("discord.owner_id", &self.discord.owner_id)
    }
}

fn parse_id(name: &str, value: &str) -> Result<PlatformId, ConfigError> {
    PlatformId::parse(value).map_err(|_| ConfigError::InvalidId(format!("{name} = {value:?}")))
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 8080)
    pub port: u16,
    /// Maximum accepted request body
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8080,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Chat platform configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// REST API base URL
    pub api_base: String,
    /// Bot token (never logged)
    pub token: String,
    /// Guild the ticket channels live in
    pub guild_id: String,
    /// Parent category for ticket channels
    pub category_id: String,
    /// Store owner; their tickets get the owner accent color
    pub owner_id: String,
    /// Per-call timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            api_base: "https://discord.com/api/v10".to_string(),
            token: String::new(),
            guild_id: String::new(),
            category_id: String::new(),
            owner_id: String::new(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("api_base", &self.api_base)
            .field("token", &"<redacted>")
            .field("guild_id", &self.guild_id)
            .field("category_id", &self.category_id)
            .field("owner_id", &self.owner_id)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Policy store configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyStoreConfig {
    /// REST API base URL
    pub api_base: String,
    /// Firebase project id
    pub project_id: String,
    /// Fixed OAuth2 bearer token; overrides the service account (never logged)
    pub access_token: Option<String>,
    /// Service account key JSON (never logged)
    pub service_account_key: Option<String>,
    /// Path to a service account key file
    pub service_account_file: Option<PathBuf>,
    /// Collection holding one document per banned identity
    pub ban_collection: String,
    /// Collection holding the operational settings document
    pub settings_collection: String,
    /// Settings document id
    pub settings_document: String,
    /// Per-call timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for PolicyStoreConfig {
    fn default() -> Self {
        Self {
            api_base: "https://firestore.googleapis.com/v1".to_string(),
            project_id: String::new(),
            access_token: None,
            service_account_key: None,
            service_account_file: None,
            ban_collection: "banned_ips".to_string(),
            settings_collection: "system_settings".to_string(),
            settings_document: "store_config".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl std::fmt::Debug for PolicyStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyStoreConfig")
            .field("api_base", &self.api_base)
            .field("project_id", &self.project_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field(
                "service_account_key",
                &self.service_account_key.as_ref().map(|_| "<redacted>"),
            )
            .field("service_account_file", &self.service_account_file)
            .field("ban_collection", &self.ban_collection)
            .field("settings_collection", &self.settings_collection)
            .field("settings_document", &self.settings_document)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Access gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Path segment exempt from the maintenance check
    pub admin_path: String,
    /// Let requests through when the policy store cannot be read
    pub fail_open: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            admin_path: "panelowner".to_string(),
            fail_open: true,
        }
    }
}

/// Channel teardown configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TeardownConfig {
    /// Time between the warning message and deletion
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
}

impl Default for TeardownConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(10),
        }
    }
}

/// Client IP resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Trusted proxy IPs allowed to set X-Forwarded-For
    pub trusted_proxies: Vec<IpAddr>,
    /// Trust private IP ranges as proxies
    pub trust_private_ips: bool,
    /// Number of proxies in front of the gateway
    pub proxy_count: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            trusted_proxies: Vec::new(),
            trust_private_ips: false,
            proxy_count: 1,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Malformed platform identifier
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Required secret not provided
    #[error("missing secret: {0}")]
    MissingSecret(&'static str),
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
