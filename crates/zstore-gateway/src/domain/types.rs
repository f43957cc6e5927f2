//! Core types for the ticket gateway.
//!
//! Chat-platform wire types follow Discord REST v10 field names so the
//! adapters can serialize them directly.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::BitOr;

/// Base URL used to build links to a channel.
pub const CHANNEL_URL_BASE: &str = "https://discord.com/channels";

/// Chat-platform identifier.
///
/// Non-empty, at most 64 characters, ASCII alphanumerics plus `-` and `_`, so
/// it is always safe to splice into a request path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlatformId(String);

impl PlatformId {
    /// Parse and validate an identifier.
    pub fn parse(s: &str) -> Result<Self, InvalidPlatformId> {
        let trimmed = s.trim();
        let well_formed = trimmed
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if trimmed.is_empty() || trimmed.len() > 64 || !well_formed {
            return Err(InvalidPlatformId(s.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for PlatformId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl std::str::FromStr for PlatformId {
    type Err = InvalidPlatformId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for PlatformId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PlatformId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PlatformId::parse(&s).map_err(de::Error::custom)
    }
}

/// Identifier that is not a valid platform id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid platform id: {0:?}")]
pub struct InvalidPlatformId(pub String);

/// Channel permission bit set.
///
/// Serializes as a decimal string, deserializes from a string or number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Permissions(u64);

impl Permissions {
    pub const NONE: Permissions = Permissions(0);
    pub const VIEW_CHANNEL: Permissions = Permissions(1 << 10);
    pub const SEND_MESSAGES: Permissions = Permissions(1 << 11);
    pub const ATTACH_FILES: Permissions = Permissions(1 << 15);

    pub const fn contains(self, other: Permissions) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Permissions {
    type Output = Permissions;

    fn bitor(self, rhs: Self) -> Self::Output {
        Permissions(self.0 | rhs.0)
    }
}

impl Serialize for Permissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PermissionsVisitor;

        impl<'de> de::Visitor<'de> for PermissionsVisitor {
            type Value = Permissions;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a permission bit set as decimal string or number")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse::<u64>().map(Permissions).map_err(de::Error::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(Permissions(v))
            }
        }

        deserializer.deserialize_any(PermissionsVisitor)
    }
}

/// Kind of principal a permission overwrite targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum PrincipalKind {
    Role,
    Member,
}

impl From<PrincipalKind> for u8 {
    fn from(kind: PrincipalKind) -> Self {
        match kind {
            PrincipalKind::Role => 0,
            PrincipalKind::Member => 1,
        }
    }
}

impl TryFrom<u8> for PrincipalKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PrincipalKind::Role),
            1 => Ok(PrincipalKind::Member),
            other => Err(format!("unknown overwrite type {}", other)),
        }
    }
}

/// A single permission overwrite on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverwrite {
    pub id: PlatformId,
    #[serde(rename = "type")]
    pub kind: PrincipalKind,
    #[serde(default)]
    pub allow: Permissions,
    #[serde(default)]
    pub deny: Permissions,
}

impl PermissionOverwrite {
    pub fn deny_role(id: PlatformId, deny: Permissions) -> Self {
        Self {
            id,
            kind: PrincipalKind::Role,
            allow: Permissions::NONE,
            deny,
        }
    }

    pub fn allow_member(id: PlatformId, allow: Permissions) -> Self {
        Self {
            id,
            kind: PrincipalKind::Member,
            allow,
            deny: Permissions::NONE,
        }
    }

    /// Whether this overwrite grants channel visibility.
    pub fn grants_view(&self) -> bool {
        self.allow.contains(Permissions::VIEW_CHANNEL)
    }
}

/// Guild as returned by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: PlatformId,
    #[serde(default)]
    pub name: String,
}

/// Channel as returned by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: PlatformId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub guild_id: Option<PlatformId>,
    #[serde(default)]
    pub parent_id: Option<PlatformId>,
    #[serde(default)]
    pub permission_overwrites: Vec<PermissionOverwrite>,
}

/// Bot user the platform session is authenticated as.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CurrentUser {
    pub id: PlatformId,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
}

impl CurrentUser {
    /// `name#1234`, or the bare username for accounts without a discriminator.
    pub fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some(d) if d != "0" => format!("{}#{}", self.username, d),
            _ => self.username.clone(),
        }
    }
}

/// Guild text channel type on the wire.
pub const GUILD_TEXT: u8 = 0;

/// Create-channel payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewChannel {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub parent_id: Option<PlatformId>,
    pub permission_overwrites: Vec<PermissionOverwrite>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
}

/// Structured message body.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    /// ISO8601 timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Restricts which mentions in `content` actually ping.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AllowedMentions {
    pub parse: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<PlatformId>,
}

/// Message payload sent into a channel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_mentions: Option<AllowedMentions>,
}

impl OutgoingMessage {
    /// Plain text message with mentions disabled.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            embeds: Vec::new(),
            allowed_mentions: Some(AllowedMentions::default()),
        }
    }
}

/// Reference to a provisioned channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRef {
    pub guild_id: PlatformId,
    pub channel_id: PlatformId,
}

impl ChannelRef {
    /// Canonical link to the channel.
    pub fn url(&self) -> String {
        format!("{}/{}/{}", CHANNEL_URL_BASE, self.guild_id, self.channel_id)
    }
}

/// Global operational-status document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    pub is_global_open: Option<bool>,
}

impl StoreConfig {
    /// A missing flag counts as open.
    pub fn is_open(&self) -> bool {
        self.is_global_open.unwrap_or(true)
    }
}

/// Why the access gate rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenyReason {
    None,
    Banned,
    Maintenance,
}

/// Per-request result of the access gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: DenyReason,
}

impl AccessDecision {
    pub const ALLOW: AccessDecision = AccessDecision {
        allowed: true,
        reason: DenyReason::None,
    };

    pub const fn deny(reason: DenyReason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

/// Validated transaction details, consumed once to provision a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionTicket {
    pub buyer_name: String,
    pub counterparty_id: PlatformId,
    pub product_name: String,
    pub price: u64,
    pub brand_name: String,
    pub method: String,
}

/// `POST /api/create-ticket` body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketRequest {
    pub buyer_name: Option<String>,
    pub seller_id: Option<String>,
    pub product_name: Option<String>,
    pub price: Option<i64>,
    pub brand_name: Option<String>,
    pub method: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketResponse {
    pub success: bool,
    pub channel_url: String,
}

/// `POST /api/close-ticket` body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseTicketRequest {
    pub channel_id: Option<String>,
    pub seller_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseTicketResponse {
    pub success: bool,
    pub status: String,
}
