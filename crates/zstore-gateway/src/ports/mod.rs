//! Outbound ports for the ticket gateway.
//!
//! The gateway talks to two remote collaborators. Each is a trait so the
//! services can be driven by the REST adapters in production and by the
//! in-memory adapters in tests.

use crate::domain::error::{PlatformError, PolicyStoreError};
use crate::domain::types::{
    Channel, CurrentUser, Guild, NewChannel, OutgoingMessage, PlatformId, StoreConfig,
};
use async_trait::async_trait;

/// Read-only access to the remote policy documents.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Whether a ban record exists for the identity.
    async fn is_banned(&self, identity: &str) -> Result<bool, PolicyStoreError>;

    /// The operational settings document, `None` if it does not exist.
    async fn store_config(&self) -> Result<Option<StoreConfig>, PolicyStoreError>;
}

/// The chat platform session.
///
/// One long-lived implementation is shared by every component.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// User the session is authenticated as.
    async fn current_user(&self) -> Result<CurrentUser, PlatformError>;

    async fn fetch_guild(&self, guild_id: &PlatformId) -> Result<Guild, PlatformError>;

    async fn create_channel(
        &self,
        guild_id: &PlatformId,
        channel: &NewChannel,
    ) -> Result<Channel, PlatformError>;

    async fn send_message(
        &self,
        channel_id: &PlatformId,
        message: &OutgoingMessage,
    ) -> Result<(), PlatformError>;

    /// Look a channel up; `Ok(None)` when the platform reports it unknown.
    async fn fetch_channel(&self, channel_id: &PlatformId) -> Result<Option<Channel>, PlatformError>;

    async fn delete_channel(&self, channel_id: &PlatformId) -> Result<(), PlatformError>;
}
