//! In-memory implementations of the outbound ports.
//!
//! Used by the test suites and for running the gateway without remote
//! credentials. Failures can be injected per operation.

use crate::domain::error::{PlatformError, PolicyStoreError};
use crate::domain::types::{
    Channel, CurrentUser, Guild, NewChannel, OutgoingMessage, PermissionOverwrite, PlatformId,
    StoreConfig,
};
use crate::ports::{ChatPlatform, PolicyStore};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Policy store backed by in-process sets.
#[derive(Default)]
pub struct InMemoryPolicyStore {
    banned: RwLock<HashSet<String>>,
    config: RwLock<Option<StoreConfig>>,
    unavailable: AtomicBool,
    reads: AtomicU64,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ban(&self, identity: impl Into<String>) {
        self.banned.write().insert(identity.into());
    }

    /// Write the settings document.
    pub fn set_global_open(&self, open: bool) {
        *self.config.write() = Some(StoreConfig {
            is_global_open: Some(open),
        });
    }

    /// Remove the settings document.
    pub fn clear_config(&self) {
        *self.config.write() = None;
    }

    /// Make every read fail with a transport error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of document reads served (including failed ones).
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), PolicyStoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PolicyStoreError::Http("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn is_banned(&self, identity: &str) -> Result<bool, PolicyStoreError> {
        self.check_available()?;
        Ok(self.banned.read().contains(identity))
    }

    async fn store_config(&self) -> Result<Option<StoreConfig>, PolicyStoreError> {
        self.check_available()?;
        Ok(*self.config.read())
    }
}

/// Chat platform operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    FetchGuild,
    CreateChannel,
    SendMessage,
    FetchChannel,
    DeleteChannel,
}

/// A message recorded by the in-memory platform.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub channel_id: PlatformId,
    pub message: OutgoingMessage,
}

#[derive(Default)]
struct PlatformState {
    channels: HashMap<PlatformId, Channel>,
    messages: Vec<SentMessage>,
    deleted: Vec<PlatformId>,
    faults: HashSet<Fault>,
    extra_overwrite: Option<PermissionOverwrite>,
    next_id: u64,
}

/// Chat platform holding one guild in memory.
pub struct InMemoryChatPlatform {
    guild: Guild,
    user: CurrentUser,
    state: Mutex<PlatformState>,
}

impl InMemoryChatPlatform {
    pub fn new(guild_id: PlatformId) -> Self {
        Self {
            guild: Guild {
                id: guild_id,
                name: "ZStore".to_string(),
            },
            user: CurrentUser {
                id: PlatformId::from(1),
                username: "zstore-bot".to_string(),
                discriminator: None,
            },
            state: Mutex::new(PlatformState {
                next_id: 1000,
                ..Default::default()
            }),
        }
    }

    pub fn set_fault(&self, fault: Fault, enabled: bool) {
        let mut state = self.state.lock();
        if enabled {
            state.faults.insert(fault);
        } else {
            state.faults.remove(&fault);
        }
    }

    /// Append an overwrite to every channel created from now on, as a
    /// platform that mangles the requested permissions would.
    pub fn inject_overwrite(&self, overwrite: PermissionOverwrite) {
        self.state.lock().extra_overwrite = Some(overwrite);
    }

    /// Seed an existing channel.
    pub fn insert_channel(&self, channel: Channel) {
        self.state.lock().channels.insert(channel.id.clone(), channel);
    }

    pub fn channel(&self, id: &PlatformId) -> Option<Channel> {
        self.state.lock().channels.get(id).cloned()
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.state.lock().channels.values().cloned().collect()
    }

    pub fn messages(&self) -> Vec<SentMessage> {
        self.state.lock().messages.clone()
    }

    pub fn messages_in(&self, id: &PlatformId) -> Vec<OutgoingMessage> {
        self.state
            .lock()
            .messages
            .iter()
            .filter(|m| &m.channel_id == id)
            .map(|m| m.message.clone())
            .collect()
    }

    /// Channels deleted so far, in order.
    pub fn deleted(&self) -> Vec<PlatformId> {
        self.state.lock().deleted.clone()
    }

    fn fail_if(&self, state: &PlatformState, fault: Fault) -> Result<(), PlatformError> {
        if state.faults.contains(&fault) {
            return Err(PlatformError::Http(format!("injected {:?} failure", fault)));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatPlatform for InMemoryChatPlatform {
    async fn current_user(&self) -> Result<CurrentUser, PlatformError> {
        Ok(self.user.clone())
    }

    async fn fetch_guild(&self, guild_id: &PlatformId) -> Result<Guild, PlatformError> {
        let state = self.state.lock();
        self.fail_if(&state, Fault::FetchGuild)?;
        if guild_id != &self.guild.id {
            return Err(PlatformError::Status {
                status: 404,
                code: 10004,
                message: "Unknown Guild".into(),
            });
        }
        Ok(self.guild.clone())
    }

    async fn create_channel(
        &self,
        guild_id: &PlatformId,
        channel: &NewChannel,
    ) -> Result<Channel, PlatformError> {
        let mut state = self.state.lock();
        self.fail_if(&state, Fault::CreateChannel)?;

        state.next_id += 1;
        let id = PlatformId::from(state.next_id);

        let mut permission_overwrites = channel.permission_overwrites.clone();
        if let Some(extra) = state.extra_overwrite.clone() {
            permission_overwrites.push(extra);
        }

        let created = Channel {
            id: id.clone(),
            name: channel.name.clone(),
            guild_id: Some(guild_id.clone()),
            parent_id: channel.parent_id.clone(),
            permission_overwrites,
        };
        state.channels.insert(id, created.clone());
        Ok(created)
    }

    async fn send_message(
        &self,
        channel_id: &PlatformId,
        message: &OutgoingMessage,
    ) -> Result<(), PlatformError> {
        let mut state = self.state.lock();
        self.fail_if(&state, Fault::SendMessage)?;
        if !state.channels.contains_key(channel_id) {
            return Err(PlatformError::Status {
                status: 404,
                code: 10003,
                message: "Unknown Channel".into(),
            });
        }
        state.messages.push(SentMessage {
            channel_id: channel_id.clone(),
            message: message.clone(),
        });
        Ok(())
    }

    async fn fetch_channel(&self, channel_id: &PlatformId) -> Result<Option<Channel>, PlatformError> {
        let state = self.state.lock();
        self.fail_if(&state, Fault::FetchChannel)?;
        Ok(state.channels.get(channel_id).cloned())
    }

    async fn delete_channel(&self, channel_id: &PlatformId) -> Result<(), PlatformError> {
        let mut state = self.state.lock();
        self.fail_if(&state, Fault::DeleteChannel)?;
        if state.channels.remove(channel_id).is_some() {
            state.deleted.push(channel_id.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::GUILD_TEXT;

    fn id(s: &str) -> PlatformId {
        PlatformId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_policy_store_reads() {
        let store = InMemoryPolicyStore::new();
        store.ban("10.0.0.1");
        assert!(store.is_banned("10.0.0.1").await.unwrap());
        assert!(!store.is_banned("10.0.0.2").await.unwrap());
        assert_eq!(store.store_config().await.unwrap(), None);

        store.set_global_open(false);
        assert_eq!(
            store.store_config().await.unwrap(),
            Some(StoreConfig {
                is_global_open: Some(false)
            })
        );

        store.set_unavailable(true);
        assert!(store.is_banned("10.0.0.1").await.is_err());
        assert_eq!(store.reads(), 5);
    }

    #[tokio::test]
    async fn test_platform_channel_lifecycle() {
        let platform = InMemoryChatPlatform::new(id("500"));
        let created = platform
            .create_channel(
                &id("500"),
                &NewChannel {
                    name: "t".into(),
                    kind: GUILD_TEXT,
                    parent_id: None,
                    permission_overwrites: vec![],
                },
            )
            .await
            .unwrap();

        platform
            .send_message(&created.id, &OutgoingMessage::text("hi"))
            .await
            .unwrap();
        assert_eq!(platform.messages_in(&created.id).len(), 1);

        platform.delete_channel(&created.id).await.unwrap();
        assert!(platform.fetch_channel(&created.id).await.unwrap().is_none());
        assert_eq!(platform.deleted(), vec![created.id]);
    }

    #[tokio::test]
    async fn test_platform_faults() {
        let platform = InMemoryChatPlatform::new(id("500"));
        platform.set_fault(Fault::FetchChannel, true);
        assert!(platform.fetch_channel(&id("1")).await.is_err());
        platform.set_fault(Fault::FetchChannel, false);
        assert!(platform.fetch_channel(&id("1")).await.unwrap().is_none());

        assert!(matches!(
            platform.fetch_guild(&id("999")).await,
            Err(PlatformError::Status { status: 404, .. })
        ));
    }
}
