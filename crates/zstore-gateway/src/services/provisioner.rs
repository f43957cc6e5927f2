//! Private transaction channel provisioning.
//!
//! A ticket becomes one text channel visible only to the counterparty,
//! with a summary message posted into it. Provisioning either completes
//! or deletes what it created.

use crate::domain::error::ProvisionError;
use crate::domain::ticket::{channel_name, format_rupiah};
use crate::domain::types::{
    AllowedMentions, Channel, ChannelRef, Embed, EmbedField, EmbedFooter, NewChannel,
    OutgoingMessage, PermissionOverwrite, Permissions, PlatformId, PrincipalKind,
    TransactionTicket, GUILD_TEXT,
};
use crate::middleware::metrics::GatewayMetrics;
use crate::ports::ChatPlatform;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Embed color when the counterparty is the store owner.
pub const OWNER_COLOR: u32 = 0xFFD700;

/// Embed color for every other counterparty.
pub const SELLER_COLOR: u32 = 0x2ECC71;

/// A channel that was created and fully configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedChannel {
    pub channel: ChannelRef,
    pub name: String,
}

impl ProvisionedChannel {
    pub fn url(&self) -> String {
        self.channel.url()
    }
}

/// Build the summary message posted into a new ticket channel.
pub fn build_ticket_message(ticket: &TransactionTicket, owner_id: &PlatformId) -> OutgoingMessage {
    let seller = &ticket.counterparty_id;
    let color = if seller == owner_id {
        OWNER_COLOR
    } else {
        SELLER_COLOR
    };

    let embed = Embed {
        title: Some("🛒 TRANSAKSI BARU DIMULAI".to_string()),
        description: Some(format!(
            "Halo **{}**, selamat datang di channel transaksi privat ZStore.",
            ticket.buyer_name
        )),
        color: Some(color),
        fields: vec![
            EmbedField {
                name: "📦 Produk".to_string(),
                value: ticket.product_name.clone(),
                inline: true,
            },
            EmbedField {
                name: "💰 Total Harga".to_string(),
                value: format_rupiah(ticket.price),
                inline: true,
            },
            EmbedField {
                name: "🌐 Jalur Beli".to_string(),
                value: ticket.method.clone(),
                inline: true,
            },
            EmbedField {
                name: "🛡️ Status".to_string(),
                value: "Verified by ZStore System".to_string(),
                inline: false,
            },
        ],
        footer: Some(EmbedFooter {
            text: "Gunakan channel ini untuk diskusi dan pengiriman aset jasa.".to_string(),
        }),
        timestamp: Some(chrono::Utc::now().to_rfc3339()),
    };

    OutgoingMessage {
        content: format!(
            "<@{}> Anda memiliki pesanan baru! Silahkan layani pembeli ini.",
            seller
        ),
        embeds: vec![embed],
        allowed_mentions: Some(AllowedMentions {
            parse: Vec::new(),
            users: vec![seller.clone()],
        }),
    }
}

/// Check the overwrites the platform actually applied.
///
/// The guild's default role must be denied visibility and the counterparty
/// must be the only principal granted it.
fn verify_overwrites(
    channel: &Channel,
    guild_id: &PlatformId,
    counterparty: &PlatformId,
) -> Result<(), String> {
    let everyone_hidden = channel.permission_overwrites.iter().any(|o| {
        &o.id == guild_id && o.kind == PrincipalKind::Role && o.deny.contains(Permissions::VIEW_CHANNEL)
    });
    if !everyone_hidden {
        return Err("default role is not denied channel visibility".to_string());
    }

    let viewers: Vec<&PermissionOverwrite> = channel
        .permission_overwrites
        .iter()
        .filter(|o| o.grants_view())
        .collect();
    match viewers.as_slice() {
        [only] if &only.id == counterparty && only.kind == PrincipalKind::Member => Ok(()),
        [] => Err("counterparty was not granted channel visibility".to_string()),
        _ => Err(format!(
            "{} principals granted channel visibility, expected only the counterparty",
            viewers.len()
        )),
    }
}

/// Creates ticket channels in one guild.
pub struct ChannelProvisioner {
    platform: Arc<dyn ChatPlatform>,
    guild_id: PlatformId,
    category_id: PlatformId,
    owner_id: PlatformId,
    metrics: Arc<GatewayMetrics>,
}

impl ChannelProvisioner {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        guild_id: PlatformId,
        category_id: PlatformId,
        owner_id: PlatformId,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            platform,
            guild_id,
            category_id,
            owner_id,
            metrics,
        }
    }

    /// Create the private channel for a ticket and post its summary.
    pub async fn create_transaction_channel(
        &self,
        ticket: &TransactionTicket,
    ) -> Result<ProvisionedChannel, ProvisionError> {
        let result = self.provision(ticket).await;
        match &result {
            Ok(provisioned) => {
                self.metrics.record_ticket_created();
                info!(
                    channel_id = %provisioned.channel.channel_id,
                    channel_name = %provisioned.name,
                    seller_id = %ticket.counterparty_id,
                    "Ticket channel created"
                );
            }
            Err(e) => {
                let rolled_back = matches!(
                    e,
                    ProvisionError::RolledBack { .. } | ProvisionError::Orphaned { .. }
                );
                self.metrics.record_ticket_failure(rolled_back);
            }
        }
        result
    }

    async fn provision(&self, ticket: &TransactionTicket) -> Result<ProvisionedChannel, ProvisionError> {
        let guild = self
            .platform
            .fetch_guild(&self.guild_id)
            .await
            .map_err(ProvisionError::CreationFailed)?;

        let request = NewChannel {
            name: channel_name(&ticket.brand_name, &ticket.buyer_name),
            kind: GUILD_TEXT,
            parent_id: Some(self.category_id.clone()),
            permission_overwrites: vec![
                PermissionOverwrite::deny_role(guild.id.clone(), Permissions::VIEW_CHANNEL),
                PermissionOverwrite::allow_member(
                    ticket.counterparty_id.clone(),
                    Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES | Permissions::ATTACH_FILES,
                ),
            ],
        };

        let channel = self
            .platform
            .create_channel(&guild.id, &request)
            .await
            .map_err(ProvisionError::CreationFailed)?;

        if let Err(reason) = verify_overwrites(&channel, &guild.id, &ticket.counterparty_id) {
            return Err(self.roll_back(&channel.id, reason).await);
        }

        let message = build_ticket_message(ticket, &self.owner_id);
        if let Err(e) = self.platform.send_message(&channel.id, &message).await {
            return Err(self.roll_back(&channel.id, format!("summary message failed: {}", e)).await);
        }

        Ok(ProvisionedChannel {
            channel: ChannelRef {
                guild_id: guild.id,
                channel_id: channel.id,
            },
            name: channel.name,
        })
    }

    /// Delete a half-configured channel and describe what happened.
    async fn roll_back(&self, channel_id: &PlatformId, reason: String) -> ProvisionError {
        warn!(channel_id = %channel_id, reason = %reason, "Rolling back ticket channel");
        match self.platform.delete_channel(channel_id).await {
            Ok(()) => ProvisionError::RolledBack {
                channel_id: channel_id.clone(),
                reason,
            },
            Err(source) => {
                error!(
                    channel_id = %channel_id,
                    reason = %reason,
                    error = %source,
                    "Rollback failed, ticket channel orphaned"
                );
                ProvisionError::Orphaned {
                    channel_id: channel_id.clone(),
                    reason,
                    source,
                }
            }
        }
    }
}
