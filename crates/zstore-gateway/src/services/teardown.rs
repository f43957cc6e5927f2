//! Delayed ticket channel teardown.
//!
//! Closing a channel posts a warning, then deletes it after a fixed delay
//! from a detached task. Only channels under the ticket category are
//! eligible. Pending teardowns live only in memory, keyed by
//! channel, each with its own cancellation signal.

use crate::domain::error::TeardownError;
use crate::domain::types::{OutgoingMessage, PlatformId};
use crate::middleware::metrics::GatewayMetrics;
use crate::ports::ChatPlatform;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Outcome of a close request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// Warning posted, deletion scheduled
    Closing { task_id: Uuid },
    /// A deletion is already pending for this channel
    AlreadyClosing,
    /// The channel does not exist
    NotFound,
}

impl Ack {
    /// Wire value reported to HTTP callers.
    pub fn status(&self) -> &'static str {
        match self {
            Ack::Closing { .. } => "closing",
            Ack::AlreadyClosing => "already_closing",
            Ack::NotFound => "not_found",
        }
    }
}

/// A deletion waiting for its timer.
struct ScheduledTeardown {
    id: Uuid,
    cancel: watch::Sender<bool>,
}

/// Schedules channel deletions.
pub struct ChannelTeardown {
    platform: Arc<dyn ChatPlatform>,
    category_id: PlatformId,
    delay: Duration,
    pending: Arc<DashMap<PlatformId, ScheduledTeardown>>,
    metrics: Arc<GatewayMetrics>,
}

impl ChannelTeardown {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        category_id: PlatformId,
        delay: Duration,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            platform,
            category_id,
            delay,
            pending: Arc::new(DashMap::new()),
            metrics,
        }
    }

    /// Whether a deletion is pending for the channel.
    pub fn is_closing(&self, channel_id: &PlatformId) -> bool {
        self.pending.contains_key(channel_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Warn the channel and schedule its deletion.
    pub async fn close_channel(
        &self,
        channel_id: &PlatformId,
        actor: &str,
    ) -> Result<Ack, TeardownError> {
        if self.is_closing(channel_id) {
            debug!(channel_id = %channel_id, "Teardown already pending");
            return Ok(Ack::AlreadyClosing);
        }

        let channel = self
            .platform
            .fetch_channel(channel_id)
            .await
            .map_err(TeardownError::LookupFailed)?;
        let Some(channel) = channel else {
            debug!(channel_id = %channel_id, "Close requested for unknown channel");
            return Ok(Ack::NotFound);
        };
        if channel.parent_id.as_ref() != Some(&self.category_id) {
            warn!(
                channel_id = %channel_id,
                parent_id = ?channel.parent_id,
                actor,
                "Close requested for a channel outside the ticket category"
            );
            return Ok(Ack::NotFound);
        }

        // Reserve the slot before notifying so concurrent closes collapse into one
        let task_id = Uuid::new_v4();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        match self.pending.entry(channel_id.clone()) {
            Entry::Occupied(_) => return Ok(Ack::AlreadyClosing),
            Entry::Vacant(slot) => {
                slot.insert(ScheduledTeardown {
                    id: task_id,
                    cancel: cancel_tx,
                });
            }
        }

        let warning = OutgoingMessage::text(format!(
            "⚠️ Channel ini akan ditutup dalam {} detik oleh {}...",
            self.delay.as_secs(),
            actor
        ));
        if let Err(e) = self.platform.send_message(channel_id, &warning).await {
            self.pending.remove_if(channel_id, |_, t| t.id == task_id);
            return Err(TeardownError::NotifyFailed(e));
        }

        self.spawn_delete(channel_id.clone(), task_id, cancel_rx);
        self.metrics.record_teardown_scheduled();
        info!(
            channel_id = %channel_id,
            task_id = %task_id,
            actor,
            delay_secs = self.delay.as_secs(),
            "Channel teardown scheduled"
        );

        Ok(Ack::Closing { task_id })
    }

    fn spawn_delete(&self, channel_id: PlatformId, task_id: Uuid, mut cancel_rx: watch::Receiver<bool>) {
        let platform = Arc::clone(&self.platform);
        let pending = Arc::clone(&self.pending);
        let metrics = Arc::clone(&self.metrics);
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    match platform.delete_channel(&channel_id).await {
                        Ok(()) => {
                            metrics.record_teardown_finished(true);
                            info!(channel_id = %channel_id, task_id = %task_id, "Channel deleted");
                        }
                        Err(e) => {
                            metrics.record_teardown_finished(false);
                            error!(
                                channel_id = %channel_id,
                                task_id = %task_id,
                                error = %e,
                                "Scheduled channel delete failed"
                            );
                        }
                    }
                }
                _ = cancel_rx.changed() => {
                    debug!(channel_id = %channel_id, task_id = %task_id, "Teardown cancelled");
                }
            }
            pending.remove_if(&channel_id, |_, t| t.id == task_id);
        });
    }

    /// Cancel every pending teardown. The channels are left in place.
    pub fn shutdown(&self) {
        let channels: Vec<PlatformId> = self.pending.iter().map(|e| e.key().clone()).collect();
        for channel_id in channels {
            if let Some((_, task)) = self.pending.remove(&channel_id) {
                let _ = task.cancel.send(true);
                warn!(
                    channel_id = %channel_id,
                    task_id = %task.id,
                    "Pending channel teardown dropped on shutdown"
                );
            }
        }
    }
}
