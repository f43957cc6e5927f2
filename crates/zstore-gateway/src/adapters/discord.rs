//! Discord REST client implementing the `ChatPlatform` port.

use crate::domain::config::DiscordConfig;
use crate::domain::error::PlatformError;
use crate::domain::types::{
    Channel, CurrentUser, Guild, NewChannel, OutgoingMessage, PlatformId,
};
use crate::ports::ChatPlatform;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/zstore/zstore-gateway, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Error body returned by the platform on non-success statuses.
#[derive(Debug, Default, Deserialize)]
struct PlatformErrorBody {
    #[serde(default)]
    code: u64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    retry_after: Option<f64>,
}

/// Discord REST v10 client.
pub struct DiscordClient {
    client: Client,
    api_base: String,
    token: String,
}

impl DiscordClient {
    /// Create a new client from the platform configuration.
    pub fn new(config: &DiscordConfig) -> Result<Self, PlatformError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(3))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Send an authorized request and map non-success statuses.
    async fn execute(&self, request: RequestBuilder) -> Result<Response, PlatformError> {
        let response = request
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let header_retry = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite());
        let body: PlatformErrorBody = response.json().await.unwrap_or_default();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let secs = body.retry_after.or(header_retry).unwrap_or(1.0).clamp(0.0, 3600.0);
            warn!(retry_after_secs = secs, "Chat platform rate limit hit");
            return Err(PlatformError::RateLimited {
                retry_after: Duration::from_secs_f64(secs),
            });
        }

        Err(PlatformError::Status {
            status: status.as_u16(),
            code: body.code,
            message: body.message,
        })
    }
}

#[async_trait]
impl ChatPlatform for DiscordClient {
    async fn current_user(&self) -> Result<CurrentUser, PlatformError> {
        let response = self.execute(self.client.get(self.url("/users/@me"))).await?;
        Ok(response.json().await?)
    }

    async fn fetch_guild(&self, guild_id: &PlatformId) -> Result<Guild, PlatformError> {
        let response = self
            .execute(self.client.get(self.url(&format!("/guilds/{}", guild_id))))
            .await?;
        Ok(response.json().await?)
    }

    async fn create_channel(
        &self,
        guild_id: &PlatformId,
        channel: &NewChannel,
    ) -> Result<Channel, PlatformError> {
        debug!(guild_id = %guild_id, name = %channel.name, "Creating channel");
        let response = self
            .execute(
                self.client
                    .post(self.url(&format!("/guilds/{}/channels", guild_id)))
                    .json(channel),
            )
            .await?;
        Ok(response.json().await?)
    }

    async fn send_message(
        &self,
        channel_id: &PlatformId,
        message: &OutgoingMessage,
    ) -> Result<(), PlatformError> {
        self.execute(
            self.client
                .post(self.url(&format!("/channels/{}/messages", channel_id)))
                .json(message),
        )
        .await?;
        Ok(())
    }

    async fn fetch_channel(&self, channel_id: &PlatformId) -> Result<Option<Channel>, PlatformError> {
        match self
            .execute(self.client.get(self.url(&format!("/channels/{}", channel_id))))
            .await
        {
            Ok(response) => Ok(Some(response.json().await?)),
            Err(PlatformError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn delete_channel(&self, channel_id: &PlatformId) -> Result<(), PlatformError> {
        match self
            .execute(self.client.delete(self.url(&format!("/channels/{}", channel_id))))
            .await
        {
            Ok(_) => Ok(()),
            Err(PlatformError::Status { status: 404, .. }) => {
                debug!(channel_id = %channel_id, "Channel already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation_trims_base() {
        let config = DiscordConfig {
            api_base: "https://discord.test/api/v10/".into(),
            token: "t".into(),
            ..Default::default()
        };
        let client = DiscordClient::new(&config).unwrap();
        assert_eq!(client.url("/users/@me"), "https://discord.test/api/v10/users/@me");
    }

    #[test]
    fn test_error_body_parsing() {
        let body: PlatformErrorBody =
            serde_json::from_str(r#"{"message":"Unknown Channel","code":10003}"#).unwrap();
        assert_eq!(body.code, 10003);
        assert_eq!(body.message, "Unknown Channel");

        let body: PlatformErrorBody =
            serde_json::from_str(r#"{"message":"You are being rate limited.","retry_after":1.25,"global":false}"#)
                .unwrap();
        assert_eq!(body.retry_after, Some(1.25));
    }

    #[test]
    fn test_user_agent_format() {
        assert!(USER_AGENT.starts_with("DiscordBot ("));
        assert!(USER_AGENT.ends_with(')'));
    }
}
