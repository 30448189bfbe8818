//! Discord implementation of the platform traits over REST API v10.

mod channel;
mod client;
pub mod models;

use std::sync::Arc;

use async_trait::async_trait;
pub use channel::DiscordChannel;
pub use client::DiscordClient;

use super::{
    ApplicationId, ChannelId, GuildId, GuildSummary, Permissions, Platform, PlatformError,
    PurgeTarget,
};

const AUTHORIZE_URL: &str = "https://discord.com/oauth2/authorize";

/// [`Platform`] backed by [`DiscordClient`].
#[derive(Clone)]
pub struct DiscordPlatform {
    client: DiscordClient,
}

impl DiscordPlatform {
    pub fn new(client: DiscordClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &DiscordClient {
        &self.client
    }
}

#[async_trait]
impl Platform for DiscordPlatform {
    async fn guilds(&self) -> Result<Vec<GuildSummary>, PlatformError> {
        Ok(self
            .client
            .list_guilds()
            .await?
            .into_iter()
            .map(|g| GuildSummary {
                id: g.id,
                name: g.name,
            })
            .collect())
    }

    async fn resolve_channel(
        &self,
        guild: GuildId,
        channel: ChannelId,
    ) -> Result<Option<Arc<dyn PurgeTarget>>, PlatformError> {
        let raw = match self.client.get_channel(channel).await {
            Ok(raw) => raw,
            Err(PlatformError::NotFound(_) | PlatformError::Forbidden(_)) => {
                tracing::debug!(
                    guild_id = %guild,
                    channel_id = %channel,
                    "Channel not visible to the bot"
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if raw.guild_id != Some(guild) {
            tracing::debug!(
                guild_id = %guild,
                channel_id = %channel,
                "Channel belongs to another guild"
            );
            return Ok(None);
        }

        Ok(Some(Arc::new(DiscordChannel::new(self.client.clone(), raw))))
    }
}

/// OAuth2 URL that adds the bot to a guild with `permissions`.
pub fn invite_url(application: ApplicationId, permissions: Permissions) -> String {
    format!(
        "{AUTHORIZE_URL}?client_id={application}&scope=bot%20applications.commands&permissions={}",
        permissions.bits()
    )
}
