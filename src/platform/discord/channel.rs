use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{DiscordClient, models::Channel};
use crate::platform::{
    BulkDeleteResult, ChannelInfo, DeleteOutcome, MessageId, MessageRef,
    PermissionContext, PlatformError, Permissions, PurgeTarget, RoleId, UserId,
};

/// Most messages one bulk-delete call accepts.
const BULK_CHUNK: usize = 100;
const HISTORY_PAGE: u8 = 100;

/// A text channel or thread backed by the REST API.
pub struct DiscordChannel {
    client: DiscordClient,
    info: ChannelInfo,
    raw: Channel,
}

impl DiscordChannel {
    pub fn new(client: DiscordClient, raw: Channel) -> Self {
        let info = ChannelInfo {
            id: raw.id,
            guild_id: raw.guild_id,
            name: raw.name.clone().unwrap_or_else(|| raw.id.to_string()),
            kind: raw.channel_kind(),
        };
        Self { client, info, raw }
    }

    /// Delete `ids` as one batch, falling back to a single delete when only
    /// one message is left. Returns how many were removed.
    async fn flush(&self, ids: &[MessageId], reason: &str) -> Result<u64, PlatformError> {
        match ids {
            [] => Ok(0),
            [single] => {
                let outcome = self
                    .client
                    .delete_message(self.info.id, *single, reason)
                    .await?;
                Ok(u64::from(outcome == DeleteOutcome::Deleted))
            }
            many => {
                self.client.bulk_delete(self.info.id, many, reason).await?;
                Ok(many.len() as u64)
            }
        }
    }

    async fn collect_and_delete(
        &self,
        cutoff: DateTime<Utc>,
        reason: &str,
        deleted: &mut u64,
    ) -> Result<(), PlatformError> {
        let mut before: Option<MessageId> = None;
        let mut pending: Vec<MessageId> = Vec::with_capacity(BULK_CHUNK);

        'pages: loop {
            let page = self
                .client
                .get_messages(self.info.id, before, HISTORY_PAGE)
                .await?;
            let Some(last) = page.last() else {
                break;
            };
            before = Some(last.id);

            for message in &page {
                // History is newest first, so the first old message ends the window.
                if message.timestamp <= cutoff {
                    break 'pages;
                }
                pending.push(message.id);
                if pending.len() == BULK_CHUNK {
                    *deleted += self.flush(&pending, reason).await?;
                    pending.clear();
                }
            }

            if page.len() < usize::from(HISTORY_PAGE) {
                break;
            }
        }

        *deleted += self.flush(&pending, reason).await?;
        Ok(())
    }

    /// Overwrites that govern this channel. Threads inherit their parent's.
    async fn governing_channel(&self) -> Result<Channel, PlatformError> {
        match (self.info.is_thread(), self.raw.parent_id) {
            (true, Some(parent)) => self.client.get_channel(parent).await,
            _ => Ok(self.raw.clone()),
        }
    }
}

#[async_trait]
impl PurgeTarget for DiscordChannel {
    fn info(&self) -> &ChannelInfo {
        &self.info
    }

    async fn permissions_for(&self, user: UserId) -> Result<Permissions, PlatformError> {
        let Some(guild_id) = self.info.guild_id else {
            return Ok(Permissions::empty());
        };

        let guild = self.client.get_guild(guild_id).await?;
        let member = self.client.get_member(guild_id, user).await?;
        let governing = self.governing_channel().await?;

        let roles: Vec<(RoleId, Permissions)> =
            guild.roles.iter().map(|r| (r.id, r.permissions)).collect();
        let overwrites = governing.overwrites();

        let ctx = PermissionContext {
            guild_id,
            owner_id: guild.owner_id,
            member_id: user,
            member_roles: &member.roles,
            roles: &roles,
            overwrites: &overwrites,
        };
        Ok(ctx.channel_permissions())
    }

    async fn bulk_delete_since(&self, cutoff: DateTime<Utc>, reason: &str) -> BulkDeleteResult {
        let mut deleted = 0;
        let error = self
            .collect_and_delete(cutoff, reason, &mut deleted)
            .await
            .err();
        BulkDeleteResult { deleted, error }
    }

    async fn history_before(
        &self,
        before: MessageId,
        limit: u8,
    ) -> Result<Vec<MessageRef>, PlatformError> {
        let page = self
            .client
            .get_messages(self.info.id, Some(before), limit)
            .await?;
        Ok(page
            .into_iter()
            .map(|m| MessageRef {
                id: m.id,
                created_at: m.timestamp,
            })
            .collect())
    }

    async fn delete_message(
        &self,
        message: MessageId,
        reason: &str,
    ) -> Result<DeleteOutcome, PlatformError> {
        self.client
            .delete_message(self.info.id, message, reason)
            .await
    }

    async fn unarchive(&self, reason: &str) -> Result<(), PlatformError> {
        self.client
            .set_thread_archived(self.info.id, false, reason)
            .await
    }

    async fn join_thread(&self) -> Result<(), PlatformError> {
        self.client.join_thread(self.info.id).await
    }
}
