//! Chat platform abstraction.
//!
//! The purge engine only talks to the platform through the [`Platform`] and
//! [`PurgeTarget`] traits. [`discord`] implements them over the REST API;
//! tests use the in-memory fakes in `testing`.

pub mod discord;
mod ids;
mod permissions;
#[cfg(test)]
pub(crate) mod testing;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
pub use ids::*;
pub use permissions::*;

/// Channel flavors the purge engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Guild text or announcement channel.
    Text,
    /// Public, private or announcement thread.
    Thread { archived: bool, private: bool },
    /// Voice, category, forum and everything else.
    Unsupported,
}

/// Static description of a resolved channel.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub id: ChannelId,
    /// `None` for channels outside any guild (DMs).
    pub guild_id: Option<GuildId>,
    pub name: String,
    pub kind: ChannelKind,
}

impl ChannelInfo {
    pub fn is_thread(&self) -> bool {
        matches!(self.kind, ChannelKind::Thread { .. })
    }

    pub fn is_archived(&self) -> bool {
        matches!(self.kind, ChannelKind::Thread { archived: true, .. })
    }

    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }
}

/// One entry of a channel's message history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub id: MessageId,
    pub created_at: DateTime<Utc>,
}

/// Result of deleting a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The platform asked us to slow down.
    RateLimited { retry_after: Option<Duration> },
    /// Missing permission for this particular message.
    Denied,
    /// Already gone.
    Missing,
    /// Any other refusal with an HTTP status.
    Failed { status: u16 },
}

/// What the bulk phase managed before it finished or failed.
#[derive(Debug, Default)]
pub struct BulkDeleteResult {
    pub deleted: u64,
    /// Set when the phase stopped early. `deleted` still counts everything
    /// removed before the failure.
    pub error: Option<PlatformError>,
}

/// Platform errors.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Missing access: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Unexpected status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// A guild the bot is a member of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildSummary {
    pub id: GuildId,
    pub name: String,
}

/// Who the bot is, known once the platform is ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub user_id: UserId,
    pub application_id: ApplicationId,
    pub username: String,
}

/// A single channel or thread that can be purged.
#[async_trait]
pub trait PurgeTarget: Send + Sync {
    fn info(&self) -> &ChannelInfo;

    /// Effective permissions of `user` in this channel.
    async fn permissions_for(&self, user: UserId) -> Result<Permissions, PlatformError>;

    /// Delete every message created after `cutoff` with the batched
    /// endpoint. `cutoff` must lie within the platform's bulk window.
    async fn bulk_delete_since(&self, cutoff: DateTime<Utc>, reason: &str) -> BulkDeleteResult;

    /// Up to `limit` messages older than `before`, newest first.
    async fn history_before(
        &self,
        before: MessageId,
        limit: u8,
    ) -> Result<Vec<MessageRef>, PlatformError>;

    async fn delete_message(
        &self,
        message: MessageId,
        reason: &str,
    ) -> Result<DeleteOutcome, PlatformError>;

    /// Reopen an archived thread.
    async fn unarchive(&self, reason: &str) -> Result<(), PlatformError>;

    /// Add the bot to a thread's member list.
    async fn join_thread(&self) -> Result<(), PlatformError>;
}

/// Guild enumeration and channel lookup.
#[async_trait]
pub trait Platform: Send + Sync {
    async fn guilds(&self) -> Result<Vec<GuildSummary>, PlatformError>;

    /// Look up a channel of `guild`. Channels that no longer exist, are not
    /// visible to the bot or belong to another guild resolve to `None`.
    async fn resolve_channel(
        &self,
        guild: GuildId,
        channel: ChannelId,
    ) -> Result<Option<Arc<dyn PurgeTarget>>, PlatformError>;
}
