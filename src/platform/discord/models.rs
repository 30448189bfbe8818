//! REST payloads, trimmed to the fields the service reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::platform::{
    ApplicationId, ChannelId, ChannelKind, GuildId, MessageId, OverwriteTarget,
    PermissionOverwrite, Permissions, RoleId, UserId,
};

pub const CHANNEL_TYPE_GUILD_TEXT: u8 = 0;
pub const CHANNEL_TYPE_GUILD_ANNOUNCEMENT: u8 = 5;
pub const CHANNEL_TYPE_ANNOUNCEMENT_THREAD: u8 = 10;
pub const CHANNEL_TYPE_PUBLIC_THREAD: u8 = 11;
pub const CHANNEL_TYPE_PRIVATE_THREAD: u8 = 12;

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartialGuild {
    pub id: GuildId,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Guild {
    pub id: GuildId,
    pub owner_id: UserId,
    #[serde(default)]
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub permissions: Permissions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub roles: Vec<RoleId>,
    /// Only present on interaction payloads, already resolved for the
    /// channel the interaction came from.
    #[serde(default)]
    pub permissions: Option<Permissions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Overwrite {
    /// Role ID or user ID, depending on `kind`.
    pub id: RoleId,
    /// 0 = role, 1 = member
    #[serde(rename = "type")]
    pub kind: u8,
    pub allow: Permissions,
    pub deny: Permissions,
}

impl Overwrite {
    pub fn to_overwrite(&self) -> PermissionOverwrite {
        let target = if self.kind == 1 {
            OverwriteTarget::Member(UserId(self.id.get()))
        } else {
            OverwriteTarget::Role(self.id)
        };
        PermissionOverwrite {
            target,
            allow: self.allow,
            deny: self.deny,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadMetadata {
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub locked: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent_id: Option<ChannelId>,
    #[serde(default)]
    pub permission_overwrites: Vec<Overwrite>,
    #[serde(default)]
    pub thread_metadata: Option<ThreadMetadata>,
}

impl Channel {
    pub fn channel_kind(&self) -> ChannelKind {
        match self.kind {
            CHANNEL_TYPE_GUILD_TEXT | CHANNEL_TYPE_GUILD_ANNOUNCEMENT => ChannelKind::Text,
            CHANNEL_TYPE_ANNOUNCEMENT_THREAD
            | CHANNEL_TYPE_PUBLIC_THREAD
            | CHANNEL_TYPE_PRIVATE_THREAD => ChannelKind::Thread {
                archived: self
                    .thread_metadata
                    .as_ref()
                    .is_some_and(|meta| meta.archived),
                private: self.kind == CHANNEL_TYPE_PRIVATE_THREAD,
            },
            _ => ChannelKind::Unsupported,
        }
    }

    pub fn overwrites(&self) -> Vec<PermissionOverwrite> {
        self.permission_overwrites
            .iter()
            .map(Overwrite::to_overwrite)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub timestamp: DateTime<Utc>,
}

/// Body of a 429 response.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitBody {
    #[serde(default)]
    pub retry_after: Option<f64>,
    #[serde(default)]
    pub global: bool,
}

/// Generic error body.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteRequest {
    pub messages: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EditThreadRequest {
    pub archived: bool,
}

#[derive(Debug, Serialize)]
pub struct EditMessageRequest<'a> {
    pub content: &'a str,
}
