//! Interaction payloads and responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    commands::{Command, Invocation, OPTION_SUB_COMMAND},
    platform::{
        ApplicationId, ChannelId, GuildId,
        discord::models::{Member, User},
    },
};

pub const INTERACTION_PING: u8 = 1;
pub const INTERACTION_APPLICATION_COMMAND: u8 = 2;

pub const RESPONSE_PONG: u8 = 1;
pub const RESPONSE_CHANNEL_MESSAGE: u8 = 4;
pub const RESPONSE_DEFERRED_CHANNEL_MESSAGE: u8 = 5;

/// Message flag that limits visibility to the invoking user.
pub const FLAG_EPHEMERAL: u64 = 1 << 6;

#[derive(Debug, Clone, Deserialize)]
pub struct Interaction {
    #[serde(rename = "type")]
    pub kind: u8,
    pub application_id: ApplicationId,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    /// Set for guild interactions.
    #[serde(default)]
    pub member: Option<Member>,
    /// Set for DM interactions.
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub data: Option<CommandData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandData {
    pub name: String,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

impl Interaction {
    fn invoking_user(&self) -> Option<&User> {
        self.member
            .as_ref()
            .and_then(|m| m.user.as_ref())
            .or(self.user.as_ref())
    }

    /// Decode an application command. `None` for unknown commands.
    pub fn invocation(&self) -> Option<Invocation> {
        let data = self.data.as_ref()?;
        let command = parse_command(data)?;
        let user = self.invoking_user()?;

        Some(Invocation {
            command,
            guild_id: self.guild_id,
            channel_id: self.channel_id,
            user_id: user.id,
            user_name: user.display_name().to_string(),
            member_permissions: self.member.as_ref().and_then(|m| m.permissions),
        })
    }
}

fn parse_command(data: &CommandData) -> Option<Command> {
    match data.name.as_str() {
        "purge" => Some(Command::Purge),
        "perms" => Some(Command::Perms),
        "invite" => Some(Command::Invite),
        "whoami" => Some(Command::Whoami),
        "purger" => {
            let sub = data
                .options
                .iter()
                .find(|o| o.kind == OPTION_SUB_COMMAND)?;
            match sub.name.as_str() {
                "select" => Some(Command::Select(selected_channels(&sub.options))),
                "list" => Some(Command::List),
                "clear" => Some(Command::Clear),
                "run" => Some(Command::Run),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Channel options in `channel1..channelN` order.
fn selected_channels(options: &[CommandOption]) -> Vec<ChannelId> {
    let mut picked: Vec<(&str, ChannelId)> = options
        .iter()
        .filter_map(|o| {
            let id = match o.value.as_ref()? {
                Value::String(s) => s.parse().ok()?,
                Value::Number(n) => ChannelId(n.as_u64()?),
                _ => return None,
            };
            Some((o.name.as_str(), id))
        })
        .collect();
    picked.sort_by_key(|(name, _)| {
        name.trim_start_matches("channel")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    picked.into_iter().map(|(_, id)| id).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub flags: u64,
}

impl InteractionResponse {
    pub fn pong() -> Self {
        Self {
            kind: RESPONSE_PONG,
            data: None,
        }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            kind: RESPONSE_CHANNEL_MESSAGE,
            data: Some(ResponseData {
                content: Some(content.into()),
                flags: FLAG_EPHEMERAL,
            }),
        }
    }

    pub fn deferred_ephemeral() -> Self {
        Self {
            kind: RESPONSE_DEFERRED_CHANNEL_MESSAGE,
            data: Some(ResponseData {
                content: None,
                flags: FLAG_EPHEMERAL,
            }),
        }
    }
}
