//! Slash command definitions in the shape the bulk-overwrite endpoint takes.

use serde_json::{Value, json};

use crate::platform::{
    Permissions,
    discord::models::{
        CHANNEL_TYPE_ANNOUNCEMENT_THREAD, CHANNEL_TYPE_GUILD_ANNOUNCEMENT, CHANNEL_TYPE_GUILD_TEXT,
        CHANNEL_TYPE_PRIVATE_THREAD, CHANNEL_TYPE_PUBLIC_THREAD,
    },
};

pub const OPTION_SUB_COMMAND: u8 = 1;
pub const OPTION_CHANNEL: u8 = 7;

/// Every command the service registers. `max_select` controls how many
/// channel options `purger select` offers.
pub fn command_definitions(max_select: usize) -> Value {
    let channel_types = [
        CHANNEL_TYPE_GUILD_TEXT,
        CHANNEL_TYPE_GUILD_ANNOUNCEMENT,
        CHANNEL_TYPE_ANNOUNCEMENT_THREAD,
        CHANNEL_TYPE_PUBLIC_THREAD,
        CHANNEL_TYPE_PRIVATE_THREAD,
    ];
    let channel_options: Vec<Value> = (1..=max_select)
        .map(|n| {
            json!({
                "type": OPTION_CHANNEL,
                "name": format!("channel{n}"),
                "description": if n == 1 {
                    "Channel 1".to_string()
                } else {
                    format!("Channel {n} (optional)")
                },
                "required": false,
                "channel_types": channel_types,
            })
        })
        .collect();

    let manage_guild = Permissions::MANAGE_GUILD.bits().to_string();
    let manage_messages = Permissions::MANAGE_MESSAGES.bits().to_string();

    json!([
        {
            "name": "purge",
            "description": "Delete every message in this channel, including messages older than 14 days.",
            "default_member_permissions": manage_messages,
            "contexts": [0],
        },
        {
            "name": "purger",
            "description": "Configure automatic purging.",
            "default_member_permissions": manage_guild,
            "contexts": [0],
            "options": [
                {
                    "type": OPTION_SUB_COMMAND,
                    "name": "select",
                    "description": format!(
                        "Choose up to {max_select} channels to purge automatically."
                    ),
                    "options": channel_options,
                },
                {
                    "type": OPTION_SUB_COMMAND,
                    "name": "list",
                    "description": "Show the channels configured for automatic purging.",
                },
                {
                    "type": OPTION_SUB_COMMAND,
                    "name": "clear",
                    "description": "Remove every auto-purge channel of this server.",
                },
                {
                    "type": OPTION_SUB_COMMAND,
                    "name": "run",
                    "description": "Purge every configured channel of this server now.",
                },
            ],
        },
        {
            "name": "perms",
            "description": "Show the bot's permissions in this channel or thread.",
            "contexts": [0],
        },
        {
            "name": "invite",
            "description": "Show an invite URL for this bot.",
        },
        {
            "name": "whoami",
            "description": "Show the bot's user and application IDs.",
        },
    ])
}
