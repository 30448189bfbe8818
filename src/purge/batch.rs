//! Purging every configured channel of a guild.
//!
//! Shared by the scheduler and the `run` command. Every channel is isolated:
//! unresolvable channels are skipped, and errors or panics while purging one
//! channel are recorded and the batch moves on.

use std::{any::Any, panic::AssertUnwindSafe};

use futures::FutureExt;

use super::{PurgeExecutor, PurgeOutcome};
use crate::{
    platform::{ChannelId, GuildId, Platform},
    store::ConfigStore,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRun {
    /// The channel no longer resolves.
    NotFound,
    Purged(PurgeOutcome),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelReport {
    pub channel_id: ChannelId,
    pub result: ChannelRun,
}

impl ChannelReport {
    pub fn mention(&self) -> String {
        format!("<#{}>", self.channel_id)
    }

    pub fn deleted(&self) -> u64 {
        match &self.result {
            ChannelRun::Purged(outcome) => outcome.total(),
            _ => 0,
        }
    }
}

/// Per-channel results for one guild.
#[derive(Debug, Clone, Default)]
pub struct GuildRunReport {
    pub channels: Vec<ChannelReport>,
}

impl GuildRunReport {
    pub fn total(&self) -> u64 {
        self.channels.iter().map(ChannelReport::deleted).sum()
    }

    pub fn failures(&self) -> usize {
        self.channels
            .iter()
            .filter(|c| matches!(c.result, ChannelRun::Failed(_)))
            .count()
    }
}

/// Purge every channel configured for `guild`.
pub async fn purge_guild(
    platform: &dyn Platform,
    store: &ConfigStore,
    executor: &PurgeExecutor,
    guild: GuildId,
    invoker: &str,
) -> GuildRunReport {
    let mut report = GuildRunReport::default();

    for channel_id in store.list_channels(guild) {
        let result = purge_one(platform, executor, guild, channel_id, invoker).await;
        report.channels.push(ChannelReport { channel_id, result });
    }

    report
}

async fn purge_one(
    platform: &dyn Platform,
    executor: &PurgeExecutor,
    guild: GuildId,
    channel_id: ChannelId,
    invoker: &str,
) -> ChannelRun {
    let target = match platform.resolve_channel(guild, channel_id).await {
        Ok(Some(target)) => target,
        Ok(None) => {
            tracing::info!(
                guild_id = %guild,
                channel_id = %channel_id,
                "Configured channel not found, skipping"
            );
            return ChannelRun::NotFound;
        }
        Err(e) => {
            tracing::warn!(
                guild_id = %guild,
                channel_id = %channel_id,
                error = %e,
                "Failed to resolve channel"
            );
            return ChannelRun::Failed(e.to_string());
        }
    };

    match AssertUnwindSafe(executor.purge(target.as_ref(), invoker))
        .catch_unwind()
        .await
    {
        Ok(outcome) => {
            tracing::info!(
                guild_id = %guild,
                channel_id = %channel_id,
                channel = %target.info().name,
                invoker = %invoker,
                deleted = outcome.total(),
                rate_limited = outcome.rate_limited,
                "Purged channel"
            );
            ChannelRun::Purged(outcome)
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(
                guild_id = %guild,
                channel_id = %channel_id,
                error = %message,
                "Purge panicked"
            );
            ChannelRun::Failed(message)
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
