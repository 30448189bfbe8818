//! Slash command handlers.
//!
//! Handlers are transport agnostic: they take a decoded [`Invocation`] and
//! produce the reply text. Errors render as user-facing replies too.

mod definitions;
mod format;

use std::sync::Arc;

pub use definitions::{OPTION_CHANNEL, OPTION_SUB_COMMAND, command_definitions};
pub use format::{TRUNCATION_MARKER, format_local, join_truncated};
use thiserror::Error;

use crate::{
    config::CommandsConfig,
    platform::{
        BotIdentity, ChannelId, ChannelKind, GuildId, Permissions, Platform, PlatformError,
        PurgeTarget, UserId, discord::invite_url,
    },
    purge::{PermissionReport, PurgeExecutor, PurgeStatus, purge_guild},
    scheduler::Scheduler,
    store::{ConfigStore, StoreError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Purge the channel the command was used in.
    Purge,
    /// Mark channels for automatic purging; empty means the current one.
    Select(Vec<ChannelId>),
    List,
    Clear,
    /// Purge every configured channel of the guild now.
    Run,
    Perms,
    Invite,
    Whoami,
}

impl Command {
    /// Commands that may run long enough to need a deferred reply.
    pub fn is_long_running(&self) -> bool {
        matches!(self, Self::Purge | Self::Run)
    }

    /// Capability the invoking member needs, if any.
    pub fn required_permission(&self) -> Option<(Permissions, &'static str)> {
        match self {
            Self::Purge => Some((Permissions::MANAGE_MESSAGES, "Manage Messages")),
            Self::Select(_) | Self::List | Self::Clear | Self::Run => {
                Some((Permissions::MANAGE_GUILD, "Manage Server"))
            }
            Self::Perms | Self::Invite | Self::Whoami => None,
        }
    }
}

/// A decoded command together with where and by whom it was used.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub command: Command,
    pub guild_id: Option<GuildId>,
    pub channel_id: Option<ChannelId>,
    pub user_id: UserId,
    pub user_name: String,
    /// Permissions of the invoking member in the channel, as resolved by
    /// the platform. `None` outside guilds.
    pub member_permissions: Option<Permissions>,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("This command can only be used in a server.")]
    GuildOnly,

    #[error("You need the {0} permission to use this command.")]
    MissingPrivilege(&'static str),

    #[error("This command only works in text channels and threads.")]
    UnsupportedChannel,

    #[error("Please select at most {0} channels.")]
    TooManyChannels(usize),

    #[error("Failed to save the channel list: {0}")]
    Store(#[from] StoreError),

    #[error("Platform request failed: {0}")]
    Platform(#[from] PlatformError),
}

/// Everything the handlers need.
pub struct CommandSurface {
    platform: Arc<dyn Platform>,
    store: Arc<ConfigStore>,
    executor: PurgeExecutor,
    scheduler: Arc<Scheduler>,
    identity: BotIdentity,
    invite_permissions: Permissions,
    config: CommandsConfig,
}

impl CommandSurface {
    pub fn new(
        platform: Arc<dyn Platform>,
        store: Arc<ConfigStore>,
        executor: PurgeExecutor,
        scheduler: Arc<Scheduler>,
        identity: BotIdentity,
        invite_permissions: Permissions,
        config: CommandsConfig,
    ) -> Self {
        Self {
            platform,
            store,
            executor,
            scheduler,
            identity,
            invite_permissions,
            config,
        }
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Run `invocation` and render the reply. Errors become replies as well.
    pub async fn respond(&self, invocation: &Invocation) -> String {
        match self.execute(invocation).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::debug!(
                    command = ?invocation.command,
                    user = %invocation.user_name,
                    error = %e,
                    "Command rejected"
                );
                e.to_string()
            }
        }
    }

    pub async fn execute(&self, invocation: &Invocation) -> Result<String, CommandError> {
        if let Some((required, name)) = invocation.command.required_permission() {
            let granted = invocation.member_permissions.unwrap_or_default();
            if !(granted.contains(required) || granted.contains(Permissions::ADMINISTRATOR)) {
                return Err(if invocation.guild_id.is_none() {
                    CommandError::GuildOnly
                } else {
                    CommandError::MissingPrivilege(name)
                });
            }
        }

        match &invocation.command {
            Command::Purge => self.purge(invocation).await,
            Command::Select(channels) => self.select(invocation, channels).await,
            Command::List => self.list(invocation).await,
            Command::Clear => self.clear(invocation),
            Command::Run => self.run(invocation).await,
            Command::Perms => self.perms(invocation).await,
            Command::Invite => Ok(self.invite()),
            Command::Whoami => Ok(self.whoami()),
        }
    }

    async fn current_channel(
        &self,
        invocation: &Invocation,
    ) -> Result<Arc<dyn PurgeTarget>, CommandError> {
        let guild = invocation.guild_id.ok_or(CommandError::GuildOnly)?;
        let channel = invocation
            .channel_id
            .ok_or(CommandError::UnsupportedChannel)?;
        let target = self
            .platform
            .resolve_channel(guild, channel)
            .await?
            .ok_or(CommandError::UnsupportedChannel)?;
        if target.info().kind == ChannelKind::Unsupported {
            return Err(CommandError::UnsupportedChannel);
        }
        Ok(target)
    }

    async fn purge(&self, invocation: &Invocation) -> Result<String, CommandError> {
        let target = self.current_channel(invocation).await?;
        let outcome = self
            .executor
            .purge(target.as_ref(), &invocation.user_name)
            .await;

        tracing::info!(
            channel_id = %target.info().id,
            invoker = %invocation.user_name,
            deleted = outcome.total(),
            "Manual purge finished"
        );

        Ok(match outcome.status {
            PurgeStatus::NotAttempted(reason) => format!("Nothing deleted. {reason}"),
            _ => format!("Done. Deleted: {} messages.", outcome.total()),
        })
    }

    async fn select(
        &self,
        invocation: &Invocation,
        requested: &[ChannelId],
    ) -> Result<String, CommandError> {
        let guild = invocation.guild_id.ok_or(CommandError::GuildOnly)?;
        if requested.len() > self.config.max_select_channels {
            return Err(CommandError::TooManyChannels(self.config.max_select_channels));
        }

        let candidates = if requested.is_empty() {
            vec![invocation.channel_id.ok_or(CommandError::UnsupportedChannel)?]
        } else {
            requested.to_vec()
        };

        let mut accepted = Vec::with_capacity(candidates.len());
        for channel in candidates {
            match self.platform.resolve_channel(guild, channel).await? {
                Some(target) if target.info().kind != ChannelKind::Unsupported => {
                    accepted.push(channel);
                }
                _ => {
                    tracing::debug!(channel_id = %channel, "Ignoring unsupported channel");
                }
            }
        }
        if accepted.is_empty() {
            return Err(CommandError::UnsupportedChannel);
        }

        let added = self.store.add_channels(guild, accepted.iter().copied())?;
        let total = self.store.list_channels(guild).len();
        tracing::info!(
            guild_id = %guild,
            user = %invocation.user_name,
            added,
            total,
            "Auto-purge channels selected"
        );

        let mentions: Vec<String> = accepted.iter().map(|c| format!("<#{c}>")).collect();
        Ok(format!(
            "Auto-purge enabled for: {}\nNewly added: {added} | Total in this server: {total}\n{}",
            mentions.join(", "),
            self.next_run_line(true)
        ))
    }

    async fn list(&self, invocation: &Invocation) -> Result<String, CommandError> {
        let guild = invocation.guild_id.ok_or(CommandError::GuildOnly)?;
        let ids = self.store.list_channels(guild);
        if ids.is_empty() {
            return Ok("No channels configured for auto-purge.".to_string());
        }

        let mut names = Vec::with_capacity(ids.len());
        for id in ids {
            // Unresolvable IDs are shown raw.
            let resolved = matches!(self.platform.resolve_channel(guild, id).await, Ok(Some(_)));
            names.push(if resolved {
                format!("<#{id}>")
            } else {
                format!("`{id}`")
            });
        }

        Ok(format!(
            "Auto-purge channels: {}\n{}",
            names.join(", "),
            self.next_run_line(false)
        ))
    }

    fn clear(&self, invocation: &Invocation) -> Result<String, CommandError> {
        let guild = invocation.guild_id.ok_or(CommandError::GuildOnly)?;
        let removed = self.store.clear_channels(guild)?;
        tracing::info!(guild_id = %guild, user = %invocation.user_name, removed, "Auto-purge channels cleared");
        Ok(format!("Removed. Affected channels: {removed}."))
    }

    async fn run(&self, invocation: &Invocation) -> Result<String, CommandError> {
        let guild = invocation.guild_id.ok_or(CommandError::GuildOnly)?;
        if self.store.list_channels(guild).is_empty() {
            return Ok("No channels configured for auto-purge.".to_string());
        }

        let report = purge_guild(
            self.platform.as_ref(),
            &self.store,
            &self.executor,
            guild,
            &invocation.user_name,
        )
        .await;

        let lines: Vec<String> = report.channels.iter().map(format::run_line).collect();
        Ok(join_truncated(
            &format::run_summary(&report),
            &lines,
            self.config.response_limit,
            self.config.truncate_lines,
        ))
    }

    async fn perms(&self, invocation: &Invocation) -> Result<String, CommandError> {
        let target = self.current_channel(invocation).await?;
        let permissions = target.permissions_for(self.identity.user_id).await?;
        let report = PermissionReport::new(target.info(), permissions);

        let mut reply = report.to_string();
        if !report.can_purge() && report.is_thread {
            reply.push_str(
                "\n\nNote: in private or archived threads the bot must be a member or the \
                 thread must be opened briefly.",
            );
        }
        Ok(reply)
    }

    fn invite(&self) -> String {
        format!(
            "Invite URL:\n{}\n\nPermission mask: `{}`",
            invite_url(self.identity.application_id, self.invite_permissions),
            self.invite_permissions.bits()
        )
    }

    fn whoami(&self) -> String {
        format!(
            "Application ID: `{}`\nBot user ID: `{}`",
            self.identity.application_id, self.identity.user_id
        )
    }

    fn next_run_line(&self, with_interval: bool) -> String {
        let schedule = self.scheduler.schedule();
        let when = self
            .scheduler
            .upcoming_run()
            .map(|at| format_local(at, schedule.tz))
            .unwrap_or_else(|| "not scheduled".to_string());
        let hours = schedule.interval.as_secs() / 3600;
        if with_interval {
            format!("Next run ({}): {when} (then every {hours} h).", schedule.tz)
        } else {
            format!("Next run ({}): {when}.", schedule.tz)
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        config::{PurgeConfig, ScheduleConfig},
        platform::{
            ApplicationId,
            testing::{FakeChannel, FakePlatform},
        },
        scheduler::Schedule,
    };

    const GUILD: u64 = 1;
    const BOT: UserId = UserId(7);

    struct Harness {
        surface: CommandSurface,
        store: Arc<ConfigStore>,
        _dir: TempDir,
    }

    fn harness(platform: FakePlatform) -> Harness {
        harness_with(platform, CommandsConfig::default())
    }

    fn harness_with(platform: FakePlatform, config: CommandsConfig) -> Harness {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ConfigStore::load(dir.path().join("store.json")));
        let platform: Arc<dyn Platform> = Arc::new(platform);
        let executor = PurgeExecutor::new(PurgeConfig::default(), BOT);
        let scheduler = Arc::new(Scheduler::new(
            platform.clone(),
            store.clone(),
            executor.clone(),
            Schedule::from_config(&ScheduleConfig::default()).unwrap(),
        ));
        let surface = CommandSurface::new(
            platform,
            store.clone(),
            executor,
            scheduler,
            BotIdentity {
                user_id: BOT,
                application_id: ApplicationId(42),
                username: "purger".into(),
            },
            Permissions::from_bits(74752),
            config,
        );
        Harness {
            surface,
            store,
            _dir: dir,
        }
    }

    fn invocation(command: Command, channel: u64, perms: Permissions) -> Invocation {
        Invocation {
            command,
            guild_id: Some(GuildId(GUILD)),
            channel_id: Some(ChannelId(channel)),
            user_id: UserId(99),
            user_name: "alice".into(),
            member_permissions: Some(perms),
        }
    }

    fn admin(command: Command, channel: u64) -> Invocation {
        invocation(command, channel, Permissions::ADMINISTRATOR)
    }

    #[tokio::test]
    async fn test_privileges_are_enforced() {
        let h = harness(FakePlatform::new());

        let err = h
            .surface
            .execute(&invocation(Command::List, 10, Permissions::MANAGE_MESSAGES))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::MissingPrivilege("Manage Server")));

        let err = h
            .surface
            .execute(&invocation(Command::Purge, 10, Permissions::MANAGE_GUILD))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::MissingPrivilege("Manage Messages")));

        let reply = h
            .surface
            .execute(&invocation(Command::List, 10, Permissions::MANAGE_GUILD))
            .await
            .unwrap();
        assert_eq!(reply, "No channels configured for auto-purge.");
    }

    #[tokio::test]
    async fn test_guild_commands_outside_guild() {
        let h = harness(FakePlatform::new());
        let mut inv = admin(Command::Clear, 10);
        inv.guild_id = None;
        inv.member_permissions = None;
        assert!(matches!(
            h.surface.execute(&inv).await,
            Err(CommandError::GuildOnly)
        ));

        // Informational commands work anywhere.
        inv.command = Command::Whoami;
        assert_eq!(
            h.surface.execute(&inv).await.unwrap(),
            "Application ID: `42`\nBot user ID: `7`"
        );
    }

    #[tokio::test]
    async fn test_select_defaults_to_current_channel() {
        let platform = FakePlatform::new()
            .with_guild(GUILD)
            .with_channel(Arc::new(FakeChannel::text(GUILD, 10)));
        let h = harness(platform);

        let reply = h
            .surface
            .execute(&admin(Command::Select(vec![]), 10))
            .await
            .unwrap();
        assert!(reply.starts_with("Auto-purge enabled for: <#10>\nNewly added: 1 | Total in this server: 1\n"));
        assert!(reply.contains("Next run (Europe/Berlin): "));
        assert!(reply.ends_with("(then every 12 h)."));
        assert_eq!(h.store.list_channels(GuildId(GUILD)), vec![ChannelId(10)]);
    }

    #[tokio::test]
    async fn test_select_filters_unsupported_channels() {
        let platform = FakePlatform::new()
            .with_guild(GUILD)
            .with_channel(Arc::new(FakeChannel::text(GUILD, 10)))
            .with_channel(Arc::new(FakeChannel::thread(GUILD, 11, false)))
            .with_channel(Arc::new(FakeChannel::text(GUILD, 12).unsupported()));
        let h = harness(platform);

        let reply = h
            .surface
            .execute(&admin(
                Command::Select(vec![ChannelId(10), ChannelId(11), ChannelId(12), ChannelId(13)]),
                10,
            ))
            .await
            .unwrap();
        assert!(reply.contains("<#10>, <#11>"));
        assert_eq!(
            h.store.list_channels(GuildId(GUILD)),
            vec![ChannelId(10), ChannelId(11)]
        );

        let err = h
            .surface
            .execute(&admin(Command::Select(vec![ChannelId(12)]), 10))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::UnsupportedChannel));
    }

    #[tokio::test]
    async fn test_select_limit() {
        let h = harness(FakePlatform::new());
        let too_many = (1..=6).map(ChannelId).collect();
        let err = h
            .surface
            .execute(&admin(Command::Select(too_many), 10))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please select at most 5 channels.");
    }

    #[tokio::test]
    async fn test_list_marks_missing_channels() {
        let platform = FakePlatform::new()
            .with_guild(GUILD)
            .with_channel(Arc::new(FakeChannel::text(GUILD, 10)));
        let h = harness(platform);
        h.store
            .add_channels(GuildId(GUILD), [ChannelId(10), ChannelId(20)])
            .unwrap();

        let reply = h.surface.execute(&admin(Command::List, 10)).await.unwrap();
        assert!(reply.starts_with("Auto-purge channels: <#10>, `20`\nNext run (Europe/Berlin): "));
    }

    #[tokio::test]
    async fn test_clear_reports_removed() {
        let h = harness(FakePlatform::new());
        h.store
            .add_channels(GuildId(GUILD), [ChannelId(10), ChannelId(20)])
            .unwrap();
        let reply = h.surface.execute(&admin(Command::Clear, 10)).await.unwrap();
        assert_eq!(reply, "Removed. Affected channels: 2.");
        assert!(h.store.list_channels(GuildId(GUILD)).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reports_breakdown() {
        let platform = FakePlatform::new()
            .with_guild(GUILD)
            .with_channel(Arc::new(FakeChannel::text(GUILD, 10).with_bulk(7, false)));
        let h = harness(platform);

        let reply = h.surface.execute(&admin(Command::Run, 10)).await.unwrap();
        assert_eq!(reply, "No channels configured for auto-purge.");

        h.store
            .add_channels(GuildId(GUILD), [ChannelId(10), ChannelId(20)])
            .unwrap();
        let reply = h.surface.execute(&admin(Command::Run, 10)).await.unwrap();
        assert_eq!(
            reply,
            "Purge complete. Total: 7 messages deleted.\n<#10> 7 deleted\n<#20> not found"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reply_is_truncated() {
        let mut platform = FakePlatform::new().with_guild(GUILD);
        for id in 100..160 {
            platform = platform.with_channel(Arc::new(FakeChannel::text(GUILD, id).with_bulk(1, false)));
        }
        let config = CommandsConfig {
            response_limit: 300,
            ..CommandsConfig::default()
        };
        let h = harness_with(platform, config);
        h.store
            .add_channels(GuildId(GUILD), (100..160).map(ChannelId))
            .unwrap();

        let reply = h.surface.execute(&admin(Command::Run, 10)).await.unwrap();
        assert!(reply.starts_with("Purge complete. Total: 60 messages deleted.\n<#100> 1 deleted"));
        assert!(reply.ends_with(TRUNCATION_MARKER));
        assert!(reply.chars().count() <= 300);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_purge() {
        let platform = FakePlatform::new()
            .with_guild(GUILD)
            .with_channel(Arc::new(FakeChannel::text(GUILD, 10).with_bulk(3, false)))
            .with_channel(Arc::new(
                FakeChannel::text(GUILD, 11).with_permissions(Permissions::VIEW_CHANNEL),
            ));
        let h = harness(platform);
        let moderator = |channel| invocation(Command::Purge, channel, Permissions::MANAGE_MESSAGES);

        assert_eq!(
            h.surface.execute(&moderator(10)).await.unwrap(),
            "Done. Deleted: 3 messages."
        );
        assert_eq!(
            h.surface.execute(&moderator(11)).await.unwrap(),
            "Nothing deleted. Missing permission: Read Message History"
        );
        assert!(matches!(
            h.surface.execute(&moderator(12)).await,
            Err(CommandError::UnsupportedChannel)
        ));
    }

    #[tokio::test]
    async fn test_perms_report() {
        let platform = FakePlatform::new().with_guild(GUILD).with_channel(Arc::new(
            FakeChannel::thread(GUILD, 10, true).with_permissions(Permissions::VIEW_CHANNEL),
        ));
        let h = harness(platform);

        let inv = invocation(Command::Perms, 10, Permissions::empty());
        let reply = h.surface.execute(&inv).await.unwrap();
        assert!(reply.contains("Thread: archived=true private=false"));
        assert!(reply.contains("Administrator: no"));
        assert!(reply.contains("Missing: Read Message History, Manage Messages"));
        assert!(reply.contains("Note: in private or archived threads"));
    }

    #[tokio::test]
    async fn test_invite() {
        let h = harness(FakePlatform::new());
        let reply = h
            .surface
            .execute(&invocation(Command::Invite, 10, Permissions::empty()))
            .await
            .unwrap();
        assert_eq!(
            reply,
            "Invite URL:\nhttps://discord.com/oauth2/authorize?client_id=42&scope=bot%20applications.commands&permissions=74752\n\nPermission mask: `74752`"
        );
    }

    #[tokio::test]
    async fn test_respond_renders_errors() {
        let h = harness(FakePlatform::new());
        let reply = h
            .surface
            .respond(&invocation(Command::Clear, 10, Permissions::empty()))
            .await;
        assert_eq!(reply, "You need the Manage Server permission to use this command.");
    }
}
