//! In-memory platform used by unit and end-to-end tests.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tokio::time::Instant;

use super::{
    BulkDeleteResult, ChannelId, ChannelInfo, ChannelKind, DeleteOutcome, GuildId, GuildSummary,
    MessageId, MessageRef, Permissions, Platform, PlatformError, PurgeTarget, UserId,
};

/// Everything the purge engine asked a [`FakeChannel`] to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Permissions,
    BulkDelete,
    History { before: MessageId },
    Delete { id: MessageId, at: Instant },
    Unarchive,
    JoinThread,
}

pub fn purge_permissions() -> Permissions {
    Permissions::VIEW_CHANNEL | Permissions::READ_MESSAGE_HISTORY | Permissions::MANAGE_MESSAGES
}

/// Scripted channel. History holds only messages older than the bulk window;
/// the bulk phase is simulated by a fixed count.
pub struct FakeChannel {
    info: ChannelInfo,
    permissions: Permissions,
    permissions_fail: bool,
    bulk_deleted: u64,
    bulk_error: bool,
    history_error: bool,
    fail_unarchive: bool,
    panic_on_permissions: bool,
    history: Mutex<Vec<MessageRef>>,
    script: Mutex<VecDeque<DeleteOutcome>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeChannel {
    pub fn text(guild: u64, id: u64) -> Self {
        Self::with_kind(guild, id, ChannelKind::Text)
    }

    pub fn thread(guild: u64, id: u64, archived: bool) -> Self {
        Self::with_kind(
            guild,
            id,
            ChannelKind::Thread {
                archived,
                private: false,
            },
        )
    }

    fn with_kind(guild: u64, id: u64, kind: ChannelKind) -> Self {
        Self {
            info: ChannelInfo {
                id: ChannelId(id),
                guild_id: Some(GuildId(guild)),
                name: format!("channel-{id}"),
                kind,
            },
            permissions: purge_permissions(),
            permissions_fail: false,
            bulk_deleted: 0,
            bulk_error: false,
            history_error: false,
            fail_unarchive: false,
            panic_on_permissions: false,
            history: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn without_guild(mut self) -> Self {
        self.info.guild_id = None;
        self
    }

    pub fn unsupported(mut self) -> Self {
        self.info.kind = ChannelKind::Unsupported;
        self
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn failing_permissions(mut self) -> Self {
        self.permissions_fail = true;
        self
    }

    pub fn with_bulk(mut self, deleted: u64, fail: bool) -> Self {
        self.bulk_deleted = deleted;
        self.bulk_error = fail;
        self
    }

    /// `count` messages older than `cutoff`, one minute apart, newest first.
    pub fn with_old_messages(self, count: usize, cutoff: DateTime<Utc>) -> Self {
        let messages = (0..count)
            .map(|i| {
                let created_at = cutoff - Duration::days(1) - Duration::minutes(i as i64);
                MessageRef {
                    id: MessageId::from_datetime(created_at),
                    created_at,
                }
            })
            .collect();
        *self.history.lock() = messages;
        self
    }

    /// History made of messages created at `times`, newest first.
    pub fn with_messages_at(self, times: impl IntoIterator<Item = DateTime<Utc>>) -> Self {
        let mut messages: Vec<MessageRef> = times
            .into_iter()
            .map(|created_at| MessageRef {
                id: MessageId::from_datetime(created_at),
                created_at,
            })
            .collect();
        messages.sort_by(|a, b| b.id.cmp(&a.id));
        *self.history.lock() = messages;
        self
    }

    /// Outcomes for the next single deletes; afterwards every delete succeeds.
    pub fn with_delete_script(self, outcomes: impl IntoIterator<Item = DeleteOutcome>) -> Self {
        self.script.lock().extend(outcomes);
        self
    }

    pub fn failing_history(mut self) -> Self {
        self.history_error = true;
        self
    }

    pub fn failing_unarchive(mut self) -> Self {
        self.fail_unarchive = true;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic_on_permissions = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn delete_times(&self) -> Vec<Instant> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Delete { at, .. } => Some(*at),
                _ => None,
            })
            .collect()
    }

    pub fn remaining_messages(&self) -> usize {
        self.history.lock().len()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl PurgeTarget for FakeChannel {
    fn info(&self) -> &ChannelInfo {
        &self.info
    }

    async fn permissions_for(&self, _user: UserId) -> Result<Permissions, PlatformError> {
        self.record(Call::Permissions);
        if self.panic_on_permissions {
            panic!("scripted panic in channel {}", self.info.id);
        }
        if self.permissions_fail {
            return Err(PlatformError::Forbidden("Missing Access".into()));
        }
        Ok(self.permissions)
    }

    async fn bulk_delete_since(&self, _cutoff: DateTime<Utc>, _reason: &str) -> BulkDeleteResult {
        self.record(Call::BulkDelete);
        BulkDeleteResult {
            deleted: self.bulk_deleted,
            error: self
                .bulk_error
                .then(|| PlatformError::Forbidden("Missing Permissions".into())),
        }
    }

    async fn history_before(
        &self,
        before: MessageId,
        limit: u8,
    ) -> Result<Vec<MessageRef>, PlatformError> {
        self.record(Call::History { before });
        if self.history_error {
            return Err(PlatformError::Status {
                status: 500,
                message: "history unavailable".into(),
            });
        }
        Ok(self
            .history
            .lock()
            .iter()
            .filter(|m| m.id < before)
            .take(usize::from(limit))
            .copied()
            .collect())
    }

    async fn delete_message(
        &self,
        message: MessageId,
        _reason: &str,
    ) -> Result<DeleteOutcome, PlatformError> {
        self.record(Call::Delete {
            id: message,
            at: Instant::now(),
        });
        let outcome = self
            .script
            .lock()
            .pop_front()
            .unwrap_or(DeleteOutcome::Deleted);
        if outcome == DeleteOutcome::Deleted {
            self.history.lock().retain(|m| m.id != message);
        }
        Ok(outcome)
    }

    async fn unarchive(&self, _reason: &str) -> Result<(), PlatformError> {
        self.record(Call::Unarchive);
        if self.fail_unarchive {
            return Err(PlatformError::Forbidden("Thread is locked".into()));
        }
        Ok(())
    }

    async fn join_thread(&self) -> Result<(), PlatformError> {
        self.record(Call::JoinThread);
        Ok(())
    }
}

/// Guilds with channels; channels not registered resolve to `None`.
#[derive(Default)]
pub struct FakePlatform {
    guilds: Vec<GuildSummary>,
    channels: BTreeMap<(GuildId, ChannelId), Arc<FakeChannel>>,
    fail_guilds: bool,
    resolutions: Mutex<Vec<(GuildId, ChannelId)>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_guild(mut self, id: u64) -> Self {
        self.guilds.push(GuildSummary {
            id: GuildId(id),
            name: format!("guild-{id}"),
        });
        self
    }

    pub fn with_channel(mut self, channel: Arc<FakeChannel>) -> Self {
        let info = channel.info();
        if let Some(guild) = info.guild_id {
            self.channels.insert((guild, info.id), channel);
        }
        self
    }

    pub fn failing_guilds(mut self) -> Self {
        self.fail_guilds = true;
        self
    }

    pub fn resolutions(&self) -> Vec<(GuildId, ChannelId)> {
        self.resolutions.lock().clone()
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn guilds(&self) -> Result<Vec<GuildSummary>, PlatformError> {
        if self.fail_guilds {
            return Err(PlatformError::Status {
                status: 502,
                message: "bad gateway".into(),
            });
        }
        Ok(self.guilds.clone())
    }

    async fn resolve_channel(
        &self,
        guild: GuildId,
        channel: ChannelId,
    ) -> Result<Option<Arc<dyn PurgeTarget>>, PlatformError> {
        self.resolutions.lock().push((guild, channel));
        Ok(self
            .channels
            .get(&(guild, channel))
            .map(|c| Arc::clone(c) as Arc<dyn PurgeTarget>))
    }
}
