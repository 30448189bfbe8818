//! Two-phase channel purge: batched delete inside the bulk window, then
//! paced single deletes for everything older.

use chrono::{TimeDelta, Utc};

use super::guard::{PermissionCheck, check_purge_permissions, ensure_thread_access};
use crate::{
    config::PurgeConfig,
    platform::{ChannelKind, DeleteOutcome, MessageId, PurgeTarget, UserId},
};

/// Messages this close to the end of the bulk window are left to the
/// single delete phase; they could age out before a batch request lands,
/// and the platform then rejects the whole batch.
const BULK_WINDOW_MARGIN: TimeDelta = TimeDelta::minutes(1);

/// Result of purging one channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeOutcome {
    /// Messages removed by the batched endpoint.
    pub bulk_deleted: u64,
    /// Messages removed one at a time.
    pub single_deleted: u64,
    /// Single deletes answered with a rate limit. These messages were
    /// skipped and remain in the channel.
    pub rate_limited: u64,
    /// Single deletes refused for any other reason.
    pub skipped: u64,
    pub status: PurgeStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PurgeStatus {
    #[default]
    Completed,
    /// Nothing was attempted.
    NotAttempted(String),
    /// A phase stopped early; the counts are what was done before.
    Interrupted(String),
}

impl PurgeOutcome {
    fn not_attempted(reason: impl Into<String>) -> Self {
        Self {
            status: PurgeStatus::NotAttempted(reason.into()),
            ..Self::default()
        }
    }

    /// Total number of messages deleted.
    pub fn total(&self) -> u64 {
        self.bulk_deleted + self.single_deleted
    }

    pub fn has_deletions(&self) -> bool {
        self.total() > 0
    }
}

/// Purges channels on behalf of the bot user.
#[derive(Debug, Clone)]
pub struct PurgeExecutor {
    config: PurgeConfig,
    acting_user: UserId,
}

impl PurgeExecutor {
    pub fn new(config: PurgeConfig, acting_user: UserId) -> Self {
        Self {
            config,
            acting_user,
        }
    }

    pub fn acting_user(&self) -> UserId {
        self.acting_user
    }

    /// Delete every message in `target`. `invoker` ends up in the audit log
    /// reason and in the logs.
    ///
    /// Never fails: missing permissions yield an empty outcome, platform
    /// errors end the current phase and keep the counts reached so far.
    pub async fn purge(&self, target: &dyn PurgeTarget, invoker: &str) -> PurgeOutcome {
        let info = target.info();
        if info.guild_id.is_none() {
            return PurgeOutcome::not_attempted("Not a guild channel");
        }
        if info.kind == ChannelKind::Unsupported {
            return PurgeOutcome::not_attempted("Only text channels and threads are supported");
        }

        let reason = format!("Auto-purge triggered by {invoker}");

        if info.is_thread() {
            ensure_thread_access(target, &reason).await;
        }

        let permissions = match target.permissions_for(self.acting_user).await {
            Ok(permissions) => permissions,
            Err(e) => {
                tracing::debug!(
                    channel_id = %info.id,
                    error = %e,
                    "Could not evaluate permissions, skipping channel"
                );
                return PurgeOutcome::not_attempted(format!("Could not check permissions: {e}"));
            }
        };
        if let PermissionCheck::Denied(reason) = check_purge_permissions(permissions) {
            tracing::debug!(channel_id = %info.id, reason = %reason, "Skipping channel");
            return PurgeOutcome::not_attempted(reason);
        }

        let cutoff = Utc::now() - self.config.bulk_window() + BULK_WINDOW_MARGIN;
        let mut outcome = PurgeOutcome::default();

        let bulk = target.bulk_delete_since(cutoff, &reason).await;
        outcome.bulk_deleted = bulk.deleted;
        if let Some(e) = bulk.error {
            tracing::debug!(
                channel_id = %info.id,
                deleted = bulk.deleted,
                error = %e,
                "Bulk delete stopped early"
            );
            outcome.status = PurgeStatus::Interrupted(format!("Bulk delete failed: {e}"));
        }

        self.delete_older(target, MessageId::from_datetime(cutoff), &reason, &mut outcome)
            .await;

        tracing::debug!(
            channel_id = %info.id,
            invoker = %invoker,
            bulk = outcome.bulk_deleted,
            single = outcome.single_deleted,
            rate_limited = outcome.rate_limited,
            skipped = outcome.skipped,
            "Channel purged"
        );
        outcome
    }

    /// Walk history below `before`, newest first, deleting one message at
    /// a time.
    async fn delete_older(
        &self,
        target: &dyn PurgeTarget,
        mut before: MessageId,
        reason: &str,
        outcome: &mut PurgeOutcome,
    ) {
        let channel_id = target.info().id;
        let page_size = self.config.history_page_size;
        let mut consecutive_limits = 0u32;

        loop {
            let page = match target.history_before(before, page_size).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::debug!(channel_id = %channel_id, error = %e, "History fetch failed");
                    outcome.status = PurgeStatus::Interrupted(format!("History fetch failed: {e}"));
                    return;
                }
            };
            let Some(last) = page.last() else {
                return;
            };
            before = last.id;

            for message in &page {
                match target.delete_message(message.id, reason).await {
                    Ok(DeleteOutcome::Deleted) => {
                        outcome.single_deleted += 1;
                        consecutive_limits = 0;
                        tokio::time::sleep(self.config.pacing()).await;
                    }
                    Ok(DeleteOutcome::RateLimited { retry_after }) => {
                        consecutive_limits += 1;
                        outcome.rate_limited += 1;
                        let delay = self.config.backoff_delay(consecutive_limits);
                        tracing::debug!(
                            channel_id = %channel_id,
                            message_id = %message.id,
                            consecutive = consecutive_limits,
                            delay_ms = delay.as_millis() as u64,
                            retry_after_ms = retry_after.map(|d| d.as_millis() as u64),
                            "Rate limited, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    Ok(other) => {
                        outcome.skipped += 1;
                        tracing::debug!(
                            channel_id = %channel_id,
                            message_id = %message.id,
                            outcome = ?other,
                            "Skipping message"
                        );
                    }
                    Err(e) => {
                        tracing::debug!(channel_id = %channel_id, error = %e, "Single delete failed");
                        outcome.status = PurgeStatus::Interrupted(format!("Delete failed: {e}"));
                        return;
                    }
                }
            }

            if page.len() < usize::from(page_size) {
                return;
            }
        }
    }
}
