//! Capability checks that run before any message is touched.

use std::fmt;

use crate::platform::{ChannelInfo, ChannelKind, Permissions, PurgeTarget};

/// Capabilities a purge needs, in the order they are checked.
const REQUIRED: [(Permissions, &str); 3] = [
    (Permissions::VIEW_CHANNEL, "View Channel"),
    (Permissions::READ_MESSAGE_HISTORY, "Read Message History"),
    (Permissions::MANAGE_MESSAGES, "Manage Messages"),
];

/// Result of [`check_purge_permissions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionCheck {
    Allowed,
    /// Names the first missing capability.
    Denied(String),
}

impl PermissionCheck {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Empty when allowed.
    pub fn reason(&self) -> &str {
        match self {
            Self::Allowed => "",
            Self::Denied(reason) => reason,
        }
    }
}

/// First-fail check of view, read-history and manage-messages.
pub fn check_purge_permissions(permissions: Permissions) -> PermissionCheck {
    REQUIRED
        .iter()
        .find(|(required, _)| !permissions.contains(*required))
        .map_or(PermissionCheck::Allowed, |(_, name)| {
            PermissionCheck::Denied(format!("Missing permission: {name}"))
        })
}

/// Diagnostic view of every capability for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionReport {
    pub channel: String,
    pub is_thread: bool,
    pub archived: bool,
    pub private: bool,
    pub administrator: bool,
    /// All missing capabilities, not just the first.
    pub missing: Vec<&'static str>,
}

impl PermissionReport {
    pub fn new(info: &ChannelInfo, permissions: Permissions) -> Self {
        let (archived, private) = match info.kind {
            ChannelKind::Thread { archived, private } => (archived, private),
            _ => (false, false),
        };
        Self {
            channel: info.mention(),
            is_thread: info.is_thread(),
            archived,
            private,
            administrator: permissions.contains(Permissions::ADMINISTRATOR),
            missing: REQUIRED
                .iter()
                .filter(|(required, _)| !permissions.contains(*required))
                .map(|(_, name)| *name)
                .collect(),
        }
    }

    pub fn can_purge(&self) -> bool {
        self.missing.is_empty()
    }
}

impl fmt::Display for PermissionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Permissions in {}", self.channel)?;
        if self.is_thread {
            writeln!(
                f,
                "Thread: archived={} private={}",
                self.archived, self.private
            )?;
        }
        writeln!(f, "Administrator: {}", yes_no(self.administrator))?;
        if self.missing.is_empty() {
            write!(f, "All purge permissions present.")
        } else {
            write!(f, "Missing: {}", self.missing.join(", "))
        }
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Reopen and join a thread so its history is reachable.
///
/// Failures are logged and ignored; a later permission check or delete
/// will surface the real problem.
pub async fn ensure_thread_access(target: &dyn PurgeTarget, reason: &str) {
    let info = target.info();
    if !info.is_thread() {
        return;
    }

    if info.is_archived()
        && let Err(e) = target.unarchive(reason).await
    {
        tracing::debug!(channel_id = %info.id, error = %e, "Failed to unarchive thread");
    }

    if let Err(e) = target.join_thread().await {
        tracing::debug!(channel_id = %info.id, error = %e, "Failed to join thread");
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::platform::testing::{Call, FakeChannel, purge_permissions};

    #[rstest]
    #[case(Permissions::empty(), "Missing permission: View Channel")]
    #[case(Permissions::VIEW_CHANNEL, "Missing permission: Read Message History")]
    #[case(
        Permissions::VIEW_CHANNEL | Permissions::MANAGE_MESSAGES,
        "Missing permission: Read Message History"
    )]
    #[case(
        Permissions::VIEW_CHANNEL | Permissions::READ_MESSAGE_HISTORY,
        "Missing permission: Manage Messages"
    )]
    fn test_first_missing_capability_wins(#[case] perms: Permissions, #[case] reason: &str) {
        let check = check_purge_permissions(perms);
        assert!(!check.is_allowed());
        assert_eq!(check.reason(), reason);
    }

    #[test]
    fn test_all_capabilities_allow() {
        let check = check_purge_permissions(purge_permissions());
        assert_eq!(check, PermissionCheck::Allowed);
        assert_eq!(check.reason(), "");
    }

    #[test]
    fn test_report_aggregates_missing() {
        let channel = FakeChannel::thread(1, 2, true);
        let report = PermissionReport::new(channel.info(), Permissions::VIEW_CHANNEL);
        assert_eq!(report.missing, vec!["Read Message History", "Manage Messages"]);
        assert!(report.is_thread && report.archived && !report.private);
        assert!(!report.can_purge());

        let text = report.to_string();
        assert!(text.contains("<#2>"));
        assert!(text.contains("Missing: Read Message History, Manage Messages"));
    }

    #[tokio::test]
    async fn test_archived_thread_is_reopened_and_joined() {
        let thread = FakeChannel::thread(1, 2, true);
        ensure_thread_access(&thread, "test").await;
        assert_eq!(thread.calls(), vec![Call::Unarchive, Call::JoinThread]);
    }

    #[tokio::test]
    async fn test_unarchive_failure_still_joins() {
        let thread = FakeChannel::thread(1, 2, true).failing_unarchive();
        ensure_thread_access(&thread, "test").await;
        assert_eq!(thread.calls(), vec![Call::Unarchive, Call::JoinThread]);
    }

    #[tokio::test]
    async fn test_open_thread_is_only_joined() {
        let thread = FakeChannel::thread(1, 2, false);
        ensure_thread_access(&thread, "test").await;
        assert_eq!(thread.calls(), vec![Call::JoinThread]);

        let text = FakeChannel::text(1, 3);
        ensure_thread_access(&text, "test").await;
        assert!(text.calls().is_empty());
    }
}
