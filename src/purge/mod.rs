//! Channel purging: permission guard, the two-phase executor and
//! guild-wide batches.

mod batch;
mod executor;
mod guard;

pub use batch::{ChannelReport, ChannelRun, GuildRunReport, purge_guild};
pub use executor::{PurgeExecutor, PurgeOutcome, PurgeStatus};
pub use guard::{PermissionCheck, PermissionReport, check_purge_permissions, ensure_thread_access};
