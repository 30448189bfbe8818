//! Durable per-guild list of channels marked for automatic purging.
//!
//! The whole mapping lives in memory and is rewritten to a single JSON file
//! after every mutation:
//!
//! ```json
//! {
//!   "123456789012345678": [223456789012345678, 323456789012345678]
//! }
//! ```
//!
//! Channel IDs are soft references. Nothing here checks that a channel
//! still exists; callers find out when they try to resolve it.

mod error;

use std::{
    collections::{BTreeMap, BTreeSet},
    io::Write,
    path::{Path, PathBuf},
};

pub use error::{StoreError, StoreResult};
use parking_lot::Mutex;

use crate::platform::{ChannelId, GuildId};

type GuildChannels = BTreeMap<GuildId, BTreeSet<ChannelId>>;

/// File-backed guild to channel-set mapping.
///
/// Each mutation holds the lock across update and write, so concurrent
/// commands never interleave halfway through a read-modify-write.
pub struct ConfigStore {
    path: PathBuf,
    guilds: Mutex<GuildChannels>,
}

impl ConfigStore {
    /// Read the store at `path`.
    ///
    /// A missing or unreadable file yields an empty store; the problem is
    /// logged and the next mutation overwrites the file.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let guilds = match read_file(&path) {
            Ok(Some(guilds)) => {
                tracing::info!(
                    path = %path.display(),
                    guilds = guilds.len(),
                    "Loaded channel store"
                );
                guilds
            }
            Ok(None) => {
                tracing::info!(path = %path.display(), "No channel store yet, starting empty");
                GuildChannels::new()
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read channel store, starting empty"
                );
                GuildChannels::new()
            }
        };

        Self {
            path,
            guilds: Mutex::new(guilds),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Merge `channels` into the guild's set and persist.
    ///
    /// Returns how many IDs were not already present. When the write fails
    /// the in-memory state is left unchanged.
    pub fn add_channels(
        &self,
        guild: GuildId,
        channels: impl IntoIterator<Item = ChannelId>,
    ) -> StoreResult<usize> {
        let mut guilds = self.guilds.lock();
        let mut updated = guilds.clone();
        let set = updated.entry(guild).or_default();
        let before = set.len();
        set.extend(channels);
        let added = set.len() - before;

        write_file(&self.path, &updated)?;
        *guilds = updated;
        Ok(added)
    }

    /// Configured channels of `guild` in ascending order.
    pub fn list_channels(&self, guild: GuildId) -> Vec<ChannelId> {
        self.guilds
            .lock()
            .get(&guild)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Empty the guild's set and persist. Returns how many were removed.
    pub fn clear_channels(&self, guild: GuildId) -> StoreResult<usize> {
        let mut guilds = self.guilds.lock();
        let mut updated = guilds.clone();
        let removed = updated
            .get_mut(&guild)
            .map(std::mem::take)
            .map_or(0, |old| old.len());

        write_file(&self.path, &updated)?;
        *guilds = updated;
        Ok(removed)
    }

    /// Guilds with an entry in the store, including emptied ones.
    pub fn guild_ids(&self) -> Vec<GuildId> {
        self.guilds.lock().keys().copied().collect()
    }
}

fn read_file(path: &Path) -> Result<Option<GuildChannels>, StoreError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let raw: BTreeMap<String, Vec<ChannelId>> = serde_json::from_str(&contents)?;
    let mut guilds = GuildChannels::new();
    for (key, channels) in raw {
        match key.parse::<GuildId>() {
            Ok(guild) => {
                guilds.entry(guild).or_default().extend(channels);
            }
            Err(_) => {
                tracing::warn!(key = %key, "Ignoring non-numeric guild key in channel store");
            }
        }
    }
    Ok(Some(guilds))
}

/// Replace the file with the full mapping, via a sibling temp file.
fn write_file(path: &Path, guilds: &GuildChannels) -> StoreResult<()> {
    let persisted: BTreeMap<String, Vec<ChannelId>> = guilds
        .iter()
        .map(|(guild, channels)| (guild.to_string(), channels.iter().copied().collect()))
        .collect();
    let json = serde_json::to_string_pretty(&persisted)?;

    let io_err = |source: std::io::Error| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };
    let tmp = path.with_extension("json.tmp");
    let mut file = std::fs::File::create(&tmp).map_err(io_err)?;
    file.write_all(json.as_bytes()).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;

    tracing::debug!(path = %path.display(), guilds = guilds.len(), "Channel store written");
    Ok(())
}
