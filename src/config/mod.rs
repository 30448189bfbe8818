//! Configuration module for the purge service.
//!
//! The service is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax. Without a file, the
//! configuration is assembled from the process environment (see
//! [`PurgerConfig::from_env`]).
//!
//! # Example
//!
//! ```toml
//! [discord]
//! token = "${DISCORD_TOKEN}"
//! public_key = "${DISCORD_PUBLIC_KEY}"
//!
//! [schedule]
//! timezone = "Europe/Berlin"
//! anchors = ["01:00", "13:00"]
//!
//! [store]
//! path = "/var/lib/purger/purger_config.json"
//! ```

mod commands;
mod discord;
mod observability;
mod purge;
mod schedule;
mod server;
mod store;

use std::path::Path;

pub use commands::*;
pub use discord::*;
pub use observability::*;
pub use purge::*;
pub use schedule::*;
use serde::{Deserialize, Serialize};
pub use server::*;
pub use store::*;

/// Root configuration for the purge service.
///
/// Every section except `[discord]` is optional. The defaults run two daily
/// purges and bulk delete everything inside the 14 day window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PurgerConfig {
    /// Platform credentials and API settings.
    pub discord: DiscordConfig,

    /// Recurring purge schedule.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Per-channel deletion pacing and backoff.
    #[serde(default)]
    pub purge: PurgeConfig,

    /// Location of the per-guild channel list.
    #[serde(default)]
    pub store: StoreConfig,

    /// Interactions endpoint.
    #[serde(default)]
    pub server: ServerConfig,

    /// Slash command behavior.
    #[serde(default)]
    pub commands: CommandsConfig,

    /// Observability configuration (logging).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl PurgerConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: PurgerConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from environment variables only.
    ///
    /// - `DISCORD_TOKEN` (required)
    /// - `DISCORD_PUBLIC_KEY` (required to serve interactions)
    /// - `DISCORD_PERMISSIONS` (invite bitmask, default 74752)
    /// - `PURGER_CONFIG` (channel store path)
    /// - `PURGER_TIMEZONE` (anchor timezone)
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = std::env::var("DISCORD_TOKEN")
            .map_err(|_| ConfigError::EnvVarNotFound("DISCORD_TOKEN".to_string()))?;

        let mut discord = DiscordConfig::with_token(token);
        discord.public_key = std::env::var("DISCORD_PUBLIC_KEY").ok();
        if let Ok(raw) = std::env::var("DISCORD_PERMISSIONS") {
            discord.permissions = raw.trim().parse().map_err(|_| {
                ConfigError::Validation(format!(
                    "DISCORD_PERMISSIONS must be a numeric bitmask, got '{raw}'"
                ))
            })?;
        }

        let mut config = Self {
            discord,
            schedule: ScheduleConfig::default(),
            purge: PurgeConfig::default(),
            store: StoreConfig::default(),
            server: ServerConfig::default(),
            commands: CommandsConfig::default(),
            observability: ObservabilityConfig::default(),
        };

        if let Ok(path) = std::env::var("PURGER_CONFIG") {
            config.store.path = path.into();
        }
        if let Ok(tz) = std::env::var("PURGER_TIMEZONE") {
            config.schedule.timezone = tz;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        self.discord.validate().map_err(ConfigError::Validation)?;
        self.schedule.validate().map_err(ConfigError::Validation)?;
        self.purge.validate().map_err(ConfigError::Validation)?;
        self.commands.validate().map_err(ConfigError::Validation)?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Expand `${VAR}` references, leaving anything after a `#` untouched.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| {
        ConfigError::Validation(format!("invalid interpolation pattern: {e}"))
    })?;
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            result.push_str(&value);

            last_end = whole.end();
        }

        result.push_str(&line[last_end..]);
        result.push('\n');
    }

    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}
