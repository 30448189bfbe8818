use serde::{Deserialize, Serialize};

/// View channel + manage messages + read message history.
pub const DEFAULT_INVITE_PERMISSIONS: u64 = 74752;

/// Discord credentials and REST API settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscordConfig {
    /// Bot token used for every REST call.
    pub token: String,

    /// Hex-encoded Ed25519 application public key.
    /// Required when the interactions endpoint is served.
    #[serde(default)]
    pub public_key: Option<String>,

    /// Permission bitmask requested by the invite URL.
    #[serde(default = "default_permissions")]
    pub permissions: u64,

    /// REST API base URL (overridable for tests and proxies).
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Register slash commands in this guild only (instant updates)
    /// instead of globally.
    #[serde(default)]
    pub command_guild_id: Option<u64>,

    /// Overwrite the registered slash commands on startup.
    #[serde(default = "default_true")]
    pub sync_commands: bool,

    /// Timeout for a single REST call in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retries of a rate-limited REST call before it fails.
    /// Single message deletes are never retried.
    /// Default: 3
    #[serde(default = "default_rate_limit_retries")]
    pub rate_limit_retries: u32,
}

impl DiscordConfig {
    /// Create a config with defaults around the given token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            public_key: None,
            permissions: default_permissions(),
            api_base_url: default_api_base_url(),
            command_guild_id: None,
            sync_commands: true,
            request_timeout_secs: default_request_timeout_secs(),
            rate_limit_retries: default_rate_limit_retries(),
        }
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    pub(super) fn validate(&self) -> Result<(), String> {
        if self.token.trim().is_empty() {
            return Err("discord.token must not be empty".into());
        }
        if let Some(key) = &self.public_key {
            let bytes = hex::decode(key.trim())
                .map_err(|e| format!("discord.public_key is not valid hex: {e}"))?;
            if bytes.len() != 32 {
                return Err(format!(
                    "discord.public_key must be 32 bytes, got {}",
                    bytes.len()
                ));
            }
        }
        if self.request_timeout_secs == 0 {
            return Err("discord.request_timeout_secs must be greater than 0".into());
        }
        Ok(())
    }
}

// The token must never end up in logs.
impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &"****")
            .field("public_key", &self.public_key)
            .field("permissions", &self.permissions)
            .field("api_base_url", &self.api_base_url)
            .field("command_guild_id", &self.command_guild_id)
            .field("sync_commands", &self.sync_commands)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("rate_limit_retries", &self.rate_limit_retries)
            .finish()
    }
}

fn default_permissions() -> u64 {
    DEFAULT_INVITE_PERMISSIONS
}

fn default_api_base_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_true() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_rate_limit_retries() -> u32 {
    3
}
