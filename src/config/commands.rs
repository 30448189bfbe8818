use serde::{Deserialize, Serialize};

/// Slash command behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandsConfig {
    /// Most channels accepted by a single `select` invocation.
    #[serde(default = "default_max_select_channels")]
    pub max_select_channels: usize,

    /// Replies longer than this are truncated.
    /// The platform hard limit is 2000 characters.
    #[serde(default = "default_response_limit")]
    pub response_limit: usize,

    /// Most breakdown lines kept in a truncated reply.
    #[serde(default = "default_truncate_lines")]
    pub truncate_lines: usize,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            max_select_channels: default_max_select_channels(),
            response_limit: default_response_limit(),
            truncate_lines: default_truncate_lines(),
        }
    }
}

fn default_max_select_channels() -> usize {
    5
}

fn default_response_limit() -> usize {
    1800
}

fn default_truncate_lines() -> usize {
    50
}

impl CommandsConfig {
    pub(super) fn validate(&self) -> Result<(), String> {
        if self.max_select_channels == 0 || self.max_select_channels > 25 {
            return Err("commands.max_select_channels must be between 1 and 25".into());
        }
        if self.response_limit < 100 || self.response_limit > 2000 {
            return Err("commands.response_limit must be between 100 and 2000".into());
        }
        Ok(())
    }
}
