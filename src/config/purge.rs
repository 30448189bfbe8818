//! Per-channel purge pacing configuration.
//!
//! # Example
//!
//! ```toml
//! [purge]
//! bulk_window_days = 14
//! pacing_ms = 500
//! backoff_base_ms = 500
//! backoff_max_ms = 8000
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The platform refuses bulk deletion of anything older than this.
pub const MAX_BULK_WINDOW_DAYS: u32 = 14;

/// Largest page the message history endpoint returns.
pub const MAX_HISTORY_PAGE_SIZE: u8 = 100;

/// Deletion pacing and rate-limit backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PurgeConfig {
    /// Messages younger than this many days go through bulk delete.
    /// Default: 14 (the platform maximum)
    #[serde(default = "default_bulk_window_days")]
    pub bulk_window_days: u32,

    /// Pause after every successful single delete.
    /// Default: 500
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Backoff unit; the n-th consecutive rate limit sleeps `2^n * base`.
    /// Default: 500
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single backoff sleep.
    /// Default: 8000
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Messages requested per history page.
    /// Default: 100
    #[serde(default = "default_history_page_size")]
    pub history_page_size: u8,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            bulk_window_days: default_bulk_window_days(),
            pacing_ms: default_pacing_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            history_page_size: default_history_page_size(),
        }
    }
}

fn default_bulk_window_days() -> u32 {
    MAX_BULK_WINDOW_DAYS
}

fn default_pacing_ms() -> u64 {
    500
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    8000
}

fn default_history_page_size() -> u8 {
    MAX_HISTORY_PAGE_SIZE
}

impl PurgeConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn bulk_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.bulk_window_days))
    }

    /// Sleep after the `consecutive`-th rate limit in a row:
    /// `min(2^consecutive * base, max)`.
    pub fn backoff_delay(&self, consecutive: u32) -> Duration {
        let factor = 2u64.checked_pow(consecutive).unwrap_or(u64::MAX);
        let delay_ms = factor
            .saturating_mul(self.backoff_base_ms)
            .min(self.backoff_max_ms);
        Duration::from_millis(delay_ms)
    }

    pub(super) fn validate(&self) -> Result<(), String> {
        if self.bulk_window_days == 0 || self.bulk_window_days > MAX_BULK_WINDOW_DAYS {
            return Err(format!(
                "purge.bulk_window_days must be between 1 and {MAX_BULK_WINDOW_DAYS}"
            ));
        }
        if self.history_page_size == 0 || self.history_page_size > MAX_HISTORY_PAGE_SIZE {
            return Err(format!(
                "purge.history_page_size must be between 1 and {MAX_HISTORY_PAGE_SIZE}"
            ));
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err("purge.backoff_max_ms must not be below purge.backoff_base_ms".into());
        }
        Ok(())
    }
}
