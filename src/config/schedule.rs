//! Recurring purge schedule configuration.
//!
//! The scheduler phase-locks to the first anchor after startup and then
//! repeats every `interval_hours`.
//!
//! # Example
//!
//! ```toml
//! [schedule]
//! enabled = true
//! timezone = "Europe/Berlin"
//! anchors = ["01:00", "13:00"]
//! interval_hours = 12
//! ```

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Recurring purge schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    /// Whether the scheduler runs at all.
    /// Manual commands keep working when disabled.
    /// Default: true
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// IANA timezone the anchors are expressed in.
    /// Default: Europe/Berlin
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Local wall-clock anchor times (`HH:MM`).
    /// Default: 01:00 and 13:00
    #[serde(default = "default_anchors")]
    pub anchors: Vec<String>,

    /// Hours between cycles once the first anchor has been reached.
    /// Default: 12
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            timezone: default_timezone(),
            anchors: default_anchors(),
            interval_hours: default_interval_hours(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_timezone() -> String {
    "Europe/Berlin".to_string()
}

fn default_anchors() -> Vec<String> {
    vec!["01:00".to_string(), "13:00".to_string()]
}

fn default_interval_hours() -> u64 {
    12
}

impl ScheduleConfig {
    /// Parsed timezone.
    pub fn tz(&self) -> Result<Tz, String> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| format!("unknown schedule.timezone '{}'", self.timezone))
    }

    /// Parsed anchor times, sorted ascending.
    pub fn anchor_times(&self) -> Result<Vec<NaiveTime>, String> {
        let mut times = self
            .anchors
            .iter()
            .map(|raw| {
                NaiveTime::parse_from_str(raw.trim(), "%H:%M")
                    .map_err(|_| format!("schedule.anchors entry '{raw}' is not HH:MM"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        times.sort();
        times.dedup();
        Ok(times)
    }

    /// Get the interval as a Duration.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_hours * 3600)
    }

    pub(super) fn validate(&self) -> Result<(), String> {
        self.tz()?;
        if self.anchor_times()?.is_empty() {
            return Err("schedule.anchors must contain at least one time".into());
        }
        if self.interval_hours == 0 {
            return Err("schedule.interval_hours must be greater than 0".into());
        }
        Ok(())
    }
}
