use serde::{Deserialize, Serialize};

/// `[observability]` section. Only logging is configurable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Log output settings.
///
/// `RUST_LOG`, when set, replaces `level`, `filter` and `quiet_targets`
/// entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default level for every target.
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default = "default_true")]
    pub timestamps: bool,

    /// Source file and line of every event.
    #[serde(default)]
    pub file_line: bool,

    /// Attach the current span (e.g. `interactions.handle`) to JSON events.
    #[serde(default = "default_true")]
    pub include_spans: bool,

    /// Extra directives appended after `level`, e.g. `"purger::purge=debug"`.
    #[serde(default)]
    pub filter: Option<String>,

    /// Dependency targets capped at `warn` unless `filter` is set.
    /// Default: hyper, h2, reqwest, rustls, tower_http
    #[serde(default = "default_quiet_targets")]
    pub quiet_targets: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            timestamps: true,
            file_line: false,
            include_spans: true,
            filter: None,
            quiet_targets: default_quiet_targets(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_quiet_targets() -> Vec<String> {
    ["hyper", "h2", "reqwest", "rustls", "tower_http"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Multi-line, for local runs.
    Pretty,
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}
