//! Reply text helpers.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::purge::{ChannelReport, ChannelRun, GuildRunReport, PurgeStatus};

pub const TRUNCATION_MARKER: &str = "… (truncated)";

/// `summary` followed by `lines`, one per line.
///
/// When the result is longer than `limit` characters, only the leading
/// lines that fit (and at most `max_lines` of them) are kept, followed by
/// [`TRUNCATION_MARKER`].
pub fn join_truncated(summary: &str, lines: &[String], limit: usize, max_lines: usize) -> String {
    let full_len = summary.chars().count()
        + lines.iter().map(|l| l.chars().count() + 1).sum::<usize>();
    if full_len <= limit {
        return std::iter::once(summary)
            .chain(lines.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("\n");
    }

    let budget = limit.saturating_sub(TRUNCATION_MARKER.chars().count() + 1);
    let mut out = summary.to_string();
    let mut used = summary.chars().count();
    for line in lines.iter().take(max_lines) {
        let len = line.chars().count() + 1;
        if used + len > budget {
            break;
        }
        out.push('\n');
        out.push_str(line);
        used += len;
    }
    out.push('\n');
    out.push_str(TRUNCATION_MARKER);
    out
}

/// `YYYY-MM-DD HH:MM` in `tz`.
pub fn format_local(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%Y-%m-%d %H:%M").to_string()
}

pub fn run_line(report: &ChannelReport) -> String {
    let mention = report.mention();
    match &report.result {
        ChannelRun::NotFound => format!("{mention} not found"),
        ChannelRun::Failed(e) => format!("{mention} error: {e}"),
        ChannelRun::Purged(outcome) => match &outcome.status {
            PurgeStatus::NotAttempted(reason) => format!("{mention} skipped: {reason}"),
            _ => format!("{mention} {} deleted", outcome.total()),
        },
    }
}

pub fn run_summary(report: &GuildRunReport) -> String {
    format!(
        "Purge complete. Total: {} messages deleted.",
        report.total()
    )
}
