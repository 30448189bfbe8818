use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::Schedule;
use crate::{
    platform::Platform,
    purge::{PurgeExecutor, purge_guild},
    store::ConfigStore,
};

/// Invoker label attached to scheduled purges.
pub const SCHEDULER_INVOKER: &str = "Scheduler";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPhase {
    WaitingForReady,
    SleepingUntilAnchor,
    RunningCycle,
    SleepingInterval,
    Stopped,
}

/// Results from one pass over every guild.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub guilds: usize,
    pub channels: usize,
    pub deleted: u64,
    pub failures: usize,
}

impl CycleReport {
    pub fn has_deletions(&self) -> bool {
        self.deleted > 0
    }
}

#[derive(Debug)]
struct State {
    phase: SchedulerPhase,
    next_run: Option<DateTime<Utc>>,
    cycles: u64,
}

/// Recurring purge of every configured channel in every guild.
///
/// Waits for the first anchor after [`start`](Self::start), then repeats at
/// a fixed interval. The anchor is resolved once; restarts realign.
pub struct Scheduler {
    platform: Arc<dyn Platform>,
    store: Arc<ConfigStore>,
    executor: PurgeExecutor,
    schedule: Schedule,
    started: AtomicBool,
    state: Mutex<State>,
}

impl Scheduler {
    pub fn new(
        platform: Arc<dyn Platform>,
        store: Arc<ConfigStore>,
        executor: PurgeExecutor,
        schedule: Schedule,
    ) -> Self {
        Self {
            platform,
            store,
            executor,
            schedule,
            started: AtomicBool::new(false),
            state: Mutex::new(State {
                phase: SchedulerPhase::WaitingForReady,
                next_run: None,
                cycles: 0,
            }),
        }
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.state.lock().phase
    }

    /// When the next cycle is due, once known.
    pub fn next_run(&self) -> Option<DateTime<Utc>> {
        self.state.lock().next_run
    }

    /// Cycles completed since start.
    pub fn cycles(&self) -> u64 {
        self.state.lock().cycles
    }

    /// Next run for display: the planned one, or the next anchor when the
    /// scheduler has not started yet.
    pub fn upcoming_run(&self) -> Option<DateTime<Utc>> {
        self.next_run().or_else(|| {
            self.schedule
                .next_anchor(Utc::now())
                .map(|at| at.with_timezone(&Utc))
        })
    }

    fn set_phase(&self, phase: SchedulerPhase, next_run: Option<DateTime<Utc>>) {
        let mut state = self.state.lock();
        state.phase = phase;
        state.next_run = next_run;
    }

    /// Spawn the scheduler loop on `tracker`. Only the first call starts it;
    /// later calls return `false`.
    pub fn start(self: &Arc<Self>, tracker: &TaskTracker, cancel: CancellationToken) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!("Scheduler already running");
            return false;
        }

        let scheduler = Arc::clone(self);
        tracker.spawn(async move { scheduler.run(cancel).await });
        true
    }

    async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            timezone = %self.schedule.tz,
            anchors = ?self.schedule.anchors,
            interval_hours = self.schedule.interval.as_secs() / 3600,
            "Starting scheduler"
        );

        let now = Utc::now();
        if let Some(anchor) = self.schedule.next_anchor(now) {
            let anchor_utc = anchor.with_timezone(&Utc);
            let wait = (anchor_utc - now).to_std().unwrap_or(Duration::ZERO);
            self.set_phase(SchedulerPhase::SleepingUntilAnchor, Some(anchor_utc));
            tracing::info!(next_run = %anchor, "Sleeping until first anchor");
            if !sleep_or_cancel(wait, &cancel).await {
                self.stop();
                return;
            }
        }

        loop {
            self.set_phase(SchedulerPhase::RunningCycle, None);
            let report = self.run_cycle().await;
            if report.has_deletions() || report.failures > 0 {
                tracing::info!(
                    guilds = report.guilds,
                    channels = report.channels,
                    deleted = report.deleted,
                    failures = report.failures,
                    "Scheduler cycle complete"
                );
            } else {
                tracing::debug!(guilds = report.guilds, "Scheduler cycle complete, nothing deleted");
            }

            let next = Utc::now()
                + chrono::Duration::from_std(self.schedule.interval)
                    .unwrap_or(chrono::Duration::hours(12));
            {
                let mut state = self.state.lock();
                state.cycles += 1;
                state.phase = SchedulerPhase::SleepingInterval;
                state.next_run = Some(next);
            }

            if !sleep_or_cancel(self.schedule.interval, &cancel).await {
                self.stop();
                return;
            }
        }
    }

    fn stop(&self) {
        self.set_phase(SchedulerPhase::Stopped, None);
        tracing::info!("Scheduler stopped");
    }

    /// One pass over every guild the bot is in.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        let guilds = match self.platform.guilds().await {
            Ok(guilds) => guilds,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list guilds, skipping cycle");
                return report;
            }
        };
        report.guilds = guilds.len();

        for guild in guilds {
            let result = purge_guild(
                self.platform.as_ref(),
                &self.store,
                &self.executor,
                guild.id,
                SCHEDULER_INVOKER,
            )
            .await;
            if result.channels.is_empty() {
                continue;
            }

            tracing::debug!(
                guild_id = %guild.id,
                guild = %guild.name,
                channels = result.channels.len(),
                deleted = result.total(),
                "Guild purged"
            );
            report.channels += result.channels.len();
            report.deleted += result.total();
            report.failures += result.failures();
        }

        report
    }
}

/// Returns `false` when cancelled before `duration` elapsed.
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
