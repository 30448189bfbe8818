//! Time-driven purging.
//!
//! The scheduler waits for the first anchor time after it is started, runs
//! a cycle over every guild, then repeats at a fixed interval.

mod anchor;
mod worker;

pub use anchor::{Schedule, next_anchor_after};
pub use worker::{CycleReport, SCHEDULER_INVOKER, Scheduler, SchedulerPhase};
