//! Scheduled message purging for Discord guild channels and threads.
//!
//! Administrators pick channels with slash commands; the [`scheduler`] purges
//! every picked channel twice a day, and `/purge` clears the current channel
//! on demand. Messages younger than 14 days go through bulk delete, older ones
//! are removed one by one with pacing and rate-limit backoff.

pub mod commands;
pub mod config;
pub mod interactions;
pub mod observability;
pub mod platform;
pub mod purge;
pub mod scheduler;
pub mod store;

#[cfg(test)]
mod tests;
