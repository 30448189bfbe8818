//! Observability module providing structured logging.
//!
//! Every component logs through `tracing` with structured fields
//! (`guild_id`, `channel_id`, `deleted`, `invoker`, ...); this module only
//! installs the subscriber.

mod tracing_init;

pub use tracing_init::*;
