//! Settlement scheduler.
//!
//! Three jobs share one heartbeat. Each job's next run is persisted in the
//! `job_schedule` table so restarts resume the cadence instead of resetting it.

pub mod jobs;
pub mod scheduler;
pub mod ticks;

pub use jobs::{interval_for, JobKind, TickReport};
pub use scheduler::{RunningScheduler, SettlementScheduler};
pub use ticks::TickContext;
