//! SBOMer scheduler.
//!
//! Drives resolved Events through scheduling and keeps each Event's status in
//! step with its Generations. Scheduling side effects and the periodic sweep
//! only run on the current leader.
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`SchedulerError`)
//! - [`aggregate`]: Pure Event status aggregation from Generation statuses
//! - [`scheduler`]: `Scheduler` service, sweep and `Pipeline` impl

pub mod aggregate;
pub mod error;
pub mod scheduler;

// --- Public API Re-exports ---

pub use aggregate::{Aggregate, aggregate};
pub use error::SchedulerError;
pub use scheduler::{
    NO_GENERATIONS_REASON, ScheduleOutcome, Scheduler, SchedulerBuilder, SchedulerSettings,
    SweepReport,
};
