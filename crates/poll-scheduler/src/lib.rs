//! Alert Poll Scheduler
//!
//! Drives the monitor: fetch a snapshot, parse it, update the area state,
//! publish the resulting events, then sleep for the poll interval.

mod scheduler;

pub use scheduler::{CycleOutcome, PollLoop, PollPhase, SchedulerConfig};
