//! Alerting System
//!
//! Tracks the alert status of the monitored area and decides which
//! transition events a new feed snapshot implies.

mod tracker;

pub use tracker::{transition, AreaStatus, StateTracker, Transition, TransitionEvent, TransitionKind};
