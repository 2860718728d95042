//! Job scheduling and execution for the MFT engine.
//!
//! This crate provides:
//! - A tick-driven scheduler keeping one timer slot per enabled job
//! - A run-locked runner shared by scheduled and manual triggers
//! - The transfer executor running a job's configs in order
//! - Webhook notifications and periodic history pruning

pub mod engine;
pub mod executor;
pub mod housekeeping;
pub mod notify;
pub mod runner;
pub mod schedule;
pub mod scheduler;
pub mod service;

pub use engine::Engine;
pub use executor::TransferExecutor;
pub use housekeeping::{Housekeeper, MaintenanceScheduler, PruneReport};
pub use notify::{NotifyOutcome, WebhookDispatcher, WebhookPayload};
pub use runner::{JobRunner, RunToken};
pub use schedule::CronSchedule;
pub use scheduler::{FireHandler, Firing, ScheduleEntry, Scheduler, SlotState};
pub use service::JobService;
