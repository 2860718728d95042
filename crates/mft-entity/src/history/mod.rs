//! Job execution history entities.

pub mod model;
pub mod status;

pub use model::{ConfigRunResult, JobHistory};
pub use status::{HistoryStatus, TriggerKind};
