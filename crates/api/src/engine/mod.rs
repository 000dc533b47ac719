//! Scheduling engine: the create-schedule saga and the status reconciler.

pub mod reconciler;
pub mod schedule_flow;

pub use reconciler::StatusReconciler;
pub use schedule_flow::{schedule_job, ScheduleContext};
