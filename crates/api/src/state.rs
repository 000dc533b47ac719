use std::sync::Arc;

use orchestra_db::Store;
use orchestra_messenger::MessengerRegistry;
use orchestra_scheduler::Scheduler;

use crate::engine::schedule_flow::ScheduleContext;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// The configured cluster selection policy, resolved at start-up.
    pub scheduler: Arc<dyn Scheduler>,
    pub messengers: Arc<MessengerRegistry>,
}

impl AppState {
    pub fn schedule_context(&self) -> ScheduleContext {
        ScheduleContext {
            store: Arc::clone(&self.store),
            scheduler: Arc::clone(&self.scheduler),
            messengers: Arc::clone(&self.messengers),
        }
    }
}
