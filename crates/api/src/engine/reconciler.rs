//! Applies `status_update` messages to persisted schedules.
//!
//! Updates may arrive duplicated, late or out of order. Only forward moves
//! of the schedule state machine are written, so a replayed `RUNNING` after
//! `COMPLETED` is dropped and the schedule stays `COMPLETED`. Writes are
//! conditional on the status that was checked, so two handlers racing on
//! one schedule cannot move it backwards.

use std::sync::Arc;

use async_trait::async_trait;
use orchestra_core::message::{Envelope, MessageType, StatusUpdatePayload};
use orchestra_core::status::ScheduleStatus;
use orchestra_db::models::schedule::{Schedule, ScheduleUpdate};
use orchestra_db::Store;
use orchestra_messenger::{HandlerError, MessageHandler};

/// Upper bound on read-check-write rounds for one update.
const MAX_APPLY_ATTEMPTS: usize = 4;

/// Subscription handler for the status topic.
///
/// Store failures are returned so the transport redelivers the update.
/// Everything else (malformed payloads, unknown schedules, stale
/// transitions) is logged and acknowledged.
pub struct StatusReconciler {
    store: Arc<dyn Store>,
}

impl StatusReconciler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Decode and apply one envelope. Returns the updated schedule when a
    /// write happened.
    pub async fn on_status_message(&self, envelope: &Envelope) -> Result<Option<Schedule>, HandlerError> {
        if envelope.msg_type != MessageType::StatusUpdate {
            tracing::debug!(msg_type = envelope.msg_type.as_str(), "Ignoring non-status message");
            return Ok(None);
        }

        let update: StatusUpdatePayload = match envelope.decode_data() {
            Ok(update) => update,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed status update");
                return Ok(None);
            }
        };

        // Every lost race means the stored status moved forward, which can
        // happen at most three times.
        for attempt in 1..=MAX_APPLY_ATTEMPTS {
            let schedule = self
                .store
                .get_schedule(update.schedule_id)
                .await
                .map_err(HandlerError::new)?;
            let Some(schedule) = schedule else {
                tracing::warn!(
                    schedule_id = %update.schedule_id,
                    status = %update.status,
                    "Status update for unknown schedule",
                );
                return Ok(None);
            };

            if !schedule.status.can_transition(update.status) {
                tracing::info!(
                    schedule_id = %schedule.id,
                    current = %schedule.status,
                    received = %update.status,
                    "Ignoring stale status update",
                );
                return Ok(None);
            }

            let patch = build_update(&schedule, update.status, envelope);
            let updated = self
                .store
                .update_schedule(schedule.id, &patch)
                .await
                .map_err(HandlerError::new)?;

            match updated {
                Some(updated) => {
                    tracing::info!(
                        schedule_id = %updated.id,
                        job_id = %updated.job_id,
                        from = %schedule.status,
                        to = %updated.status,
                        exit_info = update.exit_info.as_deref().unwrap_or(""),
                        "Schedule status updated",
                    );
                    return Ok(Some(updated));
                }
                None => {
                    tracing::debug!(
                        schedule_id = %schedule.id,
                        expected = %schedule.status,
                        attempt,
                        "Schedule changed concurrently, re-checking",
                    );
                }
            }
        }

        Err(HandlerError::new(format!(
            "schedule {} kept changing while applying {}",
            update.schedule_id, update.status
        )))
    }
}

/// Status plus the timestamps it implies, stamped with the time the update
/// was published. `started_at` is only set if it is still empty. The write
/// is guarded on the status `schedule` was read with.
fn build_update(schedule: &Schedule, status: ScheduleStatus, envelope: &Envelope) -> ScheduleUpdate {
    let at = envelope.timestamp;
    let starts = status == ScheduleStatus::Running || status.is_terminal();
    ScheduleUpdate {
        status: Some(status),
        started_at: (starts && schedule.started_at.is_none()).then_some(at),
        finished_at: status.is_terminal().then_some(at),
        expected_status: Some(schedule.status),
    }
}

#[async_trait]
impl MessageHandler for StatusReconciler {
    async fn handle(&self, envelope: Envelope) -> Result<(), HandlerError> {
        self.on_status_message(&envelope).await.map(drop)
    }
}
