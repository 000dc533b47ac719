//! The work behind each subcommand, written against the messenger and
//! cluster traits so it runs the same over any binding.

use std::sync::Arc;

use async_trait::async_trait;
use orchestra_cluster::{overall_status, ClusterBackend, ClusterBackendRegistry, SlurmCluster};
use orchestra_core::message::{Envelope, StatusUpdatePayload};
use orchestra_core::status::ScheduleStatus;
use orchestra_core::types::Id;
use orchestra_messenger::{HandlerError, MessageHandler, Messenger, MessengerRegistry};

use crate::config::WorkerConfig;
use crate::WorkerError;

/// Backends this build can submit to.
pub fn backend_registry(config: &WorkerConfig) -> ClusterBackendRegistry {
    ClusterBackendRegistry::new().with(
        SlurmCluster::NAME,
        Arc::new(SlurmCluster::new(config.slurm.clone())),
    )
}

pub fn backend(
    backends: &ClusterBackendRegistry,
    name: &str,
) -> Result<Arc<dyn ClusterBackend>, WorkerError> {
    backends
        .get(name)
        .ok_or_else(|| WorkerError::UnknownBackend(name.to_string()))
}

pub fn messenger(
    messengers: &MessengerRegistry,
    name: &str,
) -> Result<Arc<dyn Messenger>, WorkerError> {
    messengers
        .get(name)
        .ok_or_else(|| WorkerError::UnknownMessenger(name.to_string()))
}

/// Logs every envelope and acknowledges it.
#[derive(Debug, Default)]
pub struct EchoHandler;

#[async_trait]
impl MessageHandler for EchoHandler {
    async fn handle(&self, envelope: Envelope) -> Result<(), HandlerError> {
        tracing::info!(
            msg_type = envelope.msg_type.as_str(),
            timestamp = %envelope.timestamp,
            data = %envelope.data,
            "Received envelope",
        );
        Ok(())
    }
}

/// Publish one `status_update` on `topic`. Returns the message id.
pub async fn publish_status(
    messenger: &dyn Messenger,
    topic: &str,
    update: &StatusUpdatePayload,
) -> Result<String, WorkerError> {
    let envelope = Envelope::status_update(update)?;
    let message_id = messenger.publish(&envelope, topic).await?;

    tracing::info!(
        schedule_id = %update.schedule_id,
        job_id = %update.job_id,
        status = %update.status,
        topic,
        message_id = %message_id,
        "Status update published",
    );
    Ok(message_id)
}

/// Ask the backend about `external_id` and publish the status it reports.
///
/// Returns `None` without publishing when the backend has no record of the
/// job or reports a state with no schedule counterpart.
pub async fn poll_status(
    backend: &dyn ClusterBackend,
    messenger: &dyn Messenger,
    topic: &str,
    schedule_id: Id,
    job_id: Id,
    external_id: &str,
) -> Result<Option<ScheduleStatus>, WorkerError> {
    let records = backend.get_job_status(external_id).await?;
    let Some((status, record)) = overall_status(&records) else {
        tracing::warn!(
            schedule_id = %schedule_id,
            external_id,
            records = records.len(),
            "Backend reported no usable status",
        );
        return Ok(None);
    };

    let update = StatusUpdatePayload {
        schedule_id,
        job_id,
        status,
        exit_info: Some(format!("{} {}", record.state, record.exit_code)),
    };
    publish_status(messenger, topic, &update).await?;
    Ok(Some(status))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
