//! Worker-side handler for `dispatch_schedule` messages.

use std::sync::Arc;

use async_trait::async_trait;
use orchestra_core::message::{DispatchPayload, Envelope, MessageType};
use orchestra_messenger::{HandlerError, MessageHandler};

use crate::ClusterBackend;

/// Submits every dispatched schedule to a cluster backend.
///
/// Malformed payloads are logged and acknowledged, since redelivering them
/// cannot succeed. Submission failures are returned so the transport
/// redelivers the message.
pub struct DispatchHandler {
    backend: Arc<dyn ClusterBackend>,
}

impl DispatchHandler {
    pub fn new(backend: Arc<dyn ClusterBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl MessageHandler for DispatchHandler {
    async fn handle(&self, envelope: Envelope) -> Result<(), HandlerError> {
        if envelope.msg_type != MessageType::DispatchSchedule {
            tracing::debug!(msg_type = envelope.msg_type.as_str(), "Ignoring non-dispatch message");
            return Ok(());
        }

        let dispatch: DispatchPayload = match envelope.decode_data() {
            Ok(dispatch) => dispatch,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed dispatch payload");
                return Ok(());
            }
        };

        match self.backend.submit_job(&dispatch).await {
            Ok(external_id) => {
                tracing::info!(
                    schedule_id = %dispatch.schedule_id,
                    job_id = %dispatch.job_id,
                    backend = self.backend.name(),
                    external_id = %external_id,
                    "Dispatched schedule submitted",
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    schedule_id = %dispatch.schedule_id,
                    backend = self.backend.name(),
                    error = %e,
                    "Failed to submit dispatched schedule",
                );
                Err(HandlerError::new(e))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use orchestra_core::message::StatusUpdatePayload;
    use orchestra_core::status::ScheduleStatus;
    use orchestra_core::types::Id;

    use super::*;
    use crate::{ClusterError, JobStatusRecord};

    #[derive(Default)]
    struct RecordingBackend {
        submitted: Mutex<Vec<DispatchPayload>>,
        fail: bool,
    }

    #[async_trait]
    impl ClusterBackend for RecordingBackend {
        fn name(&self) -> &str {
            "recording"
        }

        async fn prepare_job(&self, _dispatch: &DispatchPayload) -> Result<PathBuf, ClusterError> {
            Ok(PathBuf::from("/tmp"))
        }

        async fn submit_job(&self, dispatch: &DispatchPayload) -> Result<String, ClusterError> {
            if self.fail {
                return Err(ClusterError::UnparseableSubmitOutput(String::new()));
            }
            self.submitted.lock().unwrap().push(dispatch.clone());
            Ok("45".to_string())
        }

        async fn get_job_status(&self, _external_id: &str) -> Result<Vec<JobStatusRecord>, ClusterError> {
            Ok(Vec::new())
        }
    }

    fn dispatch() -> DispatchPayload {
        DispatchPayload {
            job_id: Id::new_v4(),
            schedule_id: Id::new_v4(),
            script: "true".to_string(),
            cluster_capability_requirements: None,
        }
    }

    #[tokio::test]
    async fn dispatch_is_submitted() {
        let backend = Arc::new(RecordingBackend::default());
        let handler = DispatchHandler::new(backend.clone());
        let payload = dispatch();

        handler.handle(Envelope::dispatch(&payload).unwrap()).await.unwrap();

        assert_eq!(*backend.submitted.lock().unwrap(), vec![payload]);
    }

    #[tokio::test]
    async fn submit_failure_requests_redelivery() {
        let backend = Arc::new(RecordingBackend {
            fail: true,
            ..Default::default()
        });
        let handler = DispatchHandler::new(backend);

        let result = handler.handle(Envelope::dispatch(&dispatch()).unwrap()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn other_message_types_are_ignored() {
        let backend = Arc::new(RecordingBackend::default());
        let handler = DispatchHandler::new(backend.clone());
        let update = StatusUpdatePayload {
            schedule_id: Id::new_v4(),
            job_id: Id::new_v4(),
            status: ScheduleStatus::Running,
            exit_info: None,
        };

        handler.handle(Envelope::status_update(&update).unwrap()).await.unwrap();
        assert!(backend.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_is_acknowledged() {
        let backend = Arc::new(RecordingBackend::default());
        let handler = DispatchHandler::new(backend.clone());
        let envelope = Envelope::new(
            MessageType::DispatchSchedule,
            serde_json::json!({ "job_id": "not-a-uuid" }),
        );

        handler.handle(envelope).await.unwrap();
        assert!(backend.submitted.lock().unwrap().is_empty());
    }
}
