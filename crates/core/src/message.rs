//! Message envelope exchanged between the conductor and workers.
//!
//! Every message on the bus is a JSON [`Envelope`]:
//!
//! ```text
//! { "msg_type": "dispatch_schedule", "data": { ... }, "timestamp": "2026-10-14T09:30:00Z" }
//! ```
//!
//! `data` carries a [`DispatchPayload`] or a [`StatusUpdatePayload`]
//! depending on `msg_type`.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::status::ScheduleStatus;
use crate::types::{Id, Timestamp};

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// Closed set of message kinds.
///
/// Values this build does not know deserialize to [`MessageType::Unknown`]
/// so consumers can skip them instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Conductor → worker: submit this schedule to the cluster.
    DispatchSchedule,
    /// Worker/backend → conductor: a schedule changed status.
    StatusUpdate,
    #[serde(other)]
    Unknown,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DispatchSchedule => "dispatch_schedule",
            Self::StatusUpdate => "status_update",
            Self::Unknown => "unknown",
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The unit exchanged over the message bus. Constructed fresh per send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub msg_type: MessageType,
    pub data: serde_json::Value,
    pub timestamp: Timestamp,
}

impl Envelope {
    /// Create an envelope stamped with the current time.
    pub fn new(msg_type: MessageType, data: serde_json::Value) -> Self {
        Self {
            msg_type,
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn dispatch(payload: &DispatchPayload) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            MessageType::DispatchSchedule,
            serde_json::to_value(payload)?,
        ))
    }

    pub fn status_update(payload: &StatusUpdatePayload) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            MessageType::StatusUpdate,
            serde_json::to_value(payload)?,
        ))
    }

    /// Decode `data` into a typed payload.
    pub fn decode_data<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }

    /// Serialize to the JSON bytes sent over a transport.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Payload of a `dispatch_schedule` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchPayload {
    pub job_id: Id,
    pub schedule_id: Id,
    pub script: String,
    #[serde(default)]
    pub cluster_capability_requirements: Option<String>,
}

/// Payload of a `status_update` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdatePayload {
    pub schedule_id: Id,
    pub job_id: Id,
    pub status: ScheduleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_info: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dispatch() -> DispatchPayload {
        DispatchPayload {
            job_id: Id::new_v4(),
            schedule_id: Id::new_v4(),
            script: "#!/bin/bash\necho hi\n".to_string(),
            cluster_capability_requirements: Some("gpu".to_string()),
        }
    }

    #[test]
    fn envelope_round_trips_through_json_bytes() {
        let envelope = Envelope::dispatch(&sample_dispatch()).unwrap();
        let bytes = envelope.to_bytes().unwrap();
        let decoded = Envelope::from_slice(&bytes).unwrap();

        assert_eq!(decoded.msg_type, envelope.msg_type);
        assert_eq!(decoded.data, envelope.data);
        assert_eq!(decoded.timestamp, envelope.timestamp);
    }

    #[test]
    fn wire_format_uses_snake_case_type_and_string_uuids() {
        let payload = sample_dispatch();
        let envelope = Envelope::dispatch(&payload).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&envelope.to_bytes().unwrap()).unwrap();

        assert_eq!(json["msg_type"], "dispatch_schedule");
        assert_eq!(json["data"]["job_id"], payload.job_id.to_string());
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn unknown_msg_type_is_not_fatal() {
        let raw = br#"{"msg_type":"to_somewhere_else","data":{},"timestamp":"2026-10-14T09:30:00Z"}"#;
        let envelope = Envelope::from_slice(raw).unwrap();
        assert_eq!(envelope.msg_type, MessageType::Unknown);
    }

    #[test]
    fn status_update_payload_decodes_from_envelope() {
        let payload = StatusUpdatePayload {
            schedule_id: Id::new_v4(),
            job_id: Id::new_v4(),
            status: ScheduleStatus::Running,
            exit_info: None,
        };
        let envelope = Envelope::status_update(&payload).unwrap();
        assert_eq!(envelope.msg_type, MessageType::StatusUpdate);
        assert!(envelope.data.get("exit_info").is_none());

        let decoded: StatusUpdatePayload = envelope.decode_data().unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn dispatch_payload_tolerates_missing_requirements() {
        let raw = serde_json::json!({
            "job_id": Id::new_v4(),
            "schedule_id": Id::new_v4(),
            "script": "true",
        });
        let payload: DispatchPayload = serde_json::from_value(raw).unwrap();
        assert!(payload.cluster_capability_requirements.is_none());
    }
}
