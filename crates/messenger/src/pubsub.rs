//! Google Cloud Pub/Sub binding over the v1 REST API.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | publish   | `POST /v1/projects/{p}/topics/{t}:publish` |
//! | pull      | `POST /v1/projects/{p}/subscriptions/{s}:pull` |
//! | ack       | `POST /v1/projects/{p}/subscriptions/{s}:acknowledge` |
//! | nack      | `POST /v1/projects/{p}/subscriptions/{s}:modifyAckDeadline` with a zero deadline |
//!
//! Message data travels base64-encoded. When `PUBSUB_EMULATOR_HOST` is set
//! requests go to the emulator over plain HTTP without credentials.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::stream::{self, StreamExt};
use orchestra_core::message::Envelope;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::PubSubConfig;
use crate::delivery::{self, Delivery};
use crate::error::MessengerError;
use crate::{MessageHandler, Messenger};

/// Pause after a failed pull before trying again.
const PULL_RETRY_DELAY: Duration = Duration::from_secs(1);
/// Pause after a pull that returned no messages.
const EMPTY_PULL_DELAY: Duration = Duration::from_millis(250);

fn pause_after_pull(result: &Result<Vec<ReceivedMessage>, String>) -> Option<Duration> {
    match result {
        Err(_) => Some(PULL_RETRY_DELAY),
        Ok(received) if received.is_empty() => Some(EMPTY_PULL_DELAY),
        Ok(_) => None,
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct PublishRequest {
    messages: Vec<OutgoingMessage>,
}

#[derive(Debug, Serialize)]
struct OutgoingMessage {
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PullRequest {
    max_messages: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullResponse {
    #[serde(default)]
    received_messages: Vec<ReceivedMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceivedMessage {
    ack_id: String,
    message: PubsubMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PubsubMessage {
    #[serde(default)]
    data: String,
    #[serde(default)]
    message_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AcknowledgeRequest<'a> {
    ack_ids: [&'a str; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyAckDeadlineRequest<'a> {
    ack_ids: [&'a str; 1],
    ack_deadline_seconds: u32,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Thin REST client; cheap to clone.
#[derive(Debug, Clone)]
struct PubSubClient {
    http: reqwest::Client,
    base_url: String,
    project: String,
    access_token: Option<String>,
}

impl PubSubClient {
    fn topic_url(&self, topic: &str, action: &str) -> String {
        format!(
            "{}/v1/projects/{}/topics/{topic}:{action}",
            self.base_url, self.project
        )
    }

    fn subscription_url(&self, subscription: &str, action: &str) -> String {
        format!(
            "{}/v1/projects/{}/subscriptions/{subscription}:{action}",
            self.base_url, self.project
        )
    }

    async fn post<B: Serialize>(&self, url: &str, body: &B) -> Result<reqwest::Response, String> {
        let mut request = self.http.post(url).json(body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {status}: {body}"));
        }
        Ok(response)
    }

    async fn pull(
        &self,
        subscription: &str,
        max_messages: usize,
    ) -> Result<Vec<ReceivedMessage>, String> {
        let url = self.subscription_url(subscription, "pull");
        let response = self.post(&url, &PullRequest { max_messages }).await?;
        let body: PullResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(body.received_messages)
    }
}

// ---------------------------------------------------------------------------
// Messenger
// ---------------------------------------------------------------------------

pub struct PubSubMessenger {
    client: PubSubClient,
    max_in_flight: usize,
}

impl PubSubMessenger {
    pub const NAME: &'static str = "pubsub";

    pub fn new(config: &PubSubConfig, max_in_flight: usize) -> Result<Self, MessengerError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| MessengerError::Connect {
                transport: Self::NAME,
                message: e.to_string(),
            })?;

        let (base_url, access_token) = match &config.emulator_host {
            Some(host) => (format!("http://{host}"), None),
            None => (
                config.endpoint.trim_end_matches('/').to_string(),
                config.access_token.clone(),
            ),
        };
        tracing::info!(project = %config.project_id, base_url = %base_url, "Pub/Sub messenger ready");

        Ok(Self {
            client: PubSubClient {
                http,
                base_url,
                project: config.project_id.clone(),
                access_token,
            },
            max_in_flight,
        })
    }
}

struct PubSubDelivery {
    client: PubSubClient,
    subscription: String,
    ack_id: String,
    message_id: String,
    payload: Vec<u8>,
}

#[async_trait]
impl Delivery for PubSubDelivery {
    fn id(&self) -> &str {
        &self.message_id
    }

    fn payload(&self) -> &[u8] {
        &self.payload
    }

    async fn ack(&self) -> Result<(), MessengerError> {
        let url = self.client.subscription_url(&self.subscription, "acknowledge");
        self.client
            .post(&url, &AcknowledgeRequest {
                ack_ids: [&self.ack_id],
            })
            .await
            .map(drop)
            .map_err(|e| MessengerError::settle(&self.message_id, e))
    }

    async fn nack(&self) -> Result<(), MessengerError> {
        let url = self
            .client
            .subscription_url(&self.subscription, "modifyAckDeadline");
        self.client
            .post(
                &url,
                &ModifyAckDeadlineRequest {
                    ack_ids: [&self.ack_id],
                    ack_deadline_seconds: 0,
                },
            )
            .await
            .map(drop)
            .map_err(|e| MessengerError::settle(&self.message_id, e))
    }
}

/// Turn one REST message into a delivery. Undecodable base64 yields an
/// empty payload, which the delivery loop drops as an invalid envelope.
fn into_delivery(client: &PubSubClient, subscription: &str, received: ReceivedMessage) -> PubSubDelivery {
    let payload = BASE64.decode(received.message.data.as_bytes()).unwrap_or_default();
    PubSubDelivery {
        client: client.clone(),
        subscription: subscription.to_string(),
        ack_id: received.ack_id,
        message_id: received.message.message_id,
        payload,
    }
}

#[async_trait]
impl Messenger for PubSubMessenger {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn publish(&self, envelope: &Envelope, topic: &str) -> Result<String, MessengerError> {
        let request = PublishRequest {
            messages: vec![OutgoingMessage {
                data: BASE64.encode(envelope.to_bytes()?),
            }],
        };
        let url = self.client.topic_url(topic, "publish");
        let response = self
            .client
            .post(&url, &request)
            .await
            .map_err(|e| MessengerError::publish(topic, e))?;
        let body: PublishResponse = response
            .json()
            .await
            .map_err(|e| MessengerError::publish(topic, e))?;

        let id = body
            .message_ids
            .into_iter()
            .next()
            .ok_or_else(|| MessengerError::publish(topic, "response carried no message id"))?;
        tracing::debug!(topic, message_id = %id, msg_type = envelope.msg_type.as_str(), "Published");
        Ok(id)
    }

    async fn subscribe(
        &self,
        subscription: &str,
        handler: Arc<dyn MessageHandler>,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<(), MessengerError> {
        let client = self.client.clone();
        let name = subscription.to_string();
        let batch_size = self.max_in_flight.max(1);

        let incoming = stream::unfold((client, name), move |(client, name)| async move {
            let result = client.pull(&name, batch_size).await;
            if let Some(pause) = pause_after_pull(&result) {
                tokio::time::sleep(pause).await;
            }
            let batch: Vec<Result<PubSubDelivery, MessengerError>> = match result {
                Ok(received) => received
                    .into_iter()
                    .map(|message| Ok(into_delivery(&client, &name, message)))
                    .collect(),
                Err(e) => vec![Err(MessengerError::subscribe(&name, e))],
            };
            Some((stream::iter(batch), (client, name)))
        })
        .flatten()
        .boxed();

        delivery::consume(
            subscription,
            incoming,
            handler,
            timeout,
            self.max_in_flight,
            cancel,
        )
        .await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> PubSubClient {
        PubSubClient {
            http: reqwest::Client::new(),
            base_url: "http://localhost:8085".to_string(),
            project: "demo".to_string(),
            access_token: None,
        }
    }

    #[test]
    fn urls_follow_rest_layout() {
        let client = client();
        assert_eq!(
            client.topic_url("cluster-c1", "publish"),
            "http://localhost:8085/v1/projects/demo/topics/cluster-c1:publish"
        );
        assert_eq!(
            client.subscription_url("status", "modifyAckDeadline"),
            "http://localhost:8085/v1/projects/demo/subscriptions/status:modifyAckDeadline"
        );
    }

    #[test]
    fn pull_response_decodes_base64_payload() {
        let raw = serde_json::json!({
            "receivedMessages": [{
                "ackId": "ack-1",
                "message": { "data": BASE64.encode(b"{\"k\":1}"), "messageId": "42" }
            }]
        });
        let response: PullResponse = serde_json::from_value(raw).unwrap();
        let received = response.received_messages.into_iter().next().unwrap();
        let delivery = into_delivery(&client(), "status", received);

        assert_eq!(delivery.id(), "42");
        assert_eq!(delivery.ack_id, "ack-1");
        assert_eq!(delivery.payload(), b"{\"k\":1}");
    }

    #[test]
    fn empty_pull_response_has_no_messages() {
        let response: PullResponse = serde_json::from_str("{}").unwrap();
        assert!(response.received_messages.is_empty());
    }

    #[test]
    fn empty_and_failed_pulls_pause_before_the_next_pull() {
        assert_eq!(pause_after_pull(&Ok(Vec::new())), Some(EMPTY_PULL_DELAY));
        assert_eq!(pause_after_pull(&Err("HTTP 503".to_string())), Some(PULL_RETRY_DELAY));

        let raw = serde_json::json!({
            "receivedMessages": [{ "ackId": "a", "message": { "messageId": "1" } }]
        });
        let response: PullResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(pause_after_pull(&Ok(response.received_messages)), None);
    }

    #[test]
    fn settle_requests_use_camel_case() {
        let body = serde_json::to_value(ModifyAckDeadlineRequest {
            ack_ids: ["a"],
            ack_deadline_seconds: 0,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "ackIds": ["a"], "ackDeadlineSeconds": 0 }));
    }
}
