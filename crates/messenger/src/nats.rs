//! NATS JetStream binding.
//!
//! All topics live in one stream whose subjects are configured up front
//! (`orchestra.>` by default). A subscription is a durable pull consumer
//! filtered on the subscription subject, so a restarted worker resumes
//! where it left off and unacknowledged messages are redelivered after
//! `ack_wait`.

use std::sync::Arc;
use std::time::Duration;

use async_nats::jetstream::consumer::pull::Config as PullConsumerConfig;
use async_nats::jetstream::consumer::{AckPolicy, PullConsumer};
use async_nats::jetstream::stream::Config as StreamConfig;
use async_nats::jetstream::{self, AckKind};
use async_trait::async_trait;
use futures::StreamExt;
use orchestra_core::message::Envelope;
use tokio_util::sync::CancellationToken;

use crate::config::NatsConfig;
use crate::delivery::{self, Delivery};
use crate::error::MessengerError;
use crate::{MessageHandler, Messenger};

pub struct NatsMessenger {
    jetstream: jetstream::Context,
    stream_name: String,
    ack_wait: Duration,
    max_in_flight: usize,
}

impl NatsMessenger {
    pub const NAME: &'static str = "nats";

    /// Connect and make sure the stream exists.
    pub async fn connect(config: &NatsConfig, max_in_flight: usize) -> Result<Self, MessengerError> {
        let client = async_nats::connect(&config.url)
            .await
            .map_err(|e| MessengerError::Connect {
                transport: Self::NAME,
                message: e.to_string(),
            })?;
        let jetstream = jetstream::new(client);

        jetstream
            .get_or_create_stream(StreamConfig {
                name: config.stream.clone(),
                subjects: config.subjects.clone(),
                ..Default::default()
            })
            .await
            .map_err(|e| MessengerError::Connect {
                transport: Self::NAME,
                message: format!("stream {}: {e}", config.stream),
            })?;

        tracing::info!(
            url = %config.url,
            stream = %config.stream,
            subjects = ?config.subjects,
            "Connected to NATS JetStream",
        );

        Ok(Self {
            jetstream,
            stream_name: config.stream.clone(),
            ack_wait: config.ack_wait,
            max_in_flight,
        })
    }

    async fn consumer(&self, subscription: &str) -> Result<PullConsumer, MessengerError> {
        let stream = self
            .jetstream
            .get_stream(&self.stream_name)
            .await
            .map_err(|e| MessengerError::subscribe(subscription, e))?;

        let durable = durable_name(subscription);
        stream
            .get_or_create_consumer(
                &durable,
                PullConsumerConfig {
                    durable_name: Some(durable.clone()),
                    filter_subject: subscription.to_string(),
                    ack_policy: AckPolicy::Explicit,
                    ack_wait: self.ack_wait,
                    max_ack_pending: self.max_in_flight as i64,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| MessengerError::subscribe(subscription, e))
    }
}

/// Durable consumer names may not contain `.`, `*`, `>` or whitespace.
pub(crate) fn durable_name(subscription: &str) -> String {
    subscription
        .chars()
        .map(|c| match c {
            '.' | '*' | '>' => '-',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

struct NatsDelivery {
    id: String,
    message: jetstream::Message,
}

impl NatsDelivery {
    fn new(message: jetstream::Message) -> Self {
        let id = match message.info() {
            Ok(info) => format!("{}:{}", info.stream, info.stream_sequence),
            Err(_) => message.subject.to_string(),
        };
        Self { id, message }
    }
}

#[async_trait]
impl Delivery for NatsDelivery {
    fn id(&self) -> &str {
        &self.id
    }

    fn payload(&self) -> &[u8] {
        &self.message.payload
    }

    async fn ack(&self) -> Result<(), MessengerError> {
        self.message
            .ack()
            .await
            .map_err(|e| MessengerError::settle(&self.id, e))
    }

    async fn nack(&self) -> Result<(), MessengerError> {
        self.message
            .ack_with(AckKind::Nak(None))
            .await
            .map_err(|e| MessengerError::settle(&self.id, e))
    }
}

#[async_trait]
impl Messenger for NatsMessenger {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn publish(&self, envelope: &Envelope, topic: &str) -> Result<String, MessengerError> {
        let payload = envelope.to_bytes()?;
        let ack = self
            .jetstream
            .publish(topic.to_string(), payload.into())
            .await
            .map_err(|e| MessengerError::publish(topic, e))?
            .await
            .map_err(|e| MessengerError::publish(topic, e))?;

        let id = format!("{}:{}", ack.stream, ack.sequence);
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
        let consumer = self.consumer(subscription).await?;
        let owned_subscription = subscription.to_string();
        let incoming = consumer
            .messages()
            .await
            .map_err(|e| MessengerError::subscribe(subscription, e))?
            .map(move |result| {
                result
                    .map(NatsDelivery::new)
                    .map_err(|e| MessengerError::subscribe(&owned_subscription, e))
            })
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
