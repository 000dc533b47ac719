//! The subscription loop shared by every binding.
//!
//! A binding turns its transport into a stream of [`Delivery`] values; this
//! module decodes each one, runs the handler on a bounded set of tasks and
//! settles the message according to the handler's result.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use orchestra_core::message::Envelope;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::MessengerError;
use crate::MessageHandler;

/// Default number of handlers allowed to run at once per subscription.
pub(crate) const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// One received message, not yet settled.
#[async_trait]
pub(crate) trait Delivery: Send + Sync + 'static {
    /// Transport message id, for logs.
    fn id(&self) -> &str;

    fn payload(&self) -> &[u8];

    async fn ack(&self) -> Result<(), MessengerError>;

    /// Hand the message back for redelivery.
    async fn nack(&self) -> Result<(), MessengerError>;
}

pub(crate) type Incoming<D> = BoxStream<'static, Result<D, MessengerError>>;

/// Drive `incoming` until it ends, `timeout` elapses or `cancel` fires,
/// then wait for running handlers.
pub(crate) async fn consume<D: Delivery>(
    subscription: &str,
    mut incoming: Incoming<D>,
    handler: Arc<dyn MessageHandler>,
    timeout: Option<Duration>,
    max_in_flight: usize,
    cancel: &CancellationToken,
) {
    let max_in_flight = max_in_flight.max(1);
    let deadline = async {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut in_flight = JoinSet::new();
    tracing::info!(subscription, max_in_flight, "Subscription started");

    loop {
        while in_flight.len() >= max_in_flight {
            reap(in_flight.join_next().await);
        }
        while let Some(finished) = in_flight.try_join_next() {
            reap(Some(finished));
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(subscription, "Subscription cancelled");
                break;
            }
            _ = &mut deadline => {
                tracing::debug!(subscription, "Subscription timeout elapsed");
                break;
            }
            next = incoming.next() => match next {
                Some(Ok(delivery)) => {
                    in_flight.spawn(deliver(delivery, Arc::clone(&handler)));
                }
                Some(Err(e)) => {
                    tracing::warn!(subscription, error = %e, "Failed to receive message");
                }
                None => {
                    tracing::info!(subscription, "Subscription stream ended");
                    break;
                }
            },
        }
    }

    while let Some(finished) = in_flight.join_next().await {
        reap(Some(finished));
    }
    tracing::info!(subscription, "Subscription stopped");
}

fn reap(finished: Option<Result<(), tokio::task::JoinError>>) {
    if let Some(Err(e)) = finished {
        tracing::error!(error = %e, "Message handler task panicked");
    }
}

/// Decode, handle and settle one message.
async fn deliver<D: Delivery>(delivery: D, handler: Arc<dyn MessageHandler>) {
    let envelope = match Envelope::from_slice(delivery.payload()) {
        Ok(envelope) => envelope,
        Err(e) => {
            // Redelivering bytes that never decode would loop forever.
            tracing::warn!(
                message_id = delivery.id(),
                error = %e,
                "Dropping message that is not a valid envelope",
            );
            settle(&delivery, true).await;
            return;
        }
    };

    let msg_type = envelope.msg_type.as_str();
    match handler.handle(envelope).await {
        Ok(()) => {
            tracing::debug!(message_id = delivery.id(), msg_type, "Message handled");
            settle(&delivery, true).await;
        }
        Err(e) => {
            tracing::warn!(
                message_id = delivery.id(),
                msg_type,
                error = %e,
                "Message handler failed, requesting redelivery",
            );
            settle(&delivery, false).await;
        }
    }
}

async fn settle<D: Delivery>(delivery: &D, ack: bool) {
    let result = if ack {
        delivery.ack().await
    } else {
        delivery.nack().await
    };
    if let Err(e) = result {
        tracing::error!(message_id = delivery.id(), error = %e, "Failed to settle message");
    }
}
