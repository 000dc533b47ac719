//! Transport-agnostic publish/subscribe for [`Envelope`]s.
//!
//! Delivery is at-least-once: a message is acknowledged only after its
//! handler returns `Ok`, and a handler error hands the message back to the
//! transport for redelivery. Handlers must therefore be idempotent.
//!
//! Bindings:
//! - [`NatsMessenger`]: NATS JetStream, durable pull consumers.
//! - [`PubSubMessenger`]: Google Cloud Pub/Sub over its REST API.
//! - [`MemoryMessenger`]: in-process queues for tests and local runs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orchestra_core::message::Envelope;
use orchestra_core::registry::Registry;
use tokio_util::sync::CancellationToken;

pub mod config;
mod delivery;
pub mod error;
pub mod memory;
pub mod nats;
pub mod pubsub;

pub use config::{build_registry, MessengerConfig, NatsConfig, PubSubConfig};
pub use error::{HandlerError, MessengerError};
pub use memory::MemoryMessenger;
pub use nats::NatsMessenger;
pub use pubsub::PubSubMessenger;

/// Consumer side of a subscription.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process one envelope. Returning `Err` causes redelivery.
    async fn handle(&self, envelope: Envelope) -> Result<(), HandlerError>;
}

#[async_trait]
pub trait Messenger: Send + Sync {
    /// Registry name of the binding.
    fn name(&self) -> &str;

    /// Publish `envelope` on `topic` and return the transport's message id.
    async fn publish(&self, envelope: &Envelope, topic: &str) -> Result<String, MessengerError>;

    /// Deliver messages from `subscription` to `handler` until `timeout`
    /// elapses or `cancel` fires.
    ///
    /// Up to the binding's `max_in_flight` handlers run concurrently, so no
    /// ordering holds across messages. Handlers already running are awaited
    /// before this returns.
    async fn subscribe(
        &self,
        subscription: &str,
        handler: Arc<dyn MessageHandler>,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<(), MessengerError>;
}

pub type MessengerRegistry = Registry<dyn Messenger>;
