#[derive(Debug, thiserror::Error)]
pub enum MessengerError {
    #[error("Unable to connect to {transport}: {message}")]
    Connect {
        transport: &'static str,
        message: String,
    },

    #[error("Unable to publish to {topic}: {message}")]
    Publish { topic: String, message: String },

    #[error("Subscription {subscription} failed: {message}")]
    Subscribe {
        subscription: String,
        message: String,
    },

    #[error("Unable to settle message {message_id}: {message}")]
    Settle { message_id: String, message: String },

    #[error("Unable to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Messenger configuration invalid: {0}")]
    Config(String),
}

impl MessengerError {
    pub(crate) fn publish(topic: &str, err: impl std::fmt::Display) -> Self {
        Self::Publish {
            topic: topic.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn subscribe(subscription: &str, err: impl std::fmt::Display) -> Self {
        Self::Subscribe {
            subscription: subscription.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn settle(message_id: &str, err: impl std::fmt::Display) -> Self {
        Self::Settle {
            message_id: message_id.to_string(),
            message: err.to_string(),
        }
    }
}

/// A handler's refusal to accept a message; the transport redelivers it.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl std::fmt::Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}
