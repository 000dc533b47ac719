//! In-process binding.
//!
//! Each topic is a FIFO queue and a subscription consumes the topic of the
//! same name. Nacked messages go to the back of the queue. Every published
//! envelope is also kept in a log so tests can inspect what was sent.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use orchestra_core::message::Envelope;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::delivery::{self, Delivery, DEFAULT_MAX_IN_FLIGHT};
use crate::error::MessengerError;
use crate::{MessageHandler, Messenger};

#[derive(Debug, Clone)]
struct Queued {
    id: String,
    payload: Vec<u8>,
}

#[derive(Debug, Default)]
struct Topic {
    queue: Mutex<VecDeque<Queued>>,
    published: Mutex<Vec<Envelope>>,
    acked: AtomicUsize,
    nacked: AtomicUsize,
    notify: Notify,
}

impl Topic {
    fn push(&self, item: Queued) {
        lock(&self.queue).push_back(item);
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<Queued> {
        lock(&self.queue).pop_front()
    }
}

/// Poisoning only means another thread panicked mid-push; the data is intact.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
pub struct MemoryMessenger {
    topics: Mutex<HashMap<String, Arc<Topic>>>,
    sequence: AtomicU64,
    fail_publishes: AtomicBool,
    max_in_flight: usize,
}

impl MemoryMessenger {
    pub const NAME: &'static str = "memory";

    pub fn new() -> Self {
        Self::with_max_in_flight(DEFAULT_MAX_IN_FLIGHT)
    }

    pub fn with_max_in_flight(max_in_flight: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            fail_publishes: AtomicBool::new(false),
            max_in_flight,
        }
    }

    /// Make every subsequent publish fail.
    pub fn set_fail_publishes(&self, fail: bool) {
        self.fail_publishes.store(fail, Ordering::SeqCst);
    }

    /// Every envelope ever published on `topic`, in order.
    pub fn published(&self, topic: &str) -> Vec<Envelope> {
        lock(&self.topic(topic).published).clone()
    }

    /// Messages currently waiting on `topic`.
    pub fn pending(&self, topic: &str) -> usize {
        lock(&self.topic(topic).queue).len()
    }

    pub fn acked(&self, topic: &str) -> usize {
        self.topic(topic).acked.load(Ordering::SeqCst)
    }

    pub fn nacked(&self, topic: &str) -> usize {
        self.topic(topic).nacked.load(Ordering::SeqCst)
    }

    /// Topics that have seen at least one publish or subscribe, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.topics).keys().cloned().collect();
        names.sort_unstable();
        names
    }

    fn topic(&self, name: &str) -> Arc<Topic> {
        let mut topics = lock(&self.topics);
        Arc::clone(topics.entry(name.to_string()).or_default())
    }
}

impl Default for MemoryMessenger {
    fn default() -> Self {
        Self::new()
    }
}

struct MemoryDelivery {
    topic: Arc<Topic>,
    item: Queued,
}

#[async_trait]
impl Delivery for MemoryDelivery {
    fn id(&self) -> &str {
        &self.item.id
    }

    fn payload(&self) -> &[u8] {
        &self.item.payload
    }

    async fn ack(&self) -> Result<(), MessengerError> {
        self.topic.acked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn nack(&self) -> Result<(), MessengerError> {
        self.topic.nacked.fetch_add(1, Ordering::SeqCst);
        self.topic.push(self.item.clone());
        Ok(())
    }
}

#[async_trait]
impl Messenger for MemoryMessenger {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn publish(&self, envelope: &Envelope, topic: &str) -> Result<String, MessengerError> {
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(MessengerError::publish(topic, "publishing is disabled"));
        }
        let payload = envelope.to_bytes()?;
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("{topic}:{sequence}");

        let queue = self.topic(topic);
        lock(&queue.published).push(envelope.clone());
        queue.push(Queued {
            id: id.clone(),
            payload,
        });

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
        let topic = self.topic(subscription);
        let incoming = futures::stream::unfold(topic, |topic| async move {
            loop {
                if let Some(item) = topic.pop() {
                    let delivery = MemoryDelivery {
                        topic: Arc::clone(&topic),
                        item,
                    };
                    return Some((Ok::<_, MessengerError>(delivery), topic));
                }
                topic.notify.notified().await;
            }
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

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use orchestra_core::message::{DispatchPayload, MessageType};
    use orchestra_core::types::Id;

    use super::*;
    use crate::error::HandlerError;

    /// Fails the first `failures` calls, then records envelopes.
    struct Flaky {
        failures: AtomicUsize,
        calls: AtomicUsize,
        seen: Mutex<Vec<Envelope>>,
    }

    impl Flaky {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                failures: AtomicUsize::new(failures),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MessageHandler for Flaky {
        async fn handle(&self, envelope: Envelope) -> Result<(), HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(HandlerError::new("not yet"));
            }
            self.seen.lock().unwrap().push(envelope);
            Ok(())
        }
    }

    fn dispatch_envelope() -> Envelope {
        Envelope::dispatch(&DispatchPayload {
            job_id: Id::new_v4(),
            schedule_id: Id::new_v4(),
            script: "true".to_string(),
            cluster_capability_requirements: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn published_envelopes_are_delivered_and_acked() {
        let messenger = MemoryMessenger::new();
        let envelope = dispatch_envelope();
        let id = messenger.publish(&envelope, "c1").await.unwrap();
        assert_eq!(id, "c1:1");

        let handler = Flaky::new(0);
        messenger
            .subscribe(
                "c1",
                handler.clone(),
                Some(Duration::from_millis(100)),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let seen = handler.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].msg_type, MessageType::DispatchSchedule);
        assert_eq!(seen[0].data, envelope.data);
        assert_eq!(messenger.acked("c1"), 1);
        assert_eq!(messenger.pending("c1"), 0);
    }

    #[tokio::test]
    async fn handler_failure_causes_redelivery() {
        let messenger = MemoryMessenger::new();
        messenger.publish(&dispatch_envelope(), "c1").await.unwrap();

        let handler = Flaky::new(2);
        messenger
            .subscribe(
                "c1",
                handler.clone(),
                Some(Duration::from_millis(200)),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        assert_eq!(handler.seen.lock().unwrap().len(), 1);
        assert_eq!(messenger.nacked("c1"), 2);
        assert_eq!(messenger.acked("c1"), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_an_open_subscription() {
        let messenger = Arc::new(MemoryMessenger::new());
        let cancel = CancellationToken::new();
        let handler = Flaky::new(0);

        let task = {
            let messenger = Arc::clone(&messenger);
            let cancel = cancel.clone();
            let handler = handler.clone();
            tokio::spawn(async move { messenger.subscribe("c1", handler, None, &cancel).await })
        };

        messenger.publish(&dispatch_envelope(), "c1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        task.await.unwrap().unwrap();
        assert_eq!(handler.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn undecodable_payload_is_dropped() {
        let messenger = MemoryMessenger::new();
        messenger.topic("c1").push(Queued {
            id: "c1:garbage".to_string(),
            payload: b"not json".to_vec(),
        });

        let handler = Flaky::new(0);
        messenger
            .subscribe(
                "c1",
                handler.clone(),
                Some(Duration::from_millis(50)),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(messenger.pending("c1"), 0);
    }

    #[tokio::test]
    async fn failing_publish_reports_topic() {
        let messenger = MemoryMessenger::new();
        messenger.set_fail_publishes(true);
        let err = messenger.publish(&dispatch_envelope(), "c1").await.unwrap_err();
        assert_matches!(err, MessengerError::Publish { topic, .. } if topic == "c1");
        assert!(messenger.published("c1").is_empty());
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let messenger = MemoryMessenger::new();
        messenger.publish(&dispatch_envelope(), "c1").await.unwrap();
        messenger.publish(&dispatch_envelope(), "c2").await.unwrap();
        messenger.publish(&dispatch_envelope(), "c2").await.unwrap();

        assert_eq!(messenger.published("c1").len(), 1);
        assert_eq!(messenger.published("c2").len(), 2);
        assert_eq!(messenger.topics(), vec!["c1", "c2"]);
    }
}
