//! In-process delayed queue backed by tokio timers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::transport::{Acker, DelayedTransport, Delivery, Subscription, TransportError};

const CHANNEL_CAPACITY: usize = 64;

/// Redelivery policy for the in-memory queue.
#[derive(Debug, Clone, Copy)]
pub struct QueuePolicy {
    /// Maximum number of times one message is delivered. A message
    /// negatively acknowledged on its final attempt moves to the
    /// dead-letter store instead of being redelivered forever.
    pub max_attempts: u32,

    /// Delay applied before each redelivery.
    pub redelivery_delay: Duration,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            redelivery_delay: Duration::from_secs(1),
        }
    }
}

/// A message that exhausted its delivery attempts.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub topic: String,
    pub payload: Vec<u8>,
    pub attempts: u32,
}

struct Topic {
    sender: mpsc::Sender<Delivery>,
    receiver: Option<mpsc::Receiver<Delivery>>,
}

struct QueueInner {
    topics: Mutex<HashMap<String, Topic>>,
    dead_letters: Mutex<Vec<DeadLetter>>,
    policy: QueuePolicy,
}

/// In-process delayed message queue.
///
/// Each publish spawns a timer task that enqueues the delivery once the
/// delay elapses. One subscriber per topic; deliveries carry an attempt
/// counter, and requeues past `max_attempts` land in the dead-letter
/// store.
#[derive(Clone)]
pub struct InMemoryDelayedQueue {
    inner: Arc<QueueInner>,
}

impl Default for InMemoryDelayedQueue {
    fn default() -> Self {
        Self::new(QueuePolicy::default())
    }
}

impl InMemoryDelayedQueue {
    /// Creates a queue with the given redelivery policy.
    pub fn new(policy: QueuePolicy) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                topics: Mutex::new(HashMap::new()),
                dead_letters: Mutex::new(Vec::new()),
                policy,
            }),
        }
    }

    /// Messages that exhausted their delivery attempts.
    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.inner.dead_letters.lock().await.clone()
    }

    /// Number of dead-lettered messages.
    pub async fn dead_letter_count(&self) -> usize {
        self.inner.dead_letters.lock().await.len()
    }

    fn schedule_delivery(
        inner: Arc<QueueInner>,
        topic: String,
        payload: Vec<u8>,
        attempt: u32,
        delay: Duration,
    ) {
        tokio::spawn(async move {
            if delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }

            let sender = {
                let mut topics = inner.topics.lock().await;
                topic_entry(&mut topics, &topic).sender.clone()
            };

            let acker = MemoryAcker {
                inner: inner.clone(),
                topic,
                payload: payload.clone(),
                attempt,
            };
            let delivery = Delivery::new(payload, attempt, Box::new(acker));
            // Send fails only when the subscriber dropped; the message is
            // then unroutable and discarded with the queue.
            let _ = sender.send(delivery).await;
        });
    }
}

fn topic_entry<'a>(topics: &'a mut HashMap<String, Topic>, name: &str) -> &'a mut Topic {
    topics.entry(name.to_string()).or_insert_with(|| {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        Topic {
            sender,
            receiver: Some(receiver),
        }
    })
}

#[async_trait]
impl DelayedTransport for InMemoryDelayedQueue {
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        delay: Duration,
    ) -> Result<(), TransportError> {
        {
            // Materialise the topic up front so publish-before-subscribe
            // buffers rather than drops.
            let mut topics = self.inner.topics.lock().await;
            topic_entry(&mut topics, topic);
        }
        Self::schedule_delivery(
            self.inner.clone(),
            topic.to_string(),
            payload,
            1,
            delay,
        );
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, TransportError> {
        let mut topics = self.inner.topics.lock().await;
        let entry = topic_entry(&mut topics, topic);
        let receiver = entry
            .receiver
            .take()
            .ok_or_else(|| TransportError::AlreadySubscribed(topic.to_string()))?;
        Ok(Subscription::new(receiver))
    }
}

struct MemoryAcker {
    inner: Arc<QueueInner>,
    topic: String,
    payload: Vec<u8>,
    attempt: u32,
}

#[async_trait]
impl Acker for MemoryAcker {
    async fn ack(self: Box<Self>) {}

    async fn nack_requeue(self: Box<Self>) {
        if self.attempt >= self.inner.policy.max_attempts {
            tracing::warn!(
                topic = %self.topic,
                attempts = self.attempt,
                "message exhausted delivery attempts, dead-lettering"
            );
            self.inner.dead_letters.lock().await.push(DeadLetter {
                topic: self.topic,
                payload: self.payload,
                attempts: self.attempt,
            });
            return;
        }

        let delay = self.inner.policy.redelivery_delay;
        InMemoryDelayedQueue::schedule_delivery(
            self.inner.clone(),
            self.topic,
            self.payload,
            self.attempt + 1,
            delay,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_with(max_attempts: u32) -> InMemoryDelayedQueue {
        InMemoryDelayedQueue::new(QueuePolicy {
            max_attempts,
            redelivery_delay: Duration::from_millis(10),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn delivery_waits_for_the_delay() {
        let queue = InMemoryDelayedQueue::default();
        let mut sub = queue.subscribe("t").await.unwrap();

        queue
            .publish("t", b"hello".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        // Nothing is deliverable before the delay elapses.
        tokio::time::timeout(Duration::from_secs(30), sub.next())
            .await
            .expect_err("delivered too early");

        let delivery = tokio::time::timeout(Duration::from_secs(60), sub.next())
            .await
            .expect("delivery after delay")
            .unwrap();
        assert_eq!(delivery.payload(), b"hello");
        assert_eq!(delivery.attempt(), 1);
        delivery.ack().await;
    }

    #[tokio::test(start_paused = true)]
    async fn publish_before_subscribe_is_buffered() {
        let queue = InMemoryDelayedQueue::default();
        queue
            .publish("t", b"early".to_vec(), Duration::ZERO)
            .await
            .unwrap();

        let mut sub = queue.subscribe("t").await.unwrap();
        let delivery = sub.next().await.unwrap();
        assert_eq!(delivery.payload(), b"early");
        delivery.ack().await;
    }

    #[tokio::test]
    async fn second_subscriber_is_rejected() {
        let queue = InMemoryDelayedQueue::default();
        let _sub = queue.subscribe("t").await.unwrap();
        let err = queue.subscribe("t").await.unwrap_err();
        assert!(matches!(err, TransportError::AlreadySubscribed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn nack_redelivers_with_bumped_attempt() {
        let queue = queue_with(3);
        let mut sub = queue.subscribe("t").await.unwrap();
        queue
            .publish("t", b"retry-me".to_vec(), Duration::ZERO)
            .await
            .unwrap();

        let first = sub.next().await.unwrap();
        assert_eq!(first.attempt(), 1);
        first.nack_requeue().await;

        let second = sub.next().await.unwrap();
        assert_eq!(second.attempt(), 2);
        assert_eq!(second.payload(), b"retry-me");
        second.ack().await;
        assert_eq!(queue.dead_letter_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_message_moves_to_dead_letters() {
        let queue = queue_with(2);
        let mut sub = queue.subscribe("t").await.unwrap();
        queue
            .publish("t", b"poison".to_vec(), Duration::ZERO)
            .await
            .unwrap();

        let first = sub.next().await.unwrap();
        first.nack_requeue().await;
        let second = sub.next().await.unwrap();
        assert_eq!(second.attempt(), 2);
        second.nack_requeue().await;

        // No third delivery; the message is dead-lettered instead.
        tokio::time::timeout(Duration::from_secs(5), sub.next())
            .await
            .expect_err("redelivered past max attempts");

        let dead = queue.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].payload, b"poison");
        assert_eq!(dead[0].attempts, 2);
    }
}
