//! Consumer dispatcher
//!
//! Routes deliveries to the handler registered for their topic. Each message
//! gets a bounded processing timeout and a bounded number of attempts;
//! messages that stay unprocessable move to a dead-letter sink instead of
//! wedging the partition. Handlers must be idempotent: the bus redelivers
//! after a crash before acknowledgment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use ss_common::{StaffSyncError, UserLifecycleEvent};

use crate::codec;
use crate::memory::Delivery;

/// Applies one consumed event to the local store.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: UserLifecycleEvent) -> Result<(), StaffSyncError>;
}

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Attempts before a message is dead-lettered.
    pub max_attempts: u32,
    /// Processing timeout per attempt.
    pub attempt_timeout: Duration,
    /// Delay between attempts.
    pub retry_delay: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(30),
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// A message that exhausted its attempts, kept for operator inspection.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn sink(&self, letter: DeadLetter);
}

/// Logs dead letters and drops them.
pub struct LogDeadLetterSink;

#[async_trait]
impl DeadLetterSink for LogDeadLetterSink {
    async fn sink(&self, letter: DeadLetter) {
        error!(
            topic = %letter.topic,
            key = %letter.key,
            reason = %letter.reason,
            "Message dead-lettered"
        );
    }
}

/// Retains dead letters in memory, for tests and the dev monolith.
#[derive(Default)]
pub struct MemoryDeadLetterSink {
    letters: parking_lot::Mutex<Vec<DeadLetter>>,
}

impl MemoryDeadLetterSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<DeadLetter> {
        std::mem::take(&mut self.letters.lock())
    }

    pub fn len(&self) -> usize {
        self.letters.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.letters.lock().is_empty()
    }
}

#[async_trait]
impl DeadLetterSink for MemoryDeadLetterSink {
    async fn sink(&self, letter: DeadLetter) {
        warn!(topic = %letter.topic, key = %letter.key, reason = %letter.reason, "Message dead-lettered");
        self.letters.lock().push(letter);
    }
}

/// Topic-to-handler routing table with the retry/dead-letter policy applied
/// around every dispatch.
pub struct EventDispatcher {
    routes: HashMap<String, Arc<dyn EventHandler>>,
    config: ConsumerConfig,
    dead_letters: Arc<dyn DeadLetterSink>,
}

impl EventDispatcher {
    pub fn new(config: ConsumerConfig, dead_letters: Arc<dyn DeadLetterSink>) -> Self {
        Self {
            routes: HashMap::new(),
            config,
            dead_letters,
        }
    }

    pub fn route(mut self, topic: impl Into<String>, handler: Arc<dyn EventHandler>) -> Self {
        self.routes.insert(topic.into(), handler);
        self
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Process one delivery to completion: decode, invoke the handler with a
    /// timeout, retry transient failures, dead-letter the rest. Never returns
    /// an error; the caller's loop must not stall on a poison message.
    pub async fn dispatch(&self, topic: &str, key: &str, payload: &[u8]) {
        let Some(handler) = self.routes.get(topic) else {
            self.dead_letter(topic, key, payload, "no handler registered for topic").await;
            return;
        };

        let event = match codec::decode(payload) {
            Ok(event) => event,
            Err(e) => {
                // Malformed payloads can never succeed; skip the retries.
                self.dead_letter(topic, key, payload, &e.to_string()).await;
                return;
            }
        };

        let mut last_error = String::new();
        for attempt in 1..=self.config.max_attempts {
            match timeout(self.config.attempt_timeout, handler.handle(event.clone())).await {
                Ok(Ok(())) => {
                    debug!(topic, key, attempt, "Event applied");
                    return;
                }
                Ok(Err(e)) if !e.is_retryable() => {
                    self.dead_letter(topic, key, payload, &e.to_string()).await;
                    return;
                }
                Ok(Err(e)) => {
                    warn!(topic, key, attempt, error = %e, "Event handler failed, will retry");
                    last_error = e.to_string();
                }
                Err(_) => {
                    warn!(topic, key, attempt, "Event handler timed out, will retry");
                    last_error = format!(
                        "timed out after {:?}",
                        self.config.attempt_timeout
                    );
                }
            }

            if attempt < self.config.max_attempts {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        self.dead_letter(topic, key, payload, &last_error).await;
    }

    async fn dead_letter(&self, topic: &str, key: &str, payload: &[u8], reason: &str) {
        self.dead_letters
            .sink(DeadLetter {
                topic: topic.to_string(),
                key: key.to_string(),
                payload: payload.to_vec(),
                reason: reason.to_string(),
                failed_at: Utc::now(),
            })
            .await;
    }
}

/// Drain a subscription channel into the dispatcher, one message at a time.
/// Per-key ordering is preserved because messages are awaited sequentially.
pub async fn run_consumer(mut rx: mpsc::UnboundedReceiver<Delivery>, dispatcher: Arc<EventDispatcher>) {
    while let Some(delivery) = rx.recv().await {
        dispatcher
            .dispatch(&delivery.topic, &delivery.key, &delivery.payload)
            .await;
    }
    debug!("Consumer channel closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use ss_common::{EventKind, Role};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyHandler {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl EventHandler for FlakyHandler {
        async fn handle(&self, _event: UserLifecycleEvent) -> Result<(), StaffSyncError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Err(StaffSyncError::bus("transient"))
            } else {
                Ok(())
            }
        }
    }

    struct TerminalHandler;

    #[async_trait]
    impl EventHandler for TerminalHandler {
        async fn handle(&self, _event: UserLifecycleEvent) -> Result<(), StaffSyncError> {
            Err(StaffSyncError::validation("never valid"))
        }
    }

    fn event_bytes() -> Vec<u8> {
        let event = UserLifecycleEvent {
            id: 1,
            email: Some("a@x.com".to_string()),
            password: None,
            role: Some(Role::Employee),
            kind: EventKind::Create,
        };
        crate::codec::encode(&event).unwrap()
    }

    fn fast_config(max_attempts: u32) -> ConsumerConfig {
        ConsumerConfig {
            max_attempts,
            attempt_timeout: Duration::from_secs(1),
            retry_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let handler = Arc::new(FlakyHandler {
            calls: AtomicU32::new(0),
            fail_first: 2,
        });
        let sink = Arc::new(MemoryDeadLetterSink::new());
        let dispatcher = EventDispatcher::new(fast_config(3), sink.clone())
            .route("t", handler.clone());

        dispatcher.dispatch("t", "1", &event_bytes()).await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn exhausted_retries_dead_letter() {
        let handler = Arc::new(FlakyHandler {
            calls: AtomicU32::new(0),
            fail_first: 10,
        });
        let sink = Arc::new(MemoryDeadLetterSink::new());
        let dispatcher = EventDispatcher::new(fast_config(2), sink.clone()).route("t", handler);

        dispatcher.dispatch("t", "1", &event_bytes()).await;

        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn terminal_errors_skip_retries() {
        let sink = Arc::new(MemoryDeadLetterSink::new());
        let dispatcher =
            EventDispatcher::new(fast_config(5), sink.clone()).route("t", Arc::new(TerminalHandler));

        dispatcher.dispatch("t", "1", &event_bytes()).await;

        let letters = sink.drain();
        assert_eq!(letters.len(), 1);
        assert!(letters[0].reason.contains("never valid"));
    }

    #[tokio::test]
    async fn malformed_payloads_dead_letter_without_handler_calls() {
        let handler = Arc::new(FlakyHandler {
            calls: AtomicU32::new(0),
            fail_first: 0,
        });
        let sink = Arc::new(MemoryDeadLetterSink::new());
        let dispatcher = EventDispatcher::new(fast_config(3), sink.clone())
            .route("t", handler.clone());

        dispatcher.dispatch("t", "1", b"{\"email\":\"no-id\"}").await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn unrouted_topic_dead_letters() {
        let sink = Arc::new(MemoryDeadLetterSink::new());
        let dispatcher = EventDispatcher::new(fast_config(3), sink.clone());

        dispatcher.dispatch("nowhere", "1", &event_bytes()).await;

        assert_eq!(sink.len(), 1);
    }
}
