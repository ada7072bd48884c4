use std::sync::Arc;
use std::time::Duration;

use huddle_common::{DomainEvent, MessageSink, PublishMessageRequest};
use huddle_config::PublisherConfig;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How often a failing sink is retried before the message is dropped for it.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl From<&PublisherConfig> for RetryPolicy {
    fn from(config: &PublisherConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

/// Creates a connected publisher handle and worker.
///
/// The channel is bounded by `channel_capacity`; the worker runs at most
/// `concurrency` deliveries at once.
pub fn channel(
    config: &PublisherConfig,
    sinks: Vec<Arc<dyn MessageSink>>,
) -> (EventPublisher, PublisherWorker) {
    let (sender, receiver) = mpsc::channel(config.channel_capacity.max(1));
    let worker = PublisherWorker {
        receiver,
        sinks,
        concurrency: config.concurrency.max(1),
        retry: RetryPolicy::from(config),
    };
    (EventPublisher { sender }, worker)
}

/// Handle for submitting domain events.
///
/// `publish` never blocks and never fails the caller: a full or closed queue
/// is logged and the message is dropped.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: mpsc::Sender<PublishMessageRequest>,
}

impl EventPublisher {
    /// Wraps the event in an envelope and submits it to the worker.
    pub fn publish(&self, event: &DomainEvent) {
        match PublishMessageRequest::from_event(event) {
            Ok(message) => self.publish_message(message),
            Err(e) => warn!(
                "Dropping {} event, payload could not be serialized: {}",
                event.message_type(),
                e
            ),
        }
    }

    /// Submits a prepared envelope to the worker.
    pub fn publish_message(&self, message: PublishMessageRequest) {
        let message_id = message.message_id;
        match self.sender.try_send(message) {
            Ok(()) => debug!("Queued message {}", message_id),
            Err(TrySendError::Full(message)) => warn!(
                "Publisher queue full, dropping {} message {}",
                message.message_type, message.message_id
            ),
            Err(TrySendError::Closed(message)) => error!(
                "Publisher worker stopped, dropping {} message {}",
                message.message_type, message.message_id
            ),
        }
    }

    /// True once the worker has gone away.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Background task delivering queued messages to every sink.
pub struct PublisherWorker {
    receiver: mpsc::Receiver<PublishMessageRequest>,
    sinks: Vec<Arc<dyn MessageSink>>,
    concurrency: usize,
    retry: RetryPolicy,
}

impl PublisherWorker {
    /// Runs the worker on the tokio runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Delivers messages until every [`EventPublisher`] is dropped, then waits
    /// for in-flight deliveries to finish.
    pub async fn run(mut self) {
        info!(
            "Publisher worker started with {} sink(s), concurrency {}",
            self.sinks.len(),
            self.concurrency
        );
        let sinks: Arc<[Arc<dyn MessageSink>]> = self.sinks.drain(..).collect();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        while let Some(message) = self.receiver.recv().await {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let sinks = sinks.clone();
            let retry = self.retry;
            tokio::spawn(async move {
                deliver_to_all(&sinks, &message, retry).await;
                drop(permit);
            });
        }

        // All permits back means no delivery is still running
        let permits = u32::try_from(self.concurrency).unwrap_or(u32::MAX);
        if semaphore.acquire_many(permits).await.is_err() {
            warn!("Publisher worker could not wait for in-flight deliveries");
        }
        info!("Publisher worker stopped");
    }

    /// Takes one queued message without delivering it.
    #[cfg(any(test, feature = "test-util"))]
    pub fn try_next(&mut self) -> Option<PublishMessageRequest> {
        self.receiver.try_recv().ok()
    }
}

async fn deliver_to_all(
    sinks: &[Arc<dyn MessageSink>],
    message: &PublishMessageRequest,
    retry: RetryPolicy,
) {
    for sink in sinks {
        let mut attempt = 1;
        loop {
            match sink.deliver(message).await {
                Ok(()) => {
                    debug!("Delivered message {} to {}", message.message_id, sink.name());
                    break;
                }
                Err(e) if attempt < retry.max_attempts => {
                    warn!(
                        "Delivery of message {} to {} failed (attempt {}/{}): {}",
                        message.message_id,
                        sink.name(),
                        attempt,
                        retry.max_attempts,
                        e
                    );
                    attempt += 1;
                    tokio::time::sleep(retry.delay).await;
                }
                Err(e) => {
                    error!(
                        "Giving up on message {} ({}) for {} after {} attempt(s): {}",
                        message.message_id,
                        message.message_type,
                        sink.name(),
                        attempt,
                        e
                    );
                    break;
                }
            }
        }
    }
}
