use std::sync::Arc;

use huddle_common::{BoxFuture, HuddleError, MessageSink, NewNotification, PublishMessageRequest};
use huddle_db::NotificationRepository;
use serde_json::json;
use tracing::{debug, warn};

use crate::writer::NotificationWriter;

/// Turns published domain events into one notification per receiver.
///
/// The message id is stored as the notification's source, so a redelivered
/// message records nothing new.
pub struct NotificationSink<R: NotificationRepository> {
    writer: Arc<NotificationWriter<R>>,
}

impl<R: NotificationRepository> NotificationSink<R> {
    pub fn new(writer: Arc<NotificationWriter<R>>) -> Self {
        Self { writer }
    }

    async fn record_all(&self, message: &PublishMessageRequest) -> Result<(), HuddleError> {
        let event = match message.event() {
            Ok(event) => event,
            Err(e) => {
                // Retrying cannot fix a payload we don't understand
                warn!(
                    "Skipping {} message {}: payload is not a known event: {}",
                    message.message_type, message.message_id, e
                );
                return Ok(());
            }
        };

        let payload = json!({
            "type": message.message_type,
            "event": message.payload,
            "published_at": message.created_at,
        });
        let source = message.message_id.to_string();

        for receiver_id in event.receivers() {
            let recorded = self
                .writer
                .record(NewNotification {
                    receiver_id,
                    payload: payload.clone(),
                    source_message_id: Some(source.clone()),
                })
                .await?;
            if recorded.is_none() {
                debug!(
                    "Message {} already recorded for receiver {}",
                    message.message_id, receiver_id
                );
            }
        }
        Ok(())
    }
}

impl<R: NotificationRepository + 'static> MessageSink for NotificationSink<R> {
    fn name(&self) -> &str {
        "notifications"
    }

    fn deliver<'a>(&'a self, message: &'a PublishMessageRequest) -> BoxFuture<'a, (), HuddleError> {
        Box::pin(self.record_all(message))
    }
}
