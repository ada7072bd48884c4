use chrono::Utc;
use huddle_common::{HuddleError, NewNotification, Notification};
use huddle_db::{MarkReadOutcome, NotificationRepository};
use tracing::{debug, info};

use crate::registry::ConnectionRegistry;

/// Largest page returned by [`NotificationWriter::list`].
pub const MAX_PAGE_SIZE: i64 = 100;

/// Records notifications and drives their UNREAD to READ transition.
pub struct NotificationWriter<R: NotificationRepository> {
    repository: R,
    registry: ConnectionRegistry,
}

impl<R: NotificationRepository> NotificationWriter<R> {
    pub fn new(repository: R, registry: ConnectionRegistry) -> Self {
        Self {
            repository,
            registry,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Stores an UNREAD notification and pushes it to the receiver's live
    /// connections.
    ///
    /// Returns `None` when the same source message was already recorded for
    /// this receiver.
    pub async fn record(
        &self,
        notification: NewNotification,
    ) -> Result<Option<Notification>, HuddleError> {
        debug!(
            "Recording notification for receiver {}",
            notification.receiver_id
        );

        let stored = self.repository.insert(&notification, Utc::now()).await?;
        if let Some(stored) = &stored {
            info!(
                "Notification {} recorded for receiver {}",
                stored.notification_id, stored.receiver_id
            );
            self.registry.push(stored);
        }
        Ok(stored)
    }

    /// Marks one notification of `receiver_id` as READ.
    ///
    /// Returns `true` if the status changed, `false` if it was READ already.
    pub async fn mark_read(
        &self,
        notification_id: i64,
        receiver_id: i64,
    ) -> Result<bool, HuddleError> {
        match self
            .repository
            .mark_read(notification_id, receiver_id, Utc::now())
            .await?
        {
            MarkReadOutcome::Updated => {
                info!(
                    "Notification {} marked read by receiver {}",
                    notification_id, receiver_id
                );
                Ok(true)
            }
            MarkReadOutcome::AlreadyRead => Ok(false),
            MarkReadOutcome::NotFound => Err(HuddleError::NotificationNotFound {
                notification_id,
                receiver_id,
            }),
        }
    }

    /// Marks every UNREAD notification of `receiver_id` as READ and returns
    /// how many changed.
    pub async fn mark_all_read(&self, receiver_id: i64) -> Result<u64, HuddleError> {
        let updated = self
            .repository
            .mark_all_read(receiver_id, Utc::now())
            .await?;
        info!(
            "Marked {} notification(s) read for receiver {}",
            updated, receiver_id
        );
        Ok(updated)
    }

    /// Newest first, `limit` clamped to `1..=MAX_PAGE_SIZE`.
    pub async fn list(
        &self,
        receiver_id: i64,
        limit: i64,
    ) -> Result<Vec<Notification>, HuddleError> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        Ok(self
            .repository
            .list_for_receiver(receiver_id, limit)
            .await?)
    }

    pub async fn unread_count(&self, receiver_id: i64) -> Result<i64, HuddleError> {
        Ok(self.repository.unread_count(receiver_id).await?)
    }
}
