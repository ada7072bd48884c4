//! Storage contract for in-app notifications

use crate::error::DbError;
use chrono::{DateTime, Utc};
use huddle_common::{NewNotification, Notification};

/// Result of a single read transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkReadOutcome {
    /// The row went from UNREAD to READ.
    Updated,
    /// The row was READ already; nothing changed.
    AlreadyRead,
    /// No row with that id belongs to the receiver.
    NotFound,
}

/// Repository for notifications
pub trait NotificationRepository: Send + Sync {
    /// Creates the `notifications` table if it doesn't already exist.
    fn init_schema(&self) -> impl std::future::Future<Output = Result<(), DbError>> + Send;

    /// Insert an UNREAD notification
    ///
    /// # Returns
    ///
    /// The stored notification, or `None` when a notification for the same
    /// receiver and source message already exists
    fn insert(
        &self,
        notification: &NewNotification,
        created_on: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Option<Notification>, DbError>> + Send;

    fn find(
        &self,
        notification_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<Notification>, DbError>> + Send;

    /// Transition one notification of `receiver_id` from UNREAD to READ
    fn mark_read(
        &self,
        notification_id: i64,
        receiver_id: i64,
        read_on: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<MarkReadOutcome, DbError>> + Send;

    /// Transition every UNREAD notification of `receiver_id` to READ
    ///
    /// # Returns
    ///
    /// The number of notifications that changed
    fn mark_all_read(
        &self,
        receiver_id: i64,
        read_on: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, DbError>> + Send;

    /// Newest first
    fn list_for_receiver(
        &self,
        receiver_id: i64,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<Notification>, DbError>> + Send;

    fn unread_count(
        &self,
        receiver_id: i64,
    ) -> impl std::future::Future<Output = Result<i64, DbError>> + Send;
}
