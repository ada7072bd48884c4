//! SQL implementation of the notification repository

use crate::convert::{column, from_epoch};
use crate::error::DbError;
use crate::repositories::notification::{MarkReadOutcome, NotificationRepository};
use crate::DbClient;
use chrono::{DateTime, Utc};
use huddle_common::{NewNotification, Notification, NotificationStatus};
use sqlx::any::AnyRow;
use tracing::{debug, error, info};

const COLUMNS: &str =
    "notification_id, receiver_id, status, created_on, read_on, payload, source_message_id";

/// SQL implementation of [`NotificationRepository`]
#[derive(Debug, Clone)]
pub struct SqlNotificationRepository {
    db_client: DbClient,
}

impl SqlNotificationRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    fn map_row(row: &AnyRow) -> Result<Notification, DbError> {
        let status: String = column(row, "status")?;
        let payload: String = column(row, "payload")?;
        let read_on: Option<i64> = column(row, "read_on")?;
        Ok(Notification {
            notification_id: column(row, "notification_id")?,
            receiver_id: column(row, "receiver_id")?,
            status: status
                .parse::<NotificationStatus>()
                .map_err(|e| DbError::DecodeError(e.to_string()))?,
            created_on: from_epoch(column(row, "created_on")?)?,
            read_on: read_on.map(from_epoch).transpose()?,
            payload: serde_json::from_str(&payload)
                .map_err(|e| DbError::DecodeError(format!("payload: {e}")))?,
            source_message_id: column(row, "source_message_id")?,
        })
    }
}

impl NotificationRepository for SqlNotificationRepository {
    async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing notification schema");

        let query = format!(
            r#"
            CREATE TABLE IF NOT EXISTS notifications (
                notification_id {},
                receiver_id BIGINT NOT NULL,
                status TEXT NOT NULL DEFAULT 'UNREAD',
                created_on BIGINT NOT NULL,
                read_on BIGINT,
                payload TEXT NOT NULL,
                source_message_id TEXT,
                UNIQUE (receiver_id, source_message_id)
            )
            "#,
            self.db_client.backend().id_column()
        );
        self.db_client.execute(&query).await?;
        self.db_client
            .execute(
                "CREATE INDEX IF NOT EXISTS idx_notifications_receiver_status \
                 ON notifications (receiver_id, status)",
            )
            .await?;

        info!("Notification schema initialized successfully");
        Ok(())
    }

    async fn insert(
        &self,
        notification: &NewNotification,
        created_on: DateTime<Utc>,
    ) -> Result<Option<Notification>, DbError> {
        debug!(
            "Inserting notification for receiver: {}",
            notification.receiver_id
        );

        let payload = serde_json::to_string(&notification.payload)
            .map_err(|e| DbError::QueryError(format!("payload: {e}")))?;

        // A redelivered message hits the unique key and inserts nothing
        let query = format!(
            r#"
            INSERT INTO notifications (receiver_id, status, created_on, payload, source_message_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (receiver_id, source_message_id) DO NOTHING
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(notification.receiver_id)
            .bind(NotificationStatus::Unread.as_str())
            .bind(created_on.timestamp())
            .bind(payload)
            .bind(notification.source_message_id.clone())
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to insert notification: {}", e);
                DbError::from_query(e)
            })?;

        match row {
            Some(row) => Ok(Some(Self::map_row(&row)?)),
            None => {
                debug!(
                    "Duplicate notification ignored for receiver: {} (source {:?})",
                    notification.receiver_id, notification.source_message_id
                );
                Ok(None)
            }
        }
    }

    async fn find(&self, notification_id: i64) -> Result<Option<Notification>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM notifications WHERE notification_id = $1");

        let row = sqlx::query(&query)
            .bind(notification_id)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to find notification: {}", e);
                DbError::from_query(e)
            })?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn mark_read(
        &self,
        notification_id: i64,
        receiver_id: i64,
        read_on: DateTime<Utc>,
    ) -> Result<MarkReadOutcome, DbError> {
        debug!(
            "Marking notification {} read for receiver {}",
            notification_id, receiver_id
        );

        let updated = sqlx::query(
            r#"
            UPDATE notifications SET status = $1, read_on = $2
            WHERE notification_id = $3 AND receiver_id = $4 AND status = $5
            "#,
        )
        .bind(NotificationStatus::Read.as_str())
        .bind(read_on.timestamp())
        .bind(notification_id)
        .bind(receiver_id)
        .bind(NotificationStatus::Unread.as_str())
        .execute(self.db_client.pool())
        .await
        .map_err(|e| {
            error!("Failed to mark notification read: {}", e);
            DbError::from_query(e)
        })?;

        if updated.rows_affected() > 0 {
            return Ok(MarkReadOutcome::Updated);
        }

        // Nothing changed: either already READ or not this receiver's row
        let existing = sqlx::query(
            "SELECT notification_id FROM notifications WHERE notification_id = $1 AND receiver_id = $2",
        )
        .bind(notification_id)
        .bind(receiver_id)
        .fetch_optional(self.db_client.pool())
        .await
        .map_err(|e| {
            error!("Failed to look up notification: {}", e);
            DbError::from_query(e)
        })?;

        Ok(if existing.is_some() {
            MarkReadOutcome::AlreadyRead
        } else {
            MarkReadOutcome::NotFound
        })
    }

    async fn mark_all_read(
        &self,
        receiver_id: i64,
        read_on: DateTime<Utc>,
    ) -> Result<u64, DbError> {
        debug!("Marking all notifications read for receiver {}", receiver_id);

        let result = sqlx::query(
            "UPDATE notifications SET status = $1, read_on = $2 WHERE receiver_id = $3 AND status = $4",
        )
        .bind(NotificationStatus::Read.as_str())
        .bind(read_on.timestamp())
        .bind(receiver_id)
        .bind(NotificationStatus::Unread.as_str())
        .execute(self.db_client.pool())
        .await
        .map_err(|e| {
            error!("Failed to mark all notifications read: {}", e);
            DbError::from_query(e)
        })?;

        Ok(result.rows_affected())
    }

    async fn list_for_receiver(
        &self,
        receiver_id: i64,
        limit: i64,
    ) -> Result<Vec<Notification>, DbError> {
        let query = format!(
            "SELECT {COLUMNS} FROM notifications WHERE receiver_id = $1 \
             ORDER BY created_on DESC, notification_id DESC LIMIT $2"
        );

        let rows = sqlx::query(&query)
            .bind(receiver_id)
            .bind(limit)
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to list notifications: {}", e);
                DbError::from_query(e)
            })?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn unread_count(&self, receiver_id: i64) -> Result<i64, DbError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS unread FROM notifications WHERE receiver_id = $1 AND status = $2",
        )
        .bind(receiver_id)
        .bind(NotificationStatus::Unread.as_str())
        .fetch_one(self.db_client.pool())
        .await
        .map_err(|e| {
            error!("Failed to count unread notifications: {}", e);
            DbError::from_query(e)
        })?;

        column(&row, "unread")
    }
}
