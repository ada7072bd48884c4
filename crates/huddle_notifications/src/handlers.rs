// File: crates/huddle_notifications/src/handlers.rs
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use huddle_common::{HuddleError, Notification};
use huddle_db::SqlNotificationRepository;
use serde::{Deserialize, Serialize};
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::writer::NotificationWriter;

/// Page size when the caller does not pass `limit`.
const DEFAULT_PAGE_SIZE: i64 = 50;

// Shared state for the notification routes
#[derive(Clone)]
pub struct NotificationState {
    pub writer: Arc<NotificationWriter<SqlNotificationRepository>>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct NotificationListResponse {
    pub notifications: Vec<Notification>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub notification_id: i64,
    /// False when the notification was READ already.
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

/// Lists a receiver's newest notifications together with the unread count.
pub async fn list_notifications_handler(
    State(state): State<Arc<NotificationState>>,
    Path(receiver_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> Result<Json<NotificationListResponse>, HuddleError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let notifications = state.writer.list(receiver_id, limit).await?;
    let unread_count = state.writer.unread_count(receiver_id).await?;

    Ok(Json(NotificationListResponse {
        notifications,
        unread_count,
    }))
}

pub async fn mark_read_handler(
    State(state): State<Arc<NotificationState>>,
    Path((receiver_id, notification_id)): Path<(i64, i64)>,
) -> Result<Json<MarkReadResponse>, HuddleError> {
    let changed = state
        .writer
        .mark_read(notification_id, receiver_id)
        .await?;

    Ok(Json(MarkReadResponse {
        notification_id,
        changed,
    }))
}

pub async fn mark_all_read_handler(
    State(state): State<Arc<NotificationState>>,
    Path(receiver_id): Path<i64>,
) -> Result<Json<MarkAllReadResponse>, HuddleError> {
    let updated = state.writer.mark_all_read(receiver_id).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

/// Server-sent event stream of notifications recorded for the receiver while
/// the connection is open.
///
/// The connection is deregistered as soon as the client goes away and axum
/// drops the stream.
pub async fn stream_notifications_handler(
    State(state): State<Arc<NotificationState>>,
    Path(receiver_id): Path<i64>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.writer.registry().register(receiver_id);
    info!(
        "Notification stream {} opened for receiver {}",
        subscription.handle().connection_id(),
        receiver_id
    );

    let stream = subscription.filter_map(|notification| {
        match Event::default()
            .event("notification")
            .id(notification.notification_id.to_string())
            .json_data(&notification)
        {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                warn!(
                    "Could not encode notification {} for streaming: {}",
                    notification.notification_id, e
                );
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
