// --- File: crates/huddle_notifications/src/routes.rs ---

use crate::handlers::{
    list_notifications_handler, mark_all_read_handler, mark_read_handler,
    stream_notifications_handler, NotificationState,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Creates a router containing all notification routes, relative to `/api`.
pub fn routes(state: Arc<NotificationState>) -> Router {
    Router::new()
        .route("/notifications/{receiver_id}", get(list_notifications_handler))
        .route(
            "/notifications/{receiver_id}/read-all",
            post(mark_all_read_handler),
        )
        .route(
            "/notifications/{receiver_id}/stream",
            get(stream_notifications_handler),
        )
        .route(
            "/notifications/{receiver_id}/{notification_id}/read",
            post(mark_read_handler),
        )
        .with_state(state)
}
