// --- File: crates/huddle_gcal/src/routes.rs ---

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{
    activate_calendar_handler, add_attendees_handler, connect_handler, create_calendar_handler,
    create_event_handler, deactivate_calendar_handler, oauth_callback_handler,
    share_calendar_handler, GcalState,
};

/// Creates a router containing the OAuth consent and calendar routes.
pub fn routes(state: Arc<GcalState>) -> Router {
    Router::new()
        .route("/oauth/google/callback", get(oauth_callback_handler))
        .route("/oauth/google/{service_type}/connect", get(connect_handler))
        .route("/calendars", post(create_calendar_handler))
        .route("/calendars/{calendar_id}/share", post(share_calendar_handler))
        .route("/calendars/{calendar_id}/events", post(create_event_handler))
        .route(
            "/calendars/{calendar_id}/events/{event_id}/attendees",
            post(add_attendees_handler),
        )
        .route(
            "/calendars/{calendar_id}/activate",
            post(activate_calendar_handler),
        )
        .route(
            "/calendars/{calendar_id}/deactivate",
            post(deactivate_calendar_handler),
        )
        .with_state(state)
}
