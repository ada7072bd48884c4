// File: crates/huddle_gcal/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Redirect},
};
use chrono::{DateTime, Utc};
use huddle_common::{validation_error, Calendar, HuddleError, ServiceType};
use huddle_db::{SqlCalendarRepository, SqlTokenStore};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::sync::{CalendarSyncService, CreateCalendarRequest, CreateEventRequest};
use crate::token::TokenRefresher;

// Shared state for the OAuth consent and calendar routes
#[derive(Clone)]
pub struct GcalState {
    pub tokens: Arc<TokenRefresher<SqlTokenStore>>,
    pub calendars: Arc<CalendarSyncService<SqlTokenStore, SqlCalendarRepository>>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub member_id: i64,
}

/// Query the provider appends when redirecting back after consent.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set instead of `code` when the member declined.
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConnectedResponse {
    pub member_id: i64,
    pub service_type: ServiceType,
    pub expiry_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ShareCalendarRequest {
    pub email: String,
    /// The member behind `email`, when the caller knows it.
    pub member_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CreatedEventResponse {
    pub event_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AddAttendeesRequest {
    pub attendees: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AttendeesAddedResponse {
    pub added: Vec<String>,
}

/// Sends the member to the provider's consent screen.
pub async fn connect_handler(
    State(state): State<Arc<GcalState>>,
    Path(service_type): Path<String>,
    Query(query): Query<ConnectQuery>,
) -> Result<Redirect, HuddleError> {
    let service_type: ServiceType = service_type.parse()?;
    let url = state
        .tokens
        .authorization_url(query.member_id, service_type)?;
    info!(
        "Redirecting member {} to {} consent",
        query.member_id, service_type
    );
    Ok(Redirect::to(&url))
}

/// Completes the consent round trip started by [`connect_handler`].
pub async fn oauth_callback_handler(
    State(state): State<Arc<GcalState>>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<ConnectedResponse>, HuddleError> {
    if let Some(error) = query.error {
        warn!("Consent was not granted: {}", error);
        return Err(validation_error(format!("Consent was not granted: {error}")));
    }
    let (Some(code), Some(signed_state)) = (query.code, query.state) else {
        return Err(validation_error("Missing code or state"));
    };

    let authorization = state.tokens.authorize(&code, &signed_state).await?;
    Ok(Json(ConnectedResponse {
        member_id: authorization.member_id,
        service_type: authorization.service_type,
        expiry_time: authorization.expiry_time,
    }))
}

pub async fn create_calendar_handler(
    State(state): State<Arc<GcalState>>,
    Json(request): Json<CreateCalendarRequest>,
) -> Result<(StatusCode, Json<Calendar>), HuddleError> {
    let calendar = state.calendars.create_calendar(request).await?;
    Ok((StatusCode::CREATED, Json(calendar)))
}

pub async fn share_calendar_handler(
    State(state): State<Arc<GcalState>>,
    Path(calendar_id): Path<i64>,
    Json(request): Json<ShareCalendarRequest>,
) -> Result<StatusCode, HuddleError> {
    state
        .calendars
        .share_calendar(calendar_id, &request.email, request.member_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_event_handler(
    State(state): State<Arc<GcalState>>,
    Path(calendar_id): Path<i64>,
    Json(request): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, HuddleError> {
    let event_id = state.calendars.create_event(calendar_id, request).await?;
    Ok((StatusCode::CREATED, Json(CreatedEventResponse { event_id })))
}

/// Partial outcomes come back as the error body, listing both sides.
pub async fn add_attendees_handler(
    State(state): State<Arc<GcalState>>,
    Path((calendar_id, event_id)): Path<(i64, String)>,
    Json(request): Json<AddAttendeesRequest>,
) -> Result<Json<AttendeesAddedResponse>, HuddleError> {
    let added = state
        .calendars
        .add_attendees(calendar_id, &event_id, &request.attendees)
        .await?;
    Ok(Json(AttendeesAddedResponse { added }))
}

pub async fn activate_calendar_handler(
    State(state): State<Arc<GcalState>>,
    Path(calendar_id): Path<i64>,
) -> Result<StatusCode, HuddleError> {
    state.calendars.activate(calendar_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn deactivate_calendar_handler(
    State(state): State<Arc<GcalState>>,
    Path(calendar_id): Path<i64>,
) -> Result<StatusCode, HuddleError> {
    state.calendars.deactivate(calendar_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
