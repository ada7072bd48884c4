// --- File: crates/huddle_common/src/models.rs ---

// Records shared between the persistence layer, the sync services and the
// notification pipeline, plus the domain events carried by the publisher.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::HuddleError;

/// External service an OAuth2 authorization is held for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceType {
    Calendar,
    Youtube,
    Slack,
}

impl ServiceType {
    /// The value stored in the `service_type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Calendar => "CALENDAR",
            ServiceType::Youtube => "YOUTUBE",
            ServiceType::Slack => "SLACK",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = HuddleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CALENDAR" => Ok(ServiceType::Calendar),
            "YOUTUBE" => Ok(ServiceType::Youtube),
            "SLACK" => Ok(ServiceType::Slack),
            other => Err(HuddleError::Validation(format!(
                "unknown service type: {other}"
            ))),
        }
    }
}

/// Stored OAuth2 credential pair for one (member, service type).
///
/// There is at most one record per key. Refreshes replace the access token,
/// the expiry and (when rotated) the refresh token in a single write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Oauth2Authorization {
    pub member_id: i64,
    pub service_type: ServiceType,
    pub access_token: String,
    /// Absent when the provider never issued one; such a record cannot be refreshed.
    pub refresh_token: Option<String>,
    pub expiry_time: DateTime<Utc>,
    pub scope: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Oauth2Authorization {
    /// True when `now` falls inside the refresh window `[expiry - margin, ..)`.
    pub fn needs_refresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expiry_time
            .checked_sub_signed(margin)
            .map_or(true, |window_start| now >= window_start)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Unread,
    Read,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Unread => "UNREAD",
            NotificationStatus::Read => "READ",
        }
    }
}

impl FromStr for NotificationStatus {
    type Err = HuddleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNREAD" => Ok(NotificationStatus::Unread),
            "READ" => Ok(NotificationStatus::Read),
            other => Err(HuddleError::Internal(format!(
                "unknown notification status: {other}"
            ))),
        }
    }
}

/// An in-app notification. UNREAD is initial, READ is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: i64,
    pub receiver_id: i64,
    pub status: NotificationStatus,
    pub created_on: DateTime<Utc>,
    pub read_on: Option<DateTime<Utc>>,
    pub payload: serde_json::Value,
    /// Id of the published message this notification was produced from.
    pub source_message_id: Option<String>,
}

/// Input for recording a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub receiver_id: i64,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub source_message_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalendarStatus {
    Active,
    Inactive,
}

impl CalendarStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarStatus::Active => "ACTIVE",
            CalendarStatus::Inactive => "INACTIVE",
        }
    }
}

impl FromStr for CalendarStatus {
    type Err = HuddleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(CalendarStatus::Active),
            "INACTIVE" => Ok(CalendarStatus::Inactive),
            other => Err(HuddleError::Internal(format!(
                "unknown calendar status: {other}"
            ))),
        }
    }
}

/// Local mirror of a calendar created on the external provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    pub calendar_id: i64,
    pub owner_id: i64,
    pub external_id: String,
    pub title: String,
    /// Unique across all calendars.
    pub code: String,
    pub timezone: String,
    pub status: CalendarStatus,
    pub created_on: DateTime<Utc>,
}

/// Input for persisting a calendar after the provider created it.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCalendar {
    pub owner_id: i64,
    pub external_id: String,
    pub title: String,
    pub code: String,
    pub timezone: String,
}

/// Domain events fanned out by the publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    StreamCreated {
        stream_id: i64,
        host_id: i64,
        title: String,
        follower_ids: Vec<i64>,
    },
    CalendarCreated {
        calendar_id: i64,
        owner_id: i64,
        title: String,
    },
    CalendarShared {
        calendar_id: i64,
        owner_id: i64,
        target_email: String,
        target_member_id: Option<i64>,
    },
    EventCreated {
        calendar_id: i64,
        owner_id: i64,
        event_id: String,
        summary: String,
    },
    AttendeesAdded {
        calendar_id: i64,
        owner_id: i64,
        event_id: String,
        attendees: Vec<String>,
    },
    ReauthorizationRequired {
        member_id: i64,
        service_type: ServiceType,
    },
}

impl DomainEvent {
    pub fn message_type(&self) -> &'static str {
        match self {
            DomainEvent::StreamCreated { .. } => "STREAM_CREATED",
            DomainEvent::CalendarCreated { .. } => "CALENDAR_CREATED",
            DomainEvent::CalendarShared { .. } => "CALENDAR_SHARED",
            DomainEvent::EventCreated { .. } => "EVENT_CREATED",
            DomainEvent::AttendeesAdded { .. } => "ATTENDEES_ADDED",
            DomainEvent::ReauthorizationRequired { .. } => "REAUTHORIZATION_REQUIRED",
        }
    }

    /// Members that get an in-app notification for this event.
    pub fn receivers(&self) -> Vec<i64> {
        match self {
            DomainEvent::StreamCreated { follower_ids, .. } => follower_ids.clone(),
            DomainEvent::CalendarCreated { owner_id, .. }
            | DomainEvent::EventCreated { owner_id, .. }
            | DomainEvent::AttendeesAdded { owner_id, .. } => vec![*owner_id],
            DomainEvent::CalendarShared {
                target_member_id, ..
            } => target_member_id.iter().copied().collect(),
            DomainEvent::ReauthorizationRequired { member_id, .. } => vec![*member_id],
        }
    }
}

/// Envelope handed to the publisher. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishMessageRequest {
    /// Consumers deduplicate on this id.
    pub message_id: Uuid,
    pub message_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl PublishMessageRequest {
    pub fn from_event(event: &DomainEvent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            message_id: Uuid::new_v4(),
            message_type: event.message_type().to_string(),
            payload: serde_json::to_value(event)?,
            created_at: Utc::now(),
        })
    }

    /// Decodes the payload back into the event it was built from.
    pub fn event(&self) -> Result<DomainEvent, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}
