// --- File: crates/huddle_gcal/src/sync.rs ---
//! Keeps local calendars in step with the member's external calendar.
//!
//! Every operation validates its input, resolves the local calendar, obtains a
//! valid token and only then calls the provider. The provider call always
//! precedes the local write.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use huddle_common::{
    conflict, validation_error, Calendar, CalendarStatus, DomainEvent, HuddleError, ItemFailure,
    NewCalendar, ServiceType,
};
use huddle_config::GcalConfig;
use huddle_db::{CalendarRepository, TokenStore};
use huddle_events::EventPublisher;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::service::{CalendarProvider, GcalServiceError, NewCalendarEvent};
use crate::token::TokenRefresher;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateCalendarRequest {
    pub owner_id: i64,
    pub title: String,
    /// Unique across all calendars.
    pub code: String,
    /// IANA name; the configured default when absent.
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateEventRequest {
    pub summary: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// IANA name; the calendar's zone when absent.
    pub time_zone: Option<String>,
}

pub struct CalendarSyncService<S: TokenStore, C: CalendarRepository> {
    tokens: Arc<TokenRefresher<S>>,
    calendars: C,
    provider: Arc<dyn CalendarProvider>,
    publisher: Option<EventPublisher>,
    config: GcalConfig,
}

impl<S: TokenStore, C: CalendarRepository> CalendarSyncService<S, C> {
    pub fn new(
        tokens: Arc<TokenRefresher<S>>,
        calendars: C,
        provider: Arc<dyn CalendarProvider>,
        config: GcalConfig,
    ) -> Self {
        Self {
            tokens,
            calendars,
            provider,
            publisher: None,
            config,
        }
    }

    pub fn with_publisher(mut self, publisher: EventPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Creates the calendar on the provider, then stores the local row.
    pub async fn create_calendar(
        &self,
        request: CreateCalendarRequest,
    ) -> Result<Calendar, HuddleError> {
        let title = required(&request.title, "title")?;
        let code = required(&request.code, "code")?;
        let time_zone = request
            .time_zone
            .as_deref()
            .unwrap_or(&self.config.default_time_zone);
        validate_time_zone(time_zone)?;

        if self.calendars.find_by_code(code).await?.is_some() {
            return Err(conflict(format!("Calendar code '{code}' is already taken")));
        }

        let token = self
            .tokens
            .get_valid_token(request.owner_id, ServiceType::Calendar)
            .await?;
        let external_id = self
            .provider
            .create_calendar(&token.access_token, title, time_zone)
            .await?;

        let new_calendar = NewCalendar {
            owner_id: request.owner_id,
            external_id,
            title: title.to_string(),
            code: code.to_string(),
            timezone: time_zone.to_string(),
        };
        let calendar = match self.calendars.insert(&new_calendar, Utc::now()).await {
            Ok(calendar) => calendar,
            Err(e) => {
                error!(
                    "Calendar {} exists on the provider but was not stored locally \
                     (owner {}, code {}): {}",
                    new_calendar.external_id, new_calendar.owner_id, new_calendar.code, e
                );
                return Err(e.into());
            }
        };

        info!(
            "Calendar {} ({}) created for owner {}",
            calendar.calendar_id, calendar.external_id, calendar.owner_id
        );
        self.publish(DomainEvent::CalendarCreated {
            calendar_id: calendar.calendar_id,
            owner_id: calendar.owner_id,
            title: calendar.title.clone(),
        });
        Ok(calendar)
    }

    /// Grants the configured role on the calendar to `target_email`.
    ///
    /// `target_member_id` is the member behind the e-mail, when known; only
    /// then is that member notified.
    pub async fn share_calendar(
        &self,
        calendar_id: i64,
        target_email: &str,
        target_member_id: Option<i64>,
    ) -> Result<(), HuddleError> {
        let target_email = target_email.trim();
        validate_email(target_email)?;

        let calendar = self.find_calendar(calendar_id).await?;
        let token = self
            .tokens
            .get_valid_token(calendar.owner_id, ServiceType::Calendar)
            .await?;
        self.provider
            .share_calendar(
                &token.access_token,
                &calendar.external_id,
                target_email,
                &self.config.share_role,
            )
            .await?;

        info!("Calendar {} shared with {}", calendar_id, target_email);
        self.publish(DomainEvent::CalendarShared {
            calendar_id,
            owner_id: calendar.owner_id,
            target_email: target_email.to_string(),
            target_member_id,
        });
        Ok(())
    }

    /// Creates an event on the external calendar and returns its external id.
    pub async fn create_event(
        &self,
        calendar_id: i64,
        request: CreateEventRequest,
    ) -> Result<String, HuddleError> {
        let summary = required(&request.summary, "summary")?;
        if request.end <= request.start {
            return Err(validation_error("Event end must be after its start"));
        }
        if let Some(time_zone) = request.time_zone.as_deref() {
            validate_time_zone(time_zone)?;
        }

        let calendar = self.find_calendar(calendar_id).await?;
        let token = self
            .tokens
            .get_valid_token(calendar.owner_id, ServiceType::Calendar)
            .await?;

        let event = NewCalendarEvent {
            summary: summary.to_string(),
            description: request.description,
            start: request.start,
            end: request.end,
            time_zone: request.time_zone.unwrap_or_else(|| calendar.timezone.clone()),
        };
        let event_id = self
            .provider
            .create_event(&token.access_token, &calendar.external_id, &event)
            .await?;

        info!("Event {} created on calendar {}", event_id, calendar_id);
        self.publish(DomainEvent::EventCreated {
            calendar_id,
            owner_id: calendar.owner_id,
            event_id: event_id.clone(),
            summary: event.summary,
        });
        Ok(event_id)
    }

    /// Adds attendees to an event.
    ///
    /// Attendees are added independently. When any of them is rejected the
    /// result is `PartialFailure` listing both sides; the accepted ones stay
    /// on the event.
    pub async fn add_attendees(
        &self,
        calendar_id: i64,
        event_id: &str,
        attendees: &[String],
    ) -> Result<Vec<String>, HuddleError> {
        let event_id = required(event_id, "event id")?;
        if attendees.is_empty() {
            return Err(validation_error("At least one attendee is required"));
        }
        let attendees: Vec<String> = attendees.iter().map(|a| a.trim().to_string()).collect();
        for attendee in &attendees {
            validate_email(attendee)?;
        }

        let calendar = self.find_calendar(calendar_id).await?;
        let token = self
            .tokens
            .get_valid_token(calendar.owner_id, ServiceType::Calendar)
            .await?;
        let results = self
            .provider
            .add_attendees(
                &token.access_token,
                &calendar.external_id,
                event_id,
                &attendees,
            )
            .await?;
        if results.len() != attendees.len() {
            return Err(GcalServiceError::InvalidResponse(format!(
                "{} outcome(s) for {} attendee(s) on event {}",
                results.len(),
                attendees.len(),
                event_id
            ))
            .into());
        }

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for (attendee, result) in attendees.into_iter().zip(results) {
            match result {
                Ok(()) => succeeded.push(attendee),
                Err(e) => {
                    warn!(
                        "Attendee {} rejected for event {} on calendar {}: {}",
                        attendee, event_id, calendar_id, e
                    );
                    failed.push(ItemFailure {
                        item: attendee,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if !succeeded.is_empty() {
            self.publish(DomainEvent::AttendeesAdded {
                calendar_id,
                owner_id: calendar.owner_id,
                event_id: event_id.to_string(),
                attendees: succeeded.clone(),
            });
        }

        if failed.is_empty() {
            info!(
                "Added {} attendee(s) to event {} on calendar {}",
                succeeded.len(),
                event_id,
                calendar_id
            );
            Ok(succeeded)
        } else {
            Err(HuddleError::PartialFailure { succeeded, failed })
        }
    }

    pub async fn activate(&self, calendar_id: i64) -> Result<(), HuddleError> {
        self.set_status(calendar_id, CalendarStatus::Active).await
    }

    pub async fn deactivate(&self, calendar_id: i64) -> Result<(), HuddleError> {
        self.set_status(calendar_id, CalendarStatus::Inactive).await
    }

    async fn set_status(&self, calendar_id: i64, status: CalendarStatus) -> Result<(), HuddleError> {
        if !self.calendars.set_status(calendar_id, status).await? {
            return Err(HuddleError::CalendarNotFound(calendar_id));
        }
        info!("Calendar {} is now {}", calendar_id, status.as_str());
        Ok(())
    }

    async fn find_calendar(&self, calendar_id: i64) -> Result<Calendar, HuddleError> {
        debug!("Loading calendar {}", calendar_id);
        self.calendars
            .find(calendar_id)
            .await?
            .ok_or(HuddleError::CalendarNotFound(calendar_id))
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(publisher) = &self.publisher {
            publisher.publish(&event);
        }
    }
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, HuddleError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(validation_error(format!("{field} must not be empty")));
    }
    Ok(value)
}

fn validate_time_zone(time_zone: &str) -> Result<(), HuddleError> {
    time_zone
        .parse::<Tz>()
        .map(|_| ())
        .map_err(|_| validation_error(format!("Unknown time zone '{time_zone}'")))
}

/// Shape check only: one `@`, non-empty local part, dotted domain, no spaces.
pub fn validate_email(email: &str) -> Result<(), HuddleError> {
    let invalid = || validation_error(format!("Invalid e-mail address '{email}'"));
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    let well_formed = !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace);
    if well_formed {
        Ok(())
    } else {
        Err(invalid())
    }
}
