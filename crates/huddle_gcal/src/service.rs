// --- File: crates/huddle_gcal/src/service.rs ---
//! Google Calendar provider.
//!
//! [`CalendarProvider`] is the seam between the sync service and the external
//! calendar. Every call carries the acting member's access token; the provider
//! never refreshes tokens itself.

use chrono::{DateTime, Utc};
use google_calendar3::api::{
    AclRule, AclRuleScope, Calendar, Event, EventAttendee, EventDateTime,
};
use huddle_common::{BoxFuture, HuddleError};
use thiserror::Error;
use tracing::{debug, info};

use crate::auth::{create_calendar_hub, HttpClient};

/// Service name reported in [`HuddleError::ExternalService`].
pub const GOOGLE_CALENDAR: &str = "google_calendar";

/// Errors that can occur when interacting with Google Calendar.
#[derive(Error, Debug)]
pub enum GcalServiceError {
    #[error("Google API Error: {0}")]
    ApiError(#[from] google_calendar3::Error),
    #[error("Google API rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Unexpected Google API response: {0}")]
    InvalidResponse(String),
    #[error("Google Calendar client setup failed: {0}")]
    Setup(String),
}

impl GcalServiceError {
    /// HTTP status reported by the provider, when there was a response at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            GcalServiceError::ApiError(google_calendar3::Error::BadRequest(body)) => body
                .pointer("/error/code")
                .and_then(serde_json::Value::as_u64)
                .and_then(|code| u16::try_from(code).ok()),
            GcalServiceError::ApiError(google_calendar3::Error::Failure(response)) => {
                Some(response.status().as_u16())
            }
            GcalServiceError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<GcalServiceError> for HuddleError {
    fn from(err: GcalServiceError) -> Self {
        HuddleError::ExternalService {
            service: GOOGLE_CALENDAR.to_string(),
            status: err.status(),
            message: err.to_string(),
        }
    }
}

/// An event to create on an external calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCalendarEvent {
    pub summary: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// IANA name used to render the event on the provider side.
    pub time_zone: String,
}

/// Calendar operations against the external provider.
pub trait CalendarProvider: Send + Sync {
    /// Creates a secondary calendar and returns its external id.
    fn create_calendar<'a>(
        &'a self,
        access_token: &'a str,
        title: &'a str,
        time_zone: &'a str,
    ) -> BoxFuture<'a, String, GcalServiceError>;

    /// Grants `role` on the calendar to `email`.
    fn share_calendar<'a>(
        &'a self,
        access_token: &'a str,
        external_id: &'a str,
        email: &'a str,
        role: &'a str,
    ) -> BoxFuture<'a, (), GcalServiceError>;

    /// Creates an event and returns its external id.
    fn create_event<'a>(
        &'a self,
        access_token: &'a str,
        external_id: &'a str,
        event: &'a NewCalendarEvent,
    ) -> BoxFuture<'a, String, GcalServiceError>;

    /// Adds attendees one at a time.
    ///
    /// The outer error means the event could not be loaded and nothing was
    /// attempted; otherwise there is one result per attendee, in input order.
    fn add_attendees<'a>(
        &'a self,
        access_token: &'a str,
        external_id: &'a str,
        event_id: &'a str,
        attendees: &'a [String],
    ) -> BoxFuture<'a, Vec<Result<(), GcalServiceError>>, GcalServiceError>;
}

/// Google Calendar provider implementation.
pub struct GoogleCalendarProvider {
    client: HttpClient,
}

impl GoogleCalendarProvider {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

impl CalendarProvider for GoogleCalendarProvider {
    fn create_calendar<'a>(
        &'a self,
        access_token: &'a str,
        title: &'a str,
        time_zone: &'a str,
    ) -> BoxFuture<'a, String, GcalServiceError> {
        Box::pin(async move {
            let hub = create_calendar_hub(&self.client, access_token);
            let calendar = Calendar {
                summary: Some(title.to_string()),
                time_zone: Some(time_zone.to_string()),
                ..Default::default()
            };

            let (_response, created) = hub.calendars().insert(calendar).doit().await?;
            let external_id = created.id.ok_or_else(|| {
                GcalServiceError::InvalidResponse("created calendar has no id".to_string())
            })?;

            info!("Created Google calendar {}", external_id);
            Ok(external_id)
        })
    }

    fn share_calendar<'a>(
        &'a self,
        access_token: &'a str,
        external_id: &'a str,
        email: &'a str,
        role: &'a str,
    ) -> BoxFuture<'a, (), GcalServiceError> {
        Box::pin(async move {
            let hub = create_calendar_hub(&self.client, access_token);
            let rule = AclRule {
                role: Some(role.to_string()),
                scope: Some(AclRuleScope {
                    type_: Some("user".to_string()),
                    value: Some(email.to_string()),
                }),
                ..Default::default()
            };

            hub.acl().insert(rule, external_id).doit().await?;
            info!("Shared Google calendar {} as {}", external_id, role);
            Ok(())
        })
    }

    fn create_event<'a>(
        &'a self,
        access_token: &'a str,
        external_id: &'a str,
        event: &'a NewCalendarEvent,
    ) -> BoxFuture<'a, String, GcalServiceError> {
        Box::pin(async move {
            let hub = create_calendar_hub(&self.client, access_token);
            let new_event = Event {
                summary: Some(event.summary.clone()),
                description: event.description.clone(),
                start: Some(EventDateTime {
                    date_time: Some(event.start),
                    time_zone: Some(event.time_zone.clone()),
                    ..Default::default()
                }),
                end: Some(EventDateTime {
                    date_time: Some(event.end),
                    time_zone: Some(event.time_zone.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            };

            let (_response, created) = hub
                .events()
                .insert(new_event, external_id)
                .doit()
                .await?;
            let event_id = created.id.ok_or_else(|| {
                GcalServiceError::InvalidResponse("created event has no id".to_string())
            })?;

            info!("Created event {} on Google calendar {}", event_id, external_id);
            Ok(event_id)
        })
    }

    fn add_attendees<'a>(
        &'a self,
        access_token: &'a str,
        external_id: &'a str,
        event_id: &'a str,
        attendees: &'a [String],
    ) -> BoxFuture<'a, Vec<Result<(), GcalServiceError>>, GcalServiceError> {
        Box::pin(async move {
            let hub = create_calendar_hub(&self.client, access_token);
            let (_response, event) = hub.events().get(external_id, event_id).doit().await?;
            let mut current = event.attendees.unwrap_or_default();
            let mut results = Vec::with_capacity(attendees.len());

            for email in attendees {
                let already_invited = current.iter().any(|attendee| {
                    attendee
                        .email
                        .as_deref()
                        .is_some_and(|existing| existing.eq_ignore_ascii_case(email))
                });
                if already_invited {
                    debug!("{} already attends event {}", email, event_id);
                    results.push(Ok(()));
                    continue;
                }

                let mut proposed = current.clone();
                proposed.push(EventAttendee {
                    email: Some(email.clone()),
                    ..Default::default()
                });
                let patch = Event {
                    attendees: Some(proposed.clone()),
                    ..Default::default()
                };

                // Each attendee is its own patch so one rejection leaves the others in place
                match hub
                    .events()
                    .patch(patch, external_id, event_id)
                    .send_updates("all")
                    .doit()
                    .await
                {
                    Ok(_) => {
                        current = proposed;
                        results.push(Ok(()));
                    }
                    Err(e) => results.push(Err(GcalServiceError::from(e))),
                }
            }

            Ok(results)
        })
    }
}

#[cfg(test)]
pub mod mock {
    //! In-memory calendar provider for tests.

    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakeCalendarProvider {
        pub calls: AtomicUsize,
        pub(crate) next_id: AtomicU32,
        /// Attendee e-mails the provider refuses.
        pub rejected_emails: HashSet<String>,
        /// When set, every call fails with this status.
        pub fail_with: Option<u16>,
        /// When set, `add_attendees` reports at most this many outcomes.
        pub attendee_outcomes: Option<usize>,
        pub tokens_seen: Mutex<Vec<String>>,
        pub shares: Mutex<Vec<(String, String, String)>>,
    }

    impl FakeCalendarProvider {
        pub fn rejecting(emails: &[&str]) -> Self {
            Self {
                rejected_emails: emails.iter().map(|e| e.to_string()).collect(),
                ..Default::default()
            }
        }

        pub fn failing(status: u16) -> Self {
            Self {
                fail_with: Some(status),
                ..Default::default()
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn enter(&self, access_token: &str) -> Result<(), GcalServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.tokens_seen
                .lock()
                .unwrap()
                .push(access_token.to_string());
            match self.fail_with {
                Some(status) => Err(GcalServiceError::Rejected {
                    status,
                    message: "provider unavailable".to_string(),
                }),
                None => Ok(()),
            }
        }

        fn next_id(&self, prefix: &str) -> String {
            format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
        }
    }

    impl CalendarProvider for FakeCalendarProvider {
        fn create_calendar<'a>(
            &'a self,
            access_token: &'a str,
            _title: &'a str,
            _time_zone: &'a str,
        ) -> BoxFuture<'a, String, GcalServiceError> {
            Box::pin(async move {
                self.enter(access_token)?;
                Ok(self.next_id("cal"))
            })
        }

        fn share_calendar<'a>(
            &'a self,
            access_token: &'a str,
            external_id: &'a str,
            email: &'a str,
            role: &'a str,
        ) -> BoxFuture<'a, (), GcalServiceError> {
            Box::pin(async move {
                self.enter(access_token)?;
                self.shares.lock().unwrap().push((
                    external_id.to_string(),
                    email.to_string(),
                    role.to_string(),
                ));
                Ok(())
            })
        }

        fn create_event<'a>(
            &'a self,
            access_token: &'a str,
            _external_id: &'a str,
            _event: &'a NewCalendarEvent,
        ) -> BoxFuture<'a, String, GcalServiceError> {
            Box::pin(async move {
                self.enter(access_token)?;
                Ok(self.next_id("evt"))
            })
        }

        fn add_attendees<'a>(
            &'a self,
            access_token: &'a str,
            _external_id: &'a str,
            _event_id: &'a str,
            attendees: &'a [String],
        ) -> BoxFuture<'a, Vec<Result<(), GcalServiceError>>, GcalServiceError> {
            Box::pin(async move {
                self.enter(access_token)?;
                let answered = self.attendee_outcomes.unwrap_or(attendees.len());
                Ok(attendees
                    .iter()
                    .take(answered)
                    .map(|email| {
                        if self.rejected_emails.contains(email) {
                            Err(GcalServiceError::Rejected {
                                status: 400,
                                message: format!("invalid attendee {email}"),
                            })
                        } else {
                            Ok(())
                        }
                    })
                    .collect())
            })
        }
    }
}
