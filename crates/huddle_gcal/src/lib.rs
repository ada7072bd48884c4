// --- File: crates/huddle_gcal/src/lib.rs ---

// Declare modules within this crate
pub mod auth; // HTTPS client and per-member calendar hubs
pub mod handlers; // Axum handlers for consent and calendar routes
pub mod oauth; // OAuth2 token endpoint client and signed consent state
pub mod routes;
pub mod service; // Google Calendar provider
pub mod sync; // Calendar sync service
pub mod token; // Token refresher

#[cfg(test)]
mod oauth_proptest;
#[cfg(test)]
mod sync_test;

pub use handlers::GcalState;
pub use oauth::{GoogleOAuthProvider, OAuthTokenProvider, ProviderError, TokenGrant};
pub use service::{CalendarProvider, GcalServiceError, GoogleCalendarProvider, NewCalendarEvent};
pub use sync::{CalendarSyncService, CreateCalendarRequest, CreateEventRequest};
pub use token::TokenRefresher;
