// --- File: crates/huddle_common/src/lib.rs ---

// Declare modules within this crate
pub mod error; // Error taxonomy shared by every crate
pub mod http; // Axum response mapping for errors
pub mod logging; // Tracing subscriber setup
pub mod models; // Domain records and events
pub mod services; // Service seams (message sinks)


// Re-export error types and utilities for easier access
pub use error::{
    conflict, external_service_error, validation_error, HttpStatusCode,
    HuddleError, ItemFailure,
};

pub use models::{
    Calendar, CalendarStatus, DomainEvent, NewCalendar, NewNotification, Notification,
    NotificationStatus, Oauth2Authorization, PublishMessageRequest, ServiceType,
};

pub use services::{BoxFuture, MessageSink};
