// --- File: crates/huddle_notifications/src/lib.rs ---
//! In-app notifications for Huddle.
//!
//! [`NotificationWriter`] stores notifications and moves them from UNREAD to
//! READ. [`NotificationSink`] plugs the writer into the event publisher, and
//! [`ConnectionRegistry`] fans freshly recorded notifications out to open
//! server-sent event streams.

pub mod handlers;
pub mod registry;
pub mod routes;
pub mod sink;
pub mod writer;

#[cfg(test)]
mod registry_test;

pub use handlers::NotificationState;
pub use registry::{ConnectionHandle, ConnectionRegistry, Subscription};
pub use sink::NotificationSink;
pub use writer::NotificationWriter;
