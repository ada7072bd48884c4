//! Database integration for Huddle
//!
//! This crate provides a database client that is designed to be database agnostic,
//! using SQLx's `Any` driver as the underlying database library. SQLite and
//! PostgreSQL are supported through feature flags.
//!
//! # Features
//!
//! - Connection pooling through [`DbClient`]
//! - Integration with the Huddle configuration system
//! - Repositories for OAuth2 authorizations, calendars and notifications
//!
//! Timestamps are stored as UTC epoch seconds because `DateTime<Utc>` does not
//! decode through the `Any` driver.
//!
//! # Example
//!
//! ```rust,no_run
//! use huddle_db::{DbClient, SqlTokenStore, TokenStore};
//!
//! async fn setup_db() -> Result<SqlTokenStore, Box<dyn std::error::Error>> {
//!     let db_client = DbClient::from_url("sqlite::memory:").await?;
//!     let store = SqlTokenStore::new(db_client);
//!     store.init_schema().await?;
//!     Ok(store)
//! }
//! ```

pub mod client;
pub mod error;
pub mod repositories;

mod convert;

// Re-export the client and error for ease of use
pub use client::{DbBackend, DbClient};
pub use error::DbError;

// Re-export the repositories module components for ease of use
pub use repositories::{
    init_schemas, CalendarRepository, MarkReadOutcome, NotificationRepository,
    SqlCalendarRepository, SqlNotificationRepository, SqlTokenStore, TokenStore,
};
