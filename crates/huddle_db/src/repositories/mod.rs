//! Repository modules for database access
//!
//! Each repository is a trait describing the storage contract plus a SQL
//! implementation over [`DbClient`](crate::DbClient).

pub mod calendar;
pub mod calendar_sql;
pub mod notification;
pub mod notification_sql;
pub mod oauth2_authorization;
pub mod oauth2_authorization_sql;

pub use calendar::CalendarRepository;
pub use calendar_sql::SqlCalendarRepository;
pub use notification::{MarkReadOutcome, NotificationRepository};
pub use notification_sql::SqlNotificationRepository;
pub use oauth2_authorization::TokenStore;
pub use oauth2_authorization_sql::SqlTokenStore;

use crate::{DbClient, DbError};

/// Creates every table used by Huddle if it does not exist yet.
pub async fn init_schemas(db_client: &DbClient) -> Result<(), DbError> {
    SqlTokenStore::new(db_client.clone()).init_schema().await?;
    SqlCalendarRepository::new(db_client.clone()).init_schema().await?;
    SqlNotificationRepository::new(db_client.clone()).init_schema().await?;
    Ok(())
}
