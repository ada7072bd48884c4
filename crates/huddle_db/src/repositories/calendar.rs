//! Storage contract for calendars mirrored from the external provider

use crate::error::DbError;
use chrono::{DateTime, Utc};
use huddle_common::{Calendar, CalendarStatus, NewCalendar};

/// Repository for calendars
pub trait CalendarRepository: Send + Sync {
    /// Creates the `calendars` table if it doesn't already exist.
    fn init_schema(&self) -> impl std::future::Future<Output = Result<(), DbError>> + Send;

    /// Persist a calendar as ACTIVE
    ///
    /// # Errors
    ///
    /// `DbError::UniqueViolation` when the code is already taken
    fn insert(
        &self,
        calendar: &NewCalendar,
        created_on: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Calendar, DbError>> + Send;

    fn find(
        &self,
        calendar_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<Calendar>, DbError>> + Send;

    fn find_by_code(
        &self,
        code: &str,
    ) -> impl std::future::Future<Output = Result<Option<Calendar>, DbError>> + Send;

    /// # Returns
    ///
    /// `false` when no calendar has that id
    fn set_status(
        &self,
        calendar_id: i64,
        status: CalendarStatus,
    ) -> impl std::future::Future<Output = Result<bool, DbError>> + Send;
}
