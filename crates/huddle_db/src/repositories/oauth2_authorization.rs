//! Storage contract for OAuth2 authorizations
//!
//! One record per (member, service type). Absence is an expected state: the
//! member simply never authorized the service.

use crate::error::DbError;
use chrono::{DateTime, Utc};
use huddle_common::{Oauth2Authorization, ServiceType};

/// Persists OAuth2 access/refresh tokens per (member, service type) pair.
pub trait TokenStore: Send + Sync {
    /// Initialize the database schema
    ///
    /// Creates the `oauth2_authorizations` table if it doesn't already exist.
    fn init_schema(&self) -> impl std::future::Future<Output = Result<(), DbError>> + Send;

    /// Find the authorization for a member and service type
    ///
    /// # Returns
    ///
    /// The authorization if found, or None if the member never authorized
    fn find(
        &self,
        member_id: i64,
        service_type: ServiceType,
    ) -> impl std::future::Future<Output = Result<Option<Oauth2Authorization>, DbError>> + Send;

    /// Insert or replace the record for the authorization's key
    ///
    /// Access token, expiry and refresh token are written by one statement.
    /// A `None` refresh token or scope keeps the stored value.
    ///
    /// # Returns
    ///
    /// The record as stored after the write
    fn save(
        &self,
        authorization: &Oauth2Authorization,
    ) -> impl std::future::Future<Output = Result<Oauth2Authorization, DbError>> + Send;

    /// List records whose expiry is before `before`, soonest first
    fn list_expiring(
        &self,
        before: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<Oauth2Authorization>, DbError>> + Send;
}
