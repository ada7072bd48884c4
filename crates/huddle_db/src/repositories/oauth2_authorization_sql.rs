//! SQL implementation of the token store

use crate::convert::{column, from_epoch};
use crate::error::DbError;
use crate::repositories::oauth2_authorization::TokenStore;
use crate::DbClient;
use chrono::{DateTime, Utc};
use huddle_common::{Oauth2Authorization, ServiceType};
use sqlx::any::AnyRow;
use tracing::{debug, error, info};

const COLUMNS: &str =
    "member_id, service_type, access_token, refresh_token, expiry_time, scope, updated_at";

/// SQL implementation of [`TokenStore`]
#[derive(Debug, Clone)]
pub struct SqlTokenStore {
    db_client: DbClient,
}

impl SqlTokenStore {
    /// Create a new SQL token store
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    fn map_row(row: &AnyRow) -> Result<Oauth2Authorization, DbError> {
        let service_type: String = column(row, "service_type")?;
        Ok(Oauth2Authorization {
            member_id: column(row, "member_id")?,
            service_type: service_type
                .parse::<ServiceType>()
                .map_err(|e| DbError::DecodeError(e.to_string()))?,
            access_token: column(row, "access_token")?,
            refresh_token: column(row, "refresh_token")?,
            expiry_time: from_epoch(column(row, "expiry_time")?)?,
            scope: column(row, "scope")?,
            updated_at: from_epoch(column(row, "updated_at")?)?,
        })
    }
}

impl TokenStore for SqlTokenStore {
    async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing oauth2 authorization schema");

        // The composite primary key enforces one record per (member, service type)
        let query = r#"
            CREATE TABLE IF NOT EXISTS oauth2_authorizations (
                member_id BIGINT NOT NULL,
                service_type TEXT NOT NULL,
                access_token TEXT NOT NULL,
                refresh_token TEXT,
                expiry_time BIGINT NOT NULL,
                scope TEXT,
                updated_at BIGINT NOT NULL,
                PRIMARY KEY (member_id, service_type)
            )
        "#;

        self.db_client.execute(query).await?;

        info!("OAuth2 authorization schema initialized successfully");
        Ok(())
    }

    async fn find(
        &self,
        member_id: i64,
        service_type: ServiceType,
    ) -> Result<Option<Oauth2Authorization>, DbError> {
        debug!(
            "Finding authorization for member: {} and service: {}",
            member_id, service_type
        );

        let query = format!(
            "SELECT {COLUMNS} FROM oauth2_authorizations WHERE member_id = $1 AND service_type = $2"
        );

        let result = sqlx::query(&query)
            .bind(member_id)
            .bind(service_type.as_str())
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to find authorization: {}", e);
                DbError::from_query(e)
            })?;

        result.as_ref().map(Self::map_row).transpose()
    }

    async fn save(
        &self,
        authorization: &Oauth2Authorization,
    ) -> Result<Oauth2Authorization, DbError> {
        debug!(
            "Saving authorization for member: {} and service: {}",
            authorization.member_id, authorization.service_type
        );

        // Single statement: readers never see a new access token with an old expiry
        let query = format!(
            r#"
            INSERT INTO oauth2_authorizations ({COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (member_id, service_type) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = COALESCE(excluded.refresh_token, oauth2_authorizations.refresh_token),
                expiry_time = excluded.expiry_time,
                scope = COALESCE(excluded.scope, oauth2_authorizations.scope),
                updated_at = excluded.updated_at
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(authorization.member_id)
            .bind(authorization.service_type.as_str())
            .bind(&authorization.access_token)
            .bind(authorization.refresh_token.clone())
            .bind(authorization.expiry_time.timestamp())
            .bind(authorization.scope.clone())
            .bind(authorization.updated_at.timestamp())
            .fetch_one(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to save authorization: {}", e);
                DbError::from_query(e)
            })?;

        let saved = Self::map_row(&row)?;
        info!(
            "Authorization saved for member: {} ({}), expires {}",
            saved.member_id, saved.service_type, saved.expiry_time
        );
        Ok(saved)
    }

    async fn list_expiring(
        &self,
        before: DateTime<Utc>,
    ) -> Result<Vec<Oauth2Authorization>, DbError> {
        debug!("Listing authorizations expiring before {}", before);

        let query = format!(
            "SELECT {COLUMNS} FROM oauth2_authorizations WHERE expiry_time < $1 ORDER BY expiry_time ASC"
        );

        let rows = sqlx::query(&query)
            .bind(before.timestamp())
            .fetch_all(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to list expiring authorizations: {}", e);
                DbError::from_query(e)
            })?;

        rows.iter().map(Self::map_row).collect()
    }
}
