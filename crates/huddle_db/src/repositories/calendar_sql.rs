//! SQL implementation of the calendar repository

use crate::convert::{column, from_epoch};
use crate::error::DbError;
use crate::repositories::calendar::CalendarRepository;
use crate::DbClient;
use chrono::{DateTime, Utc};
use huddle_common::{Calendar, CalendarStatus, NewCalendar};
use sqlx::any::AnyRow;
use tracing::{debug, error, info};

const COLUMNS: &str = "calendar_id, owner_id, external_id, title, code, timezone, status, created_on";

#[derive(Debug, Clone)]
pub struct SqlCalendarRepository {
    db_client: DbClient,
}

impl SqlCalendarRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    fn map_row(row: &AnyRow) -> Result<Calendar, DbError> {
        let status: String = column(row, "status")?;
        Ok(Calendar {
            calendar_id: column(row, "calendar_id")?,
            owner_id: column(row, "owner_id")?,
            external_id: column(row, "external_id")?,
            title: column(row, "title")?,
            code: column(row, "code")?,
            timezone: column(row, "timezone")?,
            status: status
                .parse::<CalendarStatus>()
                .map_err(|e| DbError::DecodeError(e.to_string()))?,
            created_on: from_epoch(column(row, "created_on")?)?,
        })
    }

    async fn fetch_one_by(&self, filter: &str, value: CalendarKey<'_>) -> Result<Option<Calendar>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM calendars WHERE {filter} = $1");
        let query = sqlx::query(&query);
        let query = match value {
            CalendarKey::Id(id) => query.bind(id),
            CalendarKey::Code(code) => query.bind(code),
        };

        let row = query
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to find calendar by {}: {}", filter, e);
                DbError::from_query(e)
            })?;

        row.as_ref().map(Self::map_row).transpose()
    }
}

enum CalendarKey<'a> {
    Id(i64),
    Code(&'a str),
}

impl CalendarRepository for SqlCalendarRepository {
    async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing calendar schema");

        let query = format!(
            r#"
            CREATE TABLE IF NOT EXISTS calendars (
                calendar_id {},
                owner_id BIGINT NOT NULL,
                external_id TEXT NOT NULL,
                title TEXT NOT NULL,
                code TEXT NOT NULL UNIQUE,
                timezone TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'ACTIVE',
                created_on BIGINT NOT NULL
            )
            "#,
            self.db_client.backend().id_column()
        );
        self.db_client.execute(&query).await?;

        info!("Calendar schema initialized successfully");
        Ok(())
    }

    async fn insert(
        &self,
        calendar: &NewCalendar,
        created_on: DateTime<Utc>,
    ) -> Result<Calendar, DbError> {
        debug!(
            "Inserting calendar {} (external {}) for owner {}",
            calendar.code, calendar.external_id, calendar.owner_id
        );

        let query = format!(
            r#"
            INSERT INTO calendars (owner_id, external_id, title, code, timezone, status, created_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(calendar.owner_id)
            .bind(&calendar.external_id)
            .bind(&calendar.title)
            .bind(&calendar.code)
            .bind(&calendar.timezone)
            .bind(CalendarStatus::Active.as_str())
            .bind(created_on.timestamp())
            .fetch_one(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to insert calendar: {}", e);
                DbError::from_query(e)
            })?;

        Self::map_row(&row)
    }

    async fn find(&self, calendar_id: i64) -> Result<Option<Calendar>, DbError> {
        self.fetch_one_by("calendar_id", CalendarKey::Id(calendar_id))
            .await
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Calendar>, DbError> {
        self.fetch_one_by("code", CalendarKey::Code(code)).await
    }

    async fn set_status(&self, calendar_id: i64, status: CalendarStatus) -> Result<bool, DbError> {
        debug!("Setting calendar {} status to {}", calendar_id, status.as_str());

        let result = sqlx::query("UPDATE calendars SET status = $1 WHERE calendar_id = $2")
            .bind(status.as_str())
            .bind(calendar_id)
            .execute(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to update calendar status: {}", e);
                DbError::from_query(e)
            })?;

        Ok(result.rows_affected() > 0)
    }
}
