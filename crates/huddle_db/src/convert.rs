use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::{Decode, Row, Type};

use crate::error::DbError;

/// Epoch seconds to UTC, rejecting out-of-range values.
pub(crate) fn from_epoch(secs: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| DbError::DecodeError(format!("timestamp out of range: {secs}")))
}

/// Typed column read with the column name in the error.
pub(crate) fn column<'r, T>(row: &'r AnyRow, name: &str) -> Result<T, DbError>
where
    T: Decode<'r, sqlx::Any> + Type<sqlx::Any>,
{
    row.try_get(name)
        .map_err(|e| DbError::DecodeError(format!("column {name}: {e}")))
}
