//! Mapping of `sqlx` failures onto [`StoreError`].

use tourbook_core::store::StoreError;

/// SQLSTATEs raised when a transaction loses a lock race.
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Unique violation.
pub(crate) const UNIQUE_VIOLATION: &str = "23505";

/// Constraint guarding booking references.
pub(crate) const REFERENCE_CONSTRAINT: &str = "bookings_reference_key";

/// Converts a database error, classifying lock races as contention.
pub(crate) fn db_error(context: &str, err: &sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = err {
        if matches!(
            db.code().as_deref(),
            Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED | LOCK_NOT_AVAILABLE)
        ) {
            tracing::debug!(code = ?db.code(), context, "Lock race lost");
            return StoreError::Contention(format!("{context}: {}", db.message()));
        }
    }
    tracing::error!(error = %err, context, "Database error");
    StoreError::Database(format!("{context}: {err}"))
}

/// Whether `err` is a unique violation of `constraint`.
pub(crate) fn violates(err: &sqlx::Error, constraint: &str) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db)
            if db.code().as_deref() == Some(UNIQUE_VIOLATION) && db.constraint() == Some(constraint)
    )
}

/// Converts a stored integer that must fit `u32`.
pub(crate) fn to_u32(column: &str, value: i32) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Database(format!("negative value in {column}: {value}")))
}

/// Converts a count into an `INTEGER` column value.
pub(crate) fn to_i32(column: &str, value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Database(format!("{column} out of range: {value}")))
}

/// Converts an amount into a `BIGINT` column value.
pub(crate) fn to_i64(column: &str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Database(format!("{column} out of range: {value}")))
}

/// Converts a stored amount.
pub(crate) fn to_u64(column: &str, value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Database(format!("negative value in {column}: {value}")))
}
