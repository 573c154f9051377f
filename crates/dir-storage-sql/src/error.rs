//! SQL storage error types.

use dir_storage::StorageError;
use sqlx::Error as SqlxError;

/// `PostgreSQL` unique constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Converts a `SQLx` error to a storage error.
#[allow(clippy::needless_pass_by_value)]
pub fn from_sqlx_error(err: SqlxError) -> StorageError {
    match err {
        SqlxError::RowNotFound => StorageError::Internal("Row not found".to_string()),
        SqlxError::Database(db_err) => {
            if db_err.code().is_some_and(|c| c == UNIQUE_VIOLATION) {
                StorageError::duplicate(
                    db_err.constraint().unwrap_or("unknown"),
                    db_err.message(),
                )
            } else {
                StorageError::Query(db_err.to_string())
            }
        }
        SqlxError::ColumnDecode { .. } | SqlxError::Decode(_) => {
            StorageError::Serialization(err.to_string())
        }
        SqlxError::PoolTimedOut => StorageError::Connection("Connection pool timeout".to_string()),
        SqlxError::PoolClosed => StorageError::Connection("Connection pool closed".to_string()),
        _ => StorageError::Internal(err.to_string()),
    }
}
