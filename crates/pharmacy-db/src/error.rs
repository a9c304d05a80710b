//! # Database Errors
//!
//! `sqlx` failures are sorted into [`DbError`] as close to the SQL as
//! possible, so callers match on what went wrong instead of parsing text.
//!
//! ```text
//! sqlx::Error ──► DbError ──┬──► StoreError   (engine ports: retry or not)
//!                           └──► ApiError     (HTTP status and code)
//! ```

use thiserror::Error;

use pharmacy_core::{CoreError, ValidationError};

#[derive(Debug, Error)]
pub enum DbError {
    /// No row with that id, including rows deleted under us.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A second payment for one order, or the same drug twice on an order.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Dangling or still-referenced row, e.g. deleting a patient with orders.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    #[error("Constraint violation: {message}")]
    CheckViolation { message: String },

    /// The write disagrees with the row's current state, e.g. refunding a
    /// payment that is not completed.
    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Invalid input: {0}")]
    Invalid(#[from] ValidationError),

    #[error("Domain error: {0}")]
    Domain(#[from] CoreError),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Lock contention or a transaction that could not commit.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl ToString) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        DbError::Conflict {
            message: message.into(),
        }
    }

    /// Whether the same call could succeed if simply repeated.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DbError::PoolExhausted
                | DbError::ConnectionFailed(_)
                | DbError::TransactionFailed(_)
                | DbError::Internal(_)
        )
    }

    /// Sorts a SQLite error message by the constraint it names.
    fn from_sqlite_message(msg: &str) -> Self {
        const UNIQUE: &str = "UNIQUE constraint failed: ";

        if let Some(columns) = msg.strip_prefix(UNIQUE) {
            return DbError::UniqueViolation {
                field: columns.to_string(),
                value: "unknown".to_string(),
            };
        }
        if msg.starts_with("FOREIGN KEY constraint failed") {
            return DbError::ForeignKeyViolation {
                message: msg.to_string(),
            };
        }
        if msg.starts_with("CHECK constraint failed") {
            return DbError::CheckViolation {
                message: msg.to_string(),
            };
        }
        if msg.contains("database is locked") || msg.contains("database is busy") {
            return DbError::TransactionFailed(msg.to_string());
        }
        DbError::QueryFailed(msg.to_string())
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => DbError::from_sqlite_message(db_err.message()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            sqlx::Error::Io(io) => DbError::ConnectionFailed(io.to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DbError::PoolExhausted.is_transient());
        assert!(DbError::ConnectionFailed("closed".into()).is_transient());
        assert!(!DbError::not_found("Drug", 4).is_transient());
        assert!(!DbError::conflict("order is cancelled").is_transient());
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(DbError::not_found("Patient", 12).to_string(), "Patient not found: 12");
    }

    #[test]
    fn test_sqlite_messages_are_sorted_by_constraint() {
        assert!(matches!(
            DbError::from_sqlite_message("UNIQUE constraint failed: payments.order_id"),
            DbError::UniqueViolation { ref field, .. } if field == "payments.order_id"
        ));
        assert!(matches!(
            DbError::from_sqlite_message("FOREIGN KEY constraint failed"),
            DbError::ForeignKeyViolation { .. }
        ));
        assert!(matches!(
            DbError::from_sqlite_message("CHECK constraint failed: stock >= 0"),
            DbError::CheckViolation { .. }
        ));
        assert!(DbError::from_sqlite_message("database is locked").is_transient());
        assert!(matches!(
            DbError::from_sqlite_message("no such table: drugs"),
            DbError::QueryFailed(_)
        ));
    }
}
