//! Error types for the persistence subsystem.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// Requested identity was not found.
    #[error("identity not found: {0}")]
    IdentityNotFound(i64),

    /// Requested poll was not found.
    #[error("poll not found: {0}")]
    PollNotFound(String),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_error_display() {
        let err = StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows);
        assert!(err.to_string().contains("sqlite error"));
    }

    #[test]
    fn migration_error_display() {
        let err = StoreError::Migration {
            message: "v001 failed: syntax error".into(),
        };
        assert_eq!(err.to_string(), "migration error: v001 failed: syntax error");
    }

    #[test]
    fn identity_not_found_display() {
        let err = StoreError::IdentityNotFound(9);
        assert_eq!(err.to_string(), "identity not found: 9");
    }

    #[test]
    fn poll_not_found_display() {
        let err = StoreError::PollNotFound("poll_x".into());
        assert_eq!(err.to_string(), "poll not found: poll_x");
    }

    #[test]
    fn from_rusqlite_error() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::Sqlite(_)));
    }
}
