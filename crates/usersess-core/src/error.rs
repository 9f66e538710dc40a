//! Error types for usersess-core.

use thiserror::Error;

/// Result type alias using usersess-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for session tracking operations
#[derive(Error, Debug)]
pub enum Error {
    // Caller errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No session record is bound yet; call read or write first")]
    NotInitialized,

    // Relational store errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("Database not found. Set USERSESS_DATABASE_PATH or run `usersess init`.")]
    DatabaseNotFound,

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Session {0} was destroyed while its payload was being written")]
    DestroyedConcurrently(String),

    // Delegate payload engine errors
    #[error("Backend error ({engine}): {message}")]
    Backend { engine: String, message: String },

    #[error("Unknown session engine: {0}")]
    UnknownEngine(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an error reported by a delegate payload engine
    pub fn backend(engine: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Backend {
            engine: engine.into(),
            message: message.to_string(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if this error came from the relational store
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Self::Persistence(_) | Self::LockPoisoned | Self::DestroyedConcurrently(_)
        )
    }

    /// Check if this error came from the delegate payload engine
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }

    /// Check if this is a unique/primary key constraint violation
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            Self::Persistence(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == rusqlite::ErrorCode::ConstraintViolation
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::backend("files", "disk full");
        assert!(err.is_backend());
        assert!(err.to_string().contains("files"));
        assert!(err.to_string().contains("disk full"));

        let err = Error::invalid_argument("empty identifier");
        assert!(!err.is_backend());
        assert!(!err.is_persistence());
        assert!(err.to_string().contains("empty identifier"));
    }

    #[test]
    fn test_constraint_violation_detection() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (k TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: Error = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert!(err.is_persistence());
        assert!(err.is_constraint_violation());
    }
}
