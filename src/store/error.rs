// Pwvault - Store error types

use rusqlite::ErrorCode;
use thiserror::Error;

use crate::crypto::CryptoError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Invalid resource name: {0:?}")]
    InvalidName(String),

    #[error("This operation needs the vault key; open the store with a passphrase")]
    KeyRequired,

    #[error("Database stayed locked after {attempts} attempts")]
    Busy { attempts: usize },
}

impl StoreError {
    /// True for SQLite lock contention, which is worth retrying.
    pub fn is_busy(&self) -> bool {
        match self {
            StoreError::Storage(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: i32) -> StoreError {
        StoreError::Storage(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(code),
            None,
        ))
    }

    #[test]
    fn test_busy_and_locked_are_retryable() {
        assert!(sqlite_failure(rusqlite::ffi::SQLITE_BUSY).is_busy());
        assert!(sqlite_failure(rusqlite::ffi::SQLITE_LOCKED).is_busy());
    }

    #[test]
    fn test_other_errors_are_not_retryable() {
        assert!(!sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT).is_busy());
        assert!(!StoreError::NotFound("x".into()).is_busy());
        assert!(!StoreError::Busy { attempts: 3 }.is_busy());
    }
}
