// Pwvault - Top-level error types
//
// Aggregates errors from the config, crypto and store modules into a single
// error enum for the application boundary.

use thiserror::Error;

/// Top-level error type for all vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] crate::crypto::CryptoError),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VaultError>;
