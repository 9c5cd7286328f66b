// Pwvault - Runtime configuration
//
// Resolved once per process from CLI flags and environment. Holds the
// storage location, the optional passphrase and the tuning knobs for key
// derivation and lock-contention handling.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use zeroize::Zeroizing;

use crate::crypto::KdfParams;

/// Environment variable consulted for the vault path.
pub const DB_ENV: &str = "PWVAULT_DB";

/// Environment variable consulted for the passphrase.
pub const PASSPHRASE_ENV: &str = "PWVAULT_PASSPHRASE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No passphrase given: pass --passphrase or set PWVAULT_PASSPHRASE")]
    MissingPassphrase,

    #[error("Unusable storage location {0}: {1}")]
    StorageLocation(PathBuf, String),
}

/// SQLite lock handling: how long a single statement waits on a busy
/// database, and how often a whole transaction is retried afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageSettings {
    pub busy_timeout: Duration,
    pub max_retries: usize,
    pub retry_min_delay: Duration,
    pub retry_max_delay: Duration,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            max_retries: 3,
            retry_min_delay: Duration::from_millis(50),
            retry_max_delay: Duration::from_secs(1),
        }
    }
}

/// Everything a command needs before it touches storage.
pub struct VaultConfig {
    pub db_path: PathBuf,
    passphrase: Option<Zeroizing<String>>,
    pub kdf: KdfParams,
    pub storage: StorageSettings,
}

impl VaultConfig {
    pub fn new(db_path: Option<PathBuf>, passphrase: Option<String>) -> Self {
        Self {
            db_path: db_path.unwrap_or_else(default_db_path),
            passphrase: passphrase.map(Zeroizing::new),
            kdf: KdfParams::default(),
            storage: StorageSettings::default(),
        }
    }

    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn with_storage(mut self, storage: StorageSettings) -> Self {
        self.storage = storage;
        self
    }

    /// The passphrase, or `MissingPassphrase` when absent or empty.
    pub fn require_passphrase(&self) -> Result<&str, ConfigError> {
        match self.passphrase.as_deref() {
            Some(p) if !p.is_empty() => Ok(p.as_str()),
            _ => Err(ConfigError::MissingPassphrase),
        }
    }

    /// Create the parent directory of the vault file if needed.
    pub fn ensure_parent_dir(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ConfigError::StorageLocation(parent.to_path_buf(), e.to_string())
                })?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("db_path", &self.db_path)
            .field(
                "passphrase",
                &self.passphrase.as_ref().map(|_| "[REDACTED]"),
            )
            .field("kdf", &self.kdf)
            .field("storage", &self.storage)
            .finish()
    }
}

/// `<data dir>/pwvault/store.db`, falling back to the working directory.
pub fn default_db_path() -> PathBuf {
    dirs_next::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pwvault")
        .join("store.db")
}

// ─── Tests ───────────────────────────────────────────────────────────────────
