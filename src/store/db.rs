// Pwvault - SQLite Database Management
//
// Opens the vault file, owns the schema bootstrap and the per-vault metadata
// (KDF salt, key check), and provides the retry wrapper every write goes
// through. Tables are only ever created here, never dropped.

use std::path::Path;
use std::time::Duration;

use backon::{BlockingRetryable, ExponentialBuilder};
use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use crate::config::StorageSettings;
use crate::crypto::{Cipher, CryptoError, LEGACY_SALT, SALT_LEN};

use super::StoreError;

pub const RESOURCES_TABLE: &str = "pw_resources";
pub const CREDENTIALS_TABLE: &str = "pw_passwords";
pub const META_TABLE: &str = "pw_meta";

const KDF_SALT_KEY: &str = "kdf_salt";
const KEY_CHECK_KEY: &str = "key_check";

/// Plaintext encrypted into `pw_meta.key_check` to recognise the vault key.
const KEY_CHECK_MARKER: &str = "pwvault-key-check-v1";

const SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS pw_resources (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL UNIQUE,
        created_at  TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS pw_passwords (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        resource_id INTEGER NOT NULL,
        username    TEXT NOT NULL,
        secret      TEXT NOT NULL,
        kind        TEXT NOT NULL DEFAULT 'web',
        created_at  TEXT NOT NULL,
        FOREIGN KEY(resource_id) REFERENCES pw_resources(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_passwords_resource
        ON pw_passwords(resource_id);

    CREATE TABLE IF NOT EXISTS pw_meta (
        key     TEXT PRIMARY KEY,
        value   TEXT NOT NULL
    );
";

/// Wrapper around the vault's SQLite connection.
pub struct Database {
    conn: Connection,
    settings: StorageSettings,
}

impl Database {
    /// Open (or create) the vault file at `path`. Tables are not created
    /// here; call [`Database::init_schema`] for that.
    pub fn open(path: &Path, settings: StorageSettings) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(settings.busy_timeout)?;
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        tracing::debug!(path = %path.display(), "Opened vault database");
        Ok(Self { conn, settings })
    }

    /// Open an in-memory database with the schema already in place.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let db = Self {
            conn,
            settings: StorageSettings::default(),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Get a reference to the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn settings(&self) -> &StorageSettings {
        &self.settings
    }

    /// Create missing tables and the per-vault salt. Safe to call any
    /// number of times; existing rows are left alone.
    pub fn init_schema(&self) -> Result<(), StoreError> {
        self.with_retry("init_schema", || {
            let tx = self.begin_immediate()?;
            tx.execute_batch(SCHEMA_SQL)
                .map_err(|e| StoreError::Schema(format!("failed to create tables: {}", e)))?;

            // A vault that already holds secrets but no salt was written with
            // the legacy constant; keep deriving the same key for it.
            let existing: i64 =
                tx.query_row("SELECT count(*) FROM pw_passwords", [], |row| row.get(0))?;
            let salt = if existing > 0 {
                LEGACY_SALT.to_vec()
            } else {
                let mut salt = vec![0u8; SALT_LEN];
                rand::rng().fill_bytes(&mut salt);
                salt
            };

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO pw_meta (key, value) VALUES (?1, ?2)",
                params![KDF_SALT_KEY, hex::encode(&salt)],
            )?;
            tx.commit()?;

            if inserted > 0 {
                tracing::info!("Generated KDF salt for new vault");
            }
            Ok(())
        })?;

        tracing::debug!("Vault schema is in place");
        Ok(())
    }

    /// Check whether a table exists in the vault.
    pub fn table_exists(&self, name: &str) -> Result<bool, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type='table' AND name=?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count == 1)
    }

    /// Fail with a schema error unless both data tables exist.
    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        for table in [RESOURCES_TABLE, CREDENTIALS_TABLE] {
            if !self.table_exists(table)? {
                return Err(StoreError::Schema(format!(
                    "table {} does not exist; run `pwvault init` first",
                    table
                )));
            }
        }
        Ok(())
    }

    /// The salt to derive this vault's key with.
    pub fn kdf_salt(&self) -> Result<Vec<u8>, StoreError> {
        match self.meta_value(KDF_SALT_KEY)? {
            Some(encoded) => hex::decode(&encoded).map_err(|e| {
                StoreError::Schema(format!("stored KDF salt is not valid hex: {}", e))
            }),
            None => Ok(LEGACY_SALT.to_vec()),
        }
    }

    /// Confirm `cipher` holds this vault's key. Read-only: a vault with no
    /// key check is verified against its first stored secret, and a vault
    /// with neither accepts any key until a secret is written.
    pub fn verify_key(&self, cipher: &Cipher) -> Result<(), StoreError> {
        if !self.table_exists(META_TABLE)? {
            return Err(StoreError::Schema(format!(
                "table {} does not exist; run `pwvault init` first",
                META_TABLE
            )));
        }
        Self::check_key(&self.conn, cipher)
    }

    /// Record the key check inside the transaction that writes a secret, so
    /// only a key that actually encrypted data becomes the vault's key.
    /// Re-checks under the write lock in case another writer got there first.
    pub fn record_key_check(tx: &Transaction<'_>, cipher: &Cipher) -> Result<(), StoreError> {
        Self::check_key(tx, cipher)?;
        if Self::read_meta(tx, KEY_CHECK_KEY)?.is_some() {
            return Ok(());
        }

        let blob = cipher.encrypt(KEY_CHECK_MARKER)?;
        tx.execute(
            "INSERT INTO pw_meta (key, value) VALUES (?1, ?2)",
            params![KEY_CHECK_KEY, blob],
        )?;
        tracing::info!("Recorded key check for vault");
        Ok(())
    }

    fn check_key(conn: &Connection, cipher: &Cipher) -> Result<(), StoreError> {
        if let Some(check) = Self::read_meta(conn, KEY_CHECK_KEY)? {
            return Self::match_key_check(cipher, &check);
        }

        let sample: Option<String> = conn
            .query_row("SELECT secret FROM pw_passwords ORDER BY id LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        if let Some(blob) = sample {
            cipher
                .decrypt(&blob)
                .map_err(|_| StoreError::Crypto(CryptoError::WrongPassphrase))?;
        }
        Ok(())
    }

    fn match_key_check(cipher: &Cipher, check: &str) -> Result<(), StoreError> {
        match cipher.decrypt(check) {
            Ok(marker) if marker.as_str() == KEY_CHECK_MARKER => Ok(()),
            _ => Err(StoreError::Crypto(CryptoError::WrongPassphrase)),
        }
    }

    fn read_meta(conn: &Connection, key: &str) -> Result<Option<String>, StoreError> {
        Ok(conn
            .query_row(
                "SELECT value FROM pw_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn meta_value(&self, key: &str) -> Result<Option<String>, StoreError> {
        if !self.table_exists(META_TABLE)? {
            return Ok(None);
        }
        Self::read_meta(&self.conn, key)
    }

    /// Start a write transaction that takes the database write lock up
    /// front, so lookup-then-insert sequences cannot interleave.
    pub fn begin_immediate(&self) -> Result<Transaction<'_>, StoreError> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    /// Run `op`, retrying on lock contention with bounded exponential
    /// backoff. Exhaustion becomes [`StoreError::Busy`].
    pub fn with_retry<T, F>(&self, op: &str, mut f: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Result<T, StoreError>,
    {
        let policy = ExponentialBuilder::default()
            .with_min_delay(self.settings.retry_min_delay)
            .with_max_delay(self.settings.retry_max_delay)
            .with_max_times(self.settings.max_retries)
            .with_jitter();

        let mut attempts = 0usize;
        let result = (|| {
            attempts += 1;
            f()
        })
        .retry(policy)
        .sleep(std::thread::sleep)
        .when(StoreError::is_busy)
        .notify(|err: &StoreError, delay: Duration| {
            tracing::warn!(op, error = %err, ?delay, "Vault is locked, retrying");
        })
        .call();

        match result {
            Err(e) if e.is_busy() => {
                tracing::warn!(op, attempts, "Giving up on locked vault");
                Err(StoreError::Busy { attempts })
            }
            other => other,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
