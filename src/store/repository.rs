// Pwvault - Vault Store Repository
//
// CRUD over resources and credentials. Secrets are encrypted before they
// reach SQL and decrypted on the way out; the key is injected at
// construction and never stored. Every write runs in one IMMEDIATE
// transaction so find-or-create and cascading delete are atomic.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Transaction};

use crate::crypto::{Cipher, DerivedKey};

use super::db::Database;
use super::models::{
    CredentialEntry, CredentialRow, IntegrityReport, NewCredential, Resource, ResourceFilter,
    SecretValue,
};
use super::StoreError;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Operations the CLI (or any other front end) runs against a vault.
pub trait VaultStore {
    /// All resources, ordered by id.
    fn list_resources(&self) -> Result<Vec<Resource>, StoreError>;

    /// Return the id for `identifier`. Numeric identifiers must already
    /// exist; names are matched exactly and created on first use.
    fn resolve_or_create_resource(&self, identifier: &str) -> Result<i64, StoreError>;

    /// Encrypt and attach a credential to an existing resource.
    fn add_credential(
        &self,
        resource_id: i64,
        credential: &NewCredential,
    ) -> Result<i64, StoreError>;

    /// Resolve-or-create `identifier` and attach the credential in one
    /// transaction. Returns `(resource_id, credential_id)`.
    fn store_credential(
        &self,
        identifier: &str,
        credential: &NewCredential,
    ) -> Result<(i64, i64), StoreError>;

    /// Resources joined with their decrypted credentials, ordered by
    /// resource name. Undecryptable secrets are flagged per row.
    fn list_credentials(
        &self,
        filter: Option<&ResourceFilter>,
    ) -> Result<Vec<CredentialRow>, StoreError>;

    /// Delete a resource and all of its credentials. Returns how many
    /// credentials went with it.
    fn remove_resource(&self, id: i64) -> Result<usize, StoreError>;

    /// Delete a single credential.
    fn remove_credential(&self, id: i64) -> Result<(), StoreError>;

    /// Fail with an integrity error if any credential is orphaned.
    fn verify_integrity(&self) -> Result<IntegrityReport, StoreError>;
}

// ─── SQLite Implementation ──────────────────────────────────────────────────

pub struct SqliteVaultStore<'a> {
    db: &'a Database,
    cipher: Option<Cipher>,
}

/// A joined row before its secret is decrypted.
struct RawRow {
    resource_id: i64,
    resource_name: String,
    credential_id: Option<i64>,
    username: Option<String>,
    secret: Option<String>,
    kind: Option<String>,
    created_at: Option<String>,
}

impl<'a> SqliteVaultStore<'a> {
    /// Store without a key: resource listing and removals only.
    pub fn open(db: &'a Database) -> Result<Self, StoreError> {
        db.ensure_schema()?;
        Ok(Self { db, cipher: None })
    }

    /// Store that can encrypt and decrypt secrets with `key`. Fails with
    /// `WrongPassphrase` if the vault already holds secrets under a
    /// different key. Opening never writes; the key is pinned by the first
    /// stored secret.
    pub fn open_with_key(db: &'a Database, key: &DerivedKey) -> Result<Self, StoreError> {
        db.ensure_schema()?;
        let cipher = Cipher::new(key)?;
        db.verify_key(&cipher)?;
        Ok(Self {
            db,
            cipher: Some(cipher),
        })
    }

    fn cipher(&self) -> Result<&Cipher, StoreError> {
        self.cipher.as_ref().ok_or(StoreError::KeyRequired)
    }

    fn parse_timestamp(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn resource_exists(tx: &Transaction<'_>, id: i64) -> Result<bool, StoreError> {
        let found: Option<i64> = tx
            .query_row(
                "SELECT id FROM pw_resources WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Lookup-then-insert, run inside the caller's transaction.
    fn resolve_in_tx(tx: &Transaction<'_>, identifier: &str) -> Result<i64, StoreError> {
        match ResourceFilter::parse(identifier)? {
            ResourceFilter::Id(id) => {
                if Self::resource_exists(tx, id)? {
                    Ok(id)
                } else {
                    Err(StoreError::NotFound(format!("resource id {}", id)))
                }
            }
            ResourceFilter::Name(name) => {
                let existing: Option<i64> = tx
                    .query_row(
                        "SELECT id FROM pw_resources WHERE name = ?1",
                        params![name],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(id) = existing {
                    return Ok(id);
                }

                tx.execute(
                    "INSERT INTO pw_resources (name, created_at) VALUES (?1, ?2)",
                    params![name, Utc::now().to_rfc3339()],
                )?;
                let id = tx.last_insert_rowid();
                tracing::info!(resource_id = id, resource = %name, "Resource created");
                Ok(id)
            }
        }
    }

    fn insert_credential_in_tx(
        tx: &Transaction<'_>,
        cipher: &Cipher,
        resource_id: i64,
        credential: &NewCredential,
        encrypted: &str,
    ) -> Result<i64, StoreError> {
        if !Self::resource_exists(tx, resource_id)? {
            return Err(StoreError::Integrity(format!(
                "resource {} does not exist",
                resource_id
            )));
        }
        Database::record_key_check(tx, cipher)?;

        tx.execute(
            "INSERT INTO pw_passwords (resource_id, username, secret, kind, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                resource_id,
                credential.username,
                encrypted,
                credential.kind,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(tx.last_insert_rowid())
    }

    fn lookup_filter(&self, filter: &ResourceFilter) -> Result<(), StoreError> {
        let found: Option<i64> = match filter {
            ResourceFilter::Id(id) => self
                .db
                .conn()
                .query_row(
                    "SELECT id FROM pw_resources WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?,
            ResourceFilter::Name(name) => self
                .db
                .conn()
                .query_row(
                    "SELECT id FROM pw_resources WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?,
        };
        match found {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(filter.to_string())),
        }
    }

    fn decrypt_row(cipher: &Cipher, raw: RawRow) -> CredentialRow {
        let credential = match (raw.credential_id, raw.username, raw.secret) {
            (Some(id), Some(username), Some(blob)) => {
                let secret = match cipher.decrypt(&blob) {
                    Ok(plain) => SecretValue::Revealed {
                        value: plain.as_str().to_owned(),
                    },
                    Err(e) => {
                        tracing::warn!(
                            credential_id = id,
                            resource = %raw.resource_name,
                            error = %e,
                            "Could not decrypt credential"
                        );
                        SecretValue::Undecryptable {
                            reason: e.to_string(),
                        }
                    }
                };
                Some(CredentialEntry {
                    id,
                    username,
                    secret,
                    kind: raw.kind.unwrap_or_default(),
                    created_at: raw
                        .created_at
                        .as_deref()
                        .map(Self::parse_timestamp)
                        .unwrap_or_else(Utc::now),
                })
            }
            _ => None,
        };

        CredentialRow {
            resource_id: raw.resource_id,
            resource_name: raw.resource_name,
            credential,
        }
    }
}

impl<'a> VaultStore for SqliteVaultStore<'a> {
    fn list_resources(&self) -> Result<Vec<Resource>, StoreError> {
        let mut stmt = self
            .db
            .conn()
            .prepare("SELECT id, name, created_at FROM pw_resources ORDER BY id ASC")?;

        let rows = stmt.query_map([], |row| {
            let created_at: String = row.get(2)?;
            Ok(Resource {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: Self::parse_timestamp(&created_at),
            })
        })?;

        let mut resources = Vec::new();
        for row in rows {
            resources.push(row?);
        }
        Ok(resources)
    }

    fn resolve_or_create_resource(&self, identifier: &str) -> Result<i64, StoreError> {
        self.db.with_retry("resolve_or_create_resource", || {
            let tx = self.db.begin_immediate()?;
            let id = Self::resolve_in_tx(&tx, identifier)?;
            tx.commit()?;
            Ok(id)
        })
    }

    fn add_credential(
        &self,
        resource_id: i64,
        credential: &NewCredential,
    ) -> Result<i64, StoreError> {
        let cipher = self.cipher()?;
        let encrypted = cipher.encrypt(credential.secret())?;

        let id = self.db.with_retry("add_credential", || {
            let tx = self.db.begin_immediate()?;
            let id =
                Self::insert_credential_in_tx(&tx, cipher, resource_id, credential, &encrypted)?;
            tx.commit()?;
            Ok(id)
        })?;

        tracing::info!(
            credential_id = id,
            resource_id,
            username = %credential.username,
            kind = %credential.kind,
            "Credential stored"
        );
        Ok(id)
    }

    fn store_credential(
        &self,
        identifier: &str,
        credential: &NewCredential,
    ) -> Result<(i64, i64), StoreError> {
        let cipher = self.cipher()?;
        let encrypted = cipher.encrypt(credential.secret())?;

        let (resource_id, id) = self.db.with_retry("store_credential", || {
            let tx = self.db.begin_immediate()?;
            let resource_id = Self::resolve_in_tx(&tx, identifier)?;
            let id =
                Self::insert_credential_in_tx(&tx, cipher, resource_id, credential, &encrypted)?;
            tx.commit()?;
            Ok((resource_id, id))
        })?;

        tracing::info!(
            credential_id = id,
            resource_id,
            username = %credential.username,
            kind = %credential.kind,
            "Credential stored"
        );
        Ok((resource_id, id))
    }

    fn list_credentials(
        &self,
        filter: Option<&ResourceFilter>,
    ) -> Result<Vec<CredentialRow>, StoreError> {
        let cipher = self.cipher()?;
        if let Some(f) = filter {
            self.lookup_filter(f)?;
        }

        let (by_id, by_name) = match filter {
            Some(ResourceFilter::Id(id)) => (Some(*id), None),
            Some(ResourceFilter::Name(name)) => (None, Some(name.as_str())),
            None => (None, None),
        };

        let mut stmt = self.db.conn().prepare(
            "SELECT r.id, r.name, p.id, p.username, p.secret, p.kind, p.created_at
             FROM pw_resources r
             LEFT JOIN pw_passwords p ON p.resource_id = r.id
             WHERE (?1 IS NULL OR r.id = ?1) AND (?2 IS NULL OR r.name = ?2)
             ORDER BY r.name ASC, p.id ASC",
        )?;

        let rows = stmt.query_map(params![by_id, by_name], |row| {
            Ok(RawRow {
                resource_id: row.get(0)?,
                resource_name: row.get(1)?,
                credential_id: row.get(2)?,
                username: row.get(3)?,
                secret: row.get(4)?,
                kind: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;

        let mut raw_rows = Vec::new();
        for row in rows {
            raw_rows.push(row?);
        }

        Ok(raw_rows
            .into_iter()
            .map(|raw| Self::decrypt_row(cipher, raw))
            .collect())
    }

    fn remove_resource(&self, id: i64) -> Result<usize, StoreError> {
        let removed = self.db.with_retry("remove_resource", || {
            let tx = self.db.begin_immediate()?;
            let credentials = tx.execute(
                "DELETE FROM pw_passwords WHERE resource_id = ?1",
                params![id],
            )?;
            let resources = tx.execute("DELETE FROM pw_resources WHERE id = ?1", params![id])?;
            if resources == 0 {
                // Dropping the transaction rolls back the credential delete.
                return Err(StoreError::NotFound(format!("resource id {}", id)));
            }
            tx.commit()?;
            Ok(credentials)
        })?;

        tracing::info!(resource_id = id, credentials = removed, "Resource deleted");
        Ok(removed)
    }

    fn remove_credential(&self, id: i64) -> Result<(), StoreError> {
        let affected = self.db.with_retry("remove_credential", || {
            Ok(self
                .db
                .conn()
                .execute("DELETE FROM pw_passwords WHERE id = ?1", params![id])?)
        })?;

        if affected == 0 {
            return Err(StoreError::NotFound(format!("credential id {}", id)));
        }
        tracing::info!(credential_id = id, "Credential deleted");
        Ok(())
    }

    fn verify_integrity(&self) -> Result<IntegrityReport, StoreError> {
        let mut stmt = self.db.conn().prepare(
            "SELECT p.id FROM pw_passwords p
             LEFT JOIN pw_resources r ON r.id = p.resource_id
             WHERE r.id IS NULL
             ORDER BY p.id",
        )?;
        let orphans = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        let mut orphan_ids = Vec::new();
        for id in orphans {
            orphan_ids.push(id?);
        }
        if !orphan_ids.is_empty() {
            return Err(StoreError::Integrity(format!(
                "orphaned credentials: {:?}",
                orphan_ids
            )));
        }

        let resources: i64 =
            self.db
                .conn()
                .query_row("SELECT count(*) FROM pw_resources", [], |row| row.get(0))?;
        let credentials: i64 =
            self.db
                .conn()
                .query_row("SELECT count(*) FROM pw_passwords", [], |row| row.get(0))?;

        Ok(IntegrityReport {
            resources: resources as usize,
            credentials: credentials as usize,
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
