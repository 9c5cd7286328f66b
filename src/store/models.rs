// Pwvault - Vault data models
//
// SECURITY: plaintext secrets only ever live in `NewCredential` (on the way
// in) and `SecretValue::Revealed` (on the way out). Both redact themselves
// in Debug output so they cannot leak through logs.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use zeroize::Zeroizing;

use super::StoreError;

/// Kind assigned to credentials added without an explicit one.
pub const DEFAULT_KIND: &str = "web";

/// A named target (host, service, port) that credentials hang off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>4}  {}", self.id, self.name)
    }
}

/// Input for adding a credential. The secret is still plaintext here and is
/// encrypted by the store before it reaches SQL.
pub struct NewCredential {
    pub username: String,
    secret: Zeroizing<String>,
    pub kind: String,
}

impl NewCredential {
    pub fn new(
        username: impl Into<String>,
        secret: impl Into<String>,
        kind: Option<String>,
    ) -> Self {
        Self {
            username: username.into(),
            secret: Zeroizing::new(secret.into()),
            kind: kind
                .filter(|k| !k.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_KIND.to_string()),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for NewCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewCredential")
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .field("kind", &self.kind)
            .finish()
    }
}

/// How a caller names a resource: a purely numeric identifier (surrounding
/// whitespace ignored) is an id, anything else is an exact name, kept
/// byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceFilter {
    Id(i64),
    Name(String),
}

impl ResourceFilter {
    pub fn parse(identifier: &str) -> Result<Self, StoreError> {
        let trimmed = identifier.trim();
        if trimmed.is_empty() {
            return Err(StoreError::InvalidName(identifier.to_string()));
        }
        if trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return trimmed
                .parse::<i64>()
                .map(ResourceFilter::Id)
                .map_err(|_| StoreError::NotFound(format!("resource id {}", trimmed)));
        }
        Ok(ResourceFilter::Name(identifier.to_string()))
    }
}

impl fmt::Display for ResourceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceFilter::Id(id) => write!(f, "resource id {}", id),
            ResourceFilter::Name(name) => write!(f, "resource '{}'", name),
        }
    }
}

/// Outcome of decrypting one stored secret during a listing.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SecretValue {
    Revealed { value: String },
    Undecryptable { reason: String },
}

impl SecretValue {
    pub fn revealed(&self) -> Option<&str> {
        match self {
            SecretValue::Revealed { value } => Some(value),
            SecretValue::Undecryptable { .. } => None,
        }
    }

    pub fn is_undecryptable(&self) -> bool {
        matches!(self, SecretValue::Undecryptable { .. })
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretValue::Revealed { .. } => f.write_str("Revealed([REDACTED])"),
            SecretValue::Undecryptable { reason } => {
                f.debug_struct("Undecryptable").field("reason", reason).finish()
            }
        }
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretValue::Revealed { value } => f.pad(value),
            SecretValue::Undecryptable { reason } => write!(f, "<undecryptable: {}>", reason),
        }
    }
}

/// A credential as shown in listings, with its secret already decrypted.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialEntry {
    pub id: i64,
    pub username: String,
    pub secret: SecretValue,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

/// One line of the resource/credential join. Resources without credentials
/// appear once with `credential: None`.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialRow {
    pub resource_id: i64,
    pub resource_name: String,
    pub credential: Option<CredentialEntry>,
}

impl CredentialRow {
    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }
}

impl fmt::Display for CredentialRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.credential {
            Some(c) => write!(
                f,
                "{:>4}  {:20} │ {:>4}  {:16} │ {:24} │ {}",
                self.resource_id, self.resource_name, c.id, c.username, c.secret, c.kind
            ),
            None => write!(
                f,
                "{:>4}  {:20} │ (no credentials)",
                self.resource_id, self.resource_name
            ),
        }
    }
}

/// Totals reported by a successful integrity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub resources: usize,
    pub credentials: usize,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
