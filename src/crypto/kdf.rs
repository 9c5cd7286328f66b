// Pwvault - Passphrase Key Derivation
//
// Turns the user's passphrase into the symmetric key used for every secret
// in the vault. Derivation is deterministic: the same passphrase, salt and
// parameters always yield the same key, which is what lets a later process
// decrypt secrets written by an earlier one.
//
// Flow:
//   1. The caller reads the vault salt (`Database::kdf_salt()`)
//   2. `derive()` runs Argon2id over passphrase + salt
//   3. The resulting `DerivedKey` is handed to the store and wiped on drop

use std::fmt;

use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroizing;

use super::CryptoError;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Salt used by vaults created before the per-vault salt was stored in
/// `pw_meta`. Shared by every such vault.
pub const LEGACY_SALT: &[u8] = b"pwvault::static-salt::v1";

/// Length of the salt generated for new vaults.
pub const SALT_LEN: usize = 16;

/// Argon2 refuses salts shorter than this.
const MIN_SALT_LEN: usize = 8;

/// Key length matching AES-256.
pub const DEFAULT_KEY_LEN: usize = 32;

// m=65536 (64 MiB), t=3, p=4
const DEFAULT_MEMORY_KIB: u32 = 65536;
const DEFAULT_ITERATIONS: u32 = 3;
const DEFAULT_PARALLELISM: u32 = 4;

// ─── Parameters ──────────────────────────────────────────────────────────────

/// Argon2id cost parameters plus the requested output length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Argon2 time cost (number of passes).
    pub iterations: u32,
    pub memory_kib: u32,
    pub parallelism: u32,
    pub key_len: usize,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            memory_kib: DEFAULT_MEMORY_KIB,
            parallelism: DEFAULT_PARALLELISM,
            key_len: DEFAULT_KEY_LEN,
        }
    }
}

// ─── Derived key ─────────────────────────────────────────────────────────────

/// Key material derived from a passphrase. Zeroized on drop and never
/// printed: `Debug` shows only the length.
#[derive(Clone)]
pub struct DerivedKey {
    bytes: Zeroizing<Vec<u8>>,
}

impl DerivedKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over passphrase-to-key derivation, so callers and tests can
/// swap cost parameters or the algorithm behind one seam.
pub trait KeyDeriver {
    fn derive(&self, passphrase: &str, salt: &[u8]) -> Result<DerivedKey, CryptoError>;
}

/// Production deriver backed by Argon2id.
#[derive(Debug, Clone, Default)]
pub struct Argon2Deriver {
    params: KdfParams,
}

impl Argon2Deriver {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &KdfParams {
        &self.params
    }
}

impl KeyDeriver for Argon2Deriver {
    fn derive(&self, passphrase: &str, salt: &[u8]) -> Result<DerivedKey, CryptoError> {
        derive_key(passphrase, salt, &self.params)
    }
}

/// Derive `params.key_len` bytes from `passphrase` and `salt`.
///
/// An empty passphrase is rejected before any hashing happens.
pub fn derive_key(
    passphrase: &str,
    salt: &[u8],
    params: &KdfParams,
) -> Result<DerivedKey, CryptoError> {
    if passphrase.is_empty() {
        return Err(CryptoError::EmptyPassphrase);
    }
    if salt.len() < MIN_SALT_LEN {
        return Err(CryptoError::Derivation(format!(
            "salt too short ({} bytes, need at least {})",
            salt.len(),
            MIN_SALT_LEN
        )));
    }

    let argon_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(params.key_len),
    )
    .map_err(|e| CryptoError::Derivation(format!("invalid Argon2 params: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut out = Zeroizing::new(vec![0u8; params.key_len]);
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut out)
        .map_err(|e| CryptoError::Derivation(format!("Argon2id hash failed: {}", e)))?;

    tracing::debug!(key_len = params.key_len, "Derived vault key");

    Ok(DerivedKey { bytes: out })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
