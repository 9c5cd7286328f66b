// Pwvault - Crypto Module
//
// Passphrase key derivation (Argon2id) and per-secret authenticated
// encryption (AES-256-GCM). Nothing here touches storage.

mod cipher;
mod error;
mod kdf;

pub use cipher::{decrypt, encrypt, Cipher, KEY_LEN, NONCE_LEN, TAG_LEN};
pub use error::CryptoError;
pub use kdf::{
    derive_key, Argon2Deriver, DerivedKey, KdfParams, KeyDeriver, DEFAULT_KEY_LEN, LEGACY_SALT,
    SALT_LEN,
};
