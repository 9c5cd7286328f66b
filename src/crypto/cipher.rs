// Pwvault - Secret Cipher
//
// AES-256-GCM over individual secret strings. Every encryption draws a fresh
// random nonce; the stored form is hex(nonce || ciphertext || tag) so it fits
// in a TEXT column.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::RngCore;
use zeroize::Zeroizing;

use super::{CryptoError, DerivedKey};

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

/// Authenticated cipher bound to one derived key.
pub struct Cipher {
    aead: Aes256Gcm,
}

impl Cipher {
    pub fn new(key: &DerivedKey) -> Result<Self, CryptoError> {
        if key.len() != KEY_LEN {
            return Err(CryptoError::InvalidKeyLength(key.len(), KEY_LEN));
        }
        let aead = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|_| CryptoError::InvalidKeyLength(key.len(), KEY_LEN))?;
        Ok(Self { aead })
    }

    /// Encrypt `plaintext` and return the hex-encoded blob.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        self.encrypt_bytes(plaintext.as_bytes())
    }

    pub fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .aead
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);

        Ok(hex::encode(blob))
    }

    /// Decrypt a blob produced by [`Cipher::encrypt`].
    ///
    /// Fails closed: bad hex, a truncated blob, a wrong key and tampered bytes
    /// all return an error, never partial plaintext.
    pub fn decrypt(&self, encoded: &str) -> Result<Zeroizing<String>, CryptoError> {
        let mut plaintext = self.decrypt_bytes(encoded)?;
        String::from_utf8(std::mem::take(&mut *plaintext))
            .map(Zeroizing::new)
            .map_err(|_| CryptoError::InvalidUtf8)
    }

    pub fn decrypt_bytes(&self, encoded: &str) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let blob = hex::decode(encoded.trim())
            .map_err(|e| CryptoError::Malformed(format!("not valid hex: {}", e)))?;

        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Malformed(format!(
                "ciphertext too short ({} bytes)",
                blob.len()
            )));
        }

        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        self.aead
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| CryptoError::Authentication)
    }
}

/// One-shot encryption for callers holding only a key.
pub fn encrypt(plaintext: &str, key: &DerivedKey) -> Result<String, CryptoError> {
    Cipher::new(key)?.encrypt(plaintext)
}

/// One-shot decryption for callers holding only a key.
pub fn decrypt(encoded: &str, key: &DerivedKey) -> Result<Zeroizing<String>, CryptoError> {
    Cipher::new(key)?.decrypt(encoded)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
