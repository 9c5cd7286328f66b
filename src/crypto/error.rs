// Pwvault - Crypto error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Passphrase must not be empty")]
    EmptyPassphrase,

    #[error("Key derivation error: {0}")]
    Derivation(String),

    #[error("Invalid key length: {0} bytes, expected {1}")]
    InvalidKeyLength(usize, usize),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Malformed ciphertext: {0}")]
    Malformed(String),

    #[error("Authentication failed: wrong passphrase or tampered data")]
    Authentication,

    #[error("Decrypted secret is not valid UTF-8")]
    InvalidUtf8,

    #[error("Passphrase does not match the one this vault was created with")]
    WrongPassphrase,
}
