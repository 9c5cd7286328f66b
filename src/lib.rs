// Pwvault - Library root
//
// Re-exports the crypto, store, config and CLI modules.

pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod store;

pub use error::{Result, VaultError};
