// Pwvault - Store Module
//
// SQLite-backed storage for resources and their credentials. Secrets are
// AES-256-GCM encrypted before they are written.

mod db;
mod error;
mod models;
mod repository;

pub use db::{Database, CREDENTIALS_TABLE, META_TABLE, RESOURCES_TABLE};
pub use error::StoreError;
pub use models::{
    CredentialEntry, CredentialRow, IntegrityReport, NewCredential, Resource, ResourceFilter,
    SecretValue, DEFAULT_KIND,
};
pub use repository::{SqliteVaultStore, VaultStore};
