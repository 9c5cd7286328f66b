// Pwvault - CLI Command Handlers
//
// Each function handles one CLI subcommand: check the passphrase if the
// command needs one, open the vault, derive the key once, run exactly one
// store operation and print the result.

use serde::Serialize;

use crate::config::{ConfigError, VaultConfig};
use crate::crypto::{Argon2Deriver, DerivedKey, KeyDeriver};
use crate::error::VaultError;
use crate::store::{
    CredentialRow, Database, NewCredential, ResourceFilter, SqliteVaultStore, VaultStore,
};

use super::{Cli, Commands};

/// Execute the parsed CLI command.
pub fn execute(cli: Cli) -> Result<(), VaultError> {
    let config = VaultConfig::new(cli.db, cli.passphrase);
    run(&config, cli.command, cli.json)
}

/// Execute `command` against the vault described by `config`.
pub fn run(config: &VaultConfig, command: Commands, json: bool) -> Result<(), VaultError> {
    match command {
        Commands::Init => cmd_init(config),
        Commands::Resources => cmd_resources(config, json),
        Commands::List { resource } => cmd_list(config, resource, json),
        Commands::Add {
            resource,
            username,
            secret,
            kind,
        } => cmd_add(config, resource, username, secret, kind),
        Commands::RemoveResource { id } => cmd_remove_resource(config, id),
        Commands::RemoveCredential { id } => cmd_remove_credential(config, id),
        Commands::Verify => cmd_verify(config, json),
    }
}

// ─── Init ────────────────────────────────────────────────────────────────────

fn cmd_init(config: &VaultConfig) -> Result<(), VaultError> {
    config.ensure_parent_dir()?;
    let db = Database::open(&config.db_path, config.storage)?;
    db.init_schema()?;

    println!("✓ Vault initialized");
    println!("  Database: {}", config.db_path.display());
    println!();
    println!("Next: add a credential with `pwvault add <resource> <username> <secret>`");
    Ok(())
}

// ─── Resources ───────────────────────────────────────────────────────────────

fn cmd_resources(config: &VaultConfig, json: bool) -> Result<(), VaultError> {
    let db = open_db(config)?;
    let store = SqliteVaultStore::open(&db)?;
    let resources = store.list_resources()?;

    if json {
        return print_json(&resources);
    }
    if resources.is_empty() {
        println!("No resources stored yet.");
        return Ok(());
    }
    println!("Resources ({}):\n", resources.len());
    for resource in &resources {
        println!("  {}", resource);
    }
    Ok(())
}

// ─── List ────────────────────────────────────────────────────────────────────

fn cmd_list(config: &VaultConfig, resource: Option<String>, json: bool) -> Result<(), VaultError> {
    let (db, key) = open_keyed(config)?;
    let store = SqliteVaultStore::open_with_key(&db, &key)?;

    let filter = resource
        .as_deref()
        .map(ResourceFilter::parse)
        .transpose()?;
    let rows = store.list_credentials(filter.as_ref())?;

    let undecryptable = rows
        .iter()
        .filter_map(|r| r.credential.as_ref())
        .filter(|c| c.secret.is_undecryptable())
        .count();
    if undecryptable > 0 {
        tracing::warn!(count = undecryptable, "Some secrets could not be decrypted");
    }

    if json {
        return print_json(&rows);
    }
    print_rows(&rows);
    Ok(())
}

fn print_rows(rows: &[CredentialRow]) {
    if rows.is_empty() {
        println!("No resources stored yet.");
        return;
    }
    for row in rows {
        println!("  {}", row);
    }
}

// ─── Add ─────────────────────────────────────────────────────────────────────

fn cmd_add(
    config: &VaultConfig,
    resource: String,
    username: String,
    secret: String,
    kind: String,
) -> Result<(), VaultError> {
    let (db, key) = open_keyed(config)?;
    let store = SqliteVaultStore::open_with_key(&db, &key)?;

    let credential = NewCredential::new(username, secret, Some(kind));
    let (resource_id, credential_id) = store.store_credential(&resource, &credential)?;

    println!("✓ Credential stored");
    println!("  ID:       {}", credential_id);
    println!("  Resource: {} ({})", resource, resource_id);
    Ok(())
}

// ─── Remove ──────────────────────────────────────────────────────────────────

fn cmd_remove_resource(config: &VaultConfig, id: i64) -> Result<(), VaultError> {
    let (db, key) = open_keyed(config)?;
    let store = SqliteVaultStore::open_with_key(&db, &key)?;

    let removed = store.remove_resource(id)?;
    println!("✓ Resource {} deleted ({} credentials removed)", id, removed);
    Ok(())
}

fn cmd_remove_credential(config: &VaultConfig, id: i64) -> Result<(), VaultError> {
    let (db, key) = open_keyed(config)?;
    let store = SqliteVaultStore::open_with_key(&db, &key)?;

    store.remove_credential(id)?;
    println!("✓ Credential {} deleted", id);
    Ok(())
}

// ─── Verify ──────────────────────────────────────────────────────────────────

fn cmd_verify(config: &VaultConfig, json: bool) -> Result<(), VaultError> {
    let (db, key) = open_keyed(config)?;
    let store = SqliteVaultStore::open_with_key(&db, &key)?;

    let report = store.verify_integrity()?;
    if json {
        return print_json(&report);
    }
    println!(
        "✓ Vault is consistent: {} resources, {} credentials",
        report.resources, report.credentials
    );
    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Open an existing vault. A missing file is a configuration problem, not
/// something to create silently.
fn open_db(config: &VaultConfig) -> Result<Database, VaultError> {
    if !config.db_path.exists() {
        return Err(ConfigError::StorageLocation(
            config.db_path.clone(),
            "vault not found; run `pwvault init` first".to_string(),
        )
        .into());
    }
    Ok(Database::open(&config.db_path, config.storage)?)
}

/// Check the passphrase before touching storage, then open the vault and
/// derive its key with the vault's own salt.
fn open_keyed(config: &VaultConfig) -> Result<(Database, DerivedKey), VaultError> {
    let passphrase = config.require_passphrase()?;
    let db = open_db(config)?;
    db.ensure_schema()?;

    let salt = db.kdf_salt()?;
    let key = Argon2Deriver::new(config.kdf).derive(passphrase, &salt)?;
    Ok((db, key))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), VaultError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KdfParams;
    use crate::store::StoreError;

    fn config(dir: &tempfile::TempDir, passphrase: Option<&str>) -> VaultConfig {
        VaultConfig::new(
            Some(dir.path().join("vault").join("store.db")),
            passphrase.map(str::to_string),
        )
        .with_kdf(KdfParams {
            iterations: 1,
            memory_kib: 64,
            parallelism: 1,
            key_len: 32,
        })
    }

    #[test]
    fn test_keyed_command_without_passphrase_fails_before_storage() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir, None);

        let err = run(&cfg, Commands::List { resource: None }, false).unwrap_err();
        assert!(matches!(
            err,
            VaultError::Config(ConfigError::MissingPassphrase)
        ));
        assert!(!cfg.db_path.exists(), "no storage access may happen");
    }

    #[test]
    fn test_command_on_missing_vault_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir, Some("pw"));
        let err = run(&cfg, Commands::Resources, false).unwrap_err();
        assert!(matches!(
            err,
            VaultError::Config(ConfigError::StorageLocation(..))
        ));
    }

    #[test]
    fn test_init_add_list_remove_flow() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir, Some("correct horse"));

        run(&cfg, Commands::Init, false).unwrap();
        run(&cfg, Commands::Init, false).unwrap();
        run(
            &cfg,
            Commands::Add {
                resource: "example.com".into(),
                username: "bob".into(),
                secret: "s3cret".into(),
                kind: "web".into(),
            },
            false,
        )
        .unwrap();
        run(&cfg, Commands::Resources, true).unwrap();
        run(&cfg, Commands::List { resource: None }, true).unwrap();
        run(&cfg, Commands::Verify, false).unwrap();
        run(&cfg, Commands::RemoveCredential { id: 1 }, false).unwrap();

        let err = run(&cfg, Commands::RemoveCredential { id: 1 }, false).unwrap_err();
        assert!(matches!(err, VaultError::Store(StoreError::NotFound(_))));

        run(&cfg, Commands::RemoveResource { id: 1 }, false).unwrap();
    }

    #[test]
    fn test_mistyped_passphrase_on_empty_vault_is_not_pinned() {
        let dir = tempfile::tempdir().unwrap();
        let typo = config(&dir, Some("corect horse"));
        run(&typo, Commands::Init, false).unwrap();
        run(&typo, Commands::List { resource: None }, false).unwrap();
        run(&typo, Commands::Verify, false).unwrap();
        assert!(run(&typo, Commands::RemoveCredential { id: 1 }, false).is_err());

        let good = config(&dir, Some("correct horse"));
        run(
            &good,
            Commands::Add {
                resource: "github".into(),
                username: "bob".into(),
                secret: "s3cret".into(),
                kind: "web".into(),
            },
            false,
        )
        .unwrap();
        run(&good, Commands::List { resource: None }, false).unwrap();
    }

    #[test]
    fn test_wrong_passphrase_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let good = config(&dir, Some("right"));
        run(&good, Commands::Init, false).unwrap();
        run(
            &good,
            Commands::Add {
                resource: "site".into(),
                username: "u".into(),
                secret: "p".into(),
                kind: "web".into(),
            },
            false,
        )
        .unwrap();

        let bad = config(&dir, Some("wrong"));
        let err = run(&bad, Commands::List { resource: None }, false).unwrap_err();
        assert!(matches!(err, VaultError::Store(StoreError::Crypto(_))));
    }
}
