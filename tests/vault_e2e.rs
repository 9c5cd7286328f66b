// End-to-end tests against an on-disk vault, through the public API only.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rusqlite::{Transaction, TransactionBehavior};

use pwvault::config::StorageSettings;
use pwvault::crypto::{self, derive_key, CryptoError, DerivedKey, KdfParams};
use pwvault::store::{
    Database, NewCredential, SqliteVaultStore, StoreError, VaultStore,
};

fn cheap_kdf() -> KdfParams {
    KdfParams {
        iterations: 1,
        memory_kib: 64,
        parallelism: 1,
        key_len: 32,
    }
}

fn fresh_vault(dir: &tempfile::TempDir) -> Database {
    let db = Database::open(&dir.path().join("store.db"), StorageSettings::default()).unwrap();
    db.init_schema().unwrap();
    db
}

fn vault_key(db: &Database, passphrase: &str) -> DerivedKey {
    derive_key(passphrase, &db.kdf_salt().unwrap(), &cheap_kdf()).unwrap()
}

#[test]
fn test_add_list_remove_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let db = fresh_vault(&dir);
    let key = vault_key(&db, "passphrase");
    let store = SqliteVaultStore::open_with_key(&db, &key).unwrap();

    assert!(store.list_resources().unwrap().is_empty());

    store
        .store_credential("example.com", &NewCredential::new("bob", "s3cret", Some("web".into())))
        .unwrap();

    let resources = store.list_resources().unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!((resources[0].id, resources[0].name.as_str()), (1, "example.com"));

    let rows = store.list_credentials(None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].resource_name, "example.com");
    let entry = rows[0].credential.as_ref().expect("credential present");
    assert_eq!(entry.username, "bob");
    assert_eq!(entry.secret.revealed(), Some("s3cret"));
    assert_eq!(entry.kind, "web");

    store.remove_credential(1).unwrap();

    let rows = store.list_credentials(None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].resource_name, "example.com");
    assert!(rows[0].credential.is_none());
}

#[test]
fn test_secrets_survive_reopen_with_same_passphrase() {
    let dir = tempfile::tempdir().unwrap();
    {
        let db = fresh_vault(&dir);
        let key = vault_key(&db, "same passphrase");
        let store = SqliteVaultStore::open_with_key(&db, &key).unwrap();
        store
            .store_credential("mail", &NewCredential::new("amy", "pa55", None))
            .unwrap();
    }

    let db = Database::open(&dir.path().join("store.db"), StorageSettings::default()).unwrap();
    let key = vault_key(&db, "same passphrase");
    let store = SqliteVaultStore::open_with_key(&db, &key).unwrap();
    let rows = store.list_credentials(None).unwrap();
    assert_eq!(
        rows[0].credential.as_ref().unwrap().secret.revealed(),
        Some("pa55")
    );

    let other = vault_key(&db, "different passphrase");
    assert!(matches!(
        SqliteVaultStore::open_with_key(&db, &other).err(),
        Some(StoreError::Crypto(CryptoError::WrongPassphrase))
    ));
}

#[test]
fn test_operations_on_uninitialized_vault_report_schema_error() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("store.db"), StorageSettings::default()).unwrap();
    assert!(matches!(
        SqliteVaultStore::open(&db).err(),
        Some(StoreError::Schema(_))
    ));
}

#[test]
fn test_remove_resource_leaves_no_orphans() {
    let dir = tempfile::tempdir().unwrap();
    let db = fresh_vault(&dir);
    let key = vault_key(&db, "pw");
    let store = SqliteVaultStore::open_with_key(&db, &key).unwrap();

    let (rid, _) = store
        .store_credential("github", &NewCredential::new("a", "1", None))
        .unwrap();
    store
        .store_credential("github", &NewCredential::new("b", "2", None))
        .unwrap();

    assert_eq!(store.remove_resource(rid).unwrap(), 2);
    assert!(store
        .list_credentials(None)
        .unwrap()
        .iter()
        .all(|row| row.resource_id != rid));
    let report = store.verify_integrity().unwrap();
    assert_eq!((report.resources, report.credentials), (0, 0));
}

#[test]
fn test_concurrent_find_or_create_yields_one_resource() {
    let dir = tempfile::tempdir().unwrap();
    fresh_vault(&dir);
    let path = Arc::new(dir.path().join("store.db"));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let path = Arc::clone(&path);
            thread::spawn(move || {
                let db = Database::open(&path, StorageSettings::default()).unwrap();
                let store = SqliteVaultStore::open(&db).unwrap();
                store.resolve_or_create_resource("github").unwrap()
            })
        })
        .collect();

    let ids: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(ids.iter().all(|id| *id == ids[0]));

    let db = Database::open(&path, StorageSettings::default()).unwrap();
    let store = SqliteVaultStore::open(&db).unwrap();
    let resources = store.list_resources().unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].name, "github");
}

#[test]
fn test_lock_contention_exhausts_into_busy_error() {
    let dir = tempfile::tempdir().unwrap();
    let holder = fresh_vault(&dir);

    let impatient = StorageSettings {
        busy_timeout: Duration::from_millis(10),
        max_retries: 2,
        retry_min_delay: Duration::from_millis(1),
        retry_max_delay: Duration::from_millis(5),
    };
    let db = Database::open(&dir.path().join("store.db"), impatient).unwrap();
    let store = SqliteVaultStore::open(&db).unwrap();

    {
        let _lock = Transaction::new_unchecked(holder.conn(), TransactionBehavior::Immediate)
            .unwrap();
        let err = store.resolve_or_create_resource("github").unwrap_err();
        assert!(matches!(err, StoreError::Busy { .. }), "got {:?}", err);
    }

    // Lock released: the same call now goes through.
    assert_eq!(store.resolve_or_create_resource("github").unwrap(), 1);
}

#[test]
fn test_cipher_contract_across_keys() {
    let k1 = derive_key("one", b"0123456789abcdef", &cheap_kdf()).unwrap();
    let k2 = derive_key("two", b"0123456789abcdef", &cheap_kdf()).unwrap();

    let blob = crypto::encrypt("payload", &k1).unwrap();
    assert_eq!(crypto::decrypt(&blob, &k1).unwrap().as_str(), "payload");
    assert!(matches!(
        crypto::decrypt(&blob, &k2),
        Err(CryptoError::Authentication)
    ));
}
