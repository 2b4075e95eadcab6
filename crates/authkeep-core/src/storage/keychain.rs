use anyhow::{Context, Result};
use keyring::Entry;

use super::SnapshotStore;

/// Keychain service name used when none is configured
pub const DEFAULT_SERVICE_NAME: &str = "authkeep";

/// Stores each record as a keychain secret, with the key as the account name.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to create keyring entry")
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_NAME)
    }
}

/// A missing entry reads as no record
fn read_outcome(result: keyring::Result<String>) -> Result<Option<String>> {
    match result {
        Ok(secret) => Ok(Some(secret)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e).context("Failed to retrieve record from keychain"),
    }
}

/// Deleting a missing entry is not an error
fn delete_outcome(result: keyring::Result<()>) -> Result<()> {
    match result {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e).context("Failed to delete record from keychain"),
    }
}

impl SnapshotStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        read_outcome(self.entry(key)?.get_password())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .context("Failed to store record in keychain")
    }

    fn remove(&self, key: &str) -> Result<()> {
        delete_outcome(self.entry(key)?.delete_credential())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_entry_reads_as_none() {
        assert_eq!(read_outcome(Err(keyring::Error::NoEntry)).unwrap(), None);
        assert_eq!(read_outcome(Ok("{}".to_string())).unwrap().as_deref(), Some("{}"));
        assert!(read_outcome(Err(keyring::Error::TooLong("user".to_string(), 10))).is_err());
    }

    #[test]
    fn test_deleting_missing_entry_is_ok() {
        assert!(delete_outcome(Err(keyring::Error::NoEntry)).is_ok());
        assert!(delete_outcome(Ok(())).is_ok());
        assert!(delete_outcome(Err(keyring::Error::TooLong("user".to_string(), 10))).is_err());
    }

    // Needs a real OS keychain (macOS Keychain, Windows Credential Manager or
    // a running Secret Service). Run with `cargo test -- --ignored`.
    #[test]
    #[ignore]
    fn test_round_trip_in_os_keychain() {
        let store = KeyringStore::new("authkeep-test");
        let key = "auth-storage-round-trip";
        store.remove(key).unwrap();

        assert_eq!(store.get(key).unwrap(), None);

        store.set(key, r#"{"x":1}"#).unwrap();
        assert_eq!(store.get(key).unwrap().as_deref(), Some(r#"{"x":1}"#));

        // A fresh store handle sees the same record
        let other = KeyringStore::new("authkeep-test");
        assert_eq!(other.get(key).unwrap().as_deref(), Some(r#"{"x":1}"#));

        store.set(key, r#"{"x":2}"#).unwrap();
        assert_eq!(store.get(key).unwrap().as_deref(), Some(r#"{"x":2}"#));

        store.remove(key).unwrap();
        assert_eq!(store.get(key).unwrap(), None);
        store.remove(key).unwrap();
    }

    #[test]
    #[ignore]
    fn test_session_survives_restart_in_os_keychain() {
        use std::sync::Arc;

        use crate::auth::{Session, SessionSnapshot};
        use crate::storage::SNAPSHOT_KEY;

        let store = Arc::new(KeyringStore::new("authkeep-test-restore"));
        let snapshot = SessionSnapshot {
            user: None,
            token: Some("T1".to_string()),
            refresh_token: Some("R1".to_string()),
            authenticated: true,
        };
        store.set(SNAPSHOT_KEY, &snapshot.to_record().unwrap()).unwrap();

        let reopened = KeyringStore::new("authkeep-test-restore");
        let raw = reopened.get(SNAPSHOT_KEY).unwrap().expect("record should persist");
        let restored = Session::from_snapshot(SessionSnapshot::from_record(&raw).unwrap());
        assert_eq!(restored.access_token.as_deref(), Some("T1"));
        assert!(restored.authenticated);

        reopened.remove(SNAPSHOT_KEY).unwrap();
    }
}
