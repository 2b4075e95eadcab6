//! Durable key/value storage for the persisted session snapshot.
//!
//! The session manager only needs `get/set/remove` by key, so the backing
//! technology is chosen at startup:
//! - `FileStore`: JSON files in the cache directory
//! - `KeyringStore`: the OS keychain
//! - `MemoryStore`: process-local, nothing survives a restart

pub mod file;
pub mod keychain;
pub mod memory;

use anyhow::Result;

pub use self::file::FileStore;
pub use self::keychain::KeyringStore;
pub use self::memory::MemoryStore;

/// Name of the record holding the persisted session
pub const SNAPSHOT_KEY: &str = "auth-storage";

pub trait SnapshotStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the record for `key`. Implementations never leave a partial write behind.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the record for `key`. Removing a missing record is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}
