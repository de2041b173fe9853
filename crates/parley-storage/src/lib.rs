//! Parley Storage - durable key/value persistence for the chat client
//!
//! The client only needs a narrow `get/set/remove` capability. This crate
//! defines that contract ([`KeyValueStore`]) and ships two implementations:
//!
//! - [`KvStoreStorage`] - redb-backed, survives restarts
//! - [`MemoryStore`] - in-process, for ephemeral runs and tests
//!
//! # Tables
//!
//! - `kv_store` - string keys to UTF-8 values

pub mod kv_store;
pub mod memory;
pub mod paths;

use anyhow::{Context, Result};
use redb::Database;
use std::path::Path;
use std::sync::Arc;

pub use kv_store::KvStoreStorage;
pub use memory::MemoryStore;

/// Narrow key/value capability consumed by the chat client.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Open (or create) the database at `path` and return the key/value table.
pub fn open_kv_store(path: impl AsRef<Path>) -> Result<KvStoreStorage> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "Opening key/value store");
    let db = Arc::new(
        Database::create(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?,
    );
    KvStoreStorage::new(db)
}

/// Open the key/value table in the default data directory.
pub fn open_default_kv_store() -> Result<KvStoreStorage> {
    open_kv_store(paths::database_path()?)
}
