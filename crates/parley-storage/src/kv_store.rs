//! redb-backed [`KeyValueStore`].

use crate::KeyValueStore;
use anyhow::{Context, Result};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::sync::Arc;

const TABLE: TableDefinition<&str, &str> = TableDefinition::new("kv_store");

/// Durable string key/value pairs in the `kv_store` table.
#[derive(Debug, Clone)]
pub struct KvStoreStorage {
    db: Arc<Database>,
}

impl KvStoreStorage {
    /// Wrap `db`, creating the table if it does not exist yet.
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(TABLE)?;
        write_txn.commit()?;

        Ok(Self { db })
    }
}

impl KeyValueStore for KvStoreStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn
            .open_table(TABLE)
            .with_context(|| format!("failed to open table while reading '{key}'"))?;
        Ok(table.get(key)?.map(|value| value.value().to_string()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE)?;
            table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redb::Database;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn setup_test_storage() -> (KvStoreStorage, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(Database::create(db_path).unwrap());
        let storage = KvStoreStorage::new(db).unwrap();
        (storage, temp_dir)
    }

    #[test]
    fn test_set_get_remove() {
        let (storage, _temp_dir) = setup_test_storage();

        assert_eq!(storage.get("session").unwrap(), None);

        storage.set("session", "abc123").unwrap();
        assert_eq!(storage.get("session").unwrap().as_deref(), Some("abc123"));

        storage.set("session", "def456").unwrap();
        assert_eq!(storage.get("session").unwrap().as_deref(), Some("def456"));

        storage.remove("session").unwrap();
        assert_eq!(storage.get("session").unwrap(), None);
    }

    #[test]
    fn test_remove_missing_key_is_ok() {
        let (storage, _temp_dir) = setup_test_storage();
        assert!(storage.remove("never-set").is_ok());
    }

    #[test]
    fn test_values_survive_reopen() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("reopen.db");

        {
            let storage = crate::open_kv_store(&db_path).unwrap();
            storage.set("parley.session_id", "s1").unwrap();
        }

        let storage = crate::open_kv_store(&db_path).unwrap();
        assert_eq!(
            storage.get("parley.session_id").unwrap().as_deref(),
            Some("s1")
        );
    }
}
