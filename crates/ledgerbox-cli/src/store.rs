//! Redb-backed durable key-value store.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety, so a
//! key written before a crash is either fully present or absent.

use std::{path::Path, sync::Arc};

use ledgerbox_core::{KeyValueStore, StoreError};
use redb::{Database, TableDefinition};

/// Table: values
/// Key: slot name (e.g. `encryption_key:{account}:{app}`)
/// Value: base64 secret material
const VALUES: TableDefinition<&str, &str> = TableDefinition::new("values");

/// Durable storage backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates the values table if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref()).map_err(|e| StoreError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(VALUES).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl KeyValueStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Io(e.to_string()))?;
        let table = txn.open_table(VALUES).map_err(|e| StoreError::Io(e.to_string()))?;

        let value = table.get(key).map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(value.map(|guard| guard.value().to_string()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let mut table = txn.open_table(VALUES).map_err(|e| StoreError::Io(e.to_string()))?;
            table.insert(key, value).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let mut table = txn.open_table(VALUES).map_err(|e| StoreError::Io(e.to_string()))?;
            table.remove(key).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;

        Ok(())
    }
}
