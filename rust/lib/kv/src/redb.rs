use std::path::Path;

use redb::{Database, ReadableTable, Table, TableDefinition};
use tracing::debug;

use crate::error::{KVError, storage};
use crate::traits::KVStore;

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

/// RedbStore is a KVStore backed by redb, a pure-Rust embedded database.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create a redb database at the given path.
    pub fn open(path: &Path) -> Result<Self, KVError> {
        let db = Database::create(path).map_err(storage)?;
        let store = Self { db };
        // Create the table up front so readers never see it missing.
        store.write(|_| Ok(()))?;
        debug!("opened kv store at {}", path.display());
        Ok(store)
    }

    /// Run `f` against the table inside one write transaction and commit.
    fn write<T>(
        &self,
        f: impl FnOnce(&mut Table<'_, &'static str, &'static [u8]>) -> Result<T, KVError>,
    ) -> Result<T, KVError> {
        let txn = self.db.begin_write().map_err(storage)?;
        let out = {
            let mut table = txn.open_table(TABLE).map_err(storage)?;
            f(&mut table)?
        };
        txn.commit().map_err(storage)?;
        Ok(out)
    }
}

fn check_key(key: &str) -> Result<(), KVError> {
    if key.is_empty() {
        return Err(KVError::InvalidKey(key.to_string()));
    }
    Ok(())
}

impl KVStore for RedbStore {
    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        check_key(key)?;
        self.write(|table| {
            table.insert(key, value).map_err(storage)?;
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> Result<bool, KVError> {
        self.write(|table| {
            let removed = table.remove(key).map_err(storage)?;
            Ok(removed.is_some())
        })
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
        let txn = self.db.begin_read().map_err(storage)?;
        let table = txn.open_table(TABLE).map_err(storage)?;

        let mut results = Vec::new();
        for entry in table.range(prefix..).map_err(storage)? {
            let (key, value) = entry.map_err(storage)?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_string(), value.value().to_vec()));
        }
        Ok(results)
    }
}
