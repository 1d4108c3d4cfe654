use crate::error::KVError;

/// KVStore is a flat byte-valued key-value store.
///
/// Keys are `/`-separated namespaces, e.g. `mail/outbox/{id}`. A prefix scan
/// returns entries in key order.
pub trait KVStore: Send + Sync {
    /// Set a key-value pair, overwriting any previous value.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError>;

    /// Delete a key. Returns whether it existed.
    fn delete(&self, key: &str) -> Result<bool, KVError>;

    /// Scan all keys starting with `prefix`. Returns sorted (key, value) pairs.
    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError>;
}
