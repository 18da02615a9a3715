//! Volatile key/value store.

use std::collections::HashMap;

use super::{KeyValueStore, validate_name};
use crate::core::StorageError;

/// In-memory [`KeyValueStore`].
///
/// Clones share nothing; keep the store alive across a simulated reboot by
/// handing the same instance to the next node.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<(String, String), Vec<u8>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        validate_name(namespace)?;
        validate_name(key)?;
        Ok(self
            .entries
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    fn put(&mut self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError> {
        validate_name(namespace)?;
        validate_name(key)?;
        self.entries
            .insert((namespace.to_string(), key.to_string()), value.to_vec());
        Ok(())
    }

    fn remove(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        validate_name(namespace)?;
        validate_name(key)?;
        self.entries
            .remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }
}
