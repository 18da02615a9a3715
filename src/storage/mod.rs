//! Persistent pairing identity.
//!
//! The non-volatile region is modelled as a namespaced mapping from string
//! keys to byte blobs ([`KeyValueStore`]). [`PeerIdentityStore`] keeps the
//! paired peer's hardware address under one fixed key.
//!
//! Storage is only touched from task context, never from the radio receive
//! path.

mod file;
mod identity;
mod memory;

pub use file::FileStore;
pub use identity::PeerIdentityStore;
pub use memory::MemoryStore;

use crate::core::StorageError;

/// Persistent namespaced key/value storage.
pub trait KeyValueStore: Send {
    /// Read the blob stored under `namespace`/`key`, if any.
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store a blob under `namespace`/`key`, replacing any previous value.
    fn put(&mut self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Remove `namespace`/`key`. Removing a missing key is not an error.
    fn remove(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).get(namespace, key)
    }

    fn put(&mut self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError> {
        (**self).put(namespace, key, value)
    }

    fn remove(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        (**self).remove(namespace, key)
    }
}

/// Reject names that cannot be used as a single path component.
pub(crate) fn validate_name(name: &str) -> Result<(), StorageError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if bad {
        Err(StorageError::InvalidName(name.to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("q8bot").is_ok());
        assert!(validate_name("peerMAC").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a/b").is_err());
    }
}
