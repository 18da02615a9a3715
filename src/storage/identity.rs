//! Paired peer address persistence.

use super::KeyValueStore;
use crate::core::{ADDRESS_SIZE, MacAddress, PEER_ADDRESS_KEY, STORAGE_NAMESPACE, StorageError};

/// Load/save/clear of the paired peer's hardware address.
///
/// A stored blob that is not exactly six bytes long, or that cannot be read
/// at all, counts as "no saved peer".
#[derive(Debug)]
pub struct PeerIdentityStore<S> {
    store: S,
    namespace: String,
    key: String,
}

impl<S: KeyValueStore> PeerIdentityStore<S> {
    /// Identity store under the default namespace and key.
    pub fn new(store: S) -> Self {
        Self::with_key(store, STORAGE_NAMESPACE, PEER_ADDRESS_KEY)
    }

    /// Identity store under a custom namespace and key.
    pub fn with_key(store: S, namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            key: key.into(),
        }
    }

    /// Load the saved peer, if a valid one exists.
    pub fn load(&self) -> Option<MacAddress> {
        match self.store.get(&self.namespace, &self.key) {
            Ok(Some(bytes)) if bytes.len() == ADDRESS_SIZE => MacAddress::from_slice(&bytes),
            Ok(Some(bytes)) => {
                tracing::debug!(
                    "[STORAGE] Ignoring saved peer with {} bytes",
                    bytes.len()
                );
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::debug!("[STORAGE] Failed to read saved peer: {}", e);
                None
            }
        }
    }

    /// Persist a peer address.
    pub fn save(&mut self, peer: MacAddress) -> Result<(), StorageError> {
        self.store.put(&self.namespace, &self.key, peer.as_bytes())
    }

    /// Forget the saved peer.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.store.remove(&self.namespace, &self.key)
    }

    /// Backing store.
    pub fn inner(&self) -> &S {
        &self.store
    }

    /// Take back the backing store.
    pub fn into_inner(self) -> S {
        self.store
    }
}
