//! Unicast peer registration shared by the transport implementations.

use std::collections::HashSet;

use parking_lot::Mutex;

use crate::core::{MacAddress, TransportError};

/// Radio peer table.
///
/// Mirrors the radio driver's peer list: unicast sends require a registered
/// peer, broadcast never does.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: Mutex<HashSet<MacAddress>>,
}

impl PeerTable {
    /// Create an empty peer table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer.
    pub fn add(&self, peer: MacAddress) {
        self.peers.lock().insert(peer);
    }

    /// Remove a peer.
    pub fn remove(&self, peer: MacAddress) {
        self.peers.lock().remove(&peer);
    }

    /// Check if a peer is registered.
    pub fn contains(&self, peer: MacAddress) -> bool {
        self.peers.lock().contains(&peer)
    }

    /// Number of registered peers.
    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    /// Check if no peer is registered.
    pub fn is_empty(&self) -> bool {
        self.peers.lock().is_empty()
    }

    /// Fail with [`TransportError::UnknownPeer`] unless `dest` is reachable.
    pub fn check_reachable(&self, dest: MacAddress) -> Result<(), TransportError> {
        if dest.is_broadcast() || self.contains(dest) {
            Ok(())
        } else {
            Err(TransportError::UnknownPeer(dest))
        }
    }
}
