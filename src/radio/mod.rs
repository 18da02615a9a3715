//! Radio transport adapter.
//!
//! The radio is an unreliable, connectionless datagram service addressed by
//! 6-byte hardware addresses. Sends are fire-and-forget; receipt is reported
//! through a callback that runs in interrupt-like context and must return
//! quickly without blocking.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          Link State Machine             │
//! ├─────────────────────────────────────────┤
//! │        RadioTransport (this module)     │  ← peers, send, rx callback
//! ├─────────────────────────────────────────┤
//! │   Ether (in-process)  |  UdpRadio (host)│
//! └─────────────────────────────────────────┘
//! ```

mod ether;
mod peers;
#[cfg(feature = "udp")]
mod udp;

use std::sync::Arc;

pub use ether::{Ether, EtherPort, EtherStats};
pub use peers::PeerTable;
#[cfg(feature = "udp")]
pub use udp::UdpRadio;

use crate::core::{MacAddress, TransportError};

/// Receive callback: `(sender, datagram)`.
///
/// Runs in the radio's receive context. Implementations must not block or
/// allocate; the link only ever installs a drop-on-full queue push here.
pub type ReceiveCallback = Arc<dyn Fn(MacAddress, &[u8]) + Send + Sync>;

/// Connectionless datagram radio.
pub trait RadioTransport: Send + Sync {
    /// This node's hardware address.
    fn local_address(&self) -> MacAddress;

    /// Radio channel this node operates on.
    fn channel(&self) -> u8;

    /// Queue a datagram for transmission. Never blocks.
    ///
    /// Unicast destinations must have been registered with
    /// [`RadioTransport::add_peer`]; [`MacAddress::BROADCAST`] is always
    /// reachable. `Ok` means the frame left the node, not that it arrived.
    fn send(&self, dest: MacAddress, payload: &[u8]) -> Result<(), TransportError>;

    /// Register a unicast peer. Registering twice is not an error.
    fn add_peer(&self, peer: MacAddress) -> Result<(), TransportError>;

    /// Remove a unicast peer. Removing an unknown peer is not an error.
    fn remove_peer(&self, peer: MacAddress) -> Result<(), TransportError>;

    /// Check if a unicast peer is registered.
    fn has_peer(&self, peer: MacAddress) -> bool;

    /// Install the receive callback. Only one callback may be installed.
    fn register_receive(&self, callback: ReceiveCallback) -> Result<(), TransportError>;
}

impl<T: RadioTransport + ?Sized> RadioTransport for Arc<T> {
    fn local_address(&self) -> MacAddress {
        (**self).local_address()
    }

    fn channel(&self) -> u8 {
        (**self).channel()
    }

    fn send(&self, dest: MacAddress, payload: &[u8]) -> Result<(), TransportError> {
        (**self).send(dest, payload)
    }

    fn add_peer(&self, peer: MacAddress) -> Result<(), TransportError> {
        (**self).add_peer(peer)
    }

    fn remove_peer(&self, peer: MacAddress) -> Result<(), TransportError> {
        (**self).remove_peer(peer)
    }

    fn has_peer(&self, peer: MacAddress) -> bool {
        (**self).has_peer(peer)
    }

    fn register_receive(&self, callback: ReceiveCallback) -> Result<(), TransportError> {
        (**self).register_receive(callback)
    }
}
