//! In-process radio medium.
//!
//! Every [`EtherPort`] attached to an [`Ether`] hears broadcasts and the
//! unicast frames addressed to it on the same channel. Delivery runs the
//! receiver's callback synchronously on the sender's thread, the way an
//! interrupt preempts whatever the CPU was doing. The medium can be cut to
//! simulate a dead link.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::peers::PeerTable;
use super::{RadioTransport, ReceiveCallback};
use crate::core::{MAX_DATAGRAM_SIZE, MacAddress, TransportError};

/// Delivery counters for the shared medium.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EtherStats {
    /// Frames handed to at least one receiver callback.
    pub delivered: u64,
    /// Frames sent while the medium or the sender was down.
    pub lost: u64,
}

struct Station {
    address: MacAddress,
    channel: u8,
    online: bool,
    callback: Option<ReceiveCallback>,
}

#[derive(Default)]
struct EtherInner {
    stations: Vec<Station>,
    link_up: bool,
}

/// Shared in-process radio medium.
#[derive(Clone)]
pub struct Ether {
    inner: Arc<Mutex<EtherInner>>,
    delivered: Arc<AtomicU64>,
    lost: Arc<AtomicU64>,
}

impl Default for Ether {
    fn default() -> Self {
        Self::new()
    }
}

impl Ether {
    /// Create a medium with the link up.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(EtherInner {
                stations: Vec::new(),
                link_up: true,
            })),
            delivered: Arc::new(AtomicU64::new(0)),
            lost: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Attach a station and return its transport.
    pub fn attach(&self, address: MacAddress, channel: u8) -> EtherPort {
        self.inner.lock().stations.push(Station {
            address,
            channel,
            online: true,
            callback: None,
        });
        EtherPort {
            ether: self.clone(),
            address,
            channel,
            peers: PeerTable::new(),
        }
    }

    /// Cut or restore the whole medium.
    pub fn set_link_up(&self, up: bool) {
        self.inner.lock().link_up = up;
    }

    /// Power a single station's radio off or on.
    pub fn set_online(&self, address: MacAddress, online: bool) {
        let mut inner = self.inner.lock();
        for station in inner.stations.iter_mut().filter(|s| s.address == address) {
            station.online = online;
        }
    }

    /// Delivery counters.
    pub fn stats(&self) -> EtherStats {
        EtherStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            lost: self.lost.load(Ordering::Relaxed),
        }
    }

    fn register(&self, address: MacAddress, callback: ReceiveCallback) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        let station = inner
            .stations
            .iter_mut()
            .find(|s| s.address == address)
            .ok_or_else(|| TransportError::SendFailed(format!("station {address} detached")))?;
        if station.callback.is_some() {
            return Err(TransportError::CallbackRegistered);
        }
        station.callback = Some(callback);
        Ok(())
    }

    fn transmit(&self, from: MacAddress, channel: u8, dest: MacAddress, payload: &[u8]) {
        let receivers: Vec<ReceiveCallback> = {
            let inner = self.inner.lock();
            let sender_online = inner
                .stations
                .iter()
                .any(|s| s.address == from && s.online);
            if !inner.link_up || !sender_online {
                self.lost.fetch_add(1, Ordering::Relaxed);
                return;
            }
            inner
                .stations
                .iter()
                .filter(|s| s.address != from && s.channel == channel && s.online)
                .filter(|s| dest.is_broadcast() || s.address == dest)
                .filter_map(|s| s.callback.clone())
                .collect()
        };

        if !receivers.is_empty() {
            self.delivered.fetch_add(1, Ordering::Relaxed);
        }
        // Callbacks run outside the lock so a receiver may transmit in turn.
        for callback in receivers {
            callback(from, payload);
        }
    }
}

/// One station's view of an [`Ether`].
pub struct EtherPort {
    ether: Ether,
    address: MacAddress,
    channel: u8,
    peers: PeerTable,
}

impl EtherPort {
    /// The medium this port is attached to.
    pub fn ether(&self) -> &Ether {
        &self.ether
    }
}

impl RadioTransport for EtherPort {
    fn local_address(&self) -> MacAddress {
        self.address
    }

    fn channel(&self) -> u8 {
        self.channel
    }

    fn send(&self, dest: MacAddress, payload: &[u8]) -> Result<(), TransportError> {
        if payload.len() > MAX_DATAGRAM_SIZE {
            return Err(TransportError::PayloadTooLarge(payload.len()));
        }
        self.peers.check_reachable(dest)?;
        self.ether.transmit(self.address, self.channel, dest, payload);
        Ok(())
    }

    fn add_peer(&self, peer: MacAddress) -> Result<(), TransportError> {
        self.peers.add(peer);
        Ok(())
    }

    fn remove_peer(&self, peer: MacAddress) -> Result<(), TransportError> {
        self.peers.remove(peer);
        Ok(())
    }

    fn has_peer(&self, peer: MacAddress) -> bool {
        self.peers.contains(peer)
    }

    fn register_receive(&self, callback: ReceiveCallback) -> Result<(), TransportError> {
        self.ether.register(self.address, callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Inbox = Arc<Mutex<Vec<(MacAddress, Vec<u8>)>>>;

    fn listen(port: &EtherPort) -> Inbox {
        let inbox: Inbox = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&inbox);
        port.register_receive(Arc::new(move |from: MacAddress, data: &[u8]| {
            sink.lock().push((from, data.to_vec()));
        }))
        .unwrap();
        inbox
    }

    #[test]
    fn test_broadcast_reaches_same_channel_only() {
        let ether = Ether::new();
        let a = ether.attach(MacAddress::new([1; 6]), 1);
        let b = ether.attach(MacAddress::new([2; 6]), 1);
        let c = ether.attach(MacAddress::new([3; 6]), 6);
        let inbox_a = listen(&a);
        let inbox_b = listen(&b);
        let inbox_c = listen(&c);

        a.send(MacAddress::BROADCAST, b"hello").unwrap();

        assert!(inbox_a.lock().is_empty());
        assert_eq!(inbox_b.lock().as_slice(), &[(a.local_address(), b"hello".to_vec())]);
        assert!(inbox_c.lock().is_empty());
    }

    #[test]
    fn test_unicast_requires_peer() {
        let ether = Ether::new();
        let a = ether.attach(MacAddress::new([1; 6]), 1);
        let b = ether.attach(MacAddress::new([2; 6]), 1);
        let inbox_b = listen(&b);

        assert!(matches!(
            a.send(b.local_address(), b"x"),
            Err(TransportError::UnknownPeer(_))
        ));

        a.add_peer(b.local_address()).unwrap();
        a.send(b.local_address(), b"x").unwrap();
        assert_eq!(inbox_b.lock().len(), 1);
    }

    #[test]
    fn test_link_down_loses_frames() {
        let ether = Ether::new();
        let a = ether.attach(MacAddress::new([1; 6]), 1);
        let b = ether.attach(MacAddress::new([2; 6]), 1);
        let inbox_b = listen(&b);

        ether.set_link_up(false);
        a.send(MacAddress::BROADCAST, b"lost").unwrap();
        assert!(inbox_b.lock().is_empty());
        assert_eq!(ether.stats().lost, 1);

        ether.set_link_up(true);
        a.send(MacAddress::BROADCAST, b"found").unwrap();
        assert_eq!(inbox_b.lock().len(), 1);
        assert_eq!(ether.stats().delivered, 1);
    }

    #[test]
    fn test_offline_station_neither_sends_nor_hears() {
        let ether = Ether::new();
        let a = ether.attach(MacAddress::new([1; 6]), 1);
        let b = ether.attach(MacAddress::new([2; 6]), 1);
        let inbox_a = listen(&a);
        let inbox_b = listen(&b);

        ether.set_online(b.local_address(), false);
        a.send(MacAddress::BROADCAST, b"1").unwrap();
        b.send(MacAddress::BROADCAST, b"2").unwrap();

        assert!(inbox_a.lock().is_empty());
        assert!(inbox_b.lock().is_empty());
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let ether = Ether::new();
        let a = ether.attach(MacAddress::new([1; 6]), 1);
        let big = [0u8; MAX_DATAGRAM_SIZE + 1];
        assert!(matches!(
            a.send(MacAddress::BROADCAST, &big),
            Err(TransportError::PayloadTooLarge(251))
        ));
    }

    #[test]
    fn test_single_callback() {
        let ether = Ether::new();
        let a = ether.attach(MacAddress::new([1; 6]), 1);
        let _inbox = listen(&a);
        assert!(matches!(
            a.register_receive(Arc::new(|_: MacAddress, _: &[u8]| {})),
            Err(TransportError::CallbackRegistered)
        ));
    }
}
