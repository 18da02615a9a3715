//! Host radio emulation over UDP.
//!
//! Each node binds a UDP socket and knows a static list of neighbour socket
//! addresses. Every radio frame is sent to every neighbour; receivers keep
//! the frames on their channel addressed to them or to broadcast.
//!
//! Emulated frame layout:
//!
//! ```text
//! ┌─────────┬──────────────┬──────────────┬──────────────────┐
//! │ channel │ destination  │ source       │ payload          │
//! │ 1 byte  │ 6 bytes      │ 6 bytes      │ up to 250 bytes  │
//! └─────────┴──────────────┴──────────────┴──────────────────┘
//! ```

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use super::peers::PeerTable;
use super::{RadioTransport, ReceiveCallback};
use crate::core::{ADDRESS_SIZE, MAX_DATAGRAM_SIZE, MacAddress, TransportError};

/// Emulation header: channel, destination, source.
pub const UDP_HEADER_SIZE: usize = 1 + 2 * ADDRESS_SIZE;

/// Radio transport emulated on a UDP socket.
pub struct UdpRadio {
    socket: Arc<UdpSocket>,
    address: MacAddress,
    channel: u8,
    neighbours: Vec<SocketAddr>,
    peers: PeerTable,
    callback: Mutex<Option<ReceiveCallback>>,
}

impl std::fmt::Debug for UdpRadio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpRadio")
            .field("address", &self.address)
            .field("channel", &self.channel)
            .field("neighbours", &self.neighbours)
            .finish_non_exhaustive()
    }
}

impl UdpRadio {
    /// Bind the emulated radio.
    pub async fn bind(
        bind: SocketAddr,
        address: MacAddress,
        channel: u8,
        neighbours: Vec<SocketAddr>,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(bind).await?;
        Ok(Self {
            socket: Arc::new(socket),
            address,
            channel,
            neighbours,
            peers: PeerTable::new(),
            callback: Mutex::new(None),
        })
    }

    /// Local socket address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Neighbour socket addresses frames are sent to.
    pub fn neighbours(&self) -> &[SocketAddr] {
        &self.neighbours
    }

    /// Start the receive loop.
    ///
    /// The loop ends when the socket fails; the returned handle can be
    /// aborted to stop it earlier.
    pub fn spawn_receiver(self: &Arc<Self>) -> JoinHandle<()> {
        let radio = Arc::clone(self);
        tokio::spawn(async move {
            let mut buf = [0u8; UDP_HEADER_SIZE + MAX_DATAGRAM_SIZE];
            loop {
                let len = match radio.socket.recv_from(&mut buf).await {
                    Ok((len, _)) => len,
                    Err(e) => {
                        tracing::warn!("[RADIO] Receive failed: {}", e);
                        break;
                    }
                };
                radio.deliver(&buf[..len]);
            }
        })
    }

    fn deliver(&self, frame: &[u8]) {
        let Some((source, payload)) = self.accept(frame) else {
            return;
        };
        let callback = self.callback.lock().clone();
        if let Some(callback) = callback {
            callback(source, payload);
        }
    }

    /// Filter an emulated frame, returning its source and payload.
    fn accept<'a>(&self, frame: &'a [u8]) -> Option<(MacAddress, &'a [u8])> {
        if frame.len() < UDP_HEADER_SIZE || frame[0] != self.channel {
            return None;
        }
        let dest = MacAddress::from_slice(&frame[1..1 + ADDRESS_SIZE])?;
        let source = MacAddress::from_slice(&frame[1 + ADDRESS_SIZE..UDP_HEADER_SIZE])?;
        if source == self.address || !(dest.is_broadcast() || dest == self.address) {
            return None;
        }
        Some((source, &frame[UDP_HEADER_SIZE..]))
    }
}

impl RadioTransport for UdpRadio {
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

        let mut frame = [0u8; UDP_HEADER_SIZE + MAX_DATAGRAM_SIZE];
        frame[0] = self.channel;
        frame[1..1 + ADDRESS_SIZE].copy_from_slice(dest.as_bytes());
        frame[1 + ADDRESS_SIZE..UDP_HEADER_SIZE].copy_from_slice(self.address.as_bytes());
        frame[UDP_HEADER_SIZE..UDP_HEADER_SIZE + payload.len()].copy_from_slice(payload);
        let frame = &frame[..UDP_HEADER_SIZE + payload.len()];

        for neighbour in &self.neighbours {
            match self.socket.try_send_to(frame, *neighbour) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Err(TransportError::SendFailed(format!(
                        "socket busy sending to {neighbour}"
                    )));
                }
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
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
        let mut slot = self.callback.lock();
        if slot.is_some() {
            return Err(TransportError::CallbackRegistered);
        }
        *slot = Some(callback);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    async fn radio(address: [u8; 6], channel: u8) -> Arc<UdpRadio> {
        Arc::new(
            UdpRadio::bind(
                "127.0.0.1:0".parse().unwrap(),
                MacAddress::new(address),
                channel,
                Vec::new(),
            )
            .await
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_bind() {
        let r = radio([1; 6], 1).await;
        assert_ne!(r.local_addr().unwrap().port(), 0);
        assert!(r.neighbours().is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_roundtrip() {
        let b = radio([2; 6], 1).await;
        let a = UdpRadio::bind(
            "127.0.0.1:0".parse().unwrap(),
            MacAddress::new([1; 6]),
            1,
            vec![b.local_addr().unwrap()],
        )
        .await
        .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        b.register_receive(Arc::new(move |from: MacAddress, data: &[u8]| {
            let _ = tx.send((from, data.to_vec()));
        }))
        .unwrap();
        let handle = b.spawn_receiver();

        a.send(MacAddress::BROADCAST, b"ping").unwrap();

        let (from, data) = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(from, MacAddress::new([1; 6]));
        assert_eq!(data, b"ping");
        handle.abort();
    }

    #[tokio::test]
    async fn test_accept_filters() {
        let r = radio([2; 6], 1).await;
        let me = MacAddress::new([2; 6]);
        let other = MacAddress::new([3; 6]);
        let src = MacAddress::new([1; 6]);

        let frame = |channel: u8, dest: MacAddress, source: MacAddress| {
            let mut f = vec![channel];
            f.extend_from_slice(dest.as_bytes());
            f.extend_from_slice(source.as_bytes());
            f.extend_from_slice(b"x");
            f
        };

        assert!(r.accept(&frame(1, me, src)).is_some());
        assert!(r.accept(&frame(1, MacAddress::BROADCAST, src)).is_some());
        assert!(r.accept(&frame(1, other, src)).is_none());
        assert!(r.accept(&frame(6, me, src)).is_none());
        assert!(r.accept(&frame(1, MacAddress::BROADCAST, me)).is_none());
        assert!(r.accept(&[1, 2, 3]).is_none());
    }

    #[tokio::test]
    async fn test_unicast_requires_peer() {
        let r = radio([1; 6], 1).await;
        let peer = MacAddress::new([2; 6]);
        assert!(matches!(
            r.send(peer, b"x"),
            Err(TransportError::UnknownPeer(_))
        ));
        r.add_peer(peer).unwrap();
        assert!(r.has_peer(peer));
        assert!(r.send(peer, b"x").is_ok());
    }
}
