//! Inbound datagram envelope.

use crate::core::{MAX_DATAGRAM_SIZE, MacAddress};

/// A received datagram on its way from the radio callback to the link
/// worker.
///
/// Built in the receive path without heap allocation; ownership moves
/// through the inbound queue and the producer never reads it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEnvelope {
    sender: MacAddress,
    data: heapless::Vec<u8, MAX_DATAGRAM_SIZE>,
    received_at: u32,
}

impl InboundEnvelope {
    /// Wrap a datagram. `None` if it is empty or longer than the medium
    /// allows.
    pub fn new(sender: MacAddress, data: &[u8], received_at: u32) -> Option<Self> {
        if data.is_empty() {
            return None;
        }
        let data = heapless::Vec::from_slice(data).ok()?;
        Some(Self {
            sender,
            data,
            received_at,
        })
    }

    /// Sender hardware address.
    pub fn sender(&self) -> MacAddress {
        self.sender
    }

    /// Raw datagram bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Datagram length.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false; empty datagrams are never wrapped.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Link clock reading when the datagram arrived, in milliseconds.
    pub fn received_at(&self) -> u32 {
        self.received_at
    }
}
