//! Message codec.
//!
//! Fixed-layout, tag-prefixed binary messages. Encoding writes into a
//! stack-allocated [`Frame`]; decoding validates the length named by the tag
//! before touching any trailing byte and never allocates.
//!
//! Unknown tags decode to [`Message::Unknown`] instead of failing: the radio
//! channel is shared, and a neighbour running newer firmware must not look
//! like an error.

mod message;

pub use message::*;

use crate::core::{
    DecodeError, HEARTBEAT_SIZE, MAX_DATAGRAM_SIZE, PAIRING_SIZE, Role, TAG_DATA, TAG_HEARTBEAT,
    TAG_PAIRING,
};

/// An encoded datagram, at most [`MAX_DATAGRAM_SIZE`] bytes, held inline.
pub type Frame = heapless::Vec<u8, MAX_DATAGRAM_SIZE>;

/// Encode a message into an inline frame.
pub fn encode(message: &Message) -> Frame {
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];
    let len = message.encode_into(&mut buf);
    let mut frame = Frame::new();
    // Every variant is smaller than the datagram limit.
    let _ = frame.extend_from_slice(&buf[..len]);
    frame
}

/// Decoder bound to the Data form a node receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageCodec {
    inbound_data: DataForm,
}

impl MessageCodec {
    /// Create a codec decoding inbound Data in the given form.
    pub fn new(inbound_data: DataForm) -> Self {
        Self { inbound_data }
    }

    /// Codec for a node of the given role.
    ///
    /// Robots receive commands; controllers receive samples.
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Controller => Self::new(DataForm::Samples),
            Role::Robot => Self::new(DataForm::Command),
        }
    }

    /// Data form this codec decodes.
    pub fn inbound_data(&self) -> DataForm {
        self.inbound_data
    }

    /// Minimum wire size for a tag, or `None` for unknown tags.
    pub fn expected_size(&self, tag: u8) -> Option<usize> {
        match tag {
            TAG_PAIRING => Some(PAIRING_SIZE),
            TAG_DATA => Some(self.inbound_data.wire_size()),
            TAG_HEARTBEAT => Some(HEARTBEAT_SIZE),
            _ => None,
        }
    }

    /// Decode a datagram.
    ///
    /// Fails with [`DecodeError::TooShort`] when the datagram is shorter than
    /// the variant its tag names.
    pub fn decode(&self, bytes: &[u8]) -> Result<Message, DecodeError> {
        let tag = *bytes.first().ok_or(DecodeError::Empty)?;
        match tag {
            TAG_PAIRING => Ok(Message::Pairing(PairingMessage::from_bytes(bytes)?)),
            TAG_DATA => Ok(Message::Data(DataMessage::from_bytes(
                bytes,
                self.inbound_data,
            )?)),
            TAG_HEARTBEAT => Ok(Message::Heartbeat(HeartbeatMessage::from_bytes(bytes)?)),
            other => Ok(Message::Unknown(other)),
        }
    }
}
