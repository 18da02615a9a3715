//! Wire message formats.
//!
//! Every message starts with a one-byte tag followed by a one-byte node id.
//! Layouts are packed and little-endian:
//!
//! ```text
//! Pairing    [tag=0][id][address:6][channel]            9 bytes
//! Data/cmd   [tag=1][id][ascii:100, NUL-terminated]   102 bytes
//! Data/smp   [tag=1][id][u16 LE x 100]                202 bytes
//! Heartbeat  [tag=2][id][timestamp: u32 LE]             6 bytes
//! ```

use std::fmt;

use crate::core::{
    ADDRESS_SIZE, DATA_COMMAND_SIZE, DATA_PAYLOAD_LEN, DATA_SAMPLES_SIZE, DecodeError,
    HEARTBEAT_SIZE, MacAddress, PAIRING_SIZE, TAG_DATA, TAG_HEARTBEAT, TAG_PAIRING,
};

/// Pairing request (controller to broadcast) or acknowledgement (robot to controller).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingMessage {
    /// Sender node id.
    pub id: u8,
    /// Hardware address the sender advertises (its own).
    pub address: MacAddress,
    /// Radio channel the sender operates on.
    pub channel: u8,
}

impl PairingMessage {
    /// Serialize to bytes (9 bytes).
    pub fn to_bytes(&self) -> [u8; PAIRING_SIZE] {
        let mut buf = [0u8; PAIRING_SIZE];
        buf[0] = TAG_PAIRING;
        buf[1] = self.id;
        buf[2..8].copy_from_slice(self.address.as_bytes());
        buf[8] = self.channel;
        buf
    }

    /// Parse from bytes. Trailing bytes are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        check_len(bytes, PAIRING_SIZE)?;
        let mut address = [0u8; ADDRESS_SIZE];
        address.copy_from_slice(&bytes[2..8]);
        Ok(Self {
            id: bytes[1],
            address: MacAddress::new(address),
            channel: bytes[8],
        })
    }
}

/// Fixed 100-byte, NUL-terminated ASCII command buffer.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CommandText([u8; DATA_PAYLOAD_LEN]);

impl CommandText {
    /// Longest command that still leaves room for the terminator.
    pub const MAX_LEN: usize = DATA_PAYLOAD_LEN - 1;

    /// Build from raw bytes, truncating to [`Self::MAX_LEN`].
    pub fn from_bytes(text: &[u8]) -> Self {
        let mut buf = [0u8; DATA_PAYLOAD_LEN];
        let len = text.len().min(Self::MAX_LEN);
        buf[..len].copy_from_slice(&text[..len]);
        Self(buf)
    }

    /// Build from a string, truncating to [`Self::MAX_LEN`] bytes.
    pub fn new(text: &str) -> Self {
        Self::from_bytes(text.as_bytes())
    }

    /// Bytes before the first NUL.
    pub fn as_bytes(&self) -> &[u8] {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(self.0.len());
        &self.0[..end]
    }

    /// Text before the first NUL, cut at the first invalid UTF-8 byte.
    pub fn as_str(&self) -> &str {
        let bytes = self.as_bytes();
        match std::str::from_utf8(bytes) {
            Ok(s) => s,
            // valid_up_to() marks a char boundary, so this cannot fail
            Err(e) => std::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default(),
        }
    }

    /// The raw 100-byte buffer.
    pub fn raw(&self) -> &[u8; DATA_PAYLOAD_LEN] {
        &self.0
    }
}

impl Default for CommandText {
    fn default() -> Self {
        Self([0u8; DATA_PAYLOAD_LEN])
    }
}

impl fmt::Debug for CommandText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CommandText").field(&self.as_str()).finish()
    }
}

/// Interpretation of a Data payload.
///
/// The wire carries no sub-tag; the form is fixed by direction.
/// Controller to robot is always [`DataForm::Command`], robot to controller
/// is always [`DataForm::Samples`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataForm {
    /// 100-byte ASCII command.
    Command,
    /// 100 little-endian u16 samples.
    Samples,
}

impl DataForm {
    /// Wire size of a Data message in this form.
    pub fn wire_size(self) -> usize {
        match self {
            DataForm::Command => DATA_COMMAND_SIZE,
            DataForm::Samples => DATA_SAMPLES_SIZE,
        }
    }
}

/// Data payload in one of its two fixed forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataPayload {
    /// Joint command string (controller to robot).
    Command(CommandText),
    /// Sample block (robot to controller).
    Samples([u16; DATA_PAYLOAD_LEN]),
}

impl DataPayload {
    /// Form of this payload.
    pub fn form(&self) -> DataForm {
        match self {
            DataPayload::Command(_) => DataForm::Command,
            DataPayload::Samples(_) => DataForm::Samples,
        }
    }
}

/// Command string or sample block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataMessage {
    /// Sender node id.
    pub id: u8,
    /// Payload.
    pub payload: DataPayload,
}

impl DataMessage {
    /// Create a command-form message.
    pub fn command(id: u8, text: &str) -> Self {
        Self {
            id,
            payload: DataPayload::Command(CommandText::new(text)),
        }
    }

    /// Create a sample-form message, zero-filling past `samples.len()`.
    pub fn samples(id: u8, samples: &[u16]) -> Self {
        let mut block = [0u16; DATA_PAYLOAD_LEN];
        let len = samples.len().min(DATA_PAYLOAD_LEN);
        block[..len].copy_from_slice(&samples[..len]);
        Self {
            id,
            payload: DataPayload::Samples(block),
        }
    }

    /// Parse from bytes in the given form. Trailing bytes are ignored.
    pub fn from_bytes(bytes: &[u8], form: DataForm) -> Result<Self, DecodeError> {
        check_len(bytes, form.wire_size())?;
        let payload = match form {
            DataForm::Command => {
                let mut text = [0u8; DATA_PAYLOAD_LEN];
                text.copy_from_slice(&bytes[2..DATA_COMMAND_SIZE]);
                // Enforce termination even if the sender filled all 100 bytes.
                text[DATA_PAYLOAD_LEN - 1] = 0;
                DataPayload::Command(CommandText(text))
            }
            DataForm::Samples => {
                let mut block = [0u16; DATA_PAYLOAD_LEN];
                for (i, chunk) in bytes[2..DATA_SAMPLES_SIZE].chunks_exact(2).enumerate() {
                    block[i] = u16::from_le_bytes([chunk[0], chunk[1]]);
                }
                DataPayload::Samples(block)
            }
        };
        Ok(Self {
            id: bytes[1],
            payload,
        })
    }

    /// Serialize into `out`, returning the number of bytes written.
    fn write_into(&self, out: &mut [u8]) -> usize {
        out[0] = TAG_DATA;
        out[1] = self.id;
        match &self.payload {
            DataPayload::Command(text) => {
                out[2..DATA_COMMAND_SIZE].copy_from_slice(text.raw());
                DATA_COMMAND_SIZE
            }
            DataPayload::Samples(block) => {
                for (i, sample) in block.iter().enumerate() {
                    let at = 2 + i * 2;
                    out[at..at + 2].copy_from_slice(&sample.to_le_bytes());
                }
                DATA_SAMPLES_SIZE
            }
        }
    }
}

/// Liveness probe. The robot echoes it back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatMessage {
    /// Sender node id.
    pub id: u8,
    /// Sender's millisecond clock when the probe was created.
    pub timestamp: u32,
}

impl HeartbeatMessage {
    /// Serialize to bytes (6 bytes).
    pub fn to_bytes(&self) -> [u8; HEARTBEAT_SIZE] {
        let mut buf = [0u8; HEARTBEAT_SIZE];
        buf[0] = TAG_HEARTBEAT;
        buf[1] = self.id;
        buf[2..6].copy_from_slice(&self.timestamp.to_le_bytes());
        buf
    }

    /// Parse from bytes. Trailing bytes are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        check_len(bytes, HEARTBEAT_SIZE)?;
        Ok(Self {
            id: bytes[1],
            timestamp: u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]),
        })
    }
}

/// A decoded link message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// Pairing request or acknowledgement.
    Pairing(PairingMessage),
    /// Command or samples.
    Data(DataMessage),
    /// Liveness probe.
    Heartbeat(HeartbeatMessage),
    /// Tag this build does not know. Carried so neighbours on the shared
    /// channel can run newer firmware without breaking us.
    Unknown(u8),
}

impl Message {
    /// Wire tag of this message.
    pub fn tag(&self) -> u8 {
        match self {
            Message::Pairing(_) => TAG_PAIRING,
            Message::Data(_) => TAG_DATA,
            Message::Heartbeat(_) => TAG_HEARTBEAT,
            Message::Unknown(tag) => *tag,
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Pairing(_) => "pairing",
            Message::Data(_) => "data",
            Message::Heartbeat(_) => "heartbeat",
            Message::Unknown(_) => "unknown",
        }
    }

    /// Serialize into `out`, returning the number of bytes written.
    ///
    /// `out` must hold at least [`crate::core::MAX_DATAGRAM_SIZE`] bytes.
    pub fn encode_into(&self, out: &mut [u8]) -> usize {
        match self {
            Message::Pairing(m) => {
                out[..PAIRING_SIZE].copy_from_slice(&m.to_bytes());
                PAIRING_SIZE
            }
            Message::Data(m) => m.write_into(out),
            Message::Heartbeat(m) => {
                out[..HEARTBEAT_SIZE].copy_from_slice(&m.to_bytes());
                HEARTBEAT_SIZE
            }
            Message::Unknown(tag) => {
                out[0] = *tag;
                1
            }
        }
    }
}

/// Check a datagram is at least `expected` bytes long.
fn check_len(bytes: &[u8], expected: usize) -> Result<(), DecodeError> {
    if bytes.len() < expected {
        return Err(DecodeError::TooShort {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}
