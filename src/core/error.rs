//! Error types for the Q8 link layer.
//!
//! Protocol errors (decode failures, unknown senders) are handled inside the
//! link state machine and never reach callers. The remaining types describe
//! collaborator failures and boot failures.

use std::io;

use thiserror::Error;

use super::address::MacAddress;

/// Errors produced while decoding a wire message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Datagram carried no bytes at all.
    #[error("empty datagram")]
    Empty,

    /// Datagram is shorter than the variant its tag names.
    #[error("message too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Size of the variant named by the tag.
        expected: usize,
        /// Bytes received.
        actual: usize,
    },
}

/// Errors from the radio transport adapter.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Unicast send to an address that was never registered as a peer.
    #[error("unknown peer {0}")]
    UnknownPeer(MacAddress),

    /// Payload exceeds the medium's datagram limit.
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    /// The medium refused the frame (link down, queue full, radio off).
    #[error("send failed: {0}")]
    SendFailed(String),

    /// A receive callback is already registered.
    #[error("receive callback already registered")]
    CallbackRegistered,

    /// I/O error from a host emulation of the medium.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Check if this error is ordinary datagram loss.
    ///
    /// The link never retries a failed send: the next periodic heartbeat or
    /// pairing broadcast is the retry. Such failures are logged at debug level
    /// and otherwise ignored.
    pub fn is_silent_drop(&self) -> bool {
        matches!(
            self,
            TransportError::SendFailed(_) | TransportError::UnknownPeer(_)
        )
    }
}

/// Errors from the persistent key/value region.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backing store I/O failed.
    #[error("storage i/o error: {0}")]
    Io(#[from] io::Error),

    /// Namespace or key is not usable as a storage name.
    #[error("invalid storage name: {0:?}")]
    InvalidName(String),
}

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("cannot read config: {0}")]
    Io(#[from] io::Error),

    /// Configuration file is not valid TOML for [`crate::config::LinkConfig`].
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Boot failures. Any of these halts the node.
#[derive(Debug, Error)]
pub enum InitError {
    /// A queue could not be created.
    #[error("failed to create {0} queue")]
    Queue(&'static str),

    /// The event group could not be created.
    #[error("failed to create event group")]
    EventGroup,

    /// A task could not be started.
    #[error("failed to create {0} task")]
    Task(&'static str),

    /// The radio could not be brought up.
    #[error("radio init failed: {0}")]
    Transport(#[from] TransportError),

    /// Configuration was rejected.
    #[error("config rejected: {0}")]
    Config(#[from] ConfigError),
}

/// Error parsing a textual hardware address.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid hardware address: {0:?}")]
pub struct AddressParseError(pub String);

/// Top-level link errors.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Decode error.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Boot error.
    #[error("init error: {0}")]
    Init(#[from] InitError),

    /// The node's tasks have shut down.
    #[error("node stopped")]
    Stopped,
}
