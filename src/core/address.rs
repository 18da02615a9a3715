//! Radio hardware addresses.

use std::fmt;
use std::str::FromStr;

use super::constants::ADDRESS_SIZE;
use super::error::AddressParseError;

/// A 6-byte radio hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress([u8; ADDRESS_SIZE]);

impl MacAddress {
    /// The all-0xFF broadcast address.
    pub const BROADCAST: Self = Self([0xFF; ADDRESS_SIZE]);

    /// The all-zero address, used as "no peer".
    pub const ZERO: Self = Self([0; ADDRESS_SIZE]);

    /// Create an address from raw bytes.
    pub const fn new(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create an address from a slice of exactly 6 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; ADDRESS_SIZE] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Get the address bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    /// Check if this is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Check if this is the all-zero address.
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; ADDRESS_SIZE];
        let mut parts = s.split([':', '-']);
        for byte in &mut bytes {
            let part = parts
                .next()
                .ok_or_else(|| AddressParseError(s.to_string()))?;
            if part.len() != 2 {
                return Err(AddressParseError(s.to_string()));
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| AddressParseError(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(AddressParseError(s.to_string()));
        }
        Ok(Self(bytes))
    }
}

impl From<[u8; ADDRESS_SIZE]> for MacAddress {
    fn from(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self::new(bytes)
    }
}

impl From<MacAddress> for [u8; ADDRESS_SIZE] {
    fn from(addr: MacAddress) -> [u8; ADDRESS_SIZE] {
        addr.0
    }
}

impl AsRef<[u8]> for MacAddress {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Which end of the link this node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Hand-held controller: broadcasts pairing requests, sends heartbeats.
    Controller,
    /// Quadruped receiver: answers pairing, echoes heartbeats, drives servos.
    Robot,
}

impl Role {
    /// Id this role writes into every outbound message.
    pub fn node_id(self) -> u8 {
        match self {
            Role::Controller => super::constants::CONTROLLER_ID,
            Role::Robot => super::constants::ROBOT_ID,
        }
    }

    /// Id expected on messages from the opposite role.
    pub fn peer_id(self) -> u8 {
        match self {
            Role::Controller => super::constants::ROBOT_ID,
            Role::Robot => super::constants::CONTROLLER_ID,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Controller => f.write_str("controller"),
            Role::Robot => f.write_str("robot"),
        }
    }
}
