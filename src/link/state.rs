//! Link state owned by the state machine.

use std::fmt;
use std::time::Duration;

use crate::core::{MacAddress, Role};

/// Operational state.
///
/// The robot walks the whole cycle; a controller only moves between
/// `Unpaired` and `Paired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RobotState {
    /// Waiting for a peer.
    #[default]
    Unpaired,
    /// Peer known, actuators not yet energized.
    Paired,
    /// Actuators energized, robot operational.
    Started,
}

impl fmt::Display for RobotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RobotState::Unpaired => f.write_str("unpaired"),
            RobotState::Paired => f.write_str("paired"),
            RobotState::Started => f.write_str("started"),
        }
    }
}

/// Per-device link state.
///
/// Timestamps are readings of the node's wrapping millisecond clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkState {
    /// Which end of the link this node is.
    pub role: Role,
    /// Whether a peer is registered.
    pub paired: bool,
    /// Registered peer.
    pub peer: Option<MacAddress>,
    /// When the last heartbeat left this node.
    pub last_heartbeat_sent_at: u32,
    /// When the last valid message from the peer was processed.
    pub last_heartbeat_received_at: u32,
    /// When the last pairing broadcast left, or when pairing was lost.
    pub pair_attempt_at: u32,
    /// This node's hardware address.
    pub local_address: MacAddress,
    /// Radio channel.
    pub channel: u8,
    /// Operational state.
    pub robot_state: RobotState,
}

impl LinkState {
    /// Fresh unpaired state.
    pub fn new(role: Role, local_address: MacAddress, channel: u8) -> Self {
        Self {
            role,
            paired: false,
            peer: None,
            last_heartbeat_sent_at: 0,
            last_heartbeat_received_at: 0,
            pair_attempt_at: 0,
            local_address,
            channel,
            robot_state: RobotState::Unpaired,
        }
    }

    /// Milliseconds since the peer was last heard.
    ///
    /// A reception stamped after `now` counts as zero.
    pub fn silence_ms(&self, now: u32) -> u32 {
        let elapsed = now.wrapping_sub(self.last_heartbeat_received_at);
        if elapsed > i32::MAX as u32 { 0 } else { elapsed }
    }

    /// Check if a datagram from `sender` belongs to the current session.
    pub fn is_peer(&self, sender: MacAddress) -> bool {
        self.paired && self.peer == Some(sender)
    }
}

/// Read-only snapshot of the link published to the other tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkStatus {
    /// Which end of the link this node is.
    pub role: Role,
    /// Whether a peer is registered.
    pub paired: bool,
    /// Registered peer.
    pub peer: Option<MacAddress>,
    /// Operational state.
    pub state: RobotState,
    /// Smoothed heartbeat round trip (controller only).
    pub srtt: Option<Duration>,
    /// Latest heartbeat round trip in milliseconds (controller only).
    pub last_rtt_ms: Option<u32>,
}

impl LinkStatus {
    /// Status of a node that has not booted its link yet.
    pub fn unpaired(role: Role) -> Self {
        Self {
            role,
            paired: false,
            peer: None,
            state: RobotState::Unpaired,
            srtt: None,
            last_rtt_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_wraps() {
        let mut state = LinkState::new(Role::Controller, MacAddress::ZERO, 1);
        state.last_heartbeat_received_at = u32::MAX - 99;
        assert_eq!(state.silence_ms(400), 500);
    }

    #[test]
    fn test_silence_future_reception() {
        let mut state = LinkState::new(Role::Robot, MacAddress::ZERO, 1);
        state.last_heartbeat_received_at = 1_000;
        assert_eq!(state.silence_ms(999), 0);
    }

    #[test]
    fn test_is_peer() {
        let mut state = LinkState::new(Role::Robot, MacAddress::ZERO, 1);
        let peer = MacAddress::new([7; 6]);
        assert!(!state.is_peer(peer));
        state.paired = true;
        state.peer = Some(peer);
        assert!(state.is_peer(peer));
        assert!(!state.is_peer(MacAddress::new([8; 6])));
    }
}
