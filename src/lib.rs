//! # Q8 Link
//!
//! Link management for a hand-held controller and a quadruped robot talking
//! over a connectionless radio datagram service (ESP-NOW style: 6-byte
//! hardware addresses, broadcast, payloads up to 250 bytes, no delivery
//! acknowledgement).
//!
//! - **Pairing**: the controller broadcasts, the first robot to answer wins,
//!   and the peer address survives power cycles.
//! - **Liveness**: periodic heartbeats, echoed by the robot, with an RTT
//!   estimate on the controller. Silence past the timeout unpairs, and the
//!   robot turns torque off first.
//! - **Concurrency**: one worker task owns all link state; the receive path
//!   only pushes into a bounded queue.
//!
//! ## Feature Flags
//!
//! - `runtime` (default): Tokio task set, event group and inbound queue
//! - `udp` (default): host emulation of the radio medium over UDP
//!
//! ## Modules
//!
//! - [`core`]: constants, addresses and error types
//! - [`codec`]: the three wire messages
//! - [`radio`]: transport trait, in-process [`radio::Ether`] and UDP radio
//! - [`storage`]: key-value persistence of the peer address
//! - [`link`]: the link state machine
//! - [`bridge`]: robot actuator/sensor bridge
//! - [`config`]: TOML configuration
//! - [`console`]: operator console and `tracing` sink
//! - [`runtime`]: node boot and task set (requires `runtime` feature)
//!
//! ## Example Usage
//!
//! ```rust
//! use q8link::prelude::*;
//!
//! let ether = Ether::new();
//! let controller = MacAddress::new([0x24, 0x6f, 0x28, 0, 0, 1]);
//! let robot = MacAddress::new([0x24, 0x6f, 0x28, 0, 0, 2]);
//! let config = LinkConfig::default();
//!
//! let mut machine = LinkStateMachine::new(
//!     Role::Robot,
//!     ether.attach(robot, config.channel),
//!     MemoryStore::new(),
//!     Detached,
//!     &config,
//! );
//! machine.boot(0);
//!
//! let request = encode(&Message::Pairing(PairingMessage {
//!     id: CONTROLLER_ID,
//!     address: controller,
//!     channel: config.channel,
//! }));
//! let envelope = InboundEnvelope::new(controller, &request, 10).unwrap();
//! assert_eq!(machine.handle(&envelope), Some(LinkEvent::Paired(controller)));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod bridge;
pub mod codec;
pub mod config;
pub mod console;
pub mod core;
pub mod link;
pub mod radio;
pub mod storage;

// Task set (feature-gated)
#[cfg(feature = "runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
pub mod runtime;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bridge::{ActuatorBridge, Detached, JointCommand, Q8Bridge, SpecialResult};
    pub use crate::codec::{
        DataMessage, DataPayload, HeartbeatMessage, Message, MessageCodec, PairingMessage, encode,
    };
    pub use crate::config::LinkConfig;
    pub use crate::core::*;
    pub use crate::link::{InboundEnvelope, LinkEvent, LinkStateMachine, LinkStatus, RobotState};
    pub use crate::radio::{Ether, EtherPort, RadioTransport};
    pub use crate::storage::{FileStore, KeyValueStore, MemoryStore, PeerIdentityStore};

    #[cfg(feature = "runtime")]
    pub use crate::runtime::{LinkCommand, NodeHandle, NodeOptions, spawn_node};
}

// Re-export commonly used items at crate root
pub use crate::core::{DecodeError, InitError, LinkError, MacAddress, Role, TransportError};
pub use crate::link::{LinkEvent, LinkStateMachine};

#[cfg(feature = "runtime")]
pub use crate::runtime::{NodeHandle, spawn_node};
