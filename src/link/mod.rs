//! Link state machine.
//!
//! ```text
//!             pairing request (robot) / ack (controller)
//!  Unpaired ───────────────────────────────────────────▶ Paired
//!     ▲                                                    │
//!     │ timeout or unpair()          bridge ready (robot)  │
//!     │                                                    ▼
//!     └──────────────────────────────────────────────── Started
//! ```
//!
//! Heartbeats and Data from the peer keep the link alive; anything else is
//! transport noise. The robot forces torque off before it reports
//! `Unpaired`.

#[cfg(feature = "runtime")]
mod clock;
mod envelope;
mod machine;
mod rtt;
mod state;

#[cfg(feature = "runtime")]
pub use clock::LinkClock;
pub use envelope::InboundEnvelope;
pub use machine::{LinkEvent, LinkStateMachine, LinkStats};
pub use rtt::RttEstimator;
pub use state::{LinkState, LinkStatus, RobotState};
