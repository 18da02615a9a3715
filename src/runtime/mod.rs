//! Concurrency core.
//!
//! A node is a fixed set of long-lived Tokio tasks created at boot:
//!
//! | Task               | Priority | Role       | Wakes on                    |
//! |--------------------|----------|------------|-----------------------------|
//! | command forwarding | 4        | controller | 4 ms period                 |
//! | link worker        | 3        | both       | inbound queue, command      |
//! | heartbeat          | 2        | controller | 5 s period                  |
//! | monitor            | 2        | both       | 1 s period                  |
//! | pairing            | 2        | controller | 2 s period, unpaired event  |
//! | status / input     | 1        | both       | state change, 10 ms period  |
//! | console output     | 0        | both       | 10 ms period                |
//!
//! The link worker owns the [`LinkStateMachine`](crate::link::LinkStateMachine)
//! and is the only task that mutates link state. The radio receive callback
//! only performs a non-blocking, drop-on-full push into the [`InboundQueue`].
//! Other tasks read the published [`LinkStatus`](crate::link::LinkStatus)
//! and send [`LinkCommand`]s to the worker.

mod event;
mod inbound;
mod indicator;
mod node;
mod periodic;
mod task;
mod tasks;
mod worker;

pub use event::{EVENT_PAIRED, EVENT_STARTED, EVENT_UNPAIRED, EventGroup};
pub use inbound::InboundQueue;
pub use indicator::{BlinkStep, StatusIndicator, blink_pattern, cycle_length};
pub use node::{NodeHandle, NodeOptions, spawn_node};
pub use periodic::Periodic;
pub use task::{TaskPriority, TaskSpec};
pub use tasks::CONSOLE_POLL_INTERVAL;
pub use worker::{LinkCommand, format_samples};

use tokio::sync::watch;

/// Resolve once shutdown is signalled or the signalling side is gone.
pub(crate) async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
