//! Event group: a word of signal bits shared between tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::Notify;

/// A peer was registered.
pub const EVENT_PAIRED: u32 = 1 << 0;

/// The peer was dropped.
pub const EVENT_UNPAIRED: u32 = 1 << 1;

/// Robot actuators are energized.
pub const EVENT_STARTED: u32 = 1 << 2;

/// Signal bits that tasks can set and wait on.
///
/// Setting bits wakes every waiter. A waiter that asks for clear-on-exit
/// consumes the bits it matched, so one edge wakes it once.
#[derive(Debug, Clone, Default)]
pub struct EventGroup {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    bits: AtomicU32,
    notify: Notify,
}

impl EventGroup {
    /// Create a group with every bit clear.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `bits`, returning the resulting word.
    pub fn set(&self, bits: u32) -> u32 {
        let prev = self.inner.bits.fetch_or(bits, Ordering::AcqRel);
        self.inner.notify.notify_waiters();
        prev | bits
    }

    /// Clear `bits`, returning the word before clearing.
    pub fn clear(&self, bits: u32) -> u32 {
        self.inner.bits.fetch_and(!bits, Ordering::AcqRel)
    }

    /// Current word.
    pub fn get(&self) -> u32 {
        self.inner.bits.load(Ordering::Acquire)
    }

    /// Wait until any bit in `mask` is set and return the matched bits.
    ///
    /// With `clear_on_exit` the matched bits are cleared before returning.
    pub async fn wait_any(&self, mask: u32, clear_on_exit: bool) -> u32 {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a set() in between is not lost.
            notified.as_mut().enable();

            let matched = if clear_on_exit {
                self.inner.bits.fetch_and(!mask, Ordering::AcqRel) & mask
            } else {
                self.get() & mask
            };
            if matched != 0 {
                return matched;
            }
            notified.await;
        }
    }
}
