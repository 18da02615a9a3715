//! Link millisecond clock.

use tokio::time::Instant;

/// Wrapping millisecond clock, like a microcontroller's `millis()`.
///
/// Backed by [`tokio::time::Instant`] so paused-time tests drive it.
#[derive(Debug, Clone, Copy)]
pub struct LinkClock {
    origin: Instant,
    offset: u32,
}

impl LinkClock {
    /// Clock reading zero now.
    pub fn new() -> Self {
        Self::with_offset(0)
    }

    /// Clock reading `offset` now. Useful to exercise wraparound.
    pub fn with_offset(offset: u32) -> Self {
        Self {
            origin: Instant::now(),
            offset,
        }
    }

    /// Current reading in milliseconds, wrapping at `u32::MAX`.
    pub fn now_ms(&self) -> u32 {
        let elapsed = self.origin.elapsed().as_millis() as u64;
        self.offset.wrapping_add(elapsed as u32)
    }
}

impl Default for LinkClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_clock_advances_with_time() {
        let clock = LinkClock::new();
        assert_eq!(clock.now_ms(), 0);
        tokio::time::advance(Duration::from_millis(1_500)).await;
        assert_eq!(clock.now_ms(), 1_500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_wraps() {
        let clock = LinkClock::with_offset(u32::MAX - 9);
        tokio::time::advance(Duration::from_millis(20)).await;
        assert_eq!(clock.now_ms(), 10);
    }
}
