//! Drift-free periodic wakeups.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Fixed-period ticker.
///
/// Deadlines are aligned to the start instant, not to when the work
/// finished, so jitter in a task body does not accumulate into drift.
/// Missed deadlines are caught up in a burst.
#[derive(Debug)]
pub struct Periodic {
    interval: Interval,
    period: Duration,
}

impl Periodic {
    /// Ticker whose first tick completes immediately.
    pub fn new(period: Duration) -> Self {
        Self::starting_at(Instant::now(), period)
    }

    /// Ticker whose first tick completes one period from now.
    pub fn delayed(period: Duration) -> Self {
        Self::starting_at(Instant::now() + period, period)
    }

    fn starting_at(start: Instant, period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
        Self { interval, period }
    }

    /// Wait for the next deadline and return it.
    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }

    /// Restart the schedule so the next tick is one period from now.
    pub fn reset(&mut self) {
        self.interval.reset();
    }

    /// Restart the schedule so the next tick completes immediately.
    pub fn reset_immediately(&mut self) {
        self.interval.reset_immediately();
    }

    /// Tick period.
    pub fn period(&self) -> Duration {
        self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadlines_do_not_drift() {
        let start = Instant::now();
        let mut ticker = Periodic::delayed(Duration::from_millis(100));
        for n in 1..=5u32 {
            let deadline = ticker.tick().await;
            assert_eq!(deadline - start, Duration::from_millis(100) * n);
            // Work that eats most of the period.
            tokio::time::sleep(Duration::from_millis(70)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_catch_up() {
        let start = Instant::now();
        let mut ticker = Periodic::new(Duration::from_millis(10));
        ticker.tick().await;
        tokio::time::sleep(Duration::from_millis(35)).await;

        // Three deadlines passed; all complete without waiting.
        for n in 1..=3u32 {
            let deadline = ticker.tick().await;
            assert_eq!(deadline - start, Duration::from_millis(10) * n);
        }
        assert_eq!(Instant::now() - start, Duration::from_millis(35));
    }
}
