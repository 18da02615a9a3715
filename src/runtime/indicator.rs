//! Status indicator blink patterns.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::link::{LinkStatus, RobotState};

use super::stopped;

/// A single dimmable indicator, usually an LED.
pub trait StatusIndicator: Send {
    /// Set brightness, 0 is off and 255 full.
    fn set_level(&mut self, level: u8);
}

impl<T: StatusIndicator + ?Sized> StatusIndicator for Box<T> {
    fn set_level(&mut self, level: u8) {
        (**self).set_level(level)
    }
}

/// One step of a blink pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkStep {
    /// Brightness for this step.
    pub level: u8,
    /// How long the step lasts.
    pub hold: Duration,
}

const fn step(level: u8, ms: u64) -> BlinkStep {
    BlinkStep {
        level,
        hold: Duration::from_millis(ms),
    }
}

const BREATH_STEPS: u64 = 20;
const BREATH_STEP_MS: u64 = 250;

/// Repeating pattern for a state.
///
/// - `Unpaired`: one 1 s pulse every 2 s.
/// - `Paired`: two short pulses every 4 s.
/// - `Started`: a breathing ramp up and down every 10 s.
pub fn blink_pattern(state: RobotState) -> Vec<BlinkStep> {
    match state {
        RobotState::Unpaired => vec![step(255, 1000), step(0, 1000)],
        RobotState::Paired => vec![step(255, 200), step(0, 200), step(255, 200), step(0, 3400)],
        RobotState::Started => {
            let up = (0..BREATH_STEPS).map(|i| (i * 255 / BREATH_STEPS) as u8);
            let down = (0..BREATH_STEPS).map(|i| (255 - i * 255 / BREATH_STEPS) as u8);
            up.chain(down).map(|level| step(level, BREATH_STEP_MS)).collect()
        }
    }
}

/// Total length of one pattern cycle.
pub fn cycle_length(pattern: &[BlinkStep]) -> Duration {
    pattern.iter().map(|s| s.hold).sum()
}

/// Play the pattern for the current state, restarting whenever the state
/// changes. The indicator is switched off on shutdown.
pub(crate) async fn run_indicator<I: StatusIndicator>(
    mut indicator: I,
    mut status: watch::Receiver<LinkStatus>,
    mut shutdown: watch::Receiver<bool>,
) {
    'restart: loop {
        let state = status.borrow_and_update().state;
        let pattern = blink_pattern(state);
        loop {
            for step in &pattern {
                indicator.set_level(step.level);
                let deadline = Instant::now() + step.hold;
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => break,
                        changed = status.changed() => {
                            if changed.is_err() {
                                indicator.set_level(0);
                                return;
                            }
                            if status.borrow().state != state {
                                continue 'restart;
                            }
                        }
                        _ = stopped(&mut shutdown) => {
                            indicator.set_level(0);
                            return;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Role;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<(u8, Instant)>>>);

    impl StatusIndicator for Recorder {
        fn set_level(&mut self, level: u8) {
            self.0.lock().push((level, Instant::now()));
        }
    }

    #[test]
    fn test_pattern_cycles() {
        assert_eq!(
            cycle_length(&blink_pattern(RobotState::Unpaired)),
            Duration::from_secs(2)
        );
        assert_eq!(
            cycle_length(&blink_pattern(RobotState::Paired)),
            Duration::from_secs(4)
        );
        let breathing = blink_pattern(RobotState::Started);
        assert_eq!(cycle_length(&breathing), Duration::from_secs(10));
        assert_eq!(breathing[0].level, 0);
        assert_eq!(breathing[BREATH_STEPS as usize].level, 255);
    }

    #[test]
    fn test_paired_has_two_pulses() {
        let on = blink_pattern(RobotState::Paired)
            .iter()
            .filter(|s| s.level > 0)
            .count();
        assert_eq!(on, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restarts_on_state_change() {
        let recorder = Recorder::default();
        let (status_tx, status_rx) = watch::channel(LinkStatus::unpaired(Role::Robot));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_indicator(recorder.clone(), status_rx, shutdown_rx));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        // on, off, on
        assert_eq!(
            recorder.0.lock().iter().map(|(l, _)| *l).collect::<Vec<_>>(),
            [255, 0, 255]
        );

        let mut paired = LinkStatus::unpaired(Role::Robot);
        paired.paired = true;
        paired.state = RobotState::Paired;
        status_tx.send_replace(paired);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(recorder.0.lock().len(), 4);

        // A status change that keeps the state does not restart.
        let mut same = status_tx.borrow().clone();
        same.last_rtt_ms = Some(3);
        status_tx.send_replace(same);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recorder.0.lock().len(), 4);

        shutdown_tx.send_replace(true);
        task.await.unwrap();
        assert_eq!(recorder.0.lock().last().map(|(l, _)| *l), Some(0));
    }
}
