//! Simulated servo bus and fuel gauge for host builds and tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use parking_lot::Mutex;

use super::q8::{FuelGauge, JointReading, ServoBus};
use crate::core::{JOINT_COUNT, SERVO_ZERO_OFFSET};

/// Observable state of a [`SimServoBus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimBusState {
    /// Torque enabled.
    pub torque: bool,
    /// Last goal positions written.
    pub goals: [i32; JOINT_COUNT],
    /// Programmed profile velocity.
    pub profile_velocity: u16,
    /// Programmed profile acceleration.
    pub profile_acceleration: u16,
    /// Number of bulk writes.
    pub writes: usize,
    /// Present current reported per joint.
    pub currents: [i16; JOINT_COUNT],
    /// Make bulk reads fail.
    pub fail_reads: bool,
}

impl Default for SimBusState {
    fn default() -> Self {
        Self {
            torque: false,
            goals: [SERVO_ZERO_OFFSET; JOINT_COUNT],
            profile_velocity: 0,
            profile_acceleration: 0,
            writes: 0,
            currents: [0; JOINT_COUNT],
            fail_reads: false,
        }
    }
}

/// Servo bus whose joints reach their goal instantly.
///
/// Clones share state, so a test can keep one clone to inspect what the
/// bridge wrote.
#[derive(Debug, Clone, Default)]
pub struct SimServoBus {
    state: Arc<Mutex<SimBusState>>,
}

impl SimServoBus {
    /// Create a bus with torque off and every joint at zero degrees.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> SimBusState {
        self.state.lock().clone()
    }

    /// Set the current one joint reports.
    pub fn set_current(&self, joint: usize, current: i16) {
        if let Some(slot) = self.state.lock().currents.get_mut(joint) {
            *slot = current;
        }
    }

    /// Make bulk reads fail or succeed.
    pub fn set_read_failure(&self, fail: bool) {
        self.state.lock().fail_reads = fail;
    }
}

impl ServoBus for SimServoBus {
    fn set_torque(&mut self, enabled: bool) {
        self.state.lock().torque = enabled;
    }

    fn set_profile(&mut self, velocity: u16, acceleration: u16) {
        let mut state = self.state.lock();
        state.profile_velocity = velocity;
        state.profile_acceleration = acceleration;
    }

    fn bulk_write(&mut self, goals: &[i32; JOINT_COUNT]) {
        let mut state = self.state.lock();
        state.goals = *goals;
        state.writes += 1;
    }

    fn bulk_read(&mut self) -> Option<[JointReading; JOINT_COUNT]> {
        let state = self.state.lock();
        if state.fail_reads {
            return None;
        }
        let mut readings = [JointReading::default(); JOINT_COUNT];
        for (i, reading) in readings.iter_mut().enumerate() {
            reading.current = state.currents[i];
            reading.position = state.goals[i];
        }
        Some(readings)
    }
}

/// Fuel gauge reporting a settable percentage.
#[derive(Debug, Clone)]
pub struct SimFuelGauge {
    percent: Arc<AtomicU16>,
}

impl SimFuelGauge {
    /// Create a gauge reporting `percent`.
    pub fn new(percent: u16) -> Self {
        Self {
            percent: Arc::new(AtomicU16::new(percent)),
        }
    }

    /// Change the reported percentage.
    pub fn set_percent(&self, percent: u16) {
        self.percent.store(percent, Ordering::Relaxed);
    }
}

impl FuelGauge for SimFuelGauge {
    fn percent(&mut self) -> u16 {
        self.percent.load(Ordering::Relaxed)
    }
}
