//! Q8 quadruped bridge: eight position-controlled servos and a fuel gauge.

use super::command::{JointCommand, special};
use super::telemetry::RecordedTelemetry;
use super::{ActuatorBridge, SpecialResult};
use crate::core::{CURRENT_SAMPLE_OFFSET, DEFAULT_PROFILE, JOINT_COUNT, RECORD_SAMPLE_WIDTH};

/// One joint's registers from a bulk read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JointReading {
    /// Present current, raw servo units.
    pub current: i16,
    /// Present velocity, raw servo units.
    pub velocity: i32,
    /// Present position, raw servo units.
    pub position: i32,
}

/// Servo bus driver.
pub trait ServoBus: Send {
    /// Enable or disable torque on every joint.
    fn set_torque(&mut self, enabled: bool);

    /// Program the velocity and acceleration profile on every joint.
    fn set_profile(&mut self, velocity: u16, acceleration: u16);

    /// Write goal positions to every joint in one transaction.
    fn bulk_write(&mut self, goals: &[i32; JOINT_COUNT]);

    /// Read every joint in one transaction. `None` if any joint is silent.
    fn bulk_read(&mut self) -> Option<[JointReading; JOINT_COUNT]>;
}

/// Battery fuel gauge.
pub trait FuelGauge: Send {
    /// State of charge, percent.
    fn percent(&mut self) -> u16;
}

/// [`ActuatorBridge`] for the Q8 robot.
#[derive(Debug)]
pub struct Q8Bridge<B, G> {
    bus: B,
    gauge: G,
    profile: u16,
    torque: bool,
    recording: RecordedTelemetry,
}

impl<B: ServoBus, G: FuelGauge> Q8Bridge<B, G> {
    /// Create the bridge and program the default profile.
    pub fn new(mut bus: B, gauge: G) -> Self {
        bus.set_profile(DEFAULT_PROFILE, DEFAULT_PROFILE / 3);
        Self {
            bus,
            gauge,
            profile: DEFAULT_PROFILE,
            torque: false,
            recording: RecordedTelemetry::new(),
        }
    }

    /// Recorded samples not yet flushed.
    pub fn recording(&self) -> &RecordedTelemetry {
        &self.recording
    }

    /// Servo bus.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Current velocity profile.
    pub fn profile(&self) -> u16 {
        self.profile
    }

    /// First joints' current and position, the record layout.
    fn sample(&mut self) -> [u16; RECORD_SAMPLE_WIDTH] {
        let mut record = [0u16; RECORD_SAMPLE_WIDTH];
        if let Some(readings) = self.bus.bulk_read() {
            for (pair, reading) in record.chunks_exact_mut(2).zip(readings.iter()) {
                pair[0] = (reading.current as i32 + CURRENT_SAMPLE_OFFSET) as u16;
                pair[1] = reading.position as u16;
            }
        }
        record
    }
}

impl<B: ServoBus, G: FuelGauge> ActuatorBridge for Q8Bridge<B, G> {
    fn apply_joint_command(&mut self, command: &JointCommand) -> SpecialResult {
        match command.special {
            Some(special::BATTERY) => return SpecialResult::ReportBattery,
            Some(special::FLUSH) => return SpecialResult::FlushRecordedSamples,
            _ => {}
        }

        if let Some(profile) = command.profile {
            if profile != self.profile {
                tracing::info!("Profile changed: {}", profile);
                self.bus.set_profile(profile, profile / 3);
                self.profile = profile;
            }
        }

        if let Some(torque) = command.torque {
            if torque != self.torque {
                tracing::info!("Torque {}", if torque { "on" } else { "off" });
                self.bus.set_torque(torque);
                self.torque = torque;
                return SpecialResult::None;
            }
        }

        self.bus.bulk_write(&command.servo_positions());
        if command.special == Some(special::RECORD) {
            SpecialResult::RecordSample
        } else {
            SpecialResult::None
        }
    }

    fn torque_off(&mut self) {
        self.bus.set_torque(false);
        self.torque = false;
    }

    fn is_ready(&self) -> bool {
        self.torque
    }

    fn battery_percent(&mut self) -> u16 {
        self.gauge.percent()
    }

    fn record_sample(&mut self) {
        let record = self.sample();
        self.recording.push(&record);
    }

    fn take_recorded(&mut self) -> Vec<u16> {
        self.recording.take()
    }

    fn release_recording(&mut self) {
        self.recording.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{SimFuelGauge, SimServoBus};

    fn bridge() -> (Q8Bridge<SimServoBus, SimFuelGauge>, SimServoBus) {
        let bus = SimServoBus::new();
        (Q8Bridge::new(bus.clone(), SimFuelGauge::new(87)), bus)
    }

    #[test]
    fn test_default_profile_programmed() {
        let (_bridge, bus) = bridge();
        let state = bus.snapshot();
        assert_eq!(state.profile_velocity, 1000);
        assert_eq!(state.profile_acceleration, 333);
    }

    #[test]
    fn test_positions_written() {
        let (mut bridge, bus) = bridge();
        let result = bridge.apply_joint_command(&JointCommand::parse("90,0,0,0,0,0,0,45"));
        assert_eq!(result, SpecialResult::None);
        let state = bus.snapshot();
        assert_eq!(state.goals[0], 5120);
        assert_eq!(state.goals[7], 4608);
        assert_eq!(state.writes, 1);
    }

    #[test]
    fn test_battery_and_flush_skip_write() {
        let (mut bridge, bus) = bridge();
        assert_eq!(
            bridge.apply_joint_command(&JointCommand::parse("1,1,1,1,1,1,1,1,1")),
            SpecialResult::ReportBattery
        );
        assert_eq!(
            bridge.apply_joint_command(&JointCommand::parse("1,1,1,1,1,1,1,1,3")),
            SpecialResult::FlushRecordedSamples
        );
        assert_eq!(bus.snapshot().writes, 0);
        assert_eq!(bridge.battery_percent(), 87);
    }

    #[test]
    fn test_torque_toggle_skips_write() {
        let (mut bridge, bus) = bridge();
        assert!(!bridge.is_ready());

        let on = JointCommand::parse("0,0,0,0,0,0,0,0,0,1000,1");
        assert_eq!(bridge.apply_joint_command(&on), SpecialResult::None);
        assert!(bridge.is_ready());
        assert!(bus.snapshot().torque);
        assert_eq!(bus.snapshot().writes, 0);

        // Same flag again: positions are written.
        bridge.apply_joint_command(&on);
        assert_eq!(bus.snapshot().writes, 1);

        bridge.torque_off();
        assert!(!bridge.is_ready());
        assert!(!bus.snapshot().torque);
    }

    #[test]
    fn test_profile_change() {
        let (mut bridge, bus) = bridge();
        bridge.apply_joint_command(&JointCommand::parse("0,0,0,0,0,0,0,0,0,600"));
        assert_eq!(bridge.profile(), 600);
        assert_eq!(bus.snapshot().profile_acceleration, 200);
        assert_eq!(bus.snapshot().writes, 1);
    }

    #[test]
    fn test_record_sample_layout() {
        let (mut bridge, bus) = bridge();
        bus.set_current(0, -25);
        bus.set_current(1, 40);

        let result = bridge.apply_joint_command(&JointCommand::parse("0,90,0,0,0,0,0,0,2"));
        assert_eq!(result, SpecialResult::RecordSample);
        bridge.record_sample();

        assert_eq!(bridge.recording().as_slice(), &[9975, 4096, 10040, 5120]);
        assert_eq!(bridge.take_recorded().len(), 4);
        assert!(bridge.recording().is_empty());
    }

    #[test]
    fn test_failed_read_records_zeros() {
        let (mut bridge, bus) = bridge();
        bus.set_read_failure(true);
        bridge.record_sample();
        assert_eq!(bridge.recording().as_slice(), &[0, 0, 0, 0]);
        bridge.release_recording();
        assert!(bridge.recording().is_empty());
    }

    #[test]
    fn test_ignored_special_still_moves() {
        let (mut bridge, bus) = bridge();
        let result = bridge.apply_joint_command(&JointCommand::parse("0,0,0,0,0,0,0,0,4"));
        assert_eq!(result, SpecialResult::None);
        assert_eq!(bus.snapshot().writes, 1);
    }
}
