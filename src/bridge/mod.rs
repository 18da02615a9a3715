//! Actuator and sensor bridge.
//!
//! The link hands every decoded, liveness-confirmed command to an
//! [`ActuatorBridge`] and routes the returned [`SpecialResult`] to the right
//! reply path. How positions become actuator units is the bridge's business.

mod command;
mod q8;
mod sim;
mod telemetry;

pub use command::{JointCommand, deg_to_servo, special};
pub use q8::{FuelGauge, JointReading, Q8Bridge, ServoBus};
pub use sim::{SimBusState, SimFuelGauge, SimServoBus};
pub use telemetry::RecordedTelemetry;

/// Reply a joint command asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpecialResult {
    /// No reply.
    #[default]
    None,
    /// Reply with the battery percentage.
    ReportBattery,
    /// Append a telemetry record.
    RecordSample,
    /// Send every recorded sample in chunks.
    FlushRecordedSamples,
}

/// Side-effect target of the robot link.
pub trait ActuatorBridge: Send {
    /// Apply a joint command and report which reply it asks for.
    fn apply_joint_command(&mut self, command: &JointCommand) -> SpecialResult;

    /// Disable torque on every actuator.
    fn torque_off(&mut self);

    /// Check if the actuators are energized and accepting motion.
    fn is_ready(&self) -> bool;

    /// Battery state of charge, percent.
    fn battery_percent(&mut self) -> u16;

    /// Append one telemetry record to the recording buffer.
    fn record_sample(&mut self);

    /// Drain the recording buffer.
    fn take_recorded(&mut self) -> Vec<u16>;

    /// Drop the recording buffer and its allocation.
    fn release_recording(&mut self);
}

impl<T: ActuatorBridge + ?Sized> ActuatorBridge for Box<T> {
    fn apply_joint_command(&mut self, command: &JointCommand) -> SpecialResult {
        (**self).apply_joint_command(command)
    }

    fn torque_off(&mut self) {
        (**self).torque_off()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn battery_percent(&mut self) -> u16 {
        (**self).battery_percent()
    }

    fn record_sample(&mut self) {
        (**self).record_sample()
    }

    fn take_recorded(&mut self) -> Vec<u16> {
        (**self).take_recorded()
    }

    fn release_recording(&mut self) {
        (**self).release_recording()
    }
}

/// Bridge for nodes without actuators (the controller).
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

impl ActuatorBridge for Detached {
    fn apply_joint_command(&mut self, _command: &JointCommand) -> SpecialResult {
        SpecialResult::None
    }

    fn torque_off(&mut self) {}

    fn is_ready(&self) -> bool {
        false
    }

    fn battery_percent(&mut self) -> u16 {
        0
    }

    fn record_sample(&mut self) {}

    fn take_recorded(&mut self) -> Vec<u16> {
        Vec::new()
    }

    fn release_recording(&mut self) {}
}
