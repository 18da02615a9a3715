//! Protocol constants for the Q8 radio link.
//!
//! Wire values are shared with deployed firmware and MUST NOT be changed.
//! Timing values are defaults; [`crate::config::LinkConfig`] overrides them.

use std::time::Duration;

// =============================================================================
// RADIO MEDIUM
// =============================================================================

/// Hardware address size.
pub const ADDRESS_SIZE: usize = 6;

/// Largest datagram the radio medium carries.
pub const MAX_DATAGRAM_SIZE: usize = 250;

/// Default radio channel shared by controller and robot.
pub const DEFAULT_CHANNEL: u8 = 1;

// =============================================================================
// MESSAGE TAGS
// =============================================================================

/// Pairing request (controller) or acknowledgement (robot).
pub const TAG_PAIRING: u8 = 0;

/// Command string or sample block.
pub const TAG_DATA: u8 = 1;

/// Liveness probe carrying the sender's millisecond clock.
pub const TAG_HEARTBEAT: u8 = 2;

// =============================================================================
// NODE IDS
// =============================================================================

/// Id carried by every robot-originated message.
pub const ROBOT_ID: u8 = 0;

/// Id carried by every controller-originated message.
pub const CONTROLLER_ID: u8 = 1;

// =============================================================================
// MESSAGE SIZES
// =============================================================================

/// Number of payload elements in a Data message.
pub const DATA_PAYLOAD_LEN: usize = 100;

/// Pairing: tag + id + address + channel.
pub const PAIRING_SIZE: usize = 1 + 1 + ADDRESS_SIZE + 1;

/// Data, command form: tag + id + 100 ASCII bytes.
pub const DATA_COMMAND_SIZE: usize = 2 + DATA_PAYLOAD_LEN;

/// Data, sample form: tag + id + 100 x u16.
pub const DATA_SAMPLES_SIZE: usize = 2 + DATA_PAYLOAD_LEN * 2;

/// Heartbeat: tag + id + u32 timestamp.
pub const HEARTBEAT_SIZE: usize = 2 + 4;

// =============================================================================
// TIMING
// =============================================================================

/// Controller heartbeat period.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(5000);

/// Controller unpairs after this long without traffic from the robot.
pub const CONTROLLER_TIMEOUT: Duration = Duration::from_millis(15000);

/// Robot unpairs after this long without traffic from the controller.
pub const ROBOT_TIMEOUT: Duration = Duration::from_millis(20000);

/// Pairing broadcast period while unpaired.
pub const PAIRING_INTERVAL: Duration = Duration::from_millis(2000);

/// Liveness check period.
pub const MONITOR_INTERVAL: Duration = Duration::from_millis(1000);

/// Command forwarding period (250 Hz).
pub const COMMAND_INTERVAL: Duration = Duration::from_millis(4);

// =============================================================================
// QUEUES
// =============================================================================

/// Inbound datagram queue depth.
pub const INBOUND_QUEUE_DEPTH: usize = 10;

/// Console line queue depth.
pub const CONSOLE_QUEUE_DEPTH: usize = 20;

/// Longest console line kept before truncation.
pub const CONSOLE_LINE_MAX: usize = 128;

/// Link control command queue depth.
pub const CONTROL_QUEUE_DEPTH: usize = 8;

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Namespace holding the paired peer identity.
pub const STORAGE_NAMESPACE: &str = "q8bot";

/// Key holding the 6-byte peer address.
pub const PEER_ADDRESS_KEY: &str = "peerMAC";

// =============================================================================
// TELEMETRY
// =============================================================================

/// Samples appended per record request.
pub const RECORD_SAMPLE_WIDTH: usize = 4;

/// Offset added to present current so it fits in a u16 sample.
pub const CURRENT_SAMPLE_OFFSET: i32 = 10000;

// =============================================================================
// ACTUATORS
// =============================================================================

/// Number of joints on the robot.
pub const JOINT_COUNT: usize = 8;

/// Servo position units per full revolution.
pub const SERVO_UNITS_PER_REV: f32 = 4096.0;

/// Servo units added to every converted joint angle.
pub const SERVO_ZERO_OFFSET: i32 = 4096;

/// Largest goal magnitude the servos accept in extended position mode.
pub const SERVO_POSITION_LIMIT: i32 = 1_048_575;

/// Velocity profile programmed at bridge start.
pub const DEFAULT_PROFILE: u16 = 1000;
