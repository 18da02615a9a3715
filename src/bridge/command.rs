//! Joint command text format.
//!
//! ```text
//! p1,p2,p3,p4,p5,p6,p7,p8[,special[,profile[,torque]]]
//! ```
//!
//! Positions are joint angles in degrees. Fields are separated by commas;
//! empty fields are skipped, so `"1,,2"` has two fields. A field that does
//! not start with a number reads as zero.

use crate::core::{JOINT_COUNT, SERVO_POSITION_LIMIT, SERVO_UNITS_PER_REV, SERVO_ZERO_OFFSET};

/// Special request carried in the ninth field.
pub mod special {
    /// Reply with the battery percentage.
    pub const BATTERY: i32 = 1;
    /// Apply positions, then record a telemetry sample.
    pub const RECORD: i32 = 2;
    /// Send all recorded samples and release the buffer.
    pub const FLUSH: i32 = 3;
}

/// A parsed joint command.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointCommand {
    /// Target angle per joint, degrees. Missing joints are zero.
    pub positions: [f32; JOINT_COUNT],
    /// Special request code, if present.
    pub special: Option<i32>,
    /// Velocity profile, if present.
    pub profile: Option<u16>,
    /// Torque enable flag, if present.
    pub torque: Option<bool>,
}

impl JointCommand {
    /// Parse a command string.
    pub fn parse(text: &str) -> Self {
        let mut fields = text.split(',').filter(|f| !f.is_empty());
        let mut command = Self::default();

        for position in &mut command.positions {
            match fields.next() {
                Some(field) => *position = parse_float(field),
                None => return command,
            }
        }
        command.special = fields.next().map(parse_int);
        command.profile = fields.next().map(|f| parse_int(f).clamp(0, u16::MAX as i32) as u16);
        command.torque = fields.next().map(|f| parse_int(f) == 1);
        command
    }

    /// Target positions converted to servo units.
    pub fn servo_positions(&self) -> [i32; JOINT_COUNT] {
        self.positions.map(deg_to_servo)
    }
}

/// Convert a joint angle in degrees to servo position units.
///
/// Rounds half up, then truncates toward zero, and adds the zero offset.
/// The result is clamped to the servo's extended position range; a
/// non-finite angle maps to zero degrees.
pub fn deg_to_servo(deg: f32) -> i32 {
    if !deg.is_finite() {
        return SERVO_ZERO_OFFSET;
    }
    let degrees_per_unit = 360.0 / SERVO_UNITS_PER_REV;
    // `as` saturates at the i32 bounds.
    let units = (deg / degrees_per_unit + 0.5) as i32;
    units
        .saturating_add(SERVO_ZERO_OFFSET)
        .clamp(-SERVO_POSITION_LIMIT, SERVO_POSITION_LIMIT)
}

/// Longest numeric prefix as a float; zero if there is none or it
/// overflows to infinity.
fn parse_float(field: &str) -> f32 {
    let field = field.trim_start();
    let end = field
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    (1..=end)
        .rev()
        .find_map(|len| field[..len].parse::<f32>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

/// Leading signed decimal integer; zero if there is none.
fn parse_int(field: &str) -> i32 {
    let field = field.trim_start();
    let (negative, digits) = match field.as_bytes().first() {
        Some(b'-') => (true, &field[1..]),
        Some(b'+') => (false, &field[1..]),
        _ => (false, field),
    };
    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i32, |acc, d| acc.saturating_mul(10).saturating_add((d - b'0') as i32));
    if negative { -value } else { value }
}
