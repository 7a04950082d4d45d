// Differential-drive mixing for the two-wheeled toio base
// Converts a turn/throttle intent into left/right wheel speeds.

use serde::{Deserialize, Serialize};

use crate::messages::{IntentVector, WheelCommand};

/// Default speed cap in toio motor units (the cube accepts up to 115)
pub const DEFAULT_MAX_SPEED: i16 = 80;

/// Turn contribution relative to throttle (calibration value)
pub const DEFAULT_TURN_RATIO: f64 = 0.5;

/// Wheel speeds below this do not move the cube and are sent as zero
pub const DEFAULT_MIN_SPEED: i16 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderLimits {
    pub max_speed: i16,
    pub turn_ratio: f64,
    pub min_speed: i16,
}

impl Default for EncoderLimits {
    fn default() -> Self {
        Self {
            max_speed: DEFAULT_MAX_SPEED,
            turn_ratio: DEFAULT_TURN_RATIO,
            min_speed: DEFAULT_MIN_SPEED,
        }
    }
}

/// Convert an intent to wheel speeds
///
/// `left = throttle*max - turn*max*ratio`, `right = throttle*max + turn*max*ratio`.
/// Each wheel is clamped on its own; the turn/throttle ratio is not preserved
/// when one side saturates.
pub fn encode(intent: IntentVector, limits: &EncoderLimits) -> WheelCommand {
    let max = limits.max_speed.max(0) as f64;
    let forward = intent.throttle * max;
    let rotation = intent.turn * max * limits.turn_ratio;

    WheelCommand {
        left_speed: to_wheel_speed(forward - rotation, limits),
        right_speed: to_wheel_speed(forward + rotation, limits),
    }
}

/// Round, saturate and apply the stall deadzone
fn to_wheel_speed(speed: f64, limits: &EncoderLimits) -> i16 {
    if !speed.is_finite() {
        return 0;
    }
    let max = limits.max_speed.max(0);
    let speed = (speed.round() as i32).clamp(-(max as i32), max as i32) as i16;

    if speed.abs() < limits.min_speed { 0 } else { speed }
}
