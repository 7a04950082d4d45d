// Controller axes -> turn/throttle intent
//
// Deadzone, response curve, gain and inversion are applied per axis. The
// result is always clamped to [-1, 1] so nothing downstream has to check.

use serde::{Deserialize, Serialize};

use crate::messages::{ControllerState, IntentVector, StickAxis};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Axis magnitudes below this are treated as exactly zero
    pub deadzone: f64,
    pub turn_gain: f64,
    pub throttle_gain: f64,
    /// Response exponent on the live part of the axis (1.0 = linear)
    pub expo: f64,
    pub turn_axis: StickAxis,
    pub throttle_axis: StickAxis,
    /// Stick right is a clockwise turn, which is negative `turn`
    pub invert_turn: bool,
    pub invert_throttle: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            deadzone: 0.08,
            turn_gain: 1.0,
            throttle_gain: 1.0,
            expo: 1.5,
            turn_axis: StickAxis::LeftStickX,
            throttle_axis: StickAxis::RightStickY,
            invert_turn: true,
            invert_throttle: false,
        }
    }
}

/// Map one controller snapshot to an intent vector
pub fn map(raw: &ControllerState, config: &MapperConfig) -> IntentVector {
    let turn = shape_axis(raw.axis(config.turn_axis), config, config.turn_gain);
    let throttle = shape_axis(raw.axis(config.throttle_axis), config, config.throttle_gain);

    IntentVector {
        turn: if config.invert_turn { -turn } else { turn },
        throttle: if config.invert_throttle {
            -throttle
        } else {
            throttle
        },
    }
}

/// Deadzone + curve + gain for a single axis
fn shape_axis(value: f64, config: &MapperConfig, gain: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let value = value.clamp(-1.0, 1.0);
    let magnitude = value.abs();
    if magnitude < config.deadzone {
        return 0.0;
    }

    // Rescale the live range to [0, 1] so full deflection still reaches 1.0
    let live = ((magnitude - config.deadzone) / (1.0 - config.deadzone)).clamp(0.0, 1.0);
    let curved = live.powf(config.expo);

    (value.signum() * curved * gain).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stick(left_x: f64, right_y: f64) -> ControllerState {
        ControllerState {
            left_stick_x: left_x,
            right_stick_y: right_y,
            ..Default::default()
        }
    }

    #[test]
    fn test_inside_deadzone_is_exact_zero() {
        let config = MapperConfig {
            deadzone: 0.1,
            ..Default::default()
        };
        for v in [-0.0999, -0.05, -0.0, 0.0, 0.01, 0.05, 0.0999] {
            let intent = map(&stick(v, v), &config);
            assert_eq!(intent.turn, 0.0, "turn for {}", v);
            assert_eq!(intent.throttle, 0.0, "throttle for {}", v);
        }
    }

    #[test]
    fn test_full_deflection_reaches_gain() {
        let config = MapperConfig {
            deadzone: 0.1,
            ..Default::default()
        };
        let intent = map(&stick(0.0, 1.0), &config);
        assert_eq!(intent.throttle, 1.0);
        assert_eq!(intent.turn, 0.0);

        let intent = map(&stick(0.0, -1.0), &config);
        assert_eq!(intent.throttle, -1.0);
    }

    #[test]
    fn test_stick_right_turns_clockwise() {
        let intent = map(&stick(1.0, 0.0), &MapperConfig::default());
        assert_eq!(intent.turn, -1.0);

        let config = MapperConfig {
            invert_turn: false,
            ..Default::default()
        };
        assert_eq!(map(&stick(1.0, 0.0), &config).turn, 1.0);
    }

    #[test]
    fn test_curve_gives_fine_control_near_center() {
        let config = MapperConfig {
            deadzone: 0.0,
            expo: 2.0,
            ..Default::default()
        };
        let half = map(&stick(0.0, 0.5), &config).throttle;
        assert!((half - 0.25).abs() < 1e-12, "got {}", half);
    }

    #[test]
    fn test_out_of_range_and_nan_are_clamped() {
        let config = MapperConfig {
            throttle_gain: 3.0,
            ..Default::default()
        };
        assert_eq!(map(&stick(0.0, 5.0), &config).throttle, 1.0);
        assert_eq!(map(&stick(0.0, -5.0), &config).throttle, -1.0);
        assert_eq!(map(&stick(f64::NAN, f64::INFINITY), &config), IntentVector::STOP);
    }

    #[test]
    fn test_gain_scales_output() {
        let config = MapperConfig {
            throttle_gain: 0.5,
            ..Default::default()
        };
        assert_eq!(map(&stick(0.0, 1.0), &config).throttle, 0.5);
    }

    #[test]
    fn test_axis_selection() {
        let config = MapperConfig {
            deadzone: 0.0,
            expo: 1.0,
            throttle_axis: StickAxis::LeftStickY,
            ..Default::default()
        };
        let raw = ControllerState {
            left_stick_y: 0.75,
            right_stick_y: -1.0,
            ..Default::default()
        };
        assert_eq!(map(&raw, &config).throttle, 0.75);
    }
}
