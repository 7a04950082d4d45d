// Message types flowing through one teleoperation tick

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Button snapshot of a controller (or the keyboard stand-in)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buttons {
    pub south: bool,
    pub east: bool,
    pub west: bool,
    pub north: bool,
    pub start: bool,
    pub select: bool,
    pub mode: bool,
}

/// Raw controller state sampled once per tick.
///
/// Axes are nominally in [-1, 1] with "right" and "up" positive. Drivers are
/// expected to bound their range but the mapper clamps anyway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerState {
    pub left_stick_x: f64,
    pub left_stick_y: f64,
    pub right_stick_x: f64,
    pub right_stick_y: f64,
    pub buttons: Buttons,
}

impl ControllerState {
    /// Read one axis by name
    pub fn axis(&self, axis: StickAxis) -> f64 {
        match axis {
            StickAxis::LeftStickX => self.left_stick_x,
            StickAxis::LeftStickY => self.left_stick_y,
            StickAxis::RightStickX => self.right_stick_x,
            StickAxis::RightStickY => self.right_stick_y,
        }
    }
}

/// Selects which stick axis feeds turn or throttle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StickAxis {
    LeftStickX,
    LeftStickY,
    RightStickX,
    RightStickY,
}

/// Normalised operator intent. Both components lie in [-1, 1].
///
/// `turn > 0` rotates counter-clockwise (left), `throttle > 0` drives forward.
/// This is the action exchanged between leader and follower.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentVector {
    pub turn: f64,
    pub throttle: f64,
}

impl IntentVector {
    pub const STOP: IntentVector = IntentVector {
        turn: 0.0,
        throttle: 0.0,
    };

    pub fn new(turn: f64, throttle: f64) -> Self {
        Self { turn, throttle }
    }
}

/// Wheel speeds in the robot's native units. Sign is direction, zero is stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WheelCommand {
    pub left_speed: i16,
    pub right_speed: i16,
}

impl WheelCommand {
    pub const STOP: WheelCommand = WheelCommand {
        left_speed: 0,
        right_speed: 0,
    };

    pub fn new(left_speed: i16, right_speed: i16) -> Self {
        Self {
            left_speed,
            right_speed,
        }
    }

    pub fn is_stop(&self) -> bool {
        self.left_speed == 0 && self.right_speed == 0
    }
}

/// What the follower reports back each tick: an echo of the last accepted
/// action and the wheel command it was encoded into
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub turn: f64,
    pub throttle: f64,
    pub left_speed: i16,
    pub right_speed: i16,
}

/// Value kind of one feature in a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Float,
    Int,
}

/// Capability descriptor: feature name -> kind
pub type Features = BTreeMap<&'static str, FeatureKind>;

pub fn intent_features() -> Features {
    BTreeMap::from([("turn", FeatureKind::Float), ("throttle", FeatureKind::Float)])
}

pub fn observation_features() -> Features {
    let mut features = intent_features();
    features.insert("left_speed", FeatureKind::Int);
    features.insert("right_speed", FeatureKind::Int);
    features
}

/// Link session states.
///
/// `Idle` is the connected-and-ready state; `Sending` means a write is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Disconnected,
    Discovering,
    Connecting,
    Idle,
    Sending,
    Failed,
}

impl LinkState {
    pub fn is_connected(&self) -> bool {
        matches!(self, LinkState::Idle | LinkState::Sending)
    }
}

/// Published on every state change. Carries no payload beyond the new state
/// and an optional error detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkTransition {
    pub state: LinkState,
    pub error: Option<String>,
}

/// Health of the control loop as seen by the watchdog
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
    InputLost,
}
