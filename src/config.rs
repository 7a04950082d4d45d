// Defaults, timeouts, BLE identifiers and the TOML-backed app configuration
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::input::mapper::MapperConfig;
use crate::link::session::LinkConfig;
use crate::link::sim::SimConfig;
use crate::link::transport::WriteMode;
use crate::motor::kinematics::EncoderLimits;
use crate::motor::protocol::MAX_DURATION;

// Control loop frequency requested by the host when --fps is not given
pub const DEFAULT_FPS: u32 = 60;

// Keeps the tick period at one millisecond or more
pub const MAX_FPS: u32 = 1000;

// Robot must stop if no fresh command arrives within this window
pub const SAFETY_WINDOW: Duration = Duration::from_millis(500);

// Per-tick transmit budget (never more than one tick)
pub const SEND_TIMEOUT: Duration = Duration::from_millis(15);

// Resend an unchanged command after this long so the timed motor command never lapses
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(250);

pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(8);
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

// toio Core Cube BLE identifiers
pub const BLE_NAME_PREFIX: &str = "toio";
pub const TOIO_SERVICE_UUID: &str = "10b20100-5b3b-4571-9508-cf3efcd7bbae";
pub const TOIO_MOTOR_CHAR_UUID: &str = "10b20102-5b3b-4571-9508-cf3efcd7bbae";

// Registered plugin names
pub const ROBOT_TOIO_FOLLOWER: &str = "toio_follower";
pub const TELEOP_TOIO_LEADER: &str = "toio_leader";
pub const TELEOP_KEYBOARD_LEADER: &str = "keyboard_leader";

/// Which BLE backend the follower talks through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Ble,
    Sim,
}

impl Default for TransportKind {
    fn default() -> Self {
        if cfg!(feature = "ble") {
            TransportKind::Ble
        } else {
            TransportKind::Sim
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub robot: RobotConfig,
    pub teleop: TeleopConfig,
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    #[serde(rename = "type")]
    pub robot_type: String,
    pub transport: TransportKind,
    /// Connect only to this address; otherwise the first matching advertisement wins
    pub device_address: Option<String>,
    pub ble_name_prefix: String,
    pub service_uuid: String,
    pub motor_char_uuid: String,
    pub ble_scan_timeout_ms: u64,
    pub handshake_timeout_ms: u64,
    pub send_timeout_ms: u64,
    pub keepalive_interval_ms: u64,
    pub safety_window_ms: u64,
    pub write_mode: WriteMode,
    pub limits: EncoderLimits,
    pub sim: SimConfig,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            robot_type: ROBOT_TOIO_FOLLOWER.to_string(),
            transport: TransportKind::default(),
            device_address: None,
            ble_name_prefix: BLE_NAME_PREFIX.to_string(),
            service_uuid: TOIO_SERVICE_UUID.to_string(),
            motor_char_uuid: TOIO_MOTOR_CHAR_UUID.to_string(),
            ble_scan_timeout_ms: DISCOVERY_TIMEOUT.as_millis() as u64,
            handshake_timeout_ms: HANDSHAKE_TIMEOUT.as_millis() as u64,
            send_timeout_ms: SEND_TIMEOUT.as_millis() as u64,
            keepalive_interval_ms: KEEPALIVE_INTERVAL.as_millis() as u64,
            safety_window_ms: SAFETY_WINDOW.as_millis() as u64,
            write_mode: WriteMode::WithoutResponse,
            limits: EncoderLimits::default(),
            sim: SimConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TeleopConfig {
    #[serde(rename = "type")]
    pub teleop_type: String,
    /// Gamepad to use when several are attached; out of range falls back to the first
    pub joystick_index: usize,
    pub mapping: MapperConfig,
}

impl Default for TeleopConfig {
    fn default() -> Self {
        Self {
            teleop_type: TELEOP_TOIO_LEADER.to_string(),
            joystick_index: 0,
            mapping: MapperConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub fps: u32,
    /// Stop after this many seconds; run until interrupted when unset
    pub duration_s: Option<f64>,
    pub reconnect_attempts: u32,
    pub reconnect_backoff_ms: u64,
    pub stats_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            duration_s: None,
            reconnect_attempts: 3,
            reconnect_backoff_ms: 1000,
            stats_interval_ms: 5000,
        }
    }
}

impl RuntimeConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.fps.max(1) as u64)
    }
}

impl AppConfig {
    /// Load a TOML file; every missing key keeps its default
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Loading config from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text)?;
        debug!("Parsed config: {:?}", config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mapping = &self.teleop.mapping;
        if !(0.0..1.0).contains(&mapping.deadzone) {
            return Err(invalid("teleop.mapping.deadzone", "must be in [0, 1)"));
        }
        if !(mapping.expo.is_finite() && mapping.expo > 0.0) {
            return Err(invalid("teleop.mapping.expo", "must be positive"));
        }
        if !(mapping.turn_gain.is_finite() && mapping.throttle_gain.is_finite()) {
            return Err(invalid("teleop.mapping", "gains must be finite"));
        }
        let limits = &self.robot.limits;
        if limits.max_speed <= 0 {
            return Err(invalid("robot.limits.max_speed", "must be positive"));
        }
        if !(0..=limits.max_speed).contains(&limits.min_speed) {
            return Err(invalid("robot.limits.min_speed", "must be in [0, max_speed]"));
        }
        if !(limits.turn_ratio.is_finite() && limits.turn_ratio >= 0.0) {
            return Err(invalid("robot.limits.turn_ratio", "must be non-negative"));
        }
        if self.robot.send_timeout_ms == 0 {
            return Err(invalid("robot.send_timeout_ms", "must be positive"));
        }
        let robot = &self.robot;
        let max_window = MAX_DURATION.as_millis() as u64;
        if !(1..=max_window).contains(&robot.safety_window_ms) {
            return Err(invalid(
                "robot.safety_window_ms",
                &format!("must be in [1, {}]", max_window),
            ));
        }
        if !(1..robot.safety_window_ms).contains(&robot.keepalive_interval_ms) {
            return Err(invalid(
                "robot.keepalive_interval_ms",
                "must be positive and shorter than robot.safety_window_ms",
            ));
        }
        if !(1..=MAX_FPS).contains(&self.runtime.fps) {
            return Err(invalid("runtime.fps", &format!("must be in [1, {}]", MAX_FPS)));
        }
        if self
            .runtime
            .duration_s
            .is_some_and(|s| !(s.is_finite() && s > 0.0))
        {
            return Err(invalid("runtime.duration_s", "must be a positive number of seconds"));
        }
        Ok(())
    }

    /// Session settings; the send budget is capped at one tick
    pub fn link_config(&self) -> LinkConfig {
        let robot = &self.robot;
        let send_timeout =
            Duration::from_millis(robot.send_timeout_ms).min(self.runtime.tick_period());
        LinkConfig {
            name_prefix: robot.ble_name_prefix.clone(),
            service_uuid: robot.service_uuid.clone(),
            device_address: robot.device_address.clone(),
            discovery_timeout: Duration::from_millis(robot.ble_scan_timeout_ms),
            handshake_timeout: Duration::from_millis(robot.handshake_timeout_ms),
            send_timeout,
            keepalive_interval: Duration::from_millis(robot.keepalive_interval_ms),
            safety_window: Duration::from_millis(robot.safety_window_ms),
            write_mode: robot.write_mode,
        }
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
