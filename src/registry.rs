// Name -> constructor tables for robots and teleoperators (`--robot.type`, `--teleop.type`)

use std::collections::BTreeMap;

use tracing::info;

use crate::config::{
    AppConfig, ROBOT_TOIO_FOLLOWER, TELEOP_KEYBOARD_LEADER, TELEOP_TOIO_LEADER, TransportKind,
};
use crate::error::ConfigError;
use crate::input::KeyboardSource;
use crate::link::{BleTransport, SimTransport};
use crate::robot::{Robot, ToioFollower, TransportFactory};
use crate::teleop::{InputLeader, Teleoperator};

pub type RobotFactory = fn(&AppConfig) -> Result<Box<dyn Robot>, ConfigError>;
pub type TeleopFactory = fn(&AppConfig) -> Result<Box<dyn Teleoperator>, ConfigError>;

pub struct Registry {
    robots: BTreeMap<&'static str, RobotFactory>,
    teleops: BTreeMap<&'static str, TeleopFactory>,
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            robots: BTreeMap::new(),
            teleops: BTreeMap::new(),
        }
    }

    /// Registry with every plugin shipped in this crate
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register_robot(ROBOT_TOIO_FOLLOWER, make_toio_follower);
        registry.register_teleop(TELEOP_TOIO_LEADER, make_toio_leader);
        registry.register_teleop(TELEOP_KEYBOARD_LEADER, make_keyboard_leader);
        registry
    }

    pub fn register_robot(&mut self, name: &'static str, factory: RobotFactory) {
        self.robots.insert(name, factory);
    }

    pub fn register_teleop(&mut self, name: &'static str, factory: TeleopFactory) {
        self.teleops.insert(name, factory);
    }

    pub fn robot_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.robots.keys().copied()
    }

    pub fn teleop_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.teleops.keys().copied()
    }

    pub fn make_robot(&self, config: &AppConfig) -> Result<Box<dyn Robot>, ConfigError> {
        let name = config.robot.robot_type.as_str();
        let factory = self.robots.get(name).ok_or_else(|| ConfigError::UnknownType {
            role: "robot",
            name: name.to_string(),
            available: self.robot_types().collect::<Vec<_>>().join(", "),
        })?;
        factory(config)
    }

    pub fn make_teleop(&self, config: &AppConfig) -> Result<Box<dyn Teleoperator>, ConfigError> {
        let name = config.teleop.teleop_type.as_str();
        let factory = self.teleops.get(name).ok_or_else(|| ConfigError::UnknownType {
            role: "teleop",
            name: name.to_string(),
            available: self.teleop_types().collect::<Vec<_>>().join(", "),
        })?;
        factory(config)
    }
}

fn make_toio_follower(config: &AppConfig) -> Result<Box<dyn Robot>, ConfigError> {
    let transport = transport_factory(config)?;
    Ok(Box::new(ToioFollower::new(config, transport)))
}

/// Transport backend selected by `robot.transport`
pub fn transport_factory(config: &AppConfig) -> Result<TransportFactory, ConfigError> {
    match config.robot.transport {
        TransportKind::Sim => {
            info!("Using simulated BLE transport");
            let sim = config.robot.sim.clone();
            // Reconnects find the same simulated cube
            let handle = SimTransport::new(sim.clone()).handle();
            Ok(Box::new(move || {
                Box::new(SimTransport::attach(sim.clone(), &handle)) as Box<dyn BleTransport>
            }))
        }
        TransportKind::Ble => ble_transport_factory(config),
    }
}

#[cfg(feature = "ble")]
fn ble_transport_factory(config: &AppConfig) -> Result<TransportFactory, ConfigError> {
    use crate::link::BtleTransport;

    let parse = |field: &'static str, value: &str| {
        uuid::Uuid::parse_str(value).map_err(|e| ConfigError::Invalid {
            field,
            reason: e.to_string(),
        })
    };
    let service = parse("robot.service_uuid", &config.robot.service_uuid)?;
    let motor = parse("robot.motor_char_uuid", &config.robot.motor_char_uuid)?;
    Ok(Box::new(move || {
        Box::new(BtleTransport::new(service, motor)) as Box<dyn BleTransport>
    }))
}

#[cfg(not(feature = "ble"))]
fn ble_transport_factory(_config: &AppConfig) -> Result<TransportFactory, ConfigError> {
    Err(ConfigError::Unsupported("BLE transport", "ble"))
}

#[cfg(feature = "gamepad")]
fn make_toio_leader(config: &AppConfig) -> Result<Box<dyn Teleoperator>, ConfigError> {
    use crate::input::GamepadSource;

    let source = GamepadSource::new(config.teleop.joystick_index);
    Ok(Box::new(InputLeader::new(
        TELEOP_TOIO_LEADER,
        Box::new(source),
        config.teleop.mapping.clone(),
    )))
}

#[cfg(not(feature = "gamepad"))]
fn make_toio_leader(_config: &AppConfig) -> Result<Box<dyn Teleoperator>, ConfigError> {
    Err(ConfigError::Unsupported("Gamepad input", "gamepad"))
}

fn make_keyboard_leader(config: &AppConfig) -> Result<Box<dyn Teleoperator>, ConfigError> {
    Ok(Box::new(InputLeader::new(
        TELEOP_KEYBOARD_LEADER,
        Box::new(KeyboardSource::new()),
        config.teleop.mapping.clone(),
    )))
}
