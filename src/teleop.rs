// Leader side: input device + mapper behind the host-facing teleoperator contract

use tracing::{info, warn};

use crate::error::ConnectionError;
use crate::input::{InputError, InputSource, MapperConfig, map};
use crate::messages::{Features, IntentVector, intent_features};

/// Produces one intent vector per tick
pub trait Teleoperator: Send {
    fn name(&self) -> &str;

    fn action_features(&self) -> Features;

    fn is_connected(&self) -> bool;

    fn connect(&mut self) -> Result<(), ConnectionError>;

    /// Sample the device once and map it; never blocks
    fn get_action(&mut self) -> Result<IntentVector, ConnectionError>;

    /// The operator asked to end the session from the device
    fn exit_requested(&self) -> bool {
        false
    }

    fn disconnect(&mut self);
}

/// Teleoperator over any polled input source
pub struct InputLeader {
    name: &'static str,
    source: Box<dyn InputSource>,
    mapping: MapperConfig,
    connected: bool,
    /// Set while the device is missing so the warning is logged once
    input_lost: bool,
}

impl InputLeader {
    pub fn new(name: &'static str, source: Box<dyn InputSource>, mapping: MapperConfig) -> Self {
        Self {
            name,
            source,
            mapping,
            connected: false,
            input_lost: false,
        }
    }
}

fn unavailable(e: InputError) -> ConnectionError {
    ConnectionError::InputDeviceUnavailable {
        reason: e.to_string(),
    }
}

impl Teleoperator for InputLeader {
    fn name(&self) -> &str {
        self.name
    }

    fn action_features(&self) -> Features {
        intent_features()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self) -> Result<(), ConnectionError> {
        if self.connected {
            return Err(ConnectionError::AlreadyConnected);
        }
        self.source.open().map_err(unavailable)?;
        self.connected = true;
        self.input_lost = false;
        info!("{} connected ({} input)", self.name, self.source.name());
        Ok(())
    }

    fn get_action(&mut self) -> Result<IntentVector, ConnectionError> {
        if !self.connected {
            return Err(ConnectionError::NotConnected);
        }
        match self.source.read() {
            Ok(raw) => {
                if self.input_lost {
                    info!("{} input restored", self.source.name());
                    self.input_lost = false;
                }
                Ok(map(&raw, &self.mapping))
            }
            Err(e) => {
                if !self.input_lost {
                    warn!("{} input unavailable: {}", self.source.name(), e);
                    self.input_lost = true;
                }
                Err(unavailable(e))
            }
        }
    }

    fn exit_requested(&self) -> bool {
        self.source.exit_requested()
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.source.close();
            self.connected = false;
            info!("{} disconnected", self.name);
        }
    }
}
