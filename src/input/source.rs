// Input device boundary: anything that can produce a ControllerState on demand

use std::collections::VecDeque;

use crate::messages::ControllerState;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("Failed to initialize input backend: {0}")]
    Initialization(String),

    #[error("No input device connected")]
    NoDevice,

    #[error("Input device disconnected: {0}")]
    Disconnected(String),
}

/// A polled input device.
///
/// `read` must not block: it returns the most recent snapshot the backend has.
pub trait InputSource: Send {
    fn name(&self) -> &str;

    fn open(&mut self) -> Result<(), InputError>;

    fn read(&mut self) -> Result<ControllerState, InputError>;

    /// Set when the operator asked to end the session from the device itself
    fn exit_requested(&self) -> bool {
        false
    }

    fn close(&mut self);
}

/// Replays a fixed sequence of readings, then repeats the last one.
///
/// An `Err` entry simulates the device going away for that tick.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    readings: VecDeque<Result<ControllerState, InputError>>,
    last: Option<Result<ControllerState, InputError>>,
    open: bool,
}

impl ScriptedSource {
    pub fn new(readings: impl IntoIterator<Item = Result<ControllerState, InputError>>) -> Self {
        Self {
            readings: readings.into_iter().collect(),
            last: None,
            open: false,
        }
    }
}

impl InputSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn open(&mut self) -> Result<(), InputError> {
        self.open = true;
        Ok(())
    }

    fn read(&mut self) -> Result<ControllerState, InputError> {
        if !self.open {
            return Err(InputError::NoDevice);
        }
        if let Some(next) = self.readings.pop_front() {
            self.last = Some(next);
        }
        self.last.clone().unwrap_or(Ok(ControllerState::default()))
    }

    fn close(&mut self) {
        self.open = false;
    }
}
