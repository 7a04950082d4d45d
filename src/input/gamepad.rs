// Game controller backend (gilrs)
//
// gilrs is polled on its own thread so a slow OS driver can never stall a
// control tick. The newest snapshot is published through a watch channel and
// `read` only ever borrows it.

use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::source::{InputError, InputSource};
use crate::messages::{Buttons, ControllerState};

const POLL_INTERVAL: Duration = Duration::from_millis(4);

type Snapshot = Result<ControllerState, InputError>;

pub struct GamepadSource {
    joystick_index: usize,
    state_rx: Option<watch::Receiver<Snapshot>>,
    shutdown: CancellationToken,
    poller: Option<JoinHandle<()>>,
    last: ControllerState,
}

impl GamepadSource {
    pub fn new(joystick_index: usize) -> Self {
        Self {
            joystick_index,
            state_rx: None,
            shutdown: CancellationToken::new(),
            poller: None,
            last: ControllerState::default(),
        }
    }
}

impl InputSource for GamepadSource {
    fn name(&self) -> &str {
        "gamepad"
    }

    fn open(&mut self) -> Result<(), InputError> {
        if self.poller.is_some() {
            return Ok(());
        }

        let (state_tx, state_rx) = watch::channel(Err(InputError::NoDevice));
        let (ready_tx, ready_rx) = mpsc::channel();
        self.shutdown = CancellationToken::new();
        let shutdown = self.shutdown.clone();
        let index = self.joystick_index;

        // Gilrs is created on the poller thread; it is not Send on every platform
        let poller = std::thread::Builder::new()
            .name("gamepad-poller".into())
            .spawn(move || {
                info!("Initializing gilrs controller interface");
                let gilrs = match Gilrs::new() {
                    Ok(gilrs) => gilrs,
                    Err(e) => {
                        error!("Failed to initialize gilrs: {}", e);
                        let _ = ready_tx.send(Err(InputError::Initialization(e.to_string())));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                poll_loop(gilrs, index, state_tx, shutdown)
            })
            .map_err(|e| InputError::Initialization(e.to_string()))?;

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(InputError::Initialization("gamepad poller exited".into())));
        if let Err(e) = ready {
            let _ = poller.join();
            return Err(e);
        }

        self.state_rx = Some(state_rx);
        self.poller = Some(poller);
        Ok(())
    }

    fn read(&mut self) -> Result<ControllerState, InputError> {
        let rx = self.state_rx.as_ref().ok_or(InputError::NoDevice)?;
        if rx.has_changed().is_err() {
            return Err(InputError::Disconnected("gamepad poller stopped".into()));
        }
        let state = rx.borrow().clone()?;
        self.last = state;
        Ok(state)
    }

    fn exit_requested(&self) -> bool {
        self.last.buttons.mode
    }

    fn close(&mut self) {
        self.shutdown.cancel();
        if let Some(poller) = self.poller.take() {
            if poller.join().is_err() {
                warn!("Gamepad poller panicked");
            }
        }
        self.state_rx = None;
    }
}

impl Drop for GamepadSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn poll_loop(
    mut gilrs: Gilrs,
    index: usize,
    state_tx: watch::Sender<Snapshot>,
    shutdown: CancellationToken,
) {
    let mut active = select_gamepad(&gilrs, index);

    while !shutdown.is_cancelled() {
        // Draining events is what updates gilrs' cached axis state
        while let Some(Event { id, event, .. }) = gilrs.next_event() {
            match event {
                EventType::Connected if active.is_none() => {
                    info!("Gamepad {} connected", id);
                    active = Some(id);
                }
                EventType::Disconnected if active == Some(id) => {
                    warn!("Active gamepad {} disconnected", id);
                    active = None;
                    state_tx.send_replace(Err(InputError::Disconnected(id.to_string())));
                }
                _ => {}
            }
        }

        if active.is_none() {
            active = select_gamepad(&gilrs, index);
        }

        if let Some(pad) = active.and_then(|id| gilrs.connected_gamepad(id)) {
            state_tx.send_replace(Ok(snapshot(&pad)));
        } else if state_tx.borrow().is_ok() {
            state_tx.send_replace(Err(InputError::NoDevice));
        }

        std::thread::sleep(POLL_INTERVAL);
    }
    debug!("Gamepad poller stopped");
}

/// Pick the configured gamepad, falling back to the first one if the index is out of range
fn select_gamepad(gilrs: &Gilrs, index: usize) -> Option<GamepadId> {
    let gamepads: Vec<(GamepadId, Gamepad<'_>)> = gilrs.gamepads().collect();
    if gamepads.is_empty() {
        return None;
    }
    let (id, pad) = gamepads.get(index).unwrap_or(&gamepads[0]);
    info!(
        "Selected gamepad {} ({}) of {} connected",
        pad.name(),
        id,
        gamepads.len()
    );
    Some(*id)
}

fn snapshot(pad: &Gamepad<'_>) -> ControllerState {
    ControllerState {
        left_stick_x: pad.value(Axis::LeftStickX) as f64,
        left_stick_y: pad.value(Axis::LeftStickY) as f64,
        right_stick_x: pad.value(Axis::RightStickX) as f64,
        right_stick_y: pad.value(Axis::RightStickY) as f64,
        buttons: Buttons {
            south: pad.is_pressed(Button::South),
            east: pad.is_pressed(Button::East),
            west: pad.is_pressed(Button::West),
            north: pad.is_pressed(Button::North),
            start: pad.is_pressed(Button::Start),
            select: pad.is_pressed(Button::Select),
            mode: pad.is_pressed(Button::Mode),
        },
    }
}
