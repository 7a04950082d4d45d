// Keyboard stand-in for a game controller: W/S throttle, A/D turn, R/F speed, Q quit
//
// Terminals only report key presses and repeats, so an axis falls back to zero
// when its key has not been seen for KEY_HOLD_TIMEOUT.

use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::{info, warn};

use super::source::{InputError, InputSource};
use crate::messages::ControllerState;

const SPEED_LEVELS: [f64; 3] = [0.35, 0.65, 1.0];
const SPEED_LABELS: [&str; 3] = ["LOW", "MED", "HIGH"];
const KEY_HOLD_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug)]
pub struct KeyboardSource {
    raw_mode: bool,
    speed_idx: usize,
    throttle: f64,
    turn: f64,
    throttle_at: Option<Instant>,
    turn_at: Option<Instant>,
    quit: bool,
}

impl Default for KeyboardSource {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardSource {
    pub fn new() -> Self {
        Self {
            raw_mode: false,
            speed_idx: 0,
            throttle: 0.0,
            turn: 0.0,
            throttle_at: None,
            turn_at: None,
            quit: false,
        }
    }

    /// Apply one key press to the virtual stick state
    fn on_key(&mut self, code: KeyCode, modifiers: KeyModifiers, now: Instant) {
        let level = SPEED_LEVELS[self.speed_idx];
        match code {
            KeyCode::Char('w') => {
                self.throttle = level;
                self.throttle_at = Some(now);
            }
            KeyCode::Char('s') => {
                self.throttle = -level;
                self.throttle_at = Some(now);
            }
            // Stick left/right, inverted into turn by the mapper
            KeyCode::Char('a') => {
                self.turn = -level;
                self.turn_at = Some(now);
            }
            KeyCode::Char('d') => {
                self.turn = level;
                self.turn_at = Some(now);
            }
            KeyCode::Char(' ') => {
                self.throttle = 0.0;
                self.turn = 0.0;
            }
            KeyCode::Char('r') => {
                self.speed_idx = (self.speed_idx + 1).min(SPEED_LEVELS.len() - 1);
                info!("Speed: {}", SPEED_LABELS[self.speed_idx]);
            }
            KeyCode::Char('f') => {
                self.speed_idx = self.speed_idx.saturating_sub(1);
                info!("Speed: {}", SPEED_LABELS[self.speed_idx]);
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => self.quit = true,
            KeyCode::Char('q') | KeyCode::Esc => self.quit = true,
            _ => {}
        }
    }

    /// Release axes whose key has not repeated recently
    fn expire(&mut self, now: Instant) {
        if self
            .throttle_at
            .is_none_or(|at| now.duration_since(at) > KEY_HOLD_TIMEOUT)
        {
            self.throttle = 0.0;
        }
        if self
            .turn_at
            .is_none_or(|at| now.duration_since(at) > KEY_HOLD_TIMEOUT)
        {
            self.turn = 0.0;
        }
    }

    fn state(&self) -> ControllerState {
        ControllerState {
            left_stick_x: self.turn,
            right_stick_y: self.throttle,
            ..Default::default()
        }
    }
}

impl InputSource for KeyboardSource {
    fn name(&self) -> &str {
        "keyboard"
    }

    fn open(&mut self) -> Result<(), InputError> {
        enable_raw_mode().map_err(|e| InputError::Initialization(e.to_string()))?;
        self.raw_mode = true;
        info!("Keyboard teleop: W/S=throttle, A/D=turn, SPACE=stop, R/F=speed, Q=quit");
        Ok(())
    }

    fn read(&mut self) -> Result<ControllerState, InputError> {
        if !self.raw_mode {
            return Err(InputError::NoDevice);
        }
        let now = Instant::now();

        // Drain whatever arrived since the last tick without waiting
        loop {
            match event::poll(Duration::ZERO) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => return Err(InputError::Disconnected(e.to_string())),
            }
            match event::read() {
                Ok(Event::Key(KeyEvent {
                    code,
                    kind,
                    modifiers,
                    ..
                })) if kind != KeyEventKind::Release => self.on_key(code, modifiers, now),
                Ok(_) => {}
                Err(e) => return Err(InputError::Disconnected(e.to_string())),
            }
        }

        self.expire(now);
        Ok(self.state())
    }

    fn exit_requested(&self) -> bool {
        self.quit
    }

    fn close(&mut self) {
        if self.raw_mode {
            if let Err(e) = disable_raw_mode() {
                warn!("Failed to restore terminal mode: {}", e);
            }
            self.raw_mode = false;
        }
    }
}

impl Drop for KeyboardSource {
    fn drop(&mut self) {
        self.close();
    }
}
