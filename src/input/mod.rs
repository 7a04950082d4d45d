// Operator input: device backends and the stick -> intent mapper
//
// Provides:
// - Input mapper (deadzone, response curve, gains)
// - InputSource trait with gamepad (gilrs), keyboard (crossterm) and scripted backends

#[cfg(feature = "gamepad")]
pub mod gamepad;
pub mod keyboard;
pub mod mapper;
pub mod source;

#[cfg(feature = "gamepad")]
pub use gamepad::GamepadSource;
pub use keyboard::KeyboardSource;
pub use mapper::{MapperConfig, map};
pub use source::{InputError, InputSource, ScriptedSource};
