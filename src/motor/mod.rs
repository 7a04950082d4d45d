// Motor control for the toio two-wheeled base
//
// Provides:
// - Differential-drive mixing (intent -> left/right wheel speeds)
// - toio motor characteristic packet encoding

pub mod kinematics;
pub mod protocol;

pub use kinematics::{EncoderLimits, encode};
pub use protocol::{build_motor_packet, parse_motor_packet};
