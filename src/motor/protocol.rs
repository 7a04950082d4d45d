// toio Core Cube motor characteristic protocol
//
// Motor control (no time limit):
//   [0x01, 0x01, dirL, speedL, 0x02, dirR, speedR]
// Motor control with specified duration:
//   [0x02, 0x01, dirL, speedL, 0x02, dirR, speedR, duration]
// Direction 0x01 = forward, 0x02 = backward. Duration is in 10 ms units,
// 0 means no limit. The cube accepts speeds 0..=115.

use std::time::Duration;

use crate::messages::WheelCommand;

/// Highest speed value the cube accepts
pub const MAX_WIRE_SPEED: u8 = 115;

/// Longest duration a timed command can carry
pub const MAX_DURATION: Duration = Duration::from_millis(2550);

/// Command types written to the motor characteristic
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorCommandType {
    Control = 0x01,
    TimedControl = 0x02,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorId {
    Left = 0x01,
    Right = 0x02,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward = 0x01,
    Backward = 0x02,
}

/// Split a signed speed into direction + magnitude, saturating at MAX_WIRE_SPEED
fn encode_speed(speed: i16) -> (Direction, u8) {
    let magnitude = speed.unsigned_abs().min(MAX_WIRE_SPEED as u16) as u8;
    let direction = if speed < 0 {
        Direction::Backward
    } else {
        Direction::Forward
    };
    (direction, magnitude)
}

/// Inverse of `encode_speed`
fn decode_speed(direction: u8, magnitude: u8) -> Option<i16> {
    match direction {
        0x01 => Some(magnitude as i16),
        0x02 => Some(-(magnitude as i16)),
        _ => None,
    }
}

/// Build a motor packet. A zero `duration` gives the untimed form.
pub fn build_motor_packet(command: WheelCommand, duration: Duration) -> Vec<u8> {
    let (left_dir, left_speed) = encode_speed(command.left_speed);
    let (right_dir, right_speed) = encode_speed(command.right_speed);
    let ticks = duration_ticks(duration);

    let command_type = if ticks == 0 {
        MotorCommandType::Control
    } else {
        MotorCommandType::TimedControl
    };

    let mut packet = Vec::with_capacity(8);
    packet.push(command_type as u8);
    packet.extend_from_slice(&[MotorId::Left as u8, left_dir as u8, left_speed]);
    packet.extend_from_slice(&[MotorId::Right as u8, right_dir as u8, right_speed]);
    if ticks != 0 {
        packet.push(ticks);
    }
    packet
}

/// Parse a motor packet back into a wheel command (used by the simulator)
pub fn parse_motor_packet(packet: &[u8]) -> Option<(WheelCommand, Duration)> {
    let (command_type, expected_len) = match packet.first()? {
        0x01 => (MotorCommandType::Control, 7),
        0x02 => (MotorCommandType::TimedControl, 8),
        _ => return None,
    };
    if packet.len() != expected_len
        || packet[1] != MotorId::Left as u8
        || packet[4] != MotorId::Right as u8
    {
        return None;
    }

    let command = WheelCommand {
        left_speed: decode_speed(packet[2], packet[3])?,
        right_speed: decode_speed(packet[5], packet[6])?,
    };
    let duration = match command_type {
        MotorCommandType::TimedControl => Duration::from_millis(packet[7] as u64 * 10),
        MotorCommandType::Control => Duration::ZERO,
    };
    Some((command, duration))
}

/// Duration in 10 ms units; rounds up so short windows are never sent as "no limit"
fn duration_ticks(duration: Duration) -> u8 {
    let millis = duration.min(MAX_DURATION).as_millis() as u64;
    millis.div_ceil(10) as u8
}
