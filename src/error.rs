// Error types surfaced to the host through the robot/teleoperator traits

use std::time::Duration;

use crate::messages::LinkState;

/// Connection-lifecycle errors.
///
/// Dropped commands are not represented here: a send that misses its tick
/// budget is reported as `SendOutcome::Dropped` and only counted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectionError {
    #[error("No matching device discovered within {timeout:?}")]
    DiscoveryTimeout { timeout: Duration },

    #[error("Handshake with {device} rejected: {reason}")]
    HandshakeRejected { device: String, reason: String },

    #[error("Link lost: {reason}")]
    LinkLost { reason: String },

    #[error("Input device unavailable: {reason}")]
    InputDeviceUnavailable { reason: String },

    #[error("BLE adapter unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("Device is not connected")]
    NotConnected,

    #[error("Device is already connected")]
    AlreadyConnected,

    #[error("Operation not valid in state {0:?}")]
    InvalidState(LinkState),
}

/// Configuration and registry errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Unknown {role} type '{name}' (available: {available})")]
    UnknownType {
        role: &'static str,
        name: String,
        available: String,
    },

    #[error("{0} support was not compiled in (enable the '{1}' feature)")]
    Unsupported(&'static str, &'static str),
}
