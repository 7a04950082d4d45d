//! BLE transport boundary.
//!
//! The link session only sees this trait. Backends own the platform adapter,
//! the connected peripheral and its motor characteristic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Platform address/handle of a discovered peripheral
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One advertisement seen during a scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advertisement {
    pub id: DeviceId,
    pub name: Option<String>,
    pub rssi: Option<i16>,
    /// Advertised service UUIDs, lowercase hyphenated
    pub services: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Wait for the peripheral's write response
    WithResponse,
    /// Fire and forget; completes once the stack has queued the write
    WithoutResponse,
}

/// Asynchronous link notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Disconnected { reason: String },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("Adapter unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("Scan failed: {0}")]
    Scan(String),

    #[error("Connection rejected: {0}")]
    Rejected(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Link lost: {0}")]
    LinkLost(String),
}

#[async_trait]
pub trait BleTransport: Send {
    /// Acquire the platform adapter
    async fn open(&mut self) -> Result<(), TransportError>;

    async fn start_scan(&mut self) -> Result<(), TransportError>;

    /// Next advertisement; `None` when the scan ended
    async fn next_advertisement(&mut self) -> Option<Advertisement>;

    async fn stop_scan(&mut self) -> Result<(), TransportError>;

    /// Handshake with a discovered peripheral and resolve the motor characteristic
    async fn connect(&mut self, device: &DeviceId) -> Result<(), TransportError>;

    /// Write one packet to the motor characteristic
    async fn write(&mut self, payload: &[u8], mode: WriteMode) -> Result<(), TransportError>;

    /// Pending link event, if any. Never blocks.
    fn poll_event(&mut self) -> Option<LinkEvent>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Release the adapter
    async fn close(&mut self);
}
