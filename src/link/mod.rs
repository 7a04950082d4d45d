// BLE link to the toio cube
//
// Provides:
// - The transport boundary (real radio or simulator)
// - The link session state machine: discovery, handshake, bounded sends, teardown

#[cfg(feature = "ble")]
pub mod btle;
pub mod session;
pub mod sim;
pub mod transport;

#[cfg(feature = "ble")]
pub use btle::BtleTransport;
pub use session::{LinkConfig, LinkSession, LinkStats, SendOutcome};
pub use sim::{SimConfig, SimHandle, SimTransport};
pub use transport::{Advertisement, BleTransport, DeviceId, LinkEvent, TransportError, WriteMode};
