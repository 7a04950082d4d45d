// Simulated BLE transport
//
// Stands in for the radio when no cube is at hand (`--robot.transport=sim`)
// and drives the session tests. A `SimHandle` shares state with the transport
// so a test can inject latency or link loss and inspect what was written.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::transport::{
    Advertisement, BleTransport, DeviceId, LinkEvent, TransportError, WriteMode,
};
use crate::config::TOIO_SERVICE_UUID;
use crate::messages::WheelCommand;
use crate::motor::protocol::parse_motor_packet;

/// How the simulated peripheral answers a connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimHandshake {
    Accept,
    Reject,
    /// Never answers; exercises the handshake timeout
    Hang,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimDevice {
    pub address: String,
    pub name: String,
    /// Advertise the toio service UUID
    #[serde(default = "advertises_service")]
    pub toio_service: bool,
}

fn advertises_service() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub devices: Vec<SimDevice>,
    pub advertise_interval_ms: u64,
    pub handshake: SimHandshake,
    pub handshake_latency_ms: u64,
    pub write_latency_ms: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            devices: vec![SimDevice {
                address: "sim:toio:00".to_string(),
                name: "toio Core Cube-sim".to_string(),
                toio_service: true,
            }],
            advertise_interval_ms: 100,
            handshake: SimHandshake::Accept,
            handshake_latency_ms: 200,
            write_latency_ms: 2,
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    adapter_open: bool,
    connected: Option<DeviceId>,
    link_up: bool,
    written: Vec<Vec<u8>>,
    events: VecDeque<LinkEvent>,
    write_latency: Duration,
    /// Delay between the packet reaching the cube and the write completing
    ack_latency: Duration,
    disconnect_hangs: bool,
    handshake: Option<SimHandshake>,
}

/// Test/inspection handle onto a `SimTransport`
#[derive(Debug, Clone)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimHandle {
    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raw packets the cube received, in write order
    pub fn written_packets(&self) -> Vec<Vec<u8>> {
        self.state().written.clone()
    }

    /// Received packets decoded back into wheel commands
    pub fn written_commands(&self) -> Vec<WheelCommand> {
        self.state()
            .written
            .iter()
            .filter_map(|p| parse_motor_packet(p).map(|(cmd, _)| cmd))
            .collect()
    }

    pub fn set_write_latency(&self, latency: Duration) {
        self.state().write_latency = latency;
    }

    /// The cube receives each packet at once but the write returns late
    pub fn set_ack_latency(&self, latency: Duration) {
        self.state().ack_latency = latency;
    }

    /// Peripheral disconnects never complete
    pub fn set_disconnect_hang(&self, hang: bool) {
        self.state().disconnect_hangs = hang;
    }

    pub fn set_handshake(&self, handshake: SimHandshake) {
        self.state().handshake = Some(handshake);
    }

    /// Simulate the radio link dropping
    pub fn drop_link(&self, reason: &str) {
        let mut state = self.state();
        state.link_up = false;
        state.events.push_back(LinkEvent::Disconnected {
            reason: reason.to_string(),
        });
    }

    pub fn adapter_open(&self) -> bool {
        self.state().adapter_open
    }

    pub fn is_connected(&self) -> bool {
        self.state().connected.is_some()
    }
}

pub struct SimTransport {
    config: SimConfig,
    state: Arc<Mutex<SimState>>,
    scan_queue: Option<VecDeque<Advertisement>>,
}

impl SimTransport {
    pub fn new(config: SimConfig) -> Self {
        let state = SimState {
            write_latency: Duration::from_millis(config.write_latency_ms),
            ..Default::default()
        };
        Self {
            config,
            state: Arc::new(Mutex::new(state)),
            scan_queue: None,
        }
    }

    /// Share the state behind an existing handle, like reopening the same radio
    pub fn attach(config: SimConfig, handle: &SimHandle) -> Self {
        Self {
            config,
            state: handle.state.clone(),
            scan_queue: None,
        }
    }

    pub fn handle(&self) -> SimHandle {
        SimHandle {
            state: self.state.clone(),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn advertisements(&self) -> VecDeque<Advertisement> {
        self.config
            .devices
            .iter()
            .map(|d| Advertisement {
                id: DeviceId(d.address.clone()),
                name: Some(d.name.clone()),
                rssi: Some(-60),
                services: if d.toio_service {
                    vec![TOIO_SERVICE_UUID.to_string()]
                } else {
                    Vec::new()
                },
            })
            .collect()
    }
}

#[async_trait]
impl BleTransport for SimTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        self.state().adapter_open = true;
        debug!("Sim adapter opened");
        Ok(())
    }

    async fn start_scan(&mut self) -> Result<(), TransportError> {
        if !self.state().adapter_open {
            return Err(TransportError::AdapterUnavailable("adapter not open".into()));
        }
        self.scan_queue = Some(self.advertisements());
        Ok(())
    }

    async fn next_advertisement(&mut self) -> Option<Advertisement> {
        let queue = self.scan_queue.as_mut()?;
        match queue.pop_front() {
            Some(adv) => {
                sleep(Duration::from_millis(self.config.advertise_interval_ms)).await;
                Some(adv)
            }
            // A real scan keeps running until stopped
            None => std::future::pending().await,
        }
    }

    async fn stop_scan(&mut self) -> Result<(), TransportError> {
        self.scan_queue = None;
        Ok(())
    }

    async fn connect(&mut self, device: &DeviceId) -> Result<(), TransportError> {
        let handshake = self.state().handshake.unwrap_or(self.config.handshake);
        sleep(Duration::from_millis(self.config.handshake_latency_ms)).await;

        match handshake {
            SimHandshake::Accept => {
                let mut state = self.state();
                state.connected = Some(device.clone());
                state.link_up = true;
                state.events.clear();
                info!("Sim cube {} connected", device);
                Ok(())
            }
            SimHandshake::Reject => Err(TransportError::Rejected(format!(
                "{} refused the connection",
                device
            ))),
            SimHandshake::Hang => std::future::pending().await,
        }
    }

    async fn write(&mut self, payload: &[u8], _mode: WriteMode) -> Result<(), TransportError> {
        let latency = {
            let state = self.state();
            if state.connected.is_none() {
                return Err(TransportError::NotConnected);
            }
            if !state.link_up {
                return Err(TransportError::LinkLost("sim link down".into()));
            }
            state.write_latency
        };

        sleep(latency).await;

        let ack_latency = {
            let mut state = self.state();
            if !state.link_up {
                return Err(TransportError::LinkLost("sim link down".into()));
            }
            if let Some((cmd, duration)) = parse_motor_packet(payload) {
                debug!(
                    "Sim cube motors: left={}, right={} for {:?}",
                    cmd.left_speed, cmd.right_speed, duration
                );
            } else {
                warn!("Sim cube received unknown packet {:02X?}", payload);
            }
            state.written.push(payload.to_vec());
            state.ack_latency
        };

        if !ack_latency.is_zero() {
            sleep(ack_latency).await;
        }
        Ok(())
    }

    fn poll_event(&mut self) -> Option<LinkEvent> {
        self.state().events.pop_front()
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let hangs = self.state().disconnect_hangs;
        if hangs {
            std::future::pending::<()>().await;
        }
        let mut state = self.state();
        state.connected = None;
        state.link_up = false;
        Ok(())
    }

    async fn close(&mut self) {
        self.scan_queue = None;
        self.state().adapter_open = false;
        debug!("Sim adapter closed");
    }
}
