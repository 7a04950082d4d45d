// btleplug backend for the toio cube
//
// Central events are pumped from the adapter's event stream into a channel so
// the session can poll for disconnects without blocking a tick.

use std::collections::HashMap;

use async_trait::async_trait;
use btleplug::api::{
    BDAddr, Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter,
    WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::transport::{
    Advertisement, BleTransport, DeviceId, LinkEvent, TransportError, WriteMode,
};

pub struct BtleTransport {
    service_uuid: Uuid,
    motor_char_uuid: Uuid,
    adapter: Option<Adapter>,
    events: Option<mpsc::UnboundedReceiver<CentralEvent>>,
    pump: Option<JoinHandle<()>>,
    seen: HashMap<DeviceId, PeripheralId>,
    connected: Option<Connected>,
}

struct Connected {
    id: PeripheralId,
    peripheral: Peripheral,
    motor: Characteristic,
}

impl BtleTransport {
    pub fn new(service_uuid: Uuid, motor_char_uuid: Uuid) -> Self {
        Self {
            service_uuid,
            motor_char_uuid,
            adapter: None,
            events: None,
            pump: None,
            seen: HashMap::new(),
            connected: None,
        }
    }

    fn adapter(&self) -> Result<&Adapter, TransportError> {
        self.adapter
            .as_ref()
            .ok_or_else(|| TransportError::AdapterUnavailable("adapter not open".into()))
    }

    /// Turn a central event into an advertisement if it names a peripheral
    async fn describe(&mut self, id: PeripheralId) -> Option<Advertisement> {
        let adapter = self.adapter.as_ref()?;
        let peripheral = adapter.peripheral(&id).await.ok()?;
        let props = peripheral.properties().await.ok()??;

        let device = device_id(&props.address, &id);
        self.seen.insert(device.clone(), id);
        Some(Advertisement {
            id: device,
            name: props.local_name,
            rssi: props.rssi,
            services: props.services.iter().map(Uuid::to_string).collect(),
        })
    }
}

/// Stable textual id; some platforms hide the MAC address
fn device_id(address: &BDAddr, id: &PeripheralId) -> DeviceId {
    if *address == BDAddr::default() {
        DeviceId(format!("{:?}", id))
    } else {
        DeviceId(address.to_string())
    }
}

#[async_trait]
impl BleTransport for BtleTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        let manager = Manager::new()
            .await
            .map_err(|e| TransportError::AdapterUnavailable(e.to_string()))?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|e| TransportError::AdapterUnavailable(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::AdapterUnavailable("no Bluetooth adapter found".into()))?;
        let mut stream = adapter
            .events()
            .await
            .map_err(|e| TransportError::AdapterUnavailable(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.pump = Some(tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                if tx.send(event).is_err() {
                    break;
                }
            }
        }));
        self.events = Some(rx);

        match adapter.adapter_info().await {
            Ok(info) => info!("Using BLE adapter {}", info),
            Err(e) => debug!("Adapter info unavailable: {}", e),
        }
        self.adapter = Some(adapter);
        Ok(())
    }

    async fn start_scan(&mut self) -> Result<(), TransportError> {
        // Unfiltered: some cubes only advertise their name
        self.adapter()?
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| TransportError::Scan(e.to_string()))
    }

    async fn next_advertisement(&mut self) -> Option<Advertisement> {
        loop {
            let event = self.events.as_mut()?.recv().await?;
            match event {
                CentralEvent::DeviceDiscovered(id)
                | CentralEvent::DeviceUpdated(id)
                | CentralEvent::ServicesAdvertisement { id, .. } => {
                    if let Some(adv) = self.describe(id).await {
                        return Some(adv);
                    }
                }
                _ => {}
            }
        }
    }

    async fn stop_scan(&mut self) -> Result<(), TransportError> {
        self.adapter()?
            .stop_scan()
            .await
            .map_err(|e| TransportError::Scan(e.to_string()))
    }

    async fn connect(&mut self, device: &DeviceId) -> Result<(), TransportError> {
        let id = self
            .seen
            .get(device)
            .cloned()
            .ok_or_else(|| TransportError::Rejected(format!("{} was not discovered", device)))?;
        let peripheral = self
            .adapter()?
            .peripheral(&id)
            .await
            .map_err(|e| TransportError::Rejected(e.to_string()))?;

        peripheral
            .connect()
            .await
            .map_err(|e| TransportError::Rejected(e.to_string()))?;
        if let Err(e) = peripheral.discover_services().await {
            let _ = peripheral.disconnect().await;
            return Err(TransportError::Rejected(e.to_string()));
        }

        let has_service = peripheral
            .services()
            .iter()
            .any(|s| s.uuid == self.service_uuid);
        let motor = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == self.motor_char_uuid);
        let Some(motor) = motor else {
            let _ = peripheral.disconnect().await;
            return Err(TransportError::Rejected(format!(
                "motor characteristic {} not found (toio service present: {})",
                self.motor_char_uuid, has_service
            )));
        };

        info!("Resolved motor characteristic on {}", device);
        self.connected = Some(Connected {
            id,
            peripheral,
            motor,
        });
        Ok(())
    }

    async fn write(&mut self, payload: &[u8], mode: WriteMode) -> Result<(), TransportError> {
        let connected = self.connected.as_ref().ok_or(TransportError::NotConnected)?;
        let write_type = match mode {
            WriteMode::WithResponse => WriteType::WithResponse,
            WriteMode::WithoutResponse => WriteType::WithoutResponse,
        };
        connected
            .peripheral
            .write(&connected.motor, payload, write_type)
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    fn poll_event(&mut self) -> Option<LinkEvent> {
        let connected = self.connected.as_ref()?;
        let events = self.events.as_mut()?;
        while let Ok(event) = events.try_recv() {
            if let CentralEvent::DeviceDisconnected(id) = event {
                if id == connected.id {
                    return Some(LinkEvent::Disconnected {
                        reason: "peripheral disconnected".into(),
                    });
                }
            }
        }
        None
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let Some(connected) = self.connected.take() else {
            return Ok(());
        };
        connected
            .peripheral
            .disconnect()
            .await
            .map_err(|e| TransportError::LinkLost(e.to_string()))
    }

    async fn close(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if self.connected.is_some() {
            warn!("Closing adapter with a peripheral still connected");
            self.connected = None;
        }
        self.events = None;
        self.adapter = None;
        self.seen.clear();
    }
}
