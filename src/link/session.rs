//! Link session: the BLE connection state machine for one cube.
//!
//! ```text
//! Disconnected -> Discovering -> Connecting -> Idle <-> Sending
//!       ^              |              |          |         |
//!       +--------------+--------------+          +-> Failed (terminal)
//! ```
//!
//! Every operation on the radio is a future bounded by its own timeout.
//! `disconnect()` is valid from every state and releases the adapter.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, warn};

use super::transport::{Advertisement, BleTransport, DeviceId, LinkEvent, WriteMode};
use crate::config::{
    BLE_NAME_PREFIX, DISCOVERY_TIMEOUT, HANDSHAKE_TIMEOUT, KEEPALIVE_INTERVAL, SAFETY_WINDOW,
    SEND_TIMEOUT, TOIO_SERVICE_UUID,
};
use crate::error::ConnectionError;
use crate::messages::{LinkState, LinkTransition, WheelCommand};
use crate::motor::protocol::build_motor_packet;

/// Lower bound for each teardown step (stop command, peripheral disconnect)
const STOP_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub name_prefix: String,
    pub service_uuid: String,
    /// Only this address may be selected; otherwise the first match wins
    pub device_address: Option<String>,
    pub discovery_timeout: Duration,
    pub handshake_timeout: Duration,
    /// Budget for one command write, at most one tick
    pub send_timeout: Duration,
    /// An unchanged command is rewritten after this long
    pub keepalive_interval: Duration,
    /// Device-side run time of each command; the cube stops by itself afterwards
    pub safety_window: Duration,
    pub write_mode: WriteMode,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            name_prefix: BLE_NAME_PREFIX.to_string(),
            service_uuid: TOIO_SERVICE_UUID.to_string(),
            device_address: None,
            discovery_timeout: DISCOVERY_TIMEOUT,
            handshake_timeout: HANDSHAKE_TIMEOUT,
            send_timeout: SEND_TIMEOUT,
            keepalive_interval: KEEPALIVE_INTERVAL,
            safety_window: SAFETY_WINDOW,
            write_mode: WriteMode::WithoutResponse,
        }
    }
}

impl LinkConfig {
    /// Does this advertisement look like our robot?
    pub fn matches(&self, adv: &Advertisement) -> bool {
        if let Some(address) = &self.device_address {
            return adv.id.0.eq_ignore_ascii_case(address);
        }
        let prefix = self.name_prefix.to_lowercase();
        let name_match = !prefix.is_empty()
            && adv
                .name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().starts_with(&prefix));
        let service_match = adv
            .services
            .iter()
            .any(|s| s.eq_ignore_ascii_case(&self.service_uuid));
        name_match || service_match
    }
}

/// Result of one `send` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SendOutcome {
    /// Written to the motor characteristic
    Delivered,
    /// Identical to the last delivered command and still within the keep-alive interval
    Skipped,
    /// Missed the tick budget; the next tick's command supersedes it
    Dropped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    pub delivered: u64,
    pub skipped: u64,
    pub dropped: u64,
}

impl std::ops::AddAssign for LinkStats {
    fn add_assign(&mut self, other: Self) {
        self.delivered += other.delivered;
        self.skipped += other.skipped;
        self.dropped += other.dropped;
    }
}

pub struct LinkSession {
    transport: Box<dyn BleTransport>,
    config: LinkConfig,
    state: LinkState,
    transitions: watch::Sender<LinkTransition>,
    device_id: Option<DeviceId>,
    last_command_sent: Option<WheelCommand>,
    last_sent_at: Option<Instant>,
    last_error: Option<ConnectionError>,
    stats: LinkStats,
    adapter_held: bool,
}

impl LinkSession {
    pub fn new(transport: Box<dyn BleTransport>, config: LinkConfig) -> Self {
        let (transitions, _) = watch::channel(LinkTransition {
            state: LinkState::Disconnected,
            error: None,
        });
        Self {
            transport,
            config,
            state: LinkState::Disconnected,
            transitions,
            device_id: None,
            last_command_sent: None,
            last_sent_at: None,
            last_error: None,
            stats: LinkStats::default(),
            adapter_held: false,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn device_id(&self) -> Option<&DeviceId> {
        self.device_id.as_ref()
    }

    pub fn last_command_sent(&self) -> Option<WheelCommand> {
        self.last_command_sent
    }

    pub fn last_error(&self) -> Option<&ConnectionError> {
        self.last_error.as_ref()
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<LinkTransition> {
        self.transitions.subscribe()
    }

    fn transition(&mut self, state: LinkState, error: Option<&ConnectionError>) {
        if self.state == state && error.is_none() {
            return;
        }
        // Idle <-> Sending happens every tick
        let per_tick = self.state == LinkState::Sending || state == LinkState::Sending;
        match error {
            Some(e) => warn!("Link {:?} -> {:?}: {}", self.state, state, e),
            None if per_tick => debug!("Link {:?} -> {:?}", self.state, state),
            None => info!("Link {:?} -> {:?}", self.state, state),
        }
        self.state = state;
        self.transitions.send_replace(LinkTransition {
            state,
            error: error.map(|e| e.to_string()),
        });
    }

    /// Discover and connect. Valid only from `Disconnected`; no internal retry.
    pub async fn connect(&mut self) -> Result<DeviceId, ConnectionError> {
        match self.state {
            LinkState::Disconnected => {}
            LinkState::Idle | LinkState::Sending => return Err(ConnectionError::AlreadyConnected),
            other => return Err(ConnectionError::InvalidState(other)),
        }
        self.last_error = None;
        self.transition(LinkState::Discovering, None);

        if let Err(e) = self.transport.open().await {
            return Err(self
                .abort_connect(ConnectionError::AdapterUnavailable(e.to_string()))
                .await);
        }
        self.adapter_held = true;

        let candidate = match self.discover().await {
            Ok(candidate) => candidate,
            Err(e) => return Err(self.abort_connect(e).await),
        };

        self.transition(LinkState::Connecting, None);
        info!(
            "Connecting to {} ({})",
            candidate.name.as_deref().unwrap_or("unknown"),
            candidate.id
        );

        let handshake = timeout(
            self.config.handshake_timeout,
            self.transport.connect(&candidate.id),
        )
        .await;
        let reason = match handshake {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!(
                "no response within {:?}",
                self.config.handshake_timeout
            )),
        };
        if let Some(reason) = reason {
            let error = ConnectionError::HandshakeRejected {
                device: candidate.id.to_string(),
                reason,
            };
            return Err(self.abort_connect(error).await);
        }

        self.device_id = Some(candidate.id.clone());
        self.last_command_sent = None;
        self.last_sent_at = None;
        self.transition(LinkState::Idle, None);
        Ok(candidate.id)
    }

    /// Scan until the first matching advertisement or the discovery timeout
    async fn discover(&mut self) -> Result<Advertisement, ConnectionError> {
        self.transport
            .start_scan()
            .await
            .map_err(|e| ConnectionError::AdapterUnavailable(e.to_string()))?;

        let limit = self.config.discovery_timeout;
        let config = &self.config;
        let transport = &mut self.transport;
        let found = timeout(limit, async {
            while let Some(adv) = transport.next_advertisement().await {
                if config.matches(&adv) {
                    return Some(adv);
                }
                debug!("Ignoring advertisement {} ({:?})", adv.id, adv.name);
            }
            None
        })
        .await;

        if let Err(e) = self.transport.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }

        match found {
            Ok(Some(adv)) => {
                info!(
                    "Discovered {} ({}), rssi {:?}; first match wins",
                    adv.name.as_deref().unwrap_or("unknown"),
                    adv.id,
                    adv.rssi
                );
                Ok(adv)
            }
            Ok(None) | Err(_) => Err(ConnectionError::DiscoveryTimeout { timeout: limit }),
        }
    }

    async fn abort_connect(&mut self, error: ConnectionError) -> ConnectionError {
        self.release().await;
        self.device_id = None;
        self.last_error = Some(error.clone());
        self.transition(LinkState::Disconnected, Some(&error));
        error
    }

    /// Transmit one command within the send budget.
    ///
    /// A timeout abandons the write and reports `Dropped`; it is not an error.
    /// Transport failures move the session to `Failed`.
    pub async fn send(&mut self, command: WheelCommand) -> Result<SendOutcome, ConnectionError> {
        match self.state {
            LinkState::Idle => {}
            // Only reachable when a previous send future was dropped mid-write
            LinkState::Sending => {
                self.stats.dropped += 1;
                self.forget_last_command();
                self.transition(LinkState::Idle, None);
            }
            LinkState::Failed => {
                return Err(self.last_error.clone().unwrap_or(ConnectionError::LinkLost {
                    reason: "session failed".into(),
                }));
            }
            _ => return Err(ConnectionError::NotConnected),
        }

        if let Some(LinkEvent::Disconnected { reason }) = self.transport.poll_event() {
            return Err(self.fail(ConnectionError::LinkLost { reason }).await);
        }

        if self.within_keepalive(command) {
            self.stats.skipped += 1;
            return Ok(SendOutcome::Skipped);
        }

        let packet = build_motor_packet(command, self.config.safety_window);
        self.transition(LinkState::Sending, None);

        let write = timeout(
            self.config.send_timeout,
            self.transport.write(&packet, self.config.write_mode),
        )
        .await;
        match write {
            Ok(Ok(())) => {
                self.last_command_sent = Some(command);
                self.last_sent_at = Some(Instant::now());
                self.stats.delivered += 1;
                self.transition(LinkState::Idle, None);
                Ok(SendOutcome::Delivered)
            }
            Ok(Err(e)) => Err(self
                .fail(ConnectionError::LinkLost {
                    reason: e.to_string(),
                })
                .await),
            Err(_) => {
                self.stats.dropped += 1;
                self.forget_last_command();
                warn!(
                    "Command {:?} dropped after {:?} (dropped total: {})",
                    command, self.config.send_timeout, self.stats.dropped
                );
                self.transition(LinkState::Idle, None);
                Ok(SendOutcome::Dropped)
            }
        }
    }

    /// An abandoned write may still have reached the cube, so what it runs
    /// is unknown and the next command is always written
    fn forget_last_command(&mut self) {
        self.last_command_sent = None;
        self.last_sent_at = None;
    }

    /// Unchanged command whose previous copy is still fresh on the device
    fn within_keepalive(&self, command: WheelCommand) -> bool {
        match (self.last_command_sent, self.last_sent_at) {
            (Some(last), Some(at)) => {
                last == command && at.elapsed() < self.config.keepalive_interval
            }
            _ => false,
        }
    }

    async fn fail(&mut self, error: ConnectionError) -> ConnectionError {
        self.last_error = Some(error.clone());
        self.transition(LinkState::Failed, Some(&error));
        self.release().await;
        error
    }

    /// Tear down from any state. Never fails; calling it again is a no-op.
    pub async fn disconnect(&mut self) {
        if self.state.is_connected() {
            let packet = build_motor_packet(WheelCommand::STOP, Duration::ZERO);
            let limit = self.config.send_timeout.max(STOP_TIMEOUT);
            match timeout(limit, self.transport.write(&packet, self.config.write_mode)).await {
                Ok(Ok(())) => info!("Stop command sent"),
                Ok(Err(e)) => warn!("Failed to send stop command: {}", e),
                Err(_) => warn!("Stop command timed out after {:?}", limit),
            }
        }
        self.release().await;
        self.device_id = None;
        self.transition(LinkState::Disconnected, None);
    }

    /// Disconnect the peripheral and hand the adapter back
    async fn release(&mut self) {
        if !self.adapter_held {
            return;
        }
        // Runs on the tick path after link loss
        let limit = self.config.send_timeout.max(STOP_TIMEOUT);
        match timeout(limit, self.transport.disconnect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Transport disconnect failed: {}", e),
            Err(_) => warn!("Transport disconnect timed out after {:?}", limit),
        }
        self.transport.close().await;
        self.adapter_held = false;
        debug!("BLE adapter released");
    }
}

impl Drop for LinkSession {
    fn drop(&mut self) {
        if self.adapter_held {
            warn!("Link session dropped while holding the adapter; call disconnect() first");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::sim::{SimConfig, SimDevice, SimHandle, SimHandshake, SimTransport};
    use crate::motor::protocol::parse_motor_packet;

    fn session_with(sim: SimConfig, config: LinkConfig) -> (LinkSession, SimHandle) {
        let transport = SimTransport::new(sim);
        let handle = transport.handle();
        (LinkSession::new(Box::new(transport), config), handle)
    }

    fn session() -> (LinkSession, SimHandle) {
        session_with(SimConfig::default(), LinkConfig::default())
    }

    fn device(address: &str, name: &str) -> SimDevice {
        SimDevice {
            address: address.to_string(),
            name: name.to_string(),
            toio_service: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_reaches_idle() {
        let (mut session, sim) = session();
        let mut transitions = session.subscribe();

        let id = session.connect().await.unwrap();

        assert_eq!(id, DeviceId("sim:toio:00".into()));
        assert_eq!(session.state(), LinkState::Idle);
        assert_eq!(session.device_id(), Some(&id));
        assert!(sim.adapter_open());
        assert!(sim.is_connected());
        assert!(transitions.has_changed().unwrap());
        assert_eq!(transitions.borrow_and_update().state, LinkState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_rejected_returns_to_disconnected() {
        let (mut session, sim) = session();
        sim.set_handshake(SimHandshake::Reject);
        let transitions = session.subscribe();

        let err = session.connect().await.unwrap_err();

        assert!(matches!(err, ConnectionError::HandshakeRejected { .. }), "{:?}", err);
        assert_eq!(session.state(), LinkState::Disconnected);
        assert_eq!(session.last_error(), Some(&err));
        assert!(!sim.adapter_open());
        let last = transitions.borrow().clone();
        assert_eq!(last.state, LinkState::Disconnected);
        assert!(last.error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_timeout_is_rejection() {
        let config = LinkConfig {
            handshake_timeout: Duration::from_secs(1),
            ..Default::default()
        };
        let (mut session, sim) = session_with(SimConfig::default(), config);
        sim.set_handshake(SimHandshake::Hang);

        let err = session.connect().await.unwrap_err();

        assert!(matches!(err, ConnectionError::HandshakeRejected { .. }));
        assert_eq!(session.state(), LinkState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_timeout_without_candidates() {
        let sim = SimConfig {
            devices: vec![device("aa:bb", "Headphones")],
            ..Default::default()
        };
        let config = LinkConfig {
            discovery_timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let (mut session, handle) = session_with(sim, config);

        let err = session.connect().await.unwrap_err();

        assert_eq!(
            err,
            ConnectionError::DiscoveryTimeout {
                timeout: Duration::from_secs(2)
            }
        );
        assert_eq!(session.state(), LinkState::Disconnected);
        assert!(!handle.adapter_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_discovered_wins() {
        let sim = SimConfig {
            devices: vec![
                device("aa:bb", "Headphones"),
                device("cc:dd", "toio Core Cube-X1y"),
                device("ee:ff", "toio Core Cube-Z9q"),
            ],
            ..Default::default()
        };
        let (mut session, _) = session_with(sim, LinkConfig::default());

        assert_eq!(session.connect().await.unwrap(), DeviceId("cc:dd".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_address_selection() {
        let sim = SimConfig {
            devices: vec![
                device("cc:dd", "toio Core Cube-X1y"),
                device("ee:ff", "toio Core Cube-Z9q"),
            ],
            ..Default::default()
        };
        let config = LinkConfig {
            device_address: Some("EE:FF".into()),
            ..Default::default()
        };
        let (mut session, _) = session_with(sim, config);

        assert_eq!(session.connect().await.unwrap(), DeviceId("ee:ff".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_twice_is_rejected() {
        let (mut session, _) = session();
        session.connect().await.unwrap();
        assert_eq!(
            session.connect().await.unwrap_err(),
            ConnectionError::AlreadyConnected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_before_connect() {
        let (mut session, _) = session();
        assert_eq!(
            session.send(WheelCommand::new(10, 10)).await.unwrap_err(),
            ConnectionError::NotConnected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_delivers_timed_command() {
        let (mut session, sim) = session();
        session.connect().await.unwrap();

        let outcome = session.send(WheelCommand::new(40, -40)).await.unwrap();

        assert_eq!(outcome, SendOutcome::Delivered);
        assert_eq!(session.state(), LinkState::Idle);
        assert_eq!(session.last_command_sent(), Some(WheelCommand::new(40, -40)));
        let packets = sim.written_packets();
        assert_eq!(packets.len(), 1);
        let (cmd, duration) = parse_motor_packet(&packets[0]).unwrap();
        assert_eq!(cmd, WheelCommand::new(40, -40));
        assert_eq!(duration, SAFETY_WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_send_is_dropped_and_superseded() {
        let (mut session, sim) = session();
        session.connect().await.unwrap();

        sim.set_write_latency(Duration::from_millis(50));
        let outcome = session.send(WheelCommand::new(20, 20)).await.unwrap();
        assert_eq!(outcome, SendOutcome::Dropped);
        assert_eq!(session.state(), LinkState::Idle);
        assert_eq!(session.stats().dropped, 1);

        sim.set_write_latency(Duration::from_millis(1));
        let outcome = session.send(WheelCommand::new(30, 30)).await.unwrap();
        assert_eq!(outcome, SendOutcome::Delivered);

        // The abandoned write never reached the cube and was not retried
        assert_eq!(sim.written_commands(), vec![WheelCommand::new(30, 30)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_after_late_ack_is_written() {
        let (mut session, sim) = session();
        session.connect().await.unwrap();
        assert_eq!(
            session.send(WheelCommand::STOP).await.unwrap(),
            SendOutcome::Delivered
        );

        // The cube receives the forward command but the ack misses the budget
        sim.set_ack_latency(Duration::from_millis(50));
        let forward = WheelCommand::new(80, 80);
        assert_eq!(session.send(forward).await.unwrap(), SendOutcome::Dropped);
        assert_eq!(session.last_command_sent(), None);
        assert_eq!(sim.written_commands().last(), Some(&forward));

        sim.set_ack_latency(Duration::ZERO);
        assert_eq!(
            session.send(WheelCommand::STOP).await.unwrap(),
            SendOutcome::Delivered
        );
        assert_eq!(
            sim.written_commands(),
            vec![WheelCommand::STOP, forward, WheelCommand::STOP]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_send_forgets_last_command() {
        let (mut session, sim) = session();
        session.connect().await.unwrap();
        let cmd = WheelCommand::new(30, 30);
        session.send(cmd).await.unwrap();

        sim.set_ack_latency(Duration::from_millis(5));
        {
            let send = session.send(WheelCommand::new(60, 60));
            let _ = timeout(Duration::from_millis(4), send).await;
        }
        assert_eq!(session.state(), LinkState::Sending);

        sim.set_ack_latency(Duration::ZERO);
        assert_eq!(session.send(cmd).await.unwrap(), SendOutcome::Delivered);
        assert_eq!(session.stats().dropped, 1);
        assert_eq!(sim.written_commands().last(), Some(&cmd));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_skips_then_refreshes() {
        let (mut session, sim) = session();
        session.connect().await.unwrap();
        let cmd = WheelCommand::new(25, 25);

        assert_eq!(session.send(cmd).await.unwrap(), SendOutcome::Delivered);
        assert_eq!(session.send(cmd).await.unwrap(), SendOutcome::Skipped);

        tokio::time::advance(KEEPALIVE_INTERVAL).await;
        assert_eq!(session.send(cmd).await.unwrap(), SendOutcome::Delivered);
        assert_eq!(sim.written_commands(), vec![cmd, cmd]);
        assert_eq!(session.stats().skipped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_loss_fails_session() {
        let (mut session, sim) = session();
        session.connect().await.unwrap();
        session.send(WheelCommand::new(10, 10)).await.unwrap();

        sim.drop_link("out of range");
        let err = session.send(WheelCommand::new(20, 20)).await.unwrap_err();

        assert!(matches!(err, ConnectionError::LinkLost { .. }));
        assert_eq!(session.state(), LinkState::Failed);
        assert!(!sim.adapter_open());

        // Failed is terminal until torn down
        assert!(matches!(
            session.send(WheelCommand::new(20, 20)).await,
            Err(ConnectionError::LinkLost { .. })
        ));
        assert_eq!(
            session.connect().await.unwrap_err(),
            ConnectionError::InvalidState(LinkState::Failed)
        );

        session.disconnect().await;
        assert_eq!(session.state(), LinkState::Disconnected);
        session.connect().await.unwrap();
        assert_eq!(session.state(), LinkState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_loss_teardown_is_bounded() {
        let (mut session, sim) = session();
        session.connect().await.unwrap();
        sim.set_disconnect_hang(true);
        sim.drop_link("out of range");

        let started = Instant::now();
        let err = session.send(WheelCommand::new(20, 20)).await.unwrap_err();

        assert!(matches!(err, ConnectionError::LinkLost { .. }));
        let elapsed = started.elapsed();
        assert!(elapsed < HANDSHAKE_TIMEOUT / 10, "teardown took {:?}", elapsed);
        assert_eq!(session.state(), LinkState::Failed);
        assert!(!sim.adapter_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_sends_stop_and_is_idempotent() {
        let (mut session, sim) = session();
        session.connect().await.unwrap();
        session.send(WheelCommand::new(50, 50)).await.unwrap();
        let mut transitions = session.subscribe();

        session.disconnect().await;
        assert_eq!(session.state(), LinkState::Disconnected);
        assert_eq!(
            sim.written_commands(),
            vec![WheelCommand::new(50, 50), WheelCommand::STOP]
        );
        assert!(!sim.adapter_open());
        assert!(!sim.is_connected());
        transitions.borrow_and_update();

        session.disconnect().await;
        assert_eq!(session.state(), LinkState::Disconnected);
        assert!(!transitions.has_changed().unwrap());
        assert_eq!(sim.written_packets().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_from_every_state_is_safe() {
        let (mut session, _) = session();
        session.disconnect().await;
        assert_eq!(session.state(), LinkState::Disconnected);

        // Cancel an in-flight connect by dropping its future, then tear down
        {
            let connect = session.connect();
            let _ = timeout(Duration::from_millis(150), connect).await;
        }
        assert_eq!(session.state(), LinkState::Connecting);
        session.disconnect().await;
        assert_eq!(session.state(), LinkState::Disconnected);
        session.connect().await.unwrap();
    }
}
