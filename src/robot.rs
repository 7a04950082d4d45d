// Follower side: the host-facing robot contract and the toio implementation

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, ROBOT_TOIO_FOLLOWER};
use crate::error::ConnectionError;
use crate::link::{BleTransport, LinkConfig, LinkSession, LinkStats, SendOutcome};
use crate::messages::{
    Features, IntentVector, LinkState, Observation, intent_features, observation_features,
};
use crate::motor::{EncoderLimits, encode};

/// Builds a fresh transport for every connection attempt
pub type TransportFactory = Box<dyn Fn() -> Box<dyn BleTransport> + Send + Sync>;

/// A robot the host can drive with intent vectors
#[async_trait]
pub trait Robot: Send {
    fn name(&self) -> &str;

    fn observation_features(&self) -> Features;

    fn action_features(&self) -> Features;

    fn is_connected(&self) -> bool;

    async fn connect(&mut self) -> Result<(), ConnectionError>;

    fn get_observation(&self) -> Result<Observation, ConnectionError>;

    /// Returns the action actually accepted (clamped to the valid range)
    async fn send_action(&mut self, action: IntentVector) -> Result<IntentVector, ConnectionError>;

    /// Always succeeds; calling it twice is harmless
    async fn disconnect(&mut self);

    fn link_state(&self) -> LinkState;

    /// Transmit counters over the robot's lifetime
    fn link_stats(&self) -> LinkStats {
        LinkStats::default()
    }
}

/// toio Core Cube follower
pub struct ToioFollower {
    link: LinkConfig,
    limits: EncoderLimits,
    transport: TransportFactory,
    session: Option<LinkSession>,
    observation: Observation,
    /// Counters of sessions already torn down
    retired: LinkStats,
}

impl ToioFollower {
    pub fn new(config: &AppConfig, transport: TransportFactory) -> Self {
        Self {
            link: config.link_config(),
            limits: config.robot.limits,
            transport,
            session: None,
            observation: Observation::default(),
            retired: LinkStats::default(),
        }
    }

    async fn retire_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.disconnect().await;
            self.retired += session.stats();
        }
    }
}

/// Clamp to [-1, 1]; non-finite components become zero
fn sanitize(action: IntentVector) -> IntentVector {
    let bound = |v: f64| if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
    IntentVector::new(bound(action.turn), bound(action.throttle))
}

#[async_trait]
impl Robot for ToioFollower {
    fn name(&self) -> &str {
        ROBOT_TOIO_FOLLOWER
    }

    fn observation_features(&self) -> Features {
        observation_features()
    }

    fn action_features(&self) -> Features {
        intent_features()
    }

    fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.state().is_connected())
    }

    async fn connect(&mut self) -> Result<(), ConnectionError> {
        if self.is_connected() {
            return Err(ConnectionError::AlreadyConnected);
        }
        // A failed or half-open session is released before starting over
        self.retire_session().await;

        // Owned by self before the first await so a cancelled connect is still
        // released by disconnect()
        let session = self
            .session
            .insert(LinkSession::new((self.transport)(), self.link.clone()));
        match session.connect().await {
            Ok(device) => {
                info!("{} connected to {}", ROBOT_TOIO_FOLLOWER, device);
                self.observation = Observation::default();
                Ok(())
            }
            Err(e) => {
                self.retire_session().await;
                Err(e)
            }
        }
    }

    fn get_observation(&self) -> Result<Observation, ConnectionError> {
        if !self.is_connected() {
            return Err(ConnectionError::NotConnected);
        }
        Ok(self.observation)
    }

    async fn send_action(&mut self, action: IntentVector) -> Result<IntentVector, ConnectionError> {
        let session = self.session.as_mut().ok_or(ConnectionError::NotConnected)?;
        let accepted = sanitize(action);
        let command = encode(accepted, &self.limits);

        match session.send(command).await? {
            SendOutcome::Delivered | SendOutcome::Skipped => {
                self.observation = Observation {
                    turn: accepted.turn,
                    throttle: accepted.throttle,
                    left_speed: command.left_speed,
                    right_speed: command.right_speed,
                };
            }
            SendOutcome::Dropped if command.is_stop() => {
                warn!("Stop command not acknowledged; retrying next tick")
            }
            SendOutcome::Dropped => debug!("Action {:?} superseded before delivery", accepted),
        }
        Ok(accepted)
    }

    async fn disconnect(&mut self) {
        self.retire_session().await;
        self.observation = Observation::default();
    }

    fn link_state(&self) -> LinkState {
        self.session
            .as_ref()
            .map_or(LinkState::Disconnected, LinkSession::state)
    }

    fn link_stats(&self) -> LinkStats {
        let mut stats = self.retired;
        if let Some(session) = &self.session {
            stats += session.stats();
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::sim::SimHandshake;
    use crate::link::{SimConfig, SimHandle, SimTransport};
    use crate::messages::WheelCommand;
    use std::time::Duration;

    fn follower() -> (ToioFollower, SimHandle) {
        let handle = SimTransport::new(SimConfig::default()).handle();
        let shared = handle.clone();
        let factory: TransportFactory = Box::new(move || {
            Box::new(SimTransport::attach(SimConfig::default(), &shared)) as Box<dyn BleTransport>
        });
        (ToioFollower::new(&AppConfig::default(), factory), handle)
    }

    #[test]
    fn test_stick_to_wheels_scenarios() {
        use crate::input::{MapperConfig, map};
        use crate::messages::ControllerState;

        let mapping = MapperConfig {
            deadzone: 0.1,
            ..Default::default()
        };
        let limits = EncoderLimits {
            max_speed: 100,
            turn_ratio: 1.0,
            min_speed: 0,
        };
        let drive = |raw: ControllerState| encode(map(&raw, &mapping), &limits);

        let forward = ControllerState {
            right_stick_y: 1.0,
            ..Default::default()
        };
        assert_eq!(drive(forward), WheelCommand::new(100, 100));

        let full_right = ControllerState {
            left_stick_x: 1.0,
            ..Default::default()
        };
        assert_eq!(drive(full_right), WheelCommand::new(100, -100));

        let jitter = ControllerState {
            left_stick_x: 0.05,
            right_stick_y: -0.09,
            ..Default::default()
        };
        assert_eq!(drive(jitter), WheelCommand::STOP);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_action_encodes_and_echoes() {
        let (mut robot, sim) = follower();
        robot.connect().await.unwrap();

        let accepted = robot.send_action(IntentVector::new(0.0, 1.0)).await.unwrap();

        assert_eq!(accepted, IntentVector::new(0.0, 1.0));
        assert_eq!(sim.written_commands(), vec![WheelCommand::new(80, 80)]);
        let obs = robot.get_observation().unwrap();
        assert_eq!((obs.left_speed, obs.right_speed), (80, 80));
        assert_eq!(obs.throttle, 1.0);
        robot.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_action_is_clamped_before_echo() {
        let (mut robot, _) = follower();
        robot.connect().await.unwrap();

        let accepted = robot
            .send_action(IntentVector::new(f64::NAN, 3.0))
            .await
            .unwrap();
        assert_eq!(accepted, IntentVector::new(0.0, 1.0));
        robot.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unacknowledged_stop_is_rewritten() {
        let (mut robot, sim) = follower();
        robot.connect().await.unwrap();
        robot.send_action(IntentVector::new(0.0, 1.0)).await.unwrap();

        sim.set_ack_latency(Duration::from_millis(50));
        robot.send_action(IntentVector::STOP).await.unwrap();
        // Not acknowledged, so the echo still shows the last confirmed command
        assert_eq!(robot.get_observation().unwrap().left_speed, 80);
        assert_eq!(robot.link_stats().dropped, 1);

        sim.set_ack_latency(Duration::ZERO);
        robot.send_action(IntentVector::STOP).await.unwrap();
        assert_eq!(robot.get_observation().unwrap().left_speed, 0);
        assert_eq!(
            sim.written_commands(),
            vec![WheelCommand::new(80, 80), WheelCommand::STOP, WheelCommand::STOP]
        );
        robot.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_requires_connection() {
        let (mut robot, _) = follower();
        assert!(!robot.is_connected());
        assert_eq!(
            robot.send_action(IntentVector::STOP).await.unwrap_err(),
            ConnectionError::NotConnected
        );
        assert_eq!(
            robot.get_observation().unwrap_err(),
            ConnectionError::NotConnected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_twice() {
        let (mut robot, _) = follower();
        robot.connect().await.unwrap();
        assert_eq!(
            robot.connect().await.unwrap_err(),
            ConnectionError::AlreadyConnected
        );
        robot.disconnect().await;
        robot.disconnect().await;
        assert_eq!(robot.link_state(), LinkState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_handshake_surfaces() {
        let (mut robot, sim) = follower();
        sim.set_handshake(SimHandshake::Reject);

        let err = robot.connect().await.unwrap_err();
        assert!(matches!(err, ConnectionError::HandshakeRejected { .. }));
        assert!(!robot.is_connected());
        assert!(!sim.adapter_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_connect_released_by_disconnect() {
        let (mut robot, sim) = follower();
        sim.set_handshake(SimHandshake::Hang);

        let attempt = tokio::time::timeout(Duration::from_secs(1), robot.connect()).await;
        assert!(attempt.is_err());
        assert!(sim.adapter_open());
        assert_eq!(robot.link_state(), LinkState::Connecting);

        robot.disconnect().await;
        assert!(!sim.adapter_open());
        assert_eq!(robot.link_state(), LinkState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_after_link_loss_keeps_stats() {
        let (mut robot, sim) = follower();
        robot.connect().await.unwrap();
        robot.send_action(IntentVector::new(0.0, 0.5)).await.unwrap();

        sim.drop_link("out of range");
        let err = robot.send_action(IntentVector::new(0.0, 0.6)).await.unwrap_err();
        assert!(matches!(err, ConnectionError::LinkLost { .. }));
        assert_eq!(robot.link_state(), LinkState::Failed);

        robot.connect().await.unwrap();
        robot.send_action(IntentVector::new(0.0, 0.6)).await.unwrap();
        assert_eq!(robot.link_stats().delivered, 2);
        robot.disconnect().await;
    }
}
