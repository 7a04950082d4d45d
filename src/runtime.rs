// Fixed-rate teleoperation loop with watchdog
// Each tick: sample the leader, run the watchdog, send the result to the follower.
// The watchdog holds STOP when the leader's input is gone or no fresh intent has
// arrived within the safety window (eg. the loop stalled during a reconnect).

use std::time::Duration;

use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::ConnectionError;
use crate::link::LinkStats;
use crate::messages::{IntentVector, RuntimeHealth};
use crate::robot::Robot;
use crate::teleop::Teleoperator;

pub struct Watchdog {
    latest_action: Option<IntentVector>,
    action_received_at: Instant,
    safety_window: Duration,
    health: RuntimeHealth,
}

impl Watchdog {
    pub fn new(safety_window: Duration) -> Self {
        Self {
            latest_action: None,
            action_received_at: Instant::now(),
            safety_window,
            health: RuntimeHealth::CmdStale, // Start stale until first action
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Fresh intent from the leader
    pub fn on_action(&mut self, action: IntentVector) {
        if self.health == RuntimeHealth::InputLost {
            info!("Input restored, resuming control");
        }
        self.latest_action = Some(action);
        self.action_received_at = Instant::now();
        self.health = RuntimeHealth::Ok;
    }

    /// Leader could not produce an intent this tick
    pub fn on_input_lost(&mut self) {
        if self.health != RuntimeHealth::InputLost {
            warn!("Input lost, holding STOP");
        }
        self.latest_action = None;
        self.health = RuntimeHealth::InputLost;
    }

    /// Action to send this tick
    pub fn compute_action(&mut self) -> IntentVector {
        if self.health == RuntimeHealth::InputLost {
            return IntentVector::STOP;
        }
        let age = self.action_received_at.elapsed();
        match self.latest_action {
            Some(action) if age <= self.safety_window => {
                self.health = RuntimeHealth::Ok;
                action
            }
            _ => {
                if self.health != RuntimeHealth::CmdStale {
                    warn!("Action stale ({:?} old), stopping robot", age);
                }
                self.health = RuntimeHealth::CmdStale;
                IntentVector::STOP
            }
        }
    }
}

/// Counters reported periodically and when the loop ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub ticks: u64,
    /// Ticks whose work took longer than one period
    pub overruns: u64,
    pub stale_ticks: u64,
    pub input_lost_ticks: u64,
    pub reconnects: u32,
    pub link: LinkStats,
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Shutdown,
    DurationElapsed,
    ExitRequested,
}

/// Connect both ends, run the loop until stopped, then tear both ends down.
///
/// Teardown happens on every path, including errors and shutdown mid-connect.
pub async fn run(
    robot: &mut dyn Robot,
    teleop: &mut dyn Teleoperator,
    config: &AppConfig,
    shutdown: CancellationToken,
) -> Result<(StopReason, RunStats), ConnectionError> {
    let mut stats = RunStats::default();
    let result = drive(robot, teleop, config, &shutdown, &mut stats).await;

    robot.disconnect().await;
    teleop.disconnect();
    stats.link = robot.link_stats();
    info!(
        "Runtime stopped: {} ticks, {} delivered, {} skipped, {} dropped, {} overruns, {} reconnects",
        stats.ticks,
        stats.link.delivered,
        stats.link.skipped,
        stats.link.dropped,
        stats.overruns,
        stats.reconnects
    );
    result.map(|reason| (reason, stats))
}

async fn drive(
    robot: &mut dyn Robot,
    teleop: &mut dyn Teleoperator,
    config: &AppConfig,
    shutdown: &CancellationToken,
    stats: &mut RunStats,
) -> Result<StopReason, ConnectionError> {
    teleop.connect()?;

    info!("Connecting {}...", robot.name());
    tokio::select! {
        connected = robot.connect() => connected?,
        _ = shutdown.cancelled() => return Ok(StopReason::Shutdown),
    }

    let period = config.runtime.tick_period();
    let stats_interval = Duration::from_millis(config.runtime.stats_interval_ms);
    let deadline = config
        .runtime
        .duration_s
        .and_then(|s| Duration::try_from_secs_f64(s).ok())
        .map(|d| Instant::now() + d);

    let mut watchdog = Watchdog::new(config.link_config().safety_window);
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_report = Instant::now();

    info!(
        "Runtime started: {}Hz loop, {}ms safety window, {} -> {}",
        config.runtime.fps,
        watchdog.safety_window.as_millis(),
        teleop.name(),
        robot.name()
    );

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(StopReason::Shutdown),
            _ = tick.tick() => {}
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Ok(StopReason::DurationElapsed);
        }
        let started = Instant::now();
        stats.ticks += 1;

        // 1. Sample the leader (never blocks)
        match teleop.get_action() {
            Ok(action) => watchdog.on_action(action),
            Err(ConnectionError::InputDeviceUnavailable { .. }) => watchdog.on_input_lost(),
            Err(e) => return Err(e),
        }
        if teleop.exit_requested() {
            info!("Exit requested by {}", teleop.name());
            return Ok(StopReason::ExitRequested);
        }

        // 2. Watchdog decides what actually goes out
        let action = watchdog.compute_action();
        match watchdog.health() {
            RuntimeHealth::CmdStale => stats.stale_ticks += 1,
            RuntimeHealth::InputLost => stats.input_lost_ticks += 1,
            RuntimeHealth::Ok => {}
        }

        // 3. Send, bounded by the session's tick budget
        let sent = tokio::select! {
            sent = robot.send_action(action) => sent,
            _ = shutdown.cancelled() => return Ok(StopReason::Shutdown),
        };
        match sent {
            Ok(accepted) => debug!("Tick {}: {:?}", stats.ticks, accepted),
            Err(ConnectionError::LinkLost { reason }) => {
                warn!("Link lost: {}", reason);
                if !reconnect(robot, config, shutdown, reason).await? {
                    return Ok(StopReason::Shutdown);
                }
                stats.reconnects += 1;
            }
            Err(e) => return Err(e),
        }

        if started.elapsed() > period {
            stats.overruns += 1;
        }

        // 4. Periodic stats line
        if !stats_interval.is_zero() && last_report.elapsed() >= stats_interval {
            let link = robot.link_stats();
            info!(
                "ticks={} delivered={} skipped={} dropped={} overruns={} health={:?}",
                stats.ticks,
                link.delivered,
                link.skipped,
                link.dropped,
                stats.overruns,
                watchdog.health()
            );
            last_report = Instant::now();
        }
    }
}

/// Retry the connection with a fixed backoff. `Ok(false)` means shutdown won.
async fn reconnect(
    robot: &mut dyn Robot,
    config: &AppConfig,
    shutdown: &CancellationToken,
    reason: String,
) -> Result<bool, ConnectionError> {
    let attempts = config.runtime.reconnect_attempts;
    let backoff = Duration::from_millis(config.runtime.reconnect_backoff_ms);
    let mut last_error = ConnectionError::LinkLost { reason };

    for attempt in 1..=attempts {
        robot.disconnect().await;
        tokio::select! {
            _ = sleep(backoff) => {}
            _ = shutdown.cancelled() => return Ok(false),
        }

        info!("Reconnecting ({}/{})", attempt, attempts);
        let connected = tokio::select! {
            connected = robot.connect() => connected,
            _ = shutdown.cancelled() => return Ok(false),
        };
        match connected {
            Ok(()) => return Ok(true),
            Err(e) => {
                warn!("Reconnect attempt {} failed: {}", attempt, e);
                last_error = e;
            }
        }
    }
    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportKind;
    use crate::input::{InputError, MapperConfig, ScriptedSource};
    use crate::link::sim::SimHandshake;
    use crate::link::{BleTransport, SimConfig, SimHandle, SimTransport};
    use crate::messages::{ControllerState, WheelCommand};
    use crate::robot::ToioFollower;
    use crate::teleop::InputLeader;

    fn forward() -> ControllerState {
        ControllerState {
            right_stick_y: 1.0,
            ..Default::default()
        }
    }

    fn test_config(duration_s: f64) -> AppConfig {
        let mut config = AppConfig::default();
        config.robot.transport = TransportKind::Sim;
        config.runtime.fps = 50;
        config.runtime.duration_s = Some(duration_s);
        config
    }

    fn follower(config: &AppConfig) -> (ToioFollower, SimHandle) {
        let handle = SimTransport::new(SimConfig::default()).handle();
        let shared = handle.clone();
        let robot = ToioFollower::new(
            config,
            Box::new(move || {
                Box::new(SimTransport::attach(SimConfig::default(), &shared)) as Box<dyn BleTransport>
            }),
        );
        (robot, handle)
    }

    fn leader(readings: Vec<Result<ControllerState, InputError>>) -> InputLeader {
        InputLeader::new(
            "scripted_leader",
            Box::new(ScriptedSource::new(readings)),
            MapperConfig::default(),
        )
    }

    /// Leader that asks to quit after a number of ticks
    struct QuitAfter {
        remaining: u32,
        connected: bool,
    }

    impl Teleoperator for QuitAfter {
        fn name(&self) -> &str {
            "quit_after"
        }

        fn action_features(&self) -> crate::messages::Features {
            crate::messages::intent_features()
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn connect(&mut self) -> Result<(), ConnectionError> {
            self.connected = true;
            Ok(())
        }

        fn get_action(&mut self) -> Result<IntentVector, ConnectionError> {
            self.remaining = self.remaining.saturating_sub(1);
            Ok(IntentVector::new(0.0, 0.5))
        }

        fn exit_requested(&self) -> bool {
            self.remaining == 0
        }

        fn disconnect(&mut self) {
            self.connected = false;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_goes_stale() {
        let mut watchdog = Watchdog::new(Duration::from_millis(500));
        assert_eq!(watchdog.compute_action(), IntentVector::STOP);

        watchdog.on_action(IntentVector::new(0.2, 0.4));
        assert_eq!(watchdog.compute_action(), IntentVector::new(0.2, 0.4));
        assert_eq!(watchdog.health(), RuntimeHealth::Ok);

        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(watchdog.compute_action(), IntentVector::STOP);
        assert_eq!(watchdog.health(), RuntimeHealth::CmdStale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_input_lost_holds_stop() {
        let mut watchdog = Watchdog::new(Duration::from_millis(500));
        watchdog.on_action(IntentVector::new(0.0, 1.0));
        watchdog.on_input_lost();
        assert_eq!(watchdog.compute_action(), IntentVector::STOP);
        assert_eq!(watchdog.health(), RuntimeHealth::InputLost);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_for_duration_then_stops_robot() {
        let config = test_config(1.0);
        let (mut robot, sim) = follower(&config);
        let mut teleop = leader(vec![Ok(forward())]);

        let (reason, stats) = run(&mut robot, &mut teleop, &config, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(reason, StopReason::DurationElapsed);
        assert!((45..=51).contains(&stats.ticks), "ticks = {}", stats.ticks);
        let commands = sim.written_commands();
        assert_eq!(commands.first(), Some(&WheelCommand::new(80, 80)));
        assert_eq!(commands.last(), Some(&WheelCommand::STOP));
        // Keep-alive: an unchanged command is refreshed, not rewritten every tick
        assert!(stats.link.skipped > stats.link.delivered);
        assert!(!sim.adapter_open());
        assert!(!robot.is_connected());
        assert!(!teleop.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_loss_holds_stop() {
        let config = test_config(0.5);
        let (mut robot, sim) = follower(&config);
        let mut teleop = leader(vec![
            Ok(forward()),
            Err(InputError::Disconnected("unplugged".into())),
        ]);

        let (_, stats) = run(&mut robot, &mut teleop, &config, CancellationToken::new())
            .await
            .unwrap();

        assert!(stats.input_lost_ticks > 0);
        assert_eq!(
            sim.written_commands()[..2],
            [WheelCommand::new(80, 80), WheelCommand::STOP]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_request_ends_loop() {
        let config = test_config(10.0);
        let (mut robot, _) = follower(&config);
        let mut teleop = QuitAfter {
            remaining: 5,
            connected: false,
        };

        let (reason, stats) = run(&mut robot, &mut teleop, &config, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(reason, StopReason::ExitRequested);
        assert_eq!(stats.ticks, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_connect_releases_adapter() {
        let config = test_config(10.0);
        let (mut robot, sim) = follower(&config);
        sim.set_handshake(SimHandshake::Hang);
        let mut teleop = leader(vec![Ok(forward())]);

        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let (reason, stats) = run(&mut robot, &mut teleop, &config, shutdown)
            .await
            .unwrap();

        assert_eq!(reason, StopReason::Shutdown);
        assert_eq!(stats.ticks, 0);
        assert!(!sim.adapter_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_link_loss() {
        let config = test_config(3.0);
        let (mut robot, sim) = follower(&config);
        let mut teleop = leader(vec![Ok(forward())]);

        let link = sim.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(600)).await;
            link.drop_link("out of range");
        });

        let (reason, stats) = run(&mut robot, &mut teleop, &config, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(reason, StopReason::DurationElapsed);
        assert_eq!(stats.reconnects, 1);
        // Forward was written on both connections
        let forward = sim
            .written_commands()
            .into_iter()
            .filter(|c| *c == WheelCommand::new(80, 80))
            .count();
        assert!(forward >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_reconnect_attempts() {
        let mut config = test_config(10.0);
        config.runtime.reconnect_attempts = 2;
        let (mut robot, sim) = follower(&config);
        let mut teleop = leader(vec![Ok(forward())]);

        let link = sim.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(600)).await;
            link.set_handshake(SimHandshake::Reject);
            link.drop_link("out of range");
        });

        let err = run(&mut robot, &mut teleop, &config, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectionError::HandshakeRejected { .. }));
        assert!(!sim.adapter_open());
    }
}
