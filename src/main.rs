use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lerobot_toio_runtime::config::{AppConfig, TransportKind};
use lerobot_toio_runtime::registry::{Registry, transport_factory};
use lerobot_toio_runtime::runtime;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(
    name = "lerobot-toio",
    version,
    about = "Teleoperate a toio Core Cube over BLE"
)]
struct Cli {
    /// TOML config file; flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drive the follower from the leader at a fixed rate
    Teleoperate(Overrides),
    /// Print the feature descriptors of the selected robot and teleoperator
    Describe(Overrides),
    /// List BLE advertisements (diagnostic)
    Scan {
        #[arg(long = "timeout_s", default_value_t = 5.0)]
        timeout_s: f64,

        #[command(flatten)]
        overrides: Overrides,
    },
}

#[derive(Args, Debug)]
struct Overrides {
    #[arg(long = "robot.type")]
    robot_type: Option<String>,

    #[arg(long = "teleop.type")]
    teleop_type: Option<String>,

    #[arg(long = "robot.transport", value_enum)]
    transport: Option<TransportKind>,

    /// Connect only to this address instead of the first cube found
    #[arg(long = "robot.device_address")]
    device_address: Option<String>,

    #[arg(long = "teleop.joystick_index")]
    joystick_index: Option<usize>,

    /// Control loop frequency
    #[arg(long)]
    fps: Option<u32>,

    /// Stop after this many seconds
    #[arg(long = "duration_s")]
    duration_s: Option<f64>,
}

impl Overrides {
    fn apply(self, config: &mut AppConfig) {
        if let Some(robot_type) = self.robot_type {
            config.robot.robot_type = robot_type;
        }
        if let Some(teleop_type) = self.teleop_type {
            config.teleop.teleop_type = teleop_type;
        }
        if let Some(transport) = self.transport {
            config.robot.transport = transport;
        }
        if self.device_address.is_some() {
            config.robot.device_address = self.device_address;
        }
        if let Some(index) = self.joystick_index {
            config.teleop.joystick_index = index;
        }
        if let Some(fps) = self.fps {
            config.runtime.fps = fps;
        }
        if self.duration_s.is_some() {
            config.runtime.duration_s = self.duration_s;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Command::Teleoperate(overrides) => {
            overrides.apply(&mut config);
            config.validate()?;
            teleoperate(&config).await
        }
        Command::Describe(overrides) => {
            overrides.apply(&mut config);
            config.validate()?;
            describe(&config)
        }
        Command::Scan {
            timeout_s,
            overrides,
        } => {
            overrides.apply(&mut config);
            config.validate()?;
            let limit = Duration::try_from_secs_f64(timeout_s)?;
            scan(&config, limit).await
        }
    }
}

async fn teleoperate(config: &AppConfig) -> Result<(), BoxError> {
    let registry = Registry::builtin();
    let mut robot = registry.make_robot(config)?;
    let mut teleop = registry.make_teleop(config)?;

    let shutdown = CancellationToken::new();
    let on_ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            on_ctrl_c.cancel();
        }
    });

    let (reason, stats) =
        runtime::run(robot.as_mut(), teleop.as_mut(), config, shutdown).await?;
    info!("Teleoperation ended: {:?}", reason);
    println!("{}", serde_json::to_string(&stats)?);
    Ok(())
}

fn describe(config: &AppConfig) -> Result<(), BoxError> {
    let registry = Registry::builtin();
    let robot = registry.make_robot(config)?;
    let teleop = registry.make_teleop(config)?;

    let description = json!({
        "robot": {
            "type": robot.name(),
            "observation_features": robot.observation_features(),
            "action_features": robot.action_features(),
        },
        "teleop": {
            "type": teleop.name(),
            "action_features": teleop.action_features(),
        },
    });
    println!("{}", serde_json::to_string_pretty(&description)?);
    Ok(())
}

async fn scan(config: &AppConfig, limit: Duration) -> Result<(), BoxError> {
    let link = config.link_config();
    let factory = transport_factory(config)?;
    let mut transport = factory();
    transport.open().await?;
    transport.start_scan().await?;
    info!("Scanning for {:?}", limit);

    let deadline = Instant::now() + limit;
    let mut seen = HashSet::new();
    while let Ok(Some(adv)) = timeout_at(deadline, transport.next_advertisement()).await {
        if !seen.insert(adv.id.clone()) {
            continue;
        }
        let line = json!({ "advertisement": adv, "matches": link.matches(&adv) });
        println!("{}", serde_json::to_string(&line)?);
    }

    if let Err(e) = transport.stop_scan().await {
        warn!("Failed to stop scan: {}", e);
    }
    transport.close().await;
    info!("Scan finished: {} devices", seen.len());
    Ok(())
}
