use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use netpulse_reach::api::{self, ApiState};
use netpulse_reach::board::{self, StatusBoard};
use netpulse_reach::{
    ChannelObserver, Controller, LogObserver, MonitorConfig, NetworkProber, Observers,
};

mod utils;

#[tokio::main]
async fn main() -> Result<()> {
    let ansi = utils::setup_console();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_ansi(ansi)
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.json".into());
    let config = MonitorConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path))?;
    let controller_config = config
        .controller_config()
        .context("Invalid monitor configuration")?;

    let prober = NetworkProber::new(config.dns).context("Failed to create prober")?;
    if !prober.uses_icmp() {
        warn!("Running without ICMP privileges, probing TCP echo port instead");
    }

    let board = Arc::new(Mutex::new(StatusBoard::default()));
    let (channel_observer, reports) = ChannelObserver::new();
    board::spawn_feeder(Arc::clone(&board), reports);

    let observers = Observers::new().with(LogObserver).with(channel_observer);
    let controller = Arc::new(Controller::new(
        controller_config,
        Arc::new(prober),
        Arc::new(observers),
    ));

    if let Some(port) = config.api_port {
        let state = ApiState {
            controller: Arc::clone(&controller),
            board: Arc::clone(&board),
        };
        tokio::spawn(async move {
            if let Err(e) = api::start_server(port, state).await {
                error!("Control API failed: {:#}", e);
            }
        });
    }

    if config.autostart {
        controller.start().context("Failed to start probe loop")?;
    } else if config.api_port.is_some() {
        info!("Autostart disabled; POST /api/start to begin probing");
    } else {
        warn!("Autostart disabled and no api_port configured, nothing will be probed");
    }

    signal::ctrl_c().await?;
    info!("Shutdown signal received. Stopping NetPulse probe loop...");
    controller.stop().await;

    Ok(())
}
