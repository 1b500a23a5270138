//! Climber Client - headless multiplayer client for the platform climber game
//!
//! This is the main entry point for the client. It:
//! - Connects to the relay that forwards events between players
//! - Reconciles remote players and the shared platform layout every tick
//! - Reports the local player's position and, when leader, platform recycling
//! - Drives the local player with a seeded bot instead of a touch screen

mod app;
mod config;
mod game;
mod net;
mod util;

use tracing::{info, info_span, Instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::app::GameClient;
use crate::config::Config;
use crate::game::{BotInput, KinematicWorld};
use crate::util::time::init_client_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize client time tracking
    init_client_time();

    let client_session = Uuid::new_v4();
    let span = info_span!("client", session = %client_session);

    async move {
        info!("Starting Climber Client");
        info!("Relay address: {}", config.relay_addr);

        let seed = config.bot_seed.unwrap_or_else(rand::random);
        info!(seed, "Bot input seeded");

        let world = KinematicWorld::new(&config.constants);
        let client = GameClient::new(config, world, BotInput::new(seed));

        client.connect().await;
        client.run(shutdown_signal()).await;

        info!("Client shutdown complete");
    }
    .instrument(span)
    .await;

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
