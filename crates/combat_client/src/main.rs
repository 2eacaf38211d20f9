//! # combat-observer
//!
//! Headless player process. Joins a lobby, mirrors combat state, and logs
//! deaths, revives and control changes. Useful for watching a match and for
//! exercising a host without a game client.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use combat_client::{ClientConfig, CombatSession, LoggingControls, ObserverRunner};
use combat_net::subjects::DEFAULT_LOBBY;

#[derive(Parser)]
#[command(name = "combat-observer", about = "Headless combat observer over NATS")]
struct Args {
    /// NATS server URL (defaults to `NATS_URL` or localhost)
    #[arg(short, long)]
    nats_url: Option<String>,

    /// Lobby to join
    #[arg(short, long, default_value = DEFAULT_LOBBY)]
    lobby: String,

    /// Platform account id
    #[arg(short, long)]
    account_id: u64,

    /// Display name
    #[arg(long, default_value = "observer")]
    name: String,

    /// Local ticks per second
    #[arg(long, default_value_t = 30.0)]
    tick_rate: f64,

    /// Death-screen countdown in seconds
    #[arg(long, default_value_t = 5.0)]
    respawn_delay_secs: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("combat_client=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = ClientConfig::new(args.lobby, args.account_id, args.name)
        .with_tick_rate(args.tick_rate)
        .with_respawn_delay(
            Duration::try_from_secs_f64(args.respawn_delay_secs)
                .unwrap_or(Duration::from_secs(5)),
        );
    if let Some(url) = args.nats_url {
        config = config.with_nats_url(url);
    }

    let session = CombatSession::new(LoggingControls, config.respawn_delay);
    let runner = ObserverRunner::new(config);
    info!(instance_id = runner.instance_id(), "combat observer starting");

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    runner.run(session, shutdown).await?;

    info!("combat observer shut down");
    Ok(())
}
