//! # combat_host — Match host
//!
//! The host is the single source of truth for combat state in a lobby. It
//! owns the damage authority, answers observer joins and resyncs, applies
//! forwarded combat requests, and publishes every authoritative change.
//!
//! ## Startup Sequence
//!
//! 1. Load the authority config (JSON file, or defaults).
//! 2. Connect to NATS (`--nats-url`, `NATS_URL`, or `nats://localhost:4222`).
//! 3. Optionally join the host's own player.
//! 4. Enter the fixed-timestep tick loop until Ctrl-C.

mod registry;
mod tick;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use combat_authority::{AuthorityConfig, DamageAuthority};
use combat_client::{CombatSession, LoggingControls};
use combat_net::NatsConnection;
use combat_net::subjects::DEFAULT_LOBBY;
use tick::{TickConfig, TickLoop};

#[derive(Parser)]
#[command(name = "combat_host", about = "Authoritative combat host over NATS")]
struct Args {
    /// NATS server URL (defaults to `NATS_URL` or localhost)
    #[arg(short, long)]
    nats_url: Option<String>,

    /// Lobby to host
    #[arg(short, long, default_value = DEFAULT_LOBBY)]
    lobby: String,

    /// Target ticks per second
    #[arg(short, long, default_value_t = 30.0)]
    tick_rate: f64,

    /// Authority config file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Account id of the host's own player; omit for a dedicated host
    #[arg(short, long)]
    account_id: Option<u64>,

    /// Display name of the host's own player
    #[arg(long, default_value = "host")]
    name: String,

    /// Seconds without a heartbeat before an observer is dropped
    #[arg(long, default_value_t = 5)]
    observer_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("combat_host=info".parse()?))
        .init();

    let args = Args::parse();
    if !(args.tick_rate.is_finite() && args.tick_rate > 0.0) {
        anyhow::bail!("tick rate must be positive, got {}", args.tick_rate);
    }

    let authority_config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            AuthorityConfig::from_json(&json)
                .with_context(|| format!("loading {}", path.display()))?
        }
        None => AuthorityConfig::default(),
    };
    info!(config = ?authority_config, "combat host starting");

    let respawn_delay = authority_config.respawn_delay();
    let mut authority = DamageAuthority::new(authority_config)?;
    let own_player = match args.account_id {
        Some(account_id) => Some(authority.join(account_id, &args.name, Duration::ZERO)?),
        None => None,
    };

    let mut session = CombatSession::new(LoggingControls, respawn_delay).with_authority(authority);
    if let Some((identity, entity)) = own_player {
        session.set_local(identity, entity);
        info!(%identity, %entity, "host player joined");
    }

    let url = combat_net::connection::resolve_url(args.nats_url.as_deref());
    let conn = NatsConnection::connect_to(&url).await?;

    let config = TickConfig {
        tick_rate: args.tick_rate,
        max_ticks: 0, // Run indefinitely.
        observer_timeout: Duration::from_secs(args.observer_timeout_secs),
    };
    let mut tick_loop = TickLoop::new(config, session);
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    tick_loop.run_async(&conn, &args.lobby, shutdown).await?;

    info!(
        ticks = tick_loop.tick_id(),
        players = tick_loop.session().replica().len(),
        observers = tick_loop.registry().len(),
        "combat host shut down"
    );
    Ok(())
}
