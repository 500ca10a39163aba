//! # arena_engine: match authority
//!
//! Runs the match engine as a NATS service.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (`--config` or `ARENA_CONFIG`, defaults otherwise).
//! 2. Load player records from the JSON store.
//! 3. Connect to NATS (`--nats-url`, else `NATS_URL`, else localhost).
//! 4. Spawn the stimulus, event and stats bridges.
//! 5. Run the tick loop until Ctrl-C, then flush player records.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use arena_engine::bridge;
use arena_engine::config::EngineConfig;
use arena_engine::engine::Engine;
use arena_engine::store::JsonFileStore;
use arena_engine::tick::{TickConfig, TickLoop};
use arena_net::NatsConnection;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Parser)]
#[command(name = "arena_engine", about = "Match orchestration engine over NATS")]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// NATS server URL
    #[arg(short, long)]
    nats_url: Option<String>,

    /// Path of the player record store
    #[arg(short, long, default_value = "data/players.json")]
    store: PathBuf,

    /// Target ticks per second
    #[arg(short, long, default_value_t = 20.0)]
    tick_rate: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("arena_engine=info".parse()?))
        .init();

    let args = Args::parse();
    info!("arena engine starting");

    let config_path = EngineConfig::resolve_path(args.config);
    let config = EngineConfig::load(config_path.as_deref());
    let store = JsonFileStore::new(&args.store);
    let engine = Engine::new(config, Box::new(store));
    let snapshot = engine.snapshot();

    let conn = NatsConnection::connect(args.nats_url.as_deref()).await?;

    let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (outbound_tx, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let stimuli = tokio::spawn(bridge::forward_stimuli(conn.clone(), inbound_tx));
    let events = tokio::spawn(bridge::publish_events(conn.clone(), outbound_rx));
    let stats = tokio::spawn(bridge::serve_stats(conn.clone(), snapshot));

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(%e, "cannot listen for Ctrl-C");
            return;
        }
        info!("Ctrl-C received");
        let _ = shutdown_tx.send(true);
    });

    let tick_config = TickConfig {
        tick_rate: args.tick_rate,
        max_ticks: 0, // Run until shutdown.
    };
    let mut engine = TickLoop::new(tick_config, engine)
        .run(inbound_rx, outbound_tx, shutdown_rx)
        .await;

    if let Err(e) = engine.flush() {
        error!(%e, "failed to flush player records");
    }

    stimuli.abort();
    stats.abort();
    // The event sender is gone once the loop returns; let queued events drain.
    if let Err(e) = events.await {
        error!(%e, "event publisher task failed");
    }
    if let Err(e) = conn.flush().await {
        error!(%e, "failed to flush NATS connection");
    }

    info!("arena engine shut down");
    Ok(())
}
