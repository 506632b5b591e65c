//! sws-lb (Leaderboard) - Sound Wave Science score ledger service
//!
//! Serves the high score list and accepts score submissions from sound
//! meters on the classroom network.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use sws_common::config::{prepare_root_folder, resolve_root_folder, TomlConfig};
use sws_common::events::EventBus;
use sws_lb::{build_router, ledger, seed, AppState, EVENT_BUS_CAPACITY};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "sws-lb", version, about = "Sound Wave Science leaderboard service")]
struct Args {
    /// Folder holding sws.db
    #[arg(long, env = "SWS_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Address to listen on (overrides [ledger] bind_addr)
    #[arg(long, env = "SWS_BIND_ADDR")]
    bind: Option<String>,

    /// Insert the demo leaderboard rows that are not present yet
    #[arg(long)]
    seed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load().context("Failed to load config file")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    // Build identification first, before any database delay
    info!(
        "Starting Sound Wave Science Leaderboard (sws-lb) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    let db_path = prepare_root_folder(&root_folder)?;
    info!("Database path: {}", db_path.display());

    let pool = sws_common::db::init_database(&db_path)
        .await
        .context("Failed to open leaderboard database")?;

    if args.seed {
        seed::seed_demo_scores(&pool).await?;
    }
    info!("Leaderboard holds {} scores", ledger::count_scores(&pool).await?);

    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
    debug!("Event bus buffers {} events per subscriber", event_bus.capacity());
    let state = AppState::new(pool, event_bus);
    let app = build_router(state);

    let bind_addr = args.bind.unwrap_or(config.ledger.bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    info!("sws-lb listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("sws-lb stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
