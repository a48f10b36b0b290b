//! Novus CTF Server
//!
//! HTTP API for team registration, flag submission and the live leaderboard.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};

use novus_core::config::{database_path, load_config};
use novus_core::tracing_init::{LogFormat, init_tracing};
use novus_server::api::{AppState, build_router};
use novus_server::feed::ChangeFeed;
use novus_server::storage::NovusDatabase;

#[derive(Parser, Debug)]
#[command(name = "novus-server")]
#[command(version, about = "Novus CTF server - flag verification, scoring and live leaderboard")]
struct Args {
    /// Address to listen on (overrides config).
    #[arg(long, env = "NOVUS_ADDR")]
    addr: Option<SocketAddr>,

    /// Path to the SQLite database file (overrides config).
    #[arg(long, env = "NOVUS_DATABASE_PATH")]
    db_path: Option<PathBuf>,

    /// HS256 signing secret for session tokens (at least 32 bytes).
    #[arg(long, env = "NOVUS_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Directory holding `.novus/settings.json`.
    #[arg(long, default_value = ".")]
    project_dir: PathBuf,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config(Some(&args.project_dir))?;
    if let Some(addr) = args.addr {
        config.server.addr = addr;
    }
    if let Some(path) = args.db_path {
        config.server.database_path = Some(path);
    }
    if let Some(secret) = args.jwt_secret {
        config.auth.jwt_secret = secret;
    }
    if args.log_json {
        config.server.log_json = true;
    }
    config.validate()?;

    let format = if config.server.log_json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    init_tracing("novus_server=info,tower_http=info", format)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.server.addr,
        "Starting novus-server"
    );

    if !config.auth.has_admin_credential() {
        warn!("No admin bootstrap credential configured; /api/setup-admin will reject every request");
    }

    let db_path = config
        .server
        .database_path
        .clone()
        .or_else(database_path)
        .ok_or_else(|| anyhow::anyhow!("Cannot determine database path"))?;
    info!(path = %db_path.display(), "Opening database");

    let feed = ChangeFeed::new(config.feed.capacity);
    let db = NovusDatabase::open(&db_path, config.server.max_db_connections, feed).await?;

    let addr = config.server.addr;
    let app = build_router(AppState::new(db, config));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Listening");

    // Leaderboard streams never finish on their own, so shutdown does not
    // wait for open connections.
    tokio::select! {
        result = axum::serve(listener, app).into_future() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Server stopped");
    Ok(())
}
