//! Thais MCP server.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use thais_mcp::{
    config::{CliOverrides, Config},
    create_app,
    logging::init_logging,
    state::AppState,
};

/// Thais - MCP server for hotel room availability
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind (defaults to loopback)
    #[arg(long, env = "THAIS_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "THAIS_PORT")]
    port: Option<u16>,

    /// Base URL of the Thais partner API
    #[arg(long, env = "THAIS_UPSTREAM_URL")]
    upstream_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Also write logs to this file (rotated daily)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Credentials usually live in a local .env
    let dotenv = dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = Config::from_figment(CliOverrides {
        host: args.host,
        port: args.port,
        upstream_url: args.upstream_url,
        log_level: args.log_level,
        log_file: args.log_file,
    })
    .context("Failed to load configuration")?;

    let _log_guard = init_logging(&config.logging);

    info!("Starting Thais MCP server v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }
    info!("Upstream API: {}", config.upstream.base_url);
    if config.upstream.username.is_none() || config.upstream.password.is_none() {
        warn!("Upstream credentials not configured; tool calls will fail until THAIS_UPSTREAM_USERNAME and THAIS_UPSTREAM_PASSWORD are set");
    }

    let state = AppState::from_config(&config)?;

    if let Some(max_idle) = config.session.idle_timeout() {
        info!("Expiring sessions idle for more than {:?}", max_idle);
        state.sessions().spawn_reaper(max_idle);
    }

    let app = create_app(state.clone());

    let addrs = config.server.socket_addrs()?;
    let listener = tokio::net::TcpListener::bind(addrs.as_slice())
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.server.host, config.server.port))?;
    let addr = listener.local_addr()?;
    if !addr.ip().is_loopback() {
        warn!("Listening on non-loopback address {}; the MCP endpoint has no authentication", addr);
    }
    info!("MCP endpoint listening on http://{}/mcp", addr);

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down gracefully...");
        info!(
            "Server shutting down with {} open session(s)",
            state.sessions().len()
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    Ok(())
}
