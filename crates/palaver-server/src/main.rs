//! # palaver-server
//!
//! Real-time chat and call-signaling server.
//!
//! This binary provides:
//! - **WebSocket channel** carrying presence, private-message relay and
//!   call signaling, one authenticated connection per browser tab
//! - **Call signaling** with a per-pair session state machine and a
//!   server-side ring timeout
//! - **REST API** (axum) for message persistence and conversation history
//! - **SQLite storage** for the durable message log and group membership

mod api;
mod auth;
mod calls;
mod config;
mod error;
mod presence;
mod relay;
mod ws;

use tracing::info;
use tracing_subscriber::EnvFilter;

use palaver_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,palaver_server=debug")),
        )
        .init();

    info!("Starting Palaver server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();
    info!(
        instance = %config.instance_name,
        addr = %config.http_addr,
        db = %config.db_path.display(),
        "Loaded configuration"
    );

    let store = Database::open_at(&config.db_path)?;
    let http_addr = config.http_addr;
    let app_state = AppState::new(config, store);

    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
