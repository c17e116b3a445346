//! DoodleDock relay server binary.

use doodledock_server::{AppState, ServerConfig, serve};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doodledock_server=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let state = Arc::new(AppState::new());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!("DoodleDock relay server listening on {}", config.addr);
    info!("WebSocket endpoint: ws://{}/ws", config.addr);

    serve(listener, state).await?;
    Ok(())
}
