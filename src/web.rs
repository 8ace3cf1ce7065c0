//! Liveness endpoint for process supervision.

use axum::{routing::get, Router};
use std::net::SocketAddr;
use tracing::info;

use crate::error::Result;

/// Port for the health endpoint, from HEALTH_PORT. Unset disables it.
pub fn health_port_from_env() -> Option<u16> {
    std::env::var("HEALTH_PORT").ok().and_then(|s| s.parse().ok())
}

async fn health() -> &'static str {
    "ok"
}

/// Serve `GET /health` until the process exits.
pub async fn start_health_server(port: u16) -> Result<()> {
    let app = Router::new().route("/health", get(health));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Health endpoint listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
