//! HTTP surface of the Anitrack realtime core.
//!
//! Exposes the WebSocket upgrade at the fixed `/ws` path plus the
//! companion endpoints ordinary request-handling code calls into
//! (`/notify`, `/broadcast`) and the diagnostic reads (`/presence`,
//! `/health`). All realtime semantics live in the `realtime` crate; this
//! layer only adapts them to axum.

use log::*;
use service::AppState;

mod controller;
mod params;
pub mod router;
mod ws;

pub use router::init_router;

/// Bind the configured interface/port and serve the router until the
/// process is stopped.
pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let interface = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let address = format!("{}:{}", interface, app_state.config.port);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Server starting... listening for requests on http://{address}");

    axum::serve(listener, init_router(app_state)).await
}
