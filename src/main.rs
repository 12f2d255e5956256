use log::*;
use realtime::NullDirectory;
use service::config::Config;
use service::logging::Logger;
use service::AppState;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config);

    info!(
        "Starting anitrack realtime core ({} environment)",
        config.runtime_env()
    );

    // Standalone deployments have no host application attached; the CRUD
    // side plugs in its own Directory when it embeds this core.
    let hub = service::init_realtime(&config, Arc::new(NullDirectory));
    let app_state = AppState::new(config, hub);

    if let Err(err) = web::init_server(app_state).await {
        error!("server error: {err}");
        std::process::exit(1);
    }
}
