use config::Config;
use events::EventPublisher;
use realtime::{DeliveryGateway, Directory, Hub, NullDirectory, RelayEventHandler};
use std::sync::Arc;

pub mod config;
pub mod logging;

/// Construct (or fetch) the process-wide hub from the runtime config.
/// `directory` is the host application's lookup seam; pass
/// [`NullDirectory`] when running the realtime core standalone.
pub fn init_realtime(config: &Config, directory: Arc<dyn Directory>) -> Arc<Hub> {
    Hub::init_global(Hub::new(directory).with_message_preview_len(config.message_preview_len))
}

// Service-level state containing only infrastructure concerns
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub hub: Arc<Hub>,
    pub gateway: Arc<DeliveryGateway>,
    pub event_publisher: EventPublisher,
}

impl AppState {
    pub fn new(config: Config, hub: Arc<Hub>) -> Self {
        let gateway = Arc::new(DeliveryGateway::new(hub.clone()));
        let event_publisher =
            EventPublisher::new().with_handler(Arc::new(RelayEventHandler::new(gateway.clone())));

        Self {
            config,
            hub,
            gateway,
            event_publisher,
        }
    }

    /// State for tests and embedders that must not share the process-wide
    /// hub singleton.
    pub fn with_isolated_hub(config: Config) -> Self {
        let hub = Arc::new(
            Hub::new(Arc::new(NullDirectory)).with_message_preview_len(config.message_preview_len),
        );
        Self::new(config, hub)
    }
}
