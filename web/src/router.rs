use crate::controller::{health_check_controller, notification_controller, presence_controller};
use crate::{params, ws};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use service::AppState;
use tower_http::cors::{AllowOrigin, CorsLayer};

use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
// The WebSocket upgrade at /ws is deliberately absent — OpenAPI has no
// vocabulary for it; see the realtime crate docs for the frame protocol.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Anitrack Realtime API"
        ),
        paths(
            notification_controller::notify,
            notification_controller::broadcast,
            presence_controller::index,
            health_check_controller::health_check,
        ),
        components(
            schemas(
                params::notification::NotifyParams,
                params::notification::NotificationParams,
                params::notification::BroadcastParams,
            )
        ),
        tags(
            (name = "anitrack_realtime", description = "Anitrack real-time presence & notification fan-out API")
        )
    )]
struct ApiDoc;

pub fn init_router(app_state: AppState) -> Router {
    let cors = cors_layer(&app_state);

    Router::new()
        .merge(RapiDoc::with_openapi("/api-docs/openapi2.json", ApiDoc::openapi()).path("/rapidoc"))
        .merge(realtime_routes(app_state.clone()))
        .merge(notification_routes(app_state.clone()))
        .merge(presence_routes(app_state.clone()))
        .merge(health_routes(app_state))
        .layer(cors)
}

fn cors_layer(app_state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = app_state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .allow_origin(AllowOrigin::list(origins))
}

fn realtime_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws::handler::ws_upgrade))
        .with_state(app_state)
}

fn notification_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/notify", post(notification_controller::notify))
        .route("/broadcast", post(notification_controller::broadcast))
        .with_state(app_state)
}

fn presence_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/presence", get(presence_controller::index))
        .with_state(app_state)
}

fn health_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check_controller::health_check))
        .with_state(app_state)
}
