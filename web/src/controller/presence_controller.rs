use crate::controller::ApiResponse;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use service::AppState;

use log::*;

/// GET the ids of currently connected, identified users.
/// Diagnostics only — presence is ephemeral and restarts empty.
#[utoipa::path(
    get,
    path = "/presence",
    responses(
        (status = 200, description = "Currently online user ids, in no particular order", body = [i64])
    )
)]
pub async fn index(State(app_state): State<AppState>) -> impl IntoResponse {
    let online = app_state.hub.online_users();
    debug!("GET presence: {} user(s) online", online.len());

    Json(ApiResponse::new(StatusCode::OK.into(), online))
}
