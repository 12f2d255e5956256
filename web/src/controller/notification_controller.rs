use crate::controller::ApiResponse;
use crate::params::notification::{BroadcastParams, NotifyParams};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use events::{DomainEvent, Notification};
use service::AppState;

use log::*;

/// POST deliver a notification to a user's live connection.
///
/// Invoked synchronously by the CRUD side after it writes the durable
/// record. Delivery is best-effort: the response acknowledges receipt,
/// not reachability, so callers never block on whether the user was
/// actually online.
#[utoipa::path(
    post,
    path = "/notify",
    request_body = NotifyParams,
    responses(
        (status = 200, description = "Acknowledged; relayed only if the user has a live connection"),
        (status = 422, description = "Unprocessable Entity")
    )
)]
pub async fn notify(
    State(app_state): State<AppState>,
    Json(params): Json<NotifyParams>,
) -> impl IntoResponse {
    debug!("POST deliver notification to user {}", params.user_id);

    let mut notification = Notification::ephemeral(
        params.user_id,
        params.notification.notification_type,
        params.notification.title,
        params.notification.message,
        params.notification.related_id,
    );
    notification.id = params.notification.id;

    let notification = match serde_json::to_value(&notification) {
        Ok(value) => value,
        Err(err) => {
            error!("failed to serialize notification: {err}");
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ApiResponse::new(
                    StatusCode::UNPROCESSABLE_ENTITY.into(),
                    "rejected",
                )),
            );
        }
    };

    app_state
        .event_publisher
        .publish(DomainEvent::NotificationCreated {
            user_id: params.user_id,
            notification,
        })
        .await;

    (
        StatusCode::OK,
        Json(ApiResponse::new(StatusCode::OK.into(), "acknowledged")),
    )
}

/// POST send a system-wide announcement to every identified connection
#[utoipa::path(
    post,
    path = "/broadcast",
    request_body = BroadcastParams,
    responses(
        (status = 200, description = "Announcement broadcast to all identified connections"),
        (status = 422, description = "Unprocessable Entity")
    )
)]
pub async fn broadcast(
    State(app_state): State<AppState>,
    Json(params): Json<BroadcastParams>,
) -> impl IntoResponse {
    debug!("POST broadcast announcement: {}", params.message);

    app_state.gateway.broadcast(&params.message, &params.kind);

    Json(ApiResponse::new(StatusCode::OK.into(), "acknowledged"))
}
