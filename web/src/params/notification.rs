use events::{NotificationType, UserId};
use serde::Deserialize;
use utoipa::ToSchema;

/// Body of `POST /notify`: the target user plus the collaborator's
/// notification record to relay live.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotifyParams {
    pub user_id: UserId,
    pub notification: NotificationParams,
}

/// The relayed copy of a notification record. The durable write happens
/// elsewhere; this shape only feeds the live envelope.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationParams {
    /// Durable record id assigned by the notification store, when known.
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "type")]
    #[schema(value_type = String, example = "friend_request")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub related_id: Option<i64>,
}

/// Body of `POST /broadcast`: a system-wide announcement.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BroadcastParams {
    pub message: String,
    /// Announcement category shown by the frontend.
    #[serde(rename = "type", default = "default_broadcast_kind")]
    #[schema(example = "system")]
    pub kind: String,
}

fn default_broadcast_kind() -> String {
    "system".to_string()
}
