//! Inbound wire protocol.
//!
//! Clients send JSON frames shaped like the outbound envelope. Only the
//! `type` and `data` fields matter on the way in; extra envelope fields
//! (`userId`, `timestamp`) are tolerated and ignored so both bare command
//! frames and full envelopes parse. Anything else is a [`ParseError`] the
//! hub logs and drops without disturbing the connection.

use events::{NotificationType, UserId};
use serde::Deserialize;
use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyPayload {
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSendPayload {
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub related_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadPayload {
    pub user_id: UserId,
    pub notification_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementPayload {
    pub user_id: UserId,
    pub achievement_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakPayload {
    pub user_id: UserId,
    pub current_streak: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessagePayload {
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestPayload {
    pub sender_id: UserId,
    pub recipient_id: UserId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastPayload {
    pub message: String,
    /// Announcement category shown by the frontend ("system", "maintenance", ...)
    #[serde(rename = "type", default = "default_broadcast_kind")]
    pub kind: String,
}

fn default_broadcast_kind() -> String {
    "system".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub sender_id: UserId,
    pub recipient_id: UserId,
}

/// One parsed inbound event, ready for dispatch by the hub.
#[derive(Debug)]
pub enum ClientEvent {
    Identify(IdentifyPayload),
    NotificationSend(NotificationSendPayload),
    NotificationMarkRead(MarkReadPayload),
    AchievementUnlocked(AchievementPayload),
    StreakUpdated(StreakPayload),
    DirectMessage(DirectMessagePayload),
    FriendRequest(FriendRequestPayload),
    Broadcast(BroadcastPayload),
    TypingStart(TypingPayload),
    TypingEnd(TypingPayload),
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl ClientEvent {
    /// Parse one inbound text frame.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let frame: RawFrame = serde_json::from_str(text)?;
        let data = frame.data;

        let event = match frame.kind.as_str() {
            "user:join" | "user:identify" => ClientEvent::Identify(payload(data)?),
            "notification:send" => ClientEvent::NotificationSend(payload(data)?),
            "notification:mark-read" => ClientEvent::NotificationMarkRead(payload(data)?),
            "achievement:unlocked" => ClientEvent::AchievementUnlocked(payload(data)?),
            "streak:updated" => ClientEvent::StreakUpdated(payload(data)?),
            "message:new" => ClientEvent::DirectMessage(payload(data)?),
            "friend:request" => ClientEvent::FriendRequest(payload(data)?),
            "broadcast:notification" => ClientEvent::Broadcast(payload(data)?),
            "typing:start" => ClientEvent::TypingStart(payload(data)?),
            "typing:end" => ClientEvent::TypingEnd(payload(data)?),
            other => return Err(ParseError::UnknownType(other.to_string())),
        };

        Ok(event)
    }
}

fn payload<T: serde::de::DeserializeOwned>(data: Value) -> Result<T, ParseError> {
    serde_json::from_value(data).map_err(ParseError::Json)
}

#[derive(Debug)]
pub enum ParseError {
    Json(serde_json::Error),
    UnknownType(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::Json(err) => write!(f, "invalid frame: {err}"),
            ParseError::UnknownType(kind) => write!(f, "unknown event type {kind:?}"),
        }
    }
}

impl StdError for ParseError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ParseError::Json(err) => Some(err),
            ParseError::UnknownType(_) => None,
        }
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        ParseError::Json(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identify_accepts_both_event_names_and_full_envelopes() {
        let bare = r#"{"type":"user:join","data":{"userId":7}}"#;
        let ClientEvent::Identify(p) = ClientEvent::parse(bare).unwrap() else {
            panic!("expected identify");
        };
        assert_eq!(p.user_id, 7);

        // A full envelope carries extra fields the server ignores
        let envelope = r#"{"type":"user:identify","userId":7,"timestamp":"2026-01-01T00:00:00Z","data":{"userId":7}}"#;
        assert!(matches!(
            ClientEvent::parse(envelope).unwrap(),
            ClientEvent::Identify(_)
        ));
    }

    #[test]
    fn notification_send_parses_typed_payload() {
        let text = r#"{"type":"notification:send","data":{"userId":3,"type":"friend_request","title":"New friend request","message":"Mika sent you a friend request","relatedId":9}}"#;
        let ClientEvent::NotificationSend(p) = ClientEvent::parse(text).unwrap() else {
            panic!("expected notification:send");
        };
        assert_eq!(p.user_id, 3);
        assert_eq!(p.notification_type, NotificationType::FriendRequest);
        assert_eq!(p.related_id, Some(9));
    }

    #[test]
    fn broadcast_kind_defaults_to_system() {
        let text = r#"{"type":"broadcast:notification","data":{"message":"maintenance at noon"}}"#;
        let ClientEvent::Broadcast(p) = ClientEvent::parse(text).unwrap() else {
            panic!("expected broadcast");
        };
        assert_eq!(p.kind, "system");
    }

    #[test]
    fn unknown_and_malformed_frames_are_errors() {
        assert!(matches!(
            ClientEvent::parse(r#"{"type":"user:teleport","data":{}}"#),
            Err(ParseError::UnknownType(_))
        ));
        assert!(ClientEvent::parse("not json").is_err());
        // Right event name, wrong payload shape
        assert!(ClientEvent::parse(r#"{"type":"streak:updated","data":{"userId":"nope"}}"#).is_err());
    }
}
