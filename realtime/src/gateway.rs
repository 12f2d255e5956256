use crate::hub::{Hub, RelayOutcome};
use async_trait::async_trait;
use events::{DomainEvent, Envelope, EventHandler, EventType, Notification, NotificationType, UserId};
use log::*;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Server-side entry point for live delivery, callable from ordinary
/// request-handling code outside the real-time transport.
///
/// Decouples "a notification was created" (a collaborator's concern) from
/// "a notification was delivered live" (this crate's concern). Every call
/// is best-effort and non-blocking: the durable notification record,
/// written separately, is the source of truth, and a miss here only means
/// the user sees it on their next poll.
pub struct DeliveryGateway {
    hub: Arc<Hub>,
}

impl DeliveryGateway {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }

    /// Push `notification` to the user's live connection if one exists.
    /// Accepts anything serializable so collaborators can hand over either
    /// a typed [`Notification`] or their own serialized record.
    pub fn deliver<T: Serialize>(&self, user_id: UserId, notification: &T) {
        let data = match serde_json::to_value(notification) {
            Ok(data) => data,
            Err(err) => {
                error!("failed to serialize notification payload: {err}");
                return;
            }
        };

        let envelope = Envelope::new(EventType::NotificationNew, user_id, data);
        if self.hub.relay(user_id, envelope) == RelayOutcome::Dropped {
            debug!("live delivery skipped: user {user_id} not connected");
        }
    }

    /// Tell the user's other open sessions that a notification was read.
    pub fn deliver_read(&self, user_id: UserId, notification_id: i64) {
        let envelope = Envelope::new(
            EventType::NotificationRead,
            user_id,
            json!({ "notificationId": notification_id }),
        );
        self.hub.relay(user_id, envelope);
    }

    /// System-wide announcement to every identified connection.
    pub fn broadcast(&self, message: &str, kind: &str) {
        self.hub.broadcast_notification(message, kind);
    }
}

/// Routes published [`DomainEvent`]s into live deliveries so CRUD
/// collaborators never touch the hub or the registry directly.
pub struct RelayEventHandler {
    gateway: Arc<DeliveryGateway>,
}

impl RelayEventHandler {
    pub fn new(gateway: Arc<DeliveryGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl EventHandler for RelayEventHandler {
    async fn handle(&self, event: &DomainEvent) {
        match event {
            DomainEvent::NotificationCreated {
                user_id,
                notification,
            } => {
                debug!("relaying created notification for user {user_id}");
                self.gateway.deliver(*user_id, notification);
            }

            DomainEvent::NotificationRead {
                user_id,
                notification_id,
            } => {
                self.gateway.deliver_read(*user_id, *notification_id);
            }

            DomainEvent::AchievementUnlocked {
                user_id,
                achievement_id,
                title,
            } => {
                let notification = Notification::ephemeral(
                    *user_id,
                    NotificationType::Achievement,
                    "Achievement unlocked!",
                    format!("You earned {title}"),
                    Some(*achievement_id),
                );
                self.gateway.deliver(*user_id, &notification);
            }

            DomainEvent::StreakUpdated {
                user_id,
                current_streak,
            } => {
                let notification = Notification::ephemeral(
                    *user_id,
                    NotificationType::Streak,
                    "Streak updated",
                    format!("You're on a {current_streak}-day watch streak!"),
                    None,
                );
                self.gateway.deliver(*user_id, &notification);
            }
        }
    }
}
