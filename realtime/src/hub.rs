use crate::connection::{ConnectionId, ConnectionRegistry};
use crate::directory::Directory;
use crate::protocol::ClientEvent;
use axum::extract::ws::Message;
use events::{Envelope, EventType, Notification, NotificationType, UserId};
use log::*;
use serde_json::json;
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc::UnboundedSender;

/// Characters of a direct message relayed in its live preview.
pub const DEFAULT_MESSAGE_PREVIEW_LEN: usize = 80;

/// Result of a unicast relay. A miss is a defined outcome, not an error:
/// the durable notification store (external) is the source of truth and
/// the user sees the record on their next poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered,
    Dropped,
}

static GLOBAL_HUB: OnceLock<Arc<Hub>> = OnceLock::new();

/// The authoritative real-time hub; owns the connection registry. Route
/// handlers never touch the registry directly — they go through the
/// [`DeliveryGateway`](crate::gateway::DeliveryGateway) or publish domain
/// events.
pub struct Hub {
    registry: ConnectionRegistry,
    directory: Arc<dyn Directory>,
    message_preview_len: usize,
}

impl Hub {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            directory,
            message_preview_len: DEFAULT_MESSAGE_PREVIEW_LEN,
        }
    }

    pub fn with_message_preview_len(mut self, len: usize) -> Self {
        self.message_preview_len = len;
        self
    }

    /// Process-wide hub, lazily constructed on first use. A second call
    /// returns the existing instance rather than erroring or duplicating
    /// state; the hub passed by later calls is discarded.
    pub fn init_global(hub: Hub) -> Arc<Hub> {
        GLOBAL_HUB.get_or_init(move || Arc::new(hub)).clone()
    }

    pub fn global() -> Option<Arc<Hub>> {
        GLOBAL_HUB.get().cloned()
    }

    /// Transition a connection from Unidentified to Identified: record it
    /// as the user's current connection and announce the user to everyone
    /// else. Replaces any prior connection for the same user.
    pub fn identify(&self, user_id: UserId, connection_id: &ConnectionId, sender: &UnboundedSender<Message>) {
        self.registry
            .register(user_id, connection_id.clone(), sender.clone());
        debug!(
            "user {user_id} identified on connection {}",
            connection_id.as_str()
        );
        self.broadcast_presence(EventType::UserOnline, user_id);
    }

    /// Transport-level disconnect. Announces `user:offline` only when this
    /// connection was still the user's current one; a stale id means the
    /// user already reconnected and nothing is announced.
    pub fn disconnect(&self, connection_id: &ConnectionId) {
        match self.registry.unregister(connection_id) {
            Some(user_id) => {
                debug!("user {user_id} disconnected");
                self.broadcast_presence(EventType::UserOffline, user_id);
            }
            None => debug!(
                "connection {} closed without a current registration",
                connection_id.as_str()
            ),
        }
    }

    /// Send `envelope` to the target's live connection if one exists.
    /// Unicast, never broadcast. Offline targets are a silent drop — there
    /// is no retry queue or store-and-forward.
    pub fn relay(&self, target: UserId, envelope: Envelope) -> RelayOutcome {
        let Some(sender) = self.registry.sender(target) else {
            debug!("relay drop: user {target} has no live connection");
            return RelayOutcome::Dropped;
        };

        let text = match serde_json::to_string(&envelope) {
            Ok(text) => text,
            Err(err) => {
                error!("failed to serialize envelope: {err}");
                return RelayOutcome::Dropped;
            }
        };

        if sender.send(Message::Text(text)).is_err() {
            // The writer task is gone; disconnect cleanup will follow.
            warn!("relay drop: connection for user {target} is closing");
            return RelayOutcome::Dropped;
        }

        RelayOutcome::Delivered
    }

    /// Send a system-wide announcement to every identified connection.
    pub fn broadcast_notification(&self, message: &str, kind: &str) {
        let envelope = Envelope::new(
            EventType::NotificationBroadcast,
            0,
            json!({ "message": message, "type": kind }),
        );
        self.broadcast_except(envelope, None);
    }

    /// Currently identified users, for presence endpoints and diagnostics.
    pub fn online_users(&self) -> Vec<UserId> {
        self.registry.list_online()
    }

    fn broadcast_presence(&self, event_type: EventType, user_id: UserId) {
        let envelope = Envelope::new(event_type, user_id, json!({ "userId": user_id }));
        self.broadcast_except(envelope, Some(user_id));
    }

    fn broadcast_except(&self, envelope: Envelope, skip: Option<UserId>) {
        let text = match serde_json::to_string(&envelope) {
            Ok(text) => text,
            Err(err) => {
                error!("failed to serialize broadcast envelope: {err}");
                return;
            }
        };

        for (user_id, sender) in self.registry.senders() {
            if Some(user_id) == skip {
                continue;
            }
            if sender.send(Message::Text(text.clone())).is_err() {
                warn!("broadcast skipped user {user_id}: connection is closing");
            }
        }
    }

    /// Dispatch one inbound text frame from a connection. Malformed frames
    /// are logged and ignored; they never crash the hub or drop unrelated
    /// connections.
    ///
    /// External lookups suspend this task; the registry is consulted only
    /// after the lookup resolves (inside `relay`), never cached across the
    /// await.
    pub async fn handle_inbound(
        &self,
        connection_id: &ConnectionId,
        sender: &UnboundedSender<Message>,
        text: &str,
    ) {
        let event = match ClientEvent::parse(text) {
            Ok(event) => event,
            Err(err) => {
                warn!(
                    "ignoring malformed frame on connection {}: {err}",
                    connection_id.as_str()
                );
                return;
            }
        };

        match event {
            ClientEvent::Identify(p) => self.identify(p.user_id, connection_id, sender),

            ClientEvent::NotificationSend(p) => {
                let notification = Notification::ephemeral(
                    p.user_id,
                    p.notification_type,
                    p.title,
                    p.message,
                    p.related_id,
                );
                self.relay_notification(notification);
            }

            ClientEvent::NotificationMarkRead(p) => {
                self.relay(
                    p.user_id,
                    Envelope::new(
                        EventType::NotificationRead,
                        p.user_id,
                        json!({ "notificationId": p.notification_id }),
                    ),
                );
            }

            ClientEvent::AchievementUnlocked(p) => {
                let title = self
                    .directory
                    .achievement_title(p.achievement_id)
                    .await
                    .unwrap_or_else(|| "a new achievement".to_string());
                let notification = Notification::ephemeral(
                    p.user_id,
                    NotificationType::Achievement,
                    "Achievement unlocked!",
                    format!("You earned {title}"),
                    Some(p.achievement_id),
                );
                self.relay_notification(notification);
            }

            ClientEvent::StreakUpdated(p) => {
                let notification = Notification::ephemeral(
                    p.user_id,
                    NotificationType::Streak,
                    "Streak updated",
                    format!("You're on a {}-day watch streak!", p.current_streak),
                    None,
                );
                self.relay_notification(notification);
            }

            ClientEvent::DirectMessage(p) => {
                let name = self
                    .directory
                    .display_name(p.sender_id)
                    .await
                    .unwrap_or_else(|| "Someone".to_string());
                let notification = Notification::ephemeral(
                    p.recipient_id,
                    NotificationType::Message,
                    format!("New message from {name}"),
                    truncate_preview(&p.message, self.message_preview_len),
                    Some(p.sender_id),
                );
                self.relay_notification(notification);
            }

            ClientEvent::FriendRequest(p) => {
                let name = self
                    .directory
                    .display_name(p.sender_id)
                    .await
                    .unwrap_or_else(|| "Someone".to_string());
                let notification = Notification::ephemeral(
                    p.recipient_id,
                    NotificationType::FriendRequest,
                    "New friend request",
                    format!("{name} sent you a friend request"),
                    Some(p.sender_id),
                );
                self.relay_notification(notification);
            }

            ClientEvent::Broadcast(p) => self.broadcast_notification(&p.message, &p.kind),

            ClientEvent::TypingStart(p) => {
                self.relay(
                    p.recipient_id,
                    Envelope::new(
                        EventType::TypingStart,
                        p.recipient_id,
                        json!({ "senderId": p.sender_id }),
                    ),
                );
            }

            ClientEvent::TypingEnd(p) => {
                self.relay(
                    p.recipient_id,
                    Envelope::new(
                        EventType::TypingEnd,
                        p.recipient_id,
                        json!({ "senderId": p.sender_id }),
                    ),
                );
            }
        }
    }

    fn relay_notification(&self, notification: Notification) {
        let target = notification.user_id;
        self.relay(
            target,
            Envelope::new(EventType::NotificationNew, target, json!(notification)),
        );
    }
}

fn truncate_preview(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        message.to_string()
    } else {
        let mut preview: String = message.chars().take(max_chars).collect();
        preview.push('…');
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::NullDirectory;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn hub() -> Hub {
        Hub::new(Arc::new(NullDirectory))
    }

    fn drain(rx: &mut UnboundedReceiver<Message>) -> Vec<Envelope> {
        let mut envelopes = Vec::new();
        while let Ok(Message::Text(text)) = rx.try_recv() {
            envelopes.push(serde_json::from_str(&text).unwrap());
        }
        envelopes
    }

    #[tokio::test]
    async fn relay_to_offline_user_is_a_silent_drop() {
        let hub = hub();
        let outcome = hub.relay(
            99,
            Envelope::new(EventType::NotificationNew, 99, json!({})),
        );
        assert_eq!(outcome, RelayOutcome::Dropped);
    }

    #[tokio::test]
    async fn identify_announces_online_to_others_only() {
        let hub = hub();
        let (tx_a, mut rx_a) = unbounded_channel();
        let (tx_b, mut rx_b) = unbounded_channel();

        hub.identify(1, &ConnectionId::new(), &tx_a);
        hub.identify(2, &ConnectionId::new(), &tx_b);

        // A saw B come online; B saw nobody (A was announced before B joined
        // to others, and nobody announces B to itself)
        let seen_by_a = drain(&mut rx_a);
        assert_eq!(seen_by_a.len(), 1);
        assert_eq!(seen_by_a[0].event_type, EventType::UserOnline);
        assert_eq!(seen_by_a[0].user_id, 2);
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn stale_disconnect_after_reconnect_stays_silent() {
        let hub = hub();
        let (tx_observer, mut rx_observer) = unbounded_channel();
        hub.identify(2, &ConnectionId::new(), &tx_observer);

        let old = ConnectionId::new();
        let new = ConnectionId::new();
        let (tx_old, _rx_old) = unbounded_channel();
        let (tx_new, _rx_new) = unbounded_channel();

        hub.identify(1, &old, &tx_old);
        // Fast reconnect lands before the old connection's disconnect handler
        hub.identify(1, &new, &tx_new);
        drain(&mut rx_observer);

        hub.disconnect(&old);
        assert!(
            drain(&mut rx_observer).is_empty(),
            "stale disconnect must not announce user:offline"
        );

        hub.disconnect(&new);
        let seen = drain(&mut rx_observer);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].event_type, EventType::UserOffline);
        assert_eq!(seen[0].user_id, 1);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_identified_connection() {
        let hub = hub();
        let (tx_a, mut rx_a) = unbounded_channel();
        let (tx_b, mut rx_b) = unbounded_channel();
        hub.identify(1, &ConnectionId::new(), &tx_a);
        hub.identify(2, &ConnectionId::new(), &tx_b);
        drain(&mut rx_a);
        drain(&mut rx_b);

        hub.broadcast_notification("maintenance at noon", "system");

        for rx in [&mut rx_a, &mut rx_b] {
            let seen = drain(rx);
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0].event_type, EventType::NotificationBroadcast);
            assert_eq!(seen[0].data["message"], "maintenance at noon");
        }
    }

    #[tokio::test]
    async fn inbound_notification_send_relays_to_target() {
        let hub = hub();
        let connection = ConnectionId::new();
        let (tx, mut rx) = unbounded_channel();
        hub.identify(5, &connection, &tx);

        let sender_conn = ConnectionId::new();
        let (sender_tx, _sender_rx) = unbounded_channel();
        hub.handle_inbound(
            &sender_conn,
            &sender_tx,
            r#"{"type":"notification:send","data":{"userId":5,"type":"comment","title":"New comment","message":"Rei commented on your review"}}"#,
        )
        .await;

        let seen = drain(&mut rx);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].event_type, EventType::NotificationNew);
        assert_eq!(seen[0].data["title"], "New comment");
        assert_eq!(seen[0].data["type"], "comment");
    }

    #[tokio::test]
    async fn malformed_inbound_frames_are_ignored() {
        let hub = hub();
        let connection = ConnectionId::new();
        let (tx, mut rx) = unbounded_channel();

        hub.handle_inbound(&connection, &tx, "{ not json").await;
        hub.handle_inbound(&connection, &tx, r#"{"type":"user:teleport","data":{}}"#)
            .await;

        assert!(drain(&mut rx).is_empty());
        assert!(hub.online_users().is_empty());
    }

    #[tokio::test]
    async fn direct_message_preview_is_truncated() {
        let hub = Hub::new(Arc::new(NullDirectory)).with_message_preview_len(10);
        let (tx, mut rx) = unbounded_channel();
        hub.identify(2, &ConnectionId::new(), &tx);

        let (sender_tx, _sender_rx) = unbounded_channel();
        hub.handle_inbound(
            &ConnectionId::new(),
            &sender_tx,
            r#"{"type":"message:new","data":{"senderId":1,"recipientId":2,"message":"0123456789ABCDEF"}}"#,
        )
        .await;

        let seen = drain(&mut rx);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].data["message"], "0123456789…");
    }

    #[test]
    fn double_initialization_returns_the_existing_hub() {
        let first = Hub::init_global(Hub::new(Arc::new(NullDirectory)));
        let second = Hub::init_global(Hub::new(Arc::new(NullDirectory)));
        assert!(Arc::ptr_eq(&first, &second));
    }
}
