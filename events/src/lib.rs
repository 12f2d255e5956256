//! Event system infrastructure for the Anitrack realtime core.
//!
//! This crate defines the wire-level vocabulary shared by the server hub,
//! the delivery gateway and the client event bus, plus the domain-event
//! seam that keeps CRUD collaborators decoupled from the realtime layer.
//!
//! # Architecture
//!
//! - **EventType / Envelope**: the closed enumeration of realtime event
//!   names and the wire unit that carries them
//! - **Notification**: the in-memory relay copy of a durable notification
//!   record (owned elsewhere, never mutated here)
//! - **DomainEvent**: business-level facts published by collaborators
//! - **EventHandler / EventPublisher**: trait + fan-out for domain events
//!
//! This crate has no dependencies on internal crates, avoiding circular
//! dependencies. Entity data is carried as serialized JSON values.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Stable user identity, owned by the upstream authentication system.
pub type UserId = i64;

/// Closed enumeration of realtime event names.
///
/// The variant determines the shape callers may assume for an envelope's
/// `data` payload; the envelope itself imposes no cross-field constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "message:new")]
    MessageNew,
    #[serde(rename = "message:read")]
    MessageRead,
    #[serde(rename = "notification:new")]
    NotificationNew,
    #[serde(rename = "notification:read")]
    NotificationRead,
    #[serde(rename = "notification:broadcast")]
    NotificationBroadcast,
    #[serde(rename = "achievement:unlocked")]
    AchievementUnlocked,
    #[serde(rename = "streak:updated")]
    StreakUpdated,
    #[serde(rename = "user:online")]
    UserOnline,
    #[serde(rename = "user:offline")]
    UserOffline,
    #[serde(rename = "typing:start")]
    TypingStart,
    #[serde(rename = "typing:end")]
    TypingEnd,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::MessageNew => "message:new",
            EventType::MessageRead => "message:read",
            EventType::NotificationNew => "notification:new",
            EventType::NotificationRead => "notification:read",
            EventType::NotificationBroadcast => "notification:broadcast",
            EventType::AchievementUnlocked => "achievement:unlocked",
            EventType::StreakUpdated => "streak:updated",
            EventType::UserOnline => "user:online",
            EventType::UserOffline => "user:offline",
            EventType::TypingStart => "typing:start",
            EventType::TypingEnd => "typing:end",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kinds of notifications the social layer produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    FriendRequest,
    FriendAccepted,
    Comment,
    Rating,
    Recommendation,
    System,
    Achievement,
    Streak,
    Message,
}

/// In-memory copy of a durable notification record, relayed for immediate
/// display. The durable record is written by an external collaborator
/// before or independently of the relay; this copy is never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Durable record id, when the collaborator has one. Zero for
    /// notifications synthesized purely for live display.
    #[serde(default)]
    pub id: i64,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_id: Option<i64>,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Build a relay-only notification (no durable id yet).
    pub fn ephemeral(
        user_id: UserId,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        related_id: Option<i64>,
    ) -> Self {
        Self {
            id: 0,
            user_id,
            notification_type,
            title: title.into(),
            message: message.into(),
            related_id,
            read: false,
            created_at: Utc::now(),
        }
    }
}

/// The wire unit exchanged between client and server and between
/// subsystems. Envelopes are constructed, transmitted and discarded;
/// none are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Subject of the event.
    pub user_id: UserId,
    /// Payload whose shape is determined by `event_type`.
    #[serde(default)]
    pub data: Value,
    /// Assigned at emission time by the emitting side (RFC3339).
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    pub fn new(event_type: EventType, user_id: UserId, data: Value) -> Self {
        Self {
            event_type,
            user_id,
            data,
            timestamp: Utc::now(),
        }
    }
}

/// Domain events that represent business-level changes in the system.
/// Collaborators (route handlers, achievement/streak rules) publish these
/// when their durable writes complete; the realtime layer turns them into
/// live deliveries without the collaborator knowing how.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// A notification record was written for a user.
    NotificationCreated {
        user_id: UserId,
        notification: Value,
    },
    /// A user marked one of their notifications as read; their other open
    /// sessions should clear the unread marker.
    NotificationRead {
        user_id: UserId,
        notification_id: i64,
    },
    /// An achievement was granted to a user.
    AchievementUnlocked {
        user_id: UserId,
        achievement_id: i64,
        title: String,
    },
    /// A user's watch streak counter changed.
    StreakUpdated {
        user_id: UserId,
        current_streak: u32,
    },
}

/// Trait for handling domain events.
/// Implementations can perform side effects like sending notifications,
/// updating caches, logging, etc.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone, Default)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Publish an event to all registered handlers.
    pub async fn publish(&self, event: DomainEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}
