//! Client event bus for the Anitrack realtime core.
//!
//! Gives UI components a stable publish/subscribe surface over one flaky
//! physical connection. The transport (a raw WebSocket driven by
//! `tokio-tungstenite`) is an internal detail behind [`EventBus`]:
//! components subscribe to typed [`events::EventType`]s and never see
//! connects, disconnects or the reconnect backoff.
//!
//! - **One connection per session**, identified in-band on connect
//! - **Bounded reconnection**: exponential backoff, capped delay, capped
//!   attempts; after exhaustion the bus stays disconnected until rebuilt
//! - **Additive subscriptions** with precise, idempotent unsubscribe
//! - **Isolated handlers**: a panicking subscriber is caught and logged,
//!   never blocking the others
//!
//! The `ws-client` binary wraps this library in an interactive testing
//! tool against a running server.

pub mod backoff;
pub mod bus;
pub mod subscribers;

pub use backoff::Backoff;
pub use bus::{EventBus, ReconnectPolicy};
pub use subscribers::{Subscribers, Subscription};
