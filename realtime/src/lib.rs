//! Real-time presence and notification fan-out for Anitrack.
//!
//! This crate is the server half of the event bus: it tracks which users
//! are currently connected, routes targeted notifications to the right
//! connection, and reconciles the ephemeral in-memory registry with the
//! durable notification store owned by the CRUD side.
//!
//! # Architecture
//!
//! - **One connection per user**: the registry records a single current
//!   connection per user; reconnection replaces, never appends.
//! - **Dual-index registry**: O(1) lookups for routing (user → outbox) and
//!   for disconnect cleanup (connection → user) via separate DashMap
//!   indices.
//! - **Best-effort delivery**: offline users miss live events and see the
//!   durable record on their next poll; nothing is queued or retried.
//! - **Single hub per process**: lazily constructed on first use;
//!   initializing twice returns the existing instance.
//!
//! # Message flow
//!
//! 1. Frontend opens a WebSocket at `/ws` and sends `user:join`
//! 2. The hub registers the connection and broadcasts `user:online`
//! 3. When a mutation elsewhere creates a notification, the collaborator
//!    publishes a [`events::DomainEvent`] (or calls the
//!    [`gateway::DeliveryGateway`] directly)
//! 4. The hub performs an O(1) registry lookup and unicasts a
//!    `notification:new` envelope to the target's connection, if any
//! 5. The client event bus republishes it to subscribed UI components
//!
//! # Modules
//!
//! - `connection`: ConnectionRegistry with last-registered-wins semantics
//! - `hub`: the server event bus (per-connection state machine, relay,
//!   broadcast, inbound dispatch)
//! - `protocol`: inbound frame parsing and typed payloads
//! - `gateway`: the delivery gateway and the domain-event handler
//! - `directory`: lookup seam for names owned by the host application

pub mod connection;
pub mod directory;
pub mod gateway;
pub mod hub;
pub mod protocol;

pub use connection::{ConnectionId, ConnectionRegistry};
pub use directory::{Directory, NullDirectory};
pub use gateway::{DeliveryGateway, RelayEventHandler};
pub use hub::{Hub, RelayOutcome};
