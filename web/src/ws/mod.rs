//! WebSocket HTTP handler for the web layer.
//!
//! This module contains only the Axum handler for the `/ws` upgrade.
//! The core realtime infrastructure (Hub, ConnectionRegistry, protocol)
//! lives in the `realtime` crate to avoid circular dependencies.

pub mod handler;
