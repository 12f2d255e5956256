use axum::extract::ws::Message;
use dashmap::DashMap;
use events::UserId;
use tokio::sync::mpsc::UnboundedSender;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// A user's current live connection: its id plus the outbox feeding the
/// connection's writer task.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub connection_id: ConnectionId,
    pub sender: UnboundedSender<Message>,
}

/// Single source of truth for "is user U currently reachable, and through
/// which connection".
///
/// At most one connection is recorded per user: `register` overwrites
/// unconditionally (last-registered wins), and `unregister` removes a
/// mapping only while it is still the current one. A late `unregister`
/// from a superseded connection is therefore a silent no-op, which closes
/// the fast-reconnect race deterministically.
///
/// Presence is an ephemeral fact: nothing here is durable, none of these
/// operations fail, and a process restart losing all state is acceptable.
pub struct ConnectionRegistry {
    /// Current connection per user - O(1) routing lookups
    users: DashMap<UserId, ConnectionHandle>,

    /// Reverse index for O(1) disconnect cleanup
    index: DashMap<ConnectionId, UserId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            index: DashMap::new(),
        }
    }

    /// Record `connection_id` as the user's current connection,
    /// unconditionally replacing any prior mapping.
    pub fn register(&self, user_id: UserId, connection_id: ConnectionId, sender: UnboundedSender<Message>) {
        // A connection that re-identifies moves wholesale to the new user.
        if let Some((_, old_user)) = self.index.remove(&connection_id) {
            if old_user != user_id {
                self.users
                    .remove_if(&old_user, |_, handle| handle.connection_id == connection_id);
            }
        }

        if let Some(previous) = self.users.insert(
            user_id,
            ConnectionHandle {
                connection_id: connection_id.clone(),
                sender,
            },
        ) {
            // The superseded connection loses its index entry so its own
            // (possibly still pending) disconnect cannot touch the new
            // mapping.
            if previous.connection_id != connection_id {
                self.index.remove(&previous.connection_id);
            }
        }

        self.index.insert(connection_id, user_id);
    }

    /// Remove the mapping owned by `connection_id`, returning the user it
    /// carried if it was still that user's current connection. Stale and
    /// unknown ids return `None`. Idempotent.
    pub fn unregister(&self, connection_id: &ConnectionId) -> Option<UserId> {
        let (_, user_id) = self.index.remove(connection_id)?;
        self.users
            .remove_if(&user_id, |_, handle| handle.connection_id == *connection_id)?;
        Some(user_id)
    }

    pub fn lookup(&self, user_id: UserId) -> Option<ConnectionId> {
        self.users
            .get(&user_id)
            .map(|handle| handle.connection_id.clone())
    }

    /// Outbox of the user's current connection, if any.
    pub fn sender(&self, user_id: UserId) -> Option<UnboundedSender<Message>> {
        self.users.get(&user_id).map(|handle| handle.sender.clone())
    }

    /// Currently identified users, in no particular order. Used for
    /// presence broadcasts and diagnostics.
    pub fn list_online(&self) -> Vec<UserId> {
        self.users.iter().map(|entry| *entry.key()).collect()
    }

    /// Snapshot of every identified connection's outbox for broadcasts.
    pub fn senders(&self) -> Vec<(UserId, UnboundedSender<Message>)> {
        self.users
            .iter()
            .map(|entry| (*entry.key(), entry.value().sender.clone()))
            .collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
