use async_trait::async_trait;
use events::UserId;

/// Read-only lookups answered by the host application. Users and
/// achievements live in the CRUD side's database; the hub consults this
/// seam when a socket event carries only a foreign id and the relayed
/// notification needs human-readable copy.
///
/// Implementations may suspend (database reads, caches). Callers must not
/// hold registry state across the await — the mapping may change while a
/// lookup is in flight.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn display_name(&self, user_id: UserId) -> Option<String>;
    async fn achievement_title(&self, achievement_id: i64) -> Option<String>;
}

/// Directory for deployments and tests with no host application attached;
/// every lookup misses and callers fall back to generic copy.
pub struct NullDirectory;

#[async_trait]
impl Directory for NullDirectory {
    async fn display_name(&self, _user_id: UserId) -> Option<String> {
        None
    }

    async fn achievement_title(&self, _achievement_id: i64) -> Option<String> {
        None
    }
}
