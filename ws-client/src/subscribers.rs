use events::{Envelope, EventType};
use log::*;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

type Handler = Arc<dyn Fn(&Envelope) + Send + Sync>;

/// Handler registry behind the event bus's publish/subscribe surface.
///
/// Duplicate subscriptions are additive: the same closure subscribed
/// twice is invoked twice and owns two independent tokens. Dispatch
/// iterates over a snapshot, so handlers may subscribe and unsubscribe
/// re-entrantly without invalidating the iteration.
pub struct Subscribers {
    handlers: Mutex<HashMap<EventType, Vec<(u64, Handler)>>>,
    next_token: AtomicU64,
}

impl Subscribers {
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Register `handler` for `event_type`. Multiple handlers per type are
    /// allowed so independent UI components can observe the same event
    /// without interfering with each other.
    pub fn subscribe(
        self: &Arc<Self>,
        event_type: EventType,
        handler: impl Fn(&Envelope) + Send + Sync + 'static,
    ) -> Subscription {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut handlers) = self.handlers.lock() {
            handlers
                .entry(event_type)
                .or_default()
                .push((token, Arc::new(handler)));
        }

        Subscription {
            registry: Arc::downgrade(self),
            event_type,
            token,
        }
    }

    fn unsubscribe(&self, event_type: EventType, token: u64) {
        if let Ok(mut handlers) = self.handlers.lock() {
            let now_empty = match handlers.get_mut(&event_type) {
                Some(entries) => {
                    entries.retain(|(id, _)| *id != token);
                    entries.is_empty()
                }
                None => false,
            };
            if now_empty {
                handlers.remove(&event_type);
            }
        }
    }

    /// Invoke every handler currently subscribed for the envelope's type,
    /// in no defined order. A panicking handler is caught and logged so
    /// one faulty subscriber cannot block the others.
    pub fn dispatch(&self, envelope: &Envelope) {
        let snapshot: Vec<Handler> = match self.handlers.lock() {
            Ok(handlers) => handlers
                .get(&envelope.event_type)
                .map(|entries| entries.iter().map(|(_, h)| h.clone()).collect())
                .unwrap_or_default(),
            Err(_) => return,
        };

        for handler in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(envelope))).is_err() {
                error!(
                    "subscriber for {} panicked; continuing with remaining handlers",
                    envelope.event_type
                );
            }
        }
    }

    #[cfg(test)]
    fn handler_count(&self, event_type: EventType) -> usize {
        self.handlers
            .lock()
            .map(|handlers| handlers.get(&event_type).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl Default for Subscribers {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases exactly one registration. Idempotent: a second call is a
/// no-op, and unsubscribing never removes a different handler. Dropping
/// a Subscription without calling `unsubscribe` leaves the handler
/// active for the lifetime of the bus.
pub struct Subscription {
    registry: Weak<Subscribers>,
    event_type: EventType,
    token: u64,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.event_type, self.token);
        }
    }
}
