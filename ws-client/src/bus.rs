use crate::backoff::Backoff;
use crate::subscribers::{Subscribers, Subscription};
use chrono::Utc;
use events::{Envelope, EventType, UserId};
use futures_util::{SinkExt, StreamExt};
use log::*;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Reconnection policy: delays double from `base_delay` up to
/// `max_delay`, with at most `max_attempts` attempts before the bus
/// stays disconnected for good (no infinite retry storm).
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    fn backoff(&self) -> Backoff {
        Backoff::new(self.base_delay, self.max_delay, self.max_attempts)
    }
}

type OutboundSlot = Arc<Mutex<Option<UnboundedSender<Message>>>>;

/// The client half of the event bus: one physical connection per session,
/// reconnection with bounded exponential backoff, and a stable
/// publish/subscribe surface for UI components over that flaky link.
///
/// Incoming envelopes are republished to subscribers from the driver
/// task's context; there is no concurrent handler invocation. Dropping
/// the bus cancels the driver and any pending reconnect loop.
pub struct EventBus {
    user_id: UserId,
    subscribers: Arc<Subscribers>,
    outbound: OutboundSlot,
    driver: tokio::task::JoinHandle<()>,
}

impl EventBus {
    /// Open the session's single physical connection and identify as
    /// `user_id` as soon as the transport reports connected. Must be
    /// called from within a tokio runtime.
    pub fn connect(url: &str, user_id: UserId, policy: ReconnectPolicy) -> Self {
        let subscribers = Arc::new(Subscribers::new());
        let outbound: OutboundSlot = Arc::new(Mutex::new(None));

        let driver = tokio::spawn(drive_connection(
            url.to_string(),
            user_id,
            policy,
            subscribers.clone(),
            outbound.clone(),
        ));

        Self {
            user_id,
            subscribers,
            outbound,
            driver,
        }
    }

    /// Register `handler` for `event_type`. Duplicate subscriptions are
    /// additive; the returned [`Subscription`] removes exactly this
    /// registration and is safe to call twice.
    pub fn subscribe(
        &self,
        event_type: EventType,
        handler: impl Fn(&Envelope) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribers.subscribe(event_type, handler)
    }

    /// Invoke every currently subscribed handler for the envelope's type
    /// without touching the network. Used by the driver for incoming
    /// frames and by components that synthesize local events.
    pub fn publish_locally(&self, envelope: &Envelope) {
        self.subscribers.dispatch(envelope);
    }

    /// Transmit an event frame immediately if the connection is open;
    /// otherwise log a warning and drop it (no outbound queue).
    ///
    /// `event_type` is the wire name of an inbound server event, e.g.
    /// `"friend:request"` or `"notification:send"`.
    pub fn send(&self, event_type: &str, data: Value) {
        let sender = self.outbound.lock().ok().and_then(|slot| slot.clone());
        let Some(sender) = sender else {
            warn!("not connected; dropping outbound {event_type} frame");
            return;
        };

        let frame = json!({
            "type": event_type,
            "userId": self.user_id,
            "data": data,
            "timestamp": Utc::now(),
        });

        if sender.send(Message::Text(frame.to_string())).is_err() {
            warn!("connection closing; dropped outbound {event_type} frame");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.outbound
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        // Unmounting the owning component cancels the reconnect loop
        self.driver.abort();
    }
}

/// Connection driver: connect, identify, pump frames both ways, and on
/// unexpected disconnect retry with the policy's backoff. Returns when
/// the attempt budget is exhausted; the bus then stays disconnected
/// until it is rebuilt.
async fn drive_connection(
    url: String,
    user_id: UserId,
    policy: ReconnectPolicy,
    subscribers: Arc<Subscribers>,
    outbound: OutboundSlot,
) {
    let mut backoff = policy.backoff();

    loop {
        match connect_async(url.as_str()).await {
            Ok((stream, _response)) => {
                debug!("connected to {url} as user {user_id}");
                // A successful connect restores the full retry budget
                backoff = policy.backoff();

                let (mut sink, mut stream) = stream.split();
                let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

                // Transport reports connected: identify immediately so the
                // server can register this connection.
                let identify = json!({
                    "type": "user:join",
                    "userId": user_id,
                    "data": { "userId": user_id },
                    "timestamp": Utc::now(),
                });
                let _ = tx.send(Message::Text(identify.to_string()));

                if let Ok(mut slot) = outbound.lock() {
                    *slot = Some(tx.clone());
                }

                loop {
                    tokio::select! {
                        incoming = stream.next() => match incoming {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<Envelope>(&text) {
                                    Ok(envelope) => subscribers.dispatch(&envelope),
                                    Err(err) => debug!("ignoring unparseable frame: {err}"),
                                }
                            }
                            Some(Ok(Message::Ping(payload))) => {
                                let _ = tx.send(Message::Pong(payload));
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("server closed the connection");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(err)) => {
                                warn!("transport error: {err}");
                                break;
                            }
                        },
                        outgoing = rx.recv() => match outgoing {
                            Some(message) => {
                                if sink.send(message).await.is_err() {
                                    warn!("send failed; reconnecting");
                                    break;
                                }
                            }
                            None => break,
                        },
                    }
                }

                if let Ok(mut slot) = outbound.lock() {
                    *slot = None;
                }
            }
            Err(err) => {
                warn!("connect to {url} failed: {err}");
            }
        }

        let Some(delay) = backoff.next() else {
            error!("reconnect attempts exhausted; staying disconnected");
            return;
        };
        debug!("reconnecting in {delay:?}");
        tokio::time::sleep(delay).await;
    }
}
