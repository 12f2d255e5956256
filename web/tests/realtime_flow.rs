//! End-to-end flows over a real server, real WebSocket connections and
//! the client event bus.

use events::{Envelope, EventType, Notification, NotificationType};
use futures_util::StreamExt;
use service::config::Config;
use service::AppState;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use ws_client::{EventBus, ReconnectPolicy};

async fn spawn_app() -> (SocketAddr, AppState) {
    let state = AppState::with_isolated_hub(Config::with_defaults());
    let router = web::init_router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });

    (addr, state)
}

fn quick_reconnect() -> ReconnectPolicy {
    ReconnectPolicy {
        base_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(200),
        max_attempts: 3,
    }
}

async fn wait_online(state: &AppState, user_id: i64) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while !state.hub.online_users().contains(&user_id) {
        assert!(
            tokio::time::Instant::now() < deadline,
            "user {user_id} never identified"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Connect a bus for `user_id` and forward every `event_type` envelope
/// into a channel the test can await.
fn subscribed_bus(
    addr: SocketAddr,
    user_id: i64,
    event_type: EventType,
) -> (EventBus, mpsc::UnboundedReceiver<Envelope>) {
    let bus = EventBus::connect(&format!("ws://{addr}/ws"), user_id, quick_reconnect());
    let (tx, rx) = mpsc::unbounded_channel();
    bus.subscribe(event_type, move |envelope| {
        let _ = tx.send(envelope.clone());
    });
    (bus, rx)
}

#[tokio::test]
async fn delivered_notification_reaches_the_connected_user() {
    let (addr, state) = spawn_app().await;
    let (_bus, mut rx) = subscribed_bus(addr, 1, EventType::NotificationNew);
    wait_online(&state, 1).await;

    let notification = Notification::ephemeral(
        1,
        NotificationType::FriendRequest,
        "New friend request",
        "Mika sent you a friend request",
        Some(9),
    );
    state.gateway.deliver(1, &notification);

    let envelope = tokio::time::timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("timed out waiting for notification:new")
        .expect("subscriber channel closed");
    assert_eq!(envelope.event_type, EventType::NotificationNew);
    assert_eq!(envelope.data["title"], "New friend request");
    assert_eq!(envelope.data["message"], "Mika sent you a friend request");

    // Exactly one delivery: unicast, not broadcast
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn delivery_to_an_offline_user_is_invisible() {
    let (addr, state) = spawn_app().await;
    let (_bus, mut rx) = subscribed_bus(addr, 1, EventType::NotificationNew);
    wait_online(&state, 1).await;

    // User 2 never connects; nothing is raised and nobody observes it
    let notification =
        Notification::ephemeral(2, NotificationType::Comment, "New comment", "unseen", None);
    state.gateway.deliver(2, &notification);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn broadcast_reaches_identified_connections_only() {
    let (addr, state) = spawn_app().await;
    let (_bus_a, mut rx_a) = subscribed_bus(addr, 1, EventType::NotificationBroadcast);
    let (_bus_b, mut rx_b) = subscribed_bus(addr, 2, EventType::NotificationBroadcast);

    // A connection that never identifies must not receive the broadcast
    let (mut raw, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("raw websocket connect");

    wait_online(&state, 1).await;
    wait_online(&state, 2).await;

    state.hub.broadcast_notification("maintenance at noon", "system");

    for rx in [&mut rx_a, &mut rx_b] {
        let envelope = tokio::time::timeout(Duration::from_secs(3), rx.recv())
            .await
            .expect("timed out waiting for broadcast")
            .expect("subscriber channel closed");
        assert_eq!(envelope.data["message"], "maintenance at noon");
        assert_eq!(envelope.data["type"], "system");
    }

    assert!(
        tokio::time::timeout(Duration::from_millis(300), raw.next())
            .await
            .is_err(),
        "unidentified connection must stay silent"
    );
}

#[tokio::test]
async fn notify_endpoint_acknowledges_regardless_of_reachability() {
    let (addr, state) = spawn_app().await;
    let client = reqwest::Client::new();

    // Offline target: still a 200 acknowledgment
    let response = client
        .post(format!("http://{addr}/notify"))
        .json(&serde_json::json!({
            "userId": 42,
            "notification": {
                "type": "system",
                "title": "Welcome back",
                "message": "Your winter watchlist is ready"
            }
        }))
        .send()
        .await
        .expect("notify request");
    assert_eq!(response.status(), 200);

    // Online target: the same endpoint produces a live delivery
    let (_bus, mut rx) = subscribed_bus(addr, 7, EventType::NotificationNew);
    wait_online(&state, 7).await;

    let response = client
        .post(format!("http://{addr}/notify"))
        .json(&serde_json::json!({
            "userId": 7,
            "notification": {
                "id": 1234,
                "type": "rating",
                "title": "New rating",
                "message": "Rei rated Cowboy Bebop",
                "relatedId": 77
            }
        }))
        .send()
        .await
        .expect("notify request");
    assert_eq!(response.status(), 200);

    let envelope = tokio::time::timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("timed out waiting for notification:new")
        .expect("subscriber channel closed");
    assert_eq!(envelope.data["title"], "New rating");
    assert_eq!(envelope.data["id"], 1234);
    assert_eq!(envelope.data["relatedId"], 77);
}

#[tokio::test]
async fn presence_endpoint_lists_identified_users() {
    let (addr, state) = spawn_app().await;
    let (_bus, _rx) = subscribed_bus(addr, 5, EventType::UserOnline);
    wait_online(&state, 5).await;

    let body: serde_json::Value = reqwest::get(format!("http://{addr}/presence"))
        .await
        .expect("presence request")
        .json()
        .await
        .expect("presence body");

    assert_eq!(body["status_code"], 200);
    assert!(body["data"]
        .as_array()
        .expect("data array")
        .contains(&serde_json::json!(5)));
}

#[tokio::test]
async fn reconnecting_user_sees_events_again() {
    // Connection-level reconnect: the first connection is replaced by a
    // second one, the registry follows, and only the new socket receives.
    let (addr, state) = spawn_app().await;

    let (bus_old, mut rx_old) = subscribed_bus(addr, 3, EventType::NotificationNew);
    wait_online(&state, 3).await;
    let first_connection = state.hub.online_users();
    assert_eq!(first_connection, vec![3]);

    // Same user opens a fresh session (e.g. a page reload beat the old
    // socket's teardown); last registered wins
    let (_bus_new, mut rx_new) = subscribed_bus(addr, 3, EventType::NotificationNew);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let notification =
        Notification::ephemeral(3, NotificationType::Streak, "Streak updated", "5 days", None);
    state.gateway.deliver(3, &notification);

    let envelope = tokio::time::timeout(Duration::from_secs(3), rx_new.recv())
        .await
        .expect("timed out waiting on the new connection")
        .expect("subscriber channel closed");
    assert_eq!(envelope.data["title"], "Streak updated");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(
        rx_old.try_recv().is_err(),
        "superseded connection must not receive the relay"
    );
    drop(bus_old);
}
