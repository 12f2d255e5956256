use anyhow::Result;
use clap::Parser;
use colored::*;
use events::EventType;
use serde_json::json;
use std::time::Duration;
use ws_client::{EventBus, ReconnectPolicy, Subscription};

#[derive(Parser)]
#[command(name = "ws-client")]
#[command(about = "Realtime WebSocket Testing Tool")]
struct Cli {
    /// WebSocket URL of the backend
    #[arg(long, default_value = "ws://localhost:4000/ws")]
    url: String,

    /// User id to identify as
    #[arg(long)]
    user_id: i64,

    /// Send a friend request to this user id after connecting
    #[arg(long)]
    friend_request: Option<i64>,

    /// Send a direct message "user_id -> recipient" after connecting
    /// (format: recipient_id:text)
    #[arg(long)]
    message: Option<String>,

    /// Send a system-wide announcement after connecting
    #[arg(long)]
    announce: Option<String>,

    /// Seconds to stay connected and print incoming events
    #[arg(long, default_value_t = 30)]
    listen_secs: u64,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

const WATCHED_EVENTS: [EventType; 7] = [
    EventType::NotificationNew,
    EventType::NotificationRead,
    EventType::NotificationBroadcast,
    EventType::UserOnline,
    EventType::UserOffline,
    EventType::TypingStart,
    EventType::TypingEnd,
];

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    println!("{}", "=== ANITRACK REALTIME CLIENT ===".bright_white().bold());
    println!(
        "{} Connecting to {} as user {}...",
        "→".blue(),
        cli.url,
        cli.user_id
    );

    let bus = EventBus::connect(&cli.url, cli.user_id, ReconnectPolicy::default());

    let _subscriptions: Vec<Subscription> = WATCHED_EVENTS
        .into_iter()
        .map(|event_type| {
            bus.subscribe(event_type, move |envelope| {
                println!(
                    "{} {} {}",
                    "✓".green(),
                    envelope.event_type.to_string().bright_cyan(),
                    envelope.data
                );
            })
        })
        .collect();

    // Give the transport a beat to finish the identification handshake
    tokio::time::sleep(Duration::from_millis(300)).await;

    if let Some(recipient) = cli.friend_request {
        println!(
            "{} Sending friend request to user {recipient}...",
            "→".blue()
        );
        bus.send(
            "friend:request",
            json!({ "senderId": cli.user_id, "recipientId": recipient }),
        );
    }

    if let Some(message) = &cli.message {
        match message.split_once(':') {
            Some((recipient, text)) => {
                let recipient: i64 = recipient.trim().parse()?;
                println!("{} Messaging user {recipient}...", "→".blue());
                bus.send(
                    "message:new",
                    json!({
                        "senderId": cli.user_id,
                        "recipientId": recipient,
                        "message": text,
                    }),
                );
            }
            None => anyhow::bail!("--message expects recipient_id:text"),
        }
    }

    if let Some(announcement) = &cli.announce {
        println!("{} Broadcasting announcement...", "→".blue());
        bus.send(
            "broadcast:notification",
            json!({ "message": announcement, "type": "system" }),
        );
    }

    println!(
        "{} Listening for {}s (Ctrl-C to quit early)...",
        "→".blue(),
        cli.listen_secs
    );
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(cli.listen_secs)) => {}
        _ = tokio::signal::ctrl_c() => {
            println!("\n{} Interrupted", "✗".red());
        }
    }

    println!("{}", "Done.".bright_white());
    Ok(())
}
