mod connection;
mod protocol;
mod transport;

use anyhow::{bail, Result};
use clap::Parser;
use connection::{ConnectionConfig, ConnectionEvent, ConnectionManager};
use protocol::RequestTracker;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use transport::TcpConnector;
use widgetlink_shared::{limits, now_ms, parse_pin, Message};

/// Simulated hardware device that changes widget properties on a WidgetLink server
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Hardware port of the server
    #[arg(short, long, default_value = "127.0.0.1:8442")]
    server: String,

    /// Device token
    #[arg(short, long)]
    token: String,

    /// Change a widget property: PIN PROPERTY VALUE (repeatable)
    #[arg(long = "set", num_args = 3, value_names = ["PIN", "PROPERTY", "VALUE"], action = clap::ArgAction::Append)]
    set: Vec<String>,

    /// Seconds between keep-alive pings
    #[arg(long, default_value_t = limits::PING_INTERVAL_MS / 1000)]
    ping_interval: u64,

    /// Keep the connection open after all commands are answered
    #[arg(long)]
    stay: bool,
}

/// One `--set` triple
#[derive(Debug, Clone)]
struct PropertyChange {
    pin: u8,
    property: String,
    value: String,
}

impl PropertyChange {
    fn from_args(values: &[String]) -> Result<Vec<Self>> {
        values
            .chunks(3)
            .map(|chunk| match chunk {
                [pin, property, value] => Ok(Self {
                    pin: parse_pin(pin)?,
                    property: property.clone(),
                    value: value.clone(),
                }),
                _ => bail!("--set takes PIN PROPERTY VALUE"),
            })
            .collect()
    }

    fn describe(&self) -> String {
        format!("v{} {}={}", self.pin, self.property, self.value)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    let changes = PropertyChange::from_args(&args.set)?;

    let config = ConnectionConfig {
        token: args.token.clone(),
        ping_interval: Duration::from_secs(args.ping_interval.max(1)),
        ..Default::default()
    };

    info!("Device starting, server {}", args.server);
    let mut conn = ConnectionManager::new(config, TcpConnector::new(args.server.clone()));
    let ids = conn.ids();
    let mut tracker = RequestTracker::new(limits::ACK_TIMEOUT_MS);
    let mut sent = false;
    let mut expiry = tokio::time::interval(Duration::from_millis(limits::ACK_TIMEOUT_MS / 2));

    loop {
        tokio::select! {
            event = conn.recv() => match event {
                Some(ConnectionEvent::Connected { peer }) => info!("Connected to {}", peer),
                Some(ConnectionEvent::LoggedIn) => {
                    info!("Logged in");
                    if !sent {
                        for change in &changes {
                            let id = ids.next();
                            tracker.track(id, change.describe(), now_ms());
                            conn.send(Message::set_widget_property(id, change.pin, &change.property, &change.value))
                                .await?;
                        }
                        sent = true;
                    }
                }
                Some(ConnectionEvent::LoginRejected(code)) => {
                    error!("Login rejected: {}", code);
                    bail!("login rejected: {code}");
                }
                Some(ConnectionEvent::Disconnected { reason }) => warn!("Disconnected: {}", reason),
                Some(ConnectionEvent::ConnectionFailed { reason }) => warn!("Connection failed: {}", reason),
                Some(ConnectionEvent::Response(response)) => match tracker.resolve(&response) {
                    Some(request) if response.is_ok() => info!("{} accepted", request.description),
                    Some(request) => warn!("{} refused: {}", request.description, response.code),
                    None => debug!("Response {} for unknown request", response.id),
                },
                Some(ConnectionEvent::Received(message)) => {
                    debug!("Server sent {} id={} body={:?}", message.command, message.id, message.body);
                }
                None => {
                    error!("Connection manager closed");
                    break;
                }
            },

            _ = expiry.tick() => {
                for request in tracker.expire(now_ms()) {
                    warn!("{} got no response within {}ms", request.description, limits::ACK_TIMEOUT_MS);
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }

        if sent && tracker.is_empty() && !changes.is_empty() && !args.stay {
            info!("All commands answered");
            break;
        }
    }

    Ok(())
}
