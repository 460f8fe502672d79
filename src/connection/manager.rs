//! Connection manager with persistent connections and automatic reconnection

use crate::protocol::MessageIds;
use crate::transport::{TransportConnector, TransportStream};
use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, warn};
use widgetlink_shared::codec::{FrameDecoder, FrameEncoder};
use widgetlink_shared::{limits, Frame, Message, Response, ResponseCode};

/// Events emitted by the connection manager
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Transport connected, login sent
    Connected { peer: String },
    /// Server accepted the device token
    LoggedIn,
    /// Server refused the device token; the manager stops
    LoginRejected(ResponseCode),
    /// Connection lost; a reconnect follows
    Disconnected { reason: String },
    /// Response to a request sent through [`ConnectionManager::send`]
    Response(Response),
    /// Message pushed by the server
    Received(Message),
    /// Connect attempt failed; a retry follows
    ConnectionFailed { reason: String },
}

/// Configuration for connection manager
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Device token sent with LOGIN
    pub token: String,
    /// Reconnection delay (initial)
    pub reconnect_delay: Duration,
    /// Maximum reconnection delay
    pub max_reconnect_delay: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Keep-alive ping interval
    pub ping_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            ping_interval: Duration::from_millis(limits::PING_INTERVAL_MS),
        }
    }
}

/// Manages a persistent, logged-in connection to the server
pub struct ConnectionManager {
    ids: Arc<MessageIds>,
    /// Channel to send messages to the server once logged in
    outbound_tx: mpsc::Sender<Message>,
    /// Channel to receive connection events
    event_rx: mpsc::Receiver<ConnectionEvent>,
}

impl ConnectionManager {
    /// Create a new connection manager and start the connection loop
    pub fn new<C: TransportConnector>(config: ConnectionConfig, connector: C) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel::<Message>(limits::OUTBOUND_QUEUE_DEPTH);
        let (event_tx, event_rx) = mpsc::channel::<ConnectionEvent>(100);
        let ids = Arc::new(MessageIds::new());

        let loop_ids = Arc::clone(&ids);
        tokio::spawn(async move {
            connection_loop(config, connector, loop_ids, outbound_rx, event_tx).await;
        });

        Self {
            ids,
            outbound_tx,
            event_rx,
        }
    }

    /// Message id allocator shared with the connection loop
    pub fn ids(&self) -> Arc<MessageIds> {
        Arc::clone(&self.ids)
    }

    /// Queue a message; it is written once the connection is logged in
    pub async fn send(&self, message: Message) -> Result<()> {
        self.outbound_tx
            .send(message)
            .await
            .map_err(|_| anyhow!("Connection closed"))
    }

    /// Receive the next connection event
    pub async fn recv(&mut self) -> Option<ConnectionEvent> {
        self.event_rx.recv().await
    }
}

/// Why a connection ended
enum Ended {
    /// Retry after backoff
    Lost(anyhow::Error),
    /// Do not retry
    Rejected(ResponseCode),
    /// The manager was dropped
    Shutdown,
}

/// Main connection loop with reconnection logic
async fn connection_loop<C: TransportConnector>(
    config: ConnectionConfig,
    connector: C,
    ids: Arc<MessageIds>,
    mut outbound_rx: mpsc::Receiver<Message>,
    event_tx: mpsc::Sender<ConnectionEvent>,
) {
    let mut reconnect_delay = config.reconnect_delay;

    loop {
        match timeout(config.connect_timeout, connector.connect()).await {
            Ok(Ok(stream)) => {
                reconnect_delay = config.reconnect_delay;

                let _ = event_tx
                    .send(ConnectionEvent::Connected {
                        peer: connector.describe(),
                    })
                    .await;

                match handle_connection(stream, &config, &ids, &mut outbound_rx, &event_tx).await {
                    Ended::Lost(reason) => {
                        let _ = event_tx
                            .send(ConnectionEvent::Disconnected {
                                reason: reason.to_string(),
                            })
                            .await;
                    }
                    Ended::Rejected(code) => {
                        let _ = event_tx.send(ConnectionEvent::LoginRejected(code)).await;
                        return;
                    }
                    Ended::Shutdown => return,
                }
            }
            Ok(Err(e)) => {
                let _ = event_tx
                    .send(ConnectionEvent::ConnectionFailed {
                        reason: format!("{}: {}", connector.describe(), e),
                    })
                    .await;
            }
            Err(_) => {
                let _ = event_tx
                    .send(ConnectionEvent::ConnectionFailed {
                        reason: format!("{}: connect timed out", connector.describe()),
                    })
                    .await;
            }
        }

        if event_tx.is_closed() {
            return;
        }

        tokio::time::sleep(reconnect_delay).await;

        // Exponential backoff
        reconnect_delay = std::cmp::min(reconnect_delay * 2, config.max_reconnect_delay);
    }
}

/// Drive one connection: log in, then stream frames both ways
async fn handle_connection<S: TransportStream>(
    mut stream: S,
    config: &ConnectionConfig,
    ids: &MessageIds,
    outbound_rx: &mut mpsc::Receiver<Message>,
    event_tx: &mpsc::Sender<ConnectionEvent>,
) -> Ended {
    let result = run_connection(&mut stream, config, ids, outbound_rx, event_tx).await;
    if let Err(e) = stream.shutdown().await {
        debug!("Transport shutdown failed: {}", e);
    }
    result
}

async fn run_connection<S: TransportStream>(
    stream: &mut S,
    config: &ConnectionConfig,
    ids: &MessageIds,
    outbound_rx: &mut mpsc::Receiver<Message>,
    event_tx: &mpsc::Sender<ConnectionEvent>,
) -> Ended {
    let mut encoder = FrameEncoder::new();
    let mut decoder = FrameDecoder::new();
    let mut read_buf = vec![0u8; 4096];

    let login_id = ids.next();
    if let Err(e) = write_frame(stream, &mut encoder, Message::login(login_id, config.token.clone()).into()).await {
        return Ended::Lost(e);
    }

    let mut logged_in = false;
    let mut ping_ids: Vec<u16> = Vec::new();
    let mut ping_interval = interval(config.ping_interval);
    ping_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ping_interval.tick().await;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                let id = ids.next();
                ping_ids.push(id);
                if let Err(e) = write_frame(stream, &mut encoder, Message::ping(id).into()).await {
                    return Ended::Lost(e);
                }
            }

            outbound = outbound_rx.recv(), if logged_in => {
                let Some(message) = outbound else {
                    return Ended::Shutdown;
                };
                if let Err(e) = write_frame(stream, &mut encoder, message.into()).await {
                    return Ended::Lost(e);
                }
            }

            result = stream.read(&mut read_buf) => {
                let n = match result {
                    Ok(0) => return Ended::Lost(anyhow!("Server closed connection")),
                    Ok(n) => n,
                    Err(e) => return Ended::Lost(anyhow!("Read error: {}", e)),
                };
                decoder.extend(&read_buf[..n]);

                loop {
                    let frame = match decoder.decode_next() {
                        Ok(Some(frame)) => frame,
                        Ok(None) => break,
                        Err(e) => return Ended::Lost(anyhow!("Decode error: {}", e)),
                    };

                    let event = match frame {
                        Frame::Response(response) if response.id == login_id && !logged_in => {
                            if !response.is_ok() {
                                return Ended::Rejected(response.code);
                            }
                            logged_in = true;
                            ConnectionEvent::LoggedIn
                        }
                        Frame::Response(response) if ping_ids.contains(&response.id) => {
                            ping_ids.retain(|id| *id != response.id);
                            if !response.is_ok() {
                                warn!("Ping {} answered with {}", response.id, response.code);
                            }
                            continue;
                        }
                        Frame::Response(response) => ConnectionEvent::Response(response),
                        Frame::Message(message) => ConnectionEvent::Received(message),
                    };

                    if event_tx.send(event).await.is_err() {
                        return Ended::Shutdown;
                    }
                }
            }
        }
    }
}

async fn write_frame<S: TransportStream>(stream: &mut S, encoder: &mut FrameEncoder, frame: Frame) -> Result<()> {
    encoder.encode(&frame)?;
    stream.write_all(&encoder.take()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::io::DuplexStream;
    use widgetlink_shared::{codec, Command};

    #[async_trait]
    impl TransportStream for DuplexStream {
        async fn shutdown(&mut self) -> Result<()> {
            AsyncWriteExt::shutdown(self).await?;
            Ok(())
        }
    }

    /// Hands out prepared in-memory streams, one per connect
    struct DuplexConnector {
        streams: Mutex<Vec<DuplexStream>>,
    }

    #[async_trait]
    impl TransportConnector for DuplexConnector {
        type Stream = DuplexStream;

        async fn connect(&self) -> Result<DuplexStream> {
            self.streams
                .lock()
                .map_err(|_| anyhow!("poisoned"))?
                .pop()
                .ok_or_else(|| anyhow!("no more streams"))
        }

        fn describe(&self) -> String {
            "duplex".into()
        }
    }

    /// Server end of a duplex pair
    struct FakeServer {
        stream: DuplexStream,
        decoder: FrameDecoder,
    }

    impl FakeServer {
        async fn next_message(&mut self) -> Message {
            let mut buf = [0u8; 512];
            loop {
                if let Some(Frame::Message(message)) = self.decoder.decode_next().expect("decode") {
                    return message;
                }
                let n = self.stream.read(&mut buf).await.expect("read");
                assert!(n > 0, "client closed");
                self.decoder.extend(&buf[..n]);
            }
        }

        async fn reply(&mut self, response: Response) {
            let bytes = codec::encode(&Frame::Response(response)).expect("encode");
            self.stream.write_all(&bytes).await.expect("write");
        }
    }

    fn manager() -> (ConnectionManager, FakeServer) {
        let (client, server) = tokio::io::duplex(4096);
        let connector = DuplexConnector {
            streams: Mutex::new(vec![client]),
        };
        let config = ConnectionConfig {
            token: "tok".into(),
            ping_interval: Duration::from_secs(3600),
            ..Default::default()
        };
        (
            ConnectionManager::new(config, connector),
            FakeServer {
                stream: server,
                decoder: FrameDecoder::new(),
            },
        )
    }

    #[tokio::test]
    async fn test_login_then_send() {
        let (mut manager, mut server) = manager();

        assert!(matches!(manager.recv().await, Some(ConnectionEvent::Connected { .. })));

        let login = server.next_message().await;
        assert_eq!(login.command, Command::Login);
        assert_eq!(login.body, "tok");

        // Queued before login completes; must not be written until then
        let id = manager.ids().next();
        manager
            .send(Message::set_widget_property(id, 5, "color", "#FF0000"))
            .await
            .expect("send");

        server.reply(Response::ok(login.id)).await;
        assert_eq!(manager.recv().await, Some(ConnectionEvent::LoggedIn));

        let set = server.next_message().await;
        assert_eq!(set.command, Command::SetWidgetProperty);
        assert_eq!(set.id, id);

        server.reply(Response::illegal_command_body(id)).await;
        assert_eq!(
            manager.recv().await,
            Some(ConnectionEvent::Response(Response::illegal_command_body(id)))
        );
    }

    #[tokio::test]
    async fn test_rejected_login_stops_manager() {
        let (mut manager, mut server) = manager();
        assert!(matches!(manager.recv().await, Some(ConnectionEvent::Connected { .. })));

        let login = server.next_message().await;
        server.reply(Response::new(login.id, ResponseCode::InvalidToken)).await;

        assert_eq!(
            manager.recv().await,
            Some(ConnectionEvent::LoginRejected(ResponseCode::InvalidToken))
        );
        assert_eq!(manager.recv().await, None);
    }
}
