//! Individual client connection handling

use anyhow::Result;
use std::fmt;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use widgetlink_shared::codec::{FrameDecoder, FrameEncoder};
use widgetlink_shared::Frame;

/// Server-wide unique id of an accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to queue frames for a specific connection
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    tx: mpsc::Sender<Frame>,
}

impl ChannelHandle {
    pub fn new(id: ConnectionId, addr: SocketAddr, tx: mpsc::Sender<Frame>) -> Self {
        Self { id, addr, tx }
    }

    /// Queue a frame without waiting. Returns false if the queue is full or the
    /// connection is gone; the frame is dropped in that case.
    pub fn try_send(&self, frame: impl Into<Frame>) -> bool {
        match self.tx.try_send(frame.into()) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                debug!("Outbound queue full for {} ({}), dropping frame {}", self.id, self.addr, frame.id());
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Connection {} ({}) already closed", self.id, self.addr);
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Read side of an accepted connection; the write side runs as its own task
pub struct Connection {
    pub handle: ChannelHandle,
    reader: OwnedReadHalf,
    decoder: FrameDecoder,
    read_buf: Vec<u8>,
}

impl Connection {
    /// Split the stream and spawn the writer task draining the outbound queue
    pub fn accept(stream: TcpStream, addr: SocketAddr, id: ConnectionId, queue_depth: usize) -> Self {
        let (reader, writer) = stream.into_split();
        let (tx, rx) = mpsc::channel(queue_depth.max(1));

        tokio::spawn(async move {
            if let Err(e) = write_loop(writer, rx).await {
                debug!("Writer for {} ({}) stopped: {}", id, addr, e);
            }
        });

        Self {
            handle: ChannelHandle::new(id, addr, tx),
            reader,
            decoder: FrameDecoder::new(),
            read_buf: vec![0u8; 4096],
        }
    }

    /// Read the next frame from this connection
    /// Returns None if the connection is closed or sent undecodable data
    pub async fn recv(&mut self) -> Option<Frame> {
        loop {
            match self.decoder.decode_next() {
                Ok(Some(frame)) => return Some(frame),
                Ok(None) => {}
                Err(e) => {
                    warn!("Decode error from {} ({}): {}", self.handle.id, self.handle.addr, e);
                    return None;
                }
            }

            match self.reader.read(&mut self.read_buf).await {
                Ok(0) => return None,
                Ok(n) => self.decoder.extend(&self.read_buf[..n]),
                Err(e) => {
                    debug!("Read error from {} ({}): {}", self.handle.id, self.handle.addr, e);
                    return None;
                }
            }
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.handle.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.handle.addr
    }
}

/// Encode queued frames and write them out, batching whatever is already queued
async fn write_loop(mut writer: OwnedWriteHalf, mut rx: mpsc::Receiver<Frame>) -> Result<()> {
    let mut encoder = FrameEncoder::new();

    while let Some(frame) = rx.recv().await {
        encode_or_skip(&mut encoder, &frame);
        while let Ok(frame) = rx.try_recv() {
            encode_or_skip(&mut encoder, &frame);
        }

        if !encoder.is_empty() {
            writer.write_all(&encoder.take()).await?;
        }
    }

    writer.shutdown().await?;
    Ok(())
}

fn encode_or_skip(encoder: &mut FrameEncoder, frame: &Frame) {
    if let Err(e) = encoder.encode(frame) {
        warn!("Dropping outbound frame {}: {}", frame.id(), e);
    }
}
