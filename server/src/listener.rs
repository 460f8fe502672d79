//! TCP accept loops for hardware and app clients

use crate::command::{CommandDispatcher, ConnectionState, Role};
use crate::session::{Connection, ConnectionId};
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use widgetlink_shared::Frame;

/// Accepts connections of one role and serves each on its own task
pub struct Listener {
    listener: TcpListener,
    role: Role,
    dispatcher: Arc<CommandDispatcher>,
    connection_ids: Arc<AtomicU64>,
    queue_depth: usize,
}

impl Listener {
    pub async fn bind(
        addr: &str,
        role: Role,
        dispatcher: Arc<CommandDispatcher>,
        connection_ids: Arc<AtomicU64>,
        queue_depth: usize,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("{} server listening on {}", role, listener.local_addr()?);
        Ok(Self {
            listener,
            role,
            dispatcher,
            connection_ids,
            queue_depth,
        })
    }

    #[cfg(test)]
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the listener fails
    pub async fn run(self) -> Result<()> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let id = ConnectionId(self.connection_ids.fetch_add(1, Ordering::Relaxed) + 1);
            info!("{} connection {} from {}", self.role, id, addr);

            let role = self.role;
            let dispatcher = Arc::clone(&self.dispatcher);
            let queue_depth = self.queue_depth;
            tokio::spawn(async move {
                serve_connection(stream, addr, id, role, dispatcher, queue_depth).await;
            });
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    addr: SocketAddr,
    id: ConnectionId,
    role: Role,
    dispatcher: Arc<CommandDispatcher>,
    queue_depth: usize,
) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
    }

    let mut connection = Connection::accept(stream, addr, id, queue_depth);
    let mut state = ConnectionState::Unauthenticated;

    while let Some(frame) = connection.recv().await {
        match frame {
            Frame::Message(message) => dispatcher.dispatch(role, &mut state, &connection.handle, &message),
            Frame::Response(response) => {
                debug!("{} {} sent response {} for {}", role, id, response.code, response.id);
            }
        }
    }

    dispatcher.disconnected(&state, connection.id());
    info!("{} connection {} ({}) closed", role, id, connection.addr());
}
