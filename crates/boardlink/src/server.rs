//! `BoardlinkServer` builder and server loop.
//!
//! Ties the layers together: transport → protocol → registry → relay,
//! plus the two background sweeps (liveness and room reaping).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use boardlink_protocol::JsonCodec;
use boardlink_relay::{CoalescingRelay, RelayStats};
use boardlink_room::Registry;
use boardlink_transport::{
    ConnectionId, Incoming, Transport, WebSocketConnection, WebSocketTransport,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::handler::handle_connection;
use crate::{BoardlinkError, ServerConfig, liveness, reaper};

/// Shared server state passed to each connection handler task.
///
/// Lock order is always `registry` before `peers`. Neither lock is held
/// across a relay push.
pub(crate) struct ServerState {
    pub(crate) registry: Mutex<Registry>,
    /// Every upgraded connection, member of a room or not.
    pub(crate) peers: Mutex<HashMap<ConnectionId, Arc<WebSocketConnection>>>,
    pub(crate) relay: CoalescingRelay<WebSocketConnection>,
    pub(crate) codec: JsonCodec,
    pub(crate) config: ServerConfig,
    pub(crate) shutdown: CancellationToken,
}

/// Builder for configuring and starting a Boardlink server.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
///
/// use boardlink::BoardlinkServer;
///
/// # async fn run() -> Result<(), boardlink::BoardlinkError> {
/// let server = BoardlinkServer::builder()
///     .bind("0.0.0.0:8080")
///     .heartbeat_interval(Duration::from_secs(30))
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct BoardlinkServerBuilder {
    config: ServerConfig,
}

impl BoardlinkServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces every setting at once.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the liveness sweep period.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval_ms = millis(interval);
        self
    }

    /// Sets the empty-room sweep period.
    pub fn reap_interval(mut self, interval: Duration) -> Self {
        self.config.reap_interval_ms = millis(interval);
        self
    }

    /// Sets the relay coalescing window.
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval_ms = millis(interval);
        self
    }

    /// Sets the per-destination congestion threshold for relayed state.
    pub fn max_buffered_bytes(mut self, bytes: usize) -> Self {
        self.config.max_buffered_bytes = bytes;
        self
    }

    /// Sets the display name cap, in characters.
    pub fn max_name_len(mut self, len: usize) -> Self {
        self.config.max_name_len = len;
        self
    }

    /// Binds the listener and assembles the server state.
    ///
    /// # Errors
    /// [`BoardlinkError::Config`] for unusable settings,
    /// [`BoardlinkError::Transport`] if the address cannot be bound.
    pub async fn build(self) -> Result<BoardlinkServer, BoardlinkError> {
        self.config.validate()?;

        let transport = WebSocketTransport::bind_with_config(
            &self.config.bind_addr,
            self.config.transport(),
        )
        .await?;

        let state = Arc::new(ServerState {
            registry: Mutex::new(Registry::new(self.config.registry())),
            peers: Mutex::new(HashMap::new()),
            relay: CoalescingRelay::new(self.config.relay()),
            codec: JsonCodec,
            config: self.config,
            shutdown: CancellationToken::new(),
        });

        Ok(BoardlinkServer { transport, state })
    }
}

impl Default for BoardlinkServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn millis(interval: Duration) -> u64 {
    u64::try_from(interval.as_millis()).unwrap_or(u64::MAX)
}

/// A bound Boardlink server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct BoardlinkServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl BoardlinkServer {
    /// Creates a new builder.
    pub fn builder() -> BoardlinkServerBuilder {
        BoardlinkServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, BoardlinkError> {
        Ok(self.transport.local_addr()?)
    }

    /// Returns a handle for stopping and inspecting the server once
    /// [`run`](Self::run) owns it.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Runs the accept loop and the background sweeps until
    /// [`ServerHandle::shutdown`] is called.
    ///
    /// Each accepted socket is upgraded in its own task, so a client that
    /// stalls mid-handshake never holds up the next accept.
    pub async fn run(mut self) -> Result<(), BoardlinkError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Boardlink server running");

        let liveness = tokio::spawn(liveness::run(Arc::clone(&self.state)));
        let reaper = tokio::spawn(reaper::run(Arc::clone(&self.state)));

        loop {
            let accepted = tokio::select! {
                _ = self.state.shutdown.cancelled() => break,
                accepted = self.transport.accept() => accepted,
            };

            match accepted {
                Ok(incoming) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let peer = incoming.peer_addr();
                        let conn = match incoming.upgrade().await {
                            Ok(conn) => conn,
                            Err(e) => {
                                tracing::debug!(%peer, error = %e, "upgrade failed");
                                return;
                            }
                        };
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                %peer,
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }

        let _ = liveness.await;
        let _ = reaper.await;
        tracing::info!("Boardlink server stopped");
        Ok(())
    }
}

/// Cloneable control handle for a running server.
#[derive(Clone)]
pub struct ServerHandle {
    state: Arc<ServerState>,
}

impl ServerHandle {
    /// Stops accepting, ends the background sweeps and closes every
    /// connection.
    pub fn shutdown(&self) {
        self.state.shutdown.cancel();
    }

    /// Number of rooms in the registry, empty ones included.
    pub async fn room_count(&self) -> usize {
        self.state.registry.lock().await.room_count()
    }

    /// Number of upgraded connections.
    pub async fn connection_count(&self) -> usize {
        self.state.peers.lock().await.len()
    }

    /// Relay counters since startup.
    pub fn relay_stats(&self) -> RelayStats {
        self.state.relay.stats()
    }
}
