//! Transport abstraction layer for Boardlink.
//!
//! Provides the [`Transport`], [`Incoming`] and [`Connection`] traits that
//! separate the relay logic from the socket implementation.
//!
//! A [`Connection`] never blocks its caller on the network: `send` only
//! queues bytes, and [`Connection::buffered_amount`] reports how much is
//! still waiting to be written. Higher layers use that figure to shed load
//! from slow peers instead of buffering without bound.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    IncomingWebSocket, TransportConfig, WebSocketConnection, WebSocketTransport,
};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// A raw accepted socket that still has to complete its handshake.
    type Incoming: Incoming<Connection = Self::Connection, Error = Self::Error>;
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next inbound socket.
    ///
    /// Only the cheap part of accepting happens here; the protocol
    /// handshake is left to [`Incoming::upgrade`] so a slow client cannot
    /// hold up the accept loop.
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error>;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}

/// An accepted socket awaiting its protocol handshake.
pub trait Incoming: Send + 'static {
    /// The connection produced once the handshake completes.
    type Connection: Connection;
    /// The error type for the handshake.
    type Error: std::error::Error + Send + Sync;

    /// Remote address of the peer.
    fn peer_addr(&self) -> SocketAddr;

    /// Completes the handshake and yields a ready connection.
    fn upgrade(
        self,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// A single connection that can send and receive bytes.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Queues data for the remote peer without waiting on the network.
    fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Number of bytes queued by [`send`](Self::send) that have not yet
    /// been handed to the socket.
    fn buffered_amount(&self) -> usize;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is closed, either cleanly by
    /// the peer or by [`terminate`](Self::terminate).
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Runs one liveness sweep step for this connection.
    ///
    /// Marks the connection unconfirmed and sends a probe. Returns
    /// `Ok(false)` without probing if the previous probe was never
    /// answered; the caller is expected to terminate the connection.
    fn probe(&self) -> Result<bool, Self::Error>;

    /// Queues a close frame.
    fn close(&self) -> Result<(), Self::Error>;

    /// Drops the connection immediately, without a close handshake.
    fn terminate(&self);

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_ordering_follows_raw_value() {
        assert!(ConnectionId::new(1) < ConnectionId::new(2));
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "seat A");
        map.insert(ConnectionId::new(2), "seat B");
        assert_eq!(map[&ConnectionId::new(1)], "seat A");
    }
}
