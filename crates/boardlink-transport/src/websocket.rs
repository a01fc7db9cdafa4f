//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! Every upgraded socket is split in two. A write pump task owns the sink
//! and drains an unbounded queue, so [`Connection::send`] returns as soon
//! as the frame is queued. The read half stays with the connection and is
//! polled by whoever calls [`Connection::recv`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_util::sync::CancellationToken;

use crate::{Connection, ConnectionId, Incoming, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// Limits applied to every accepted WebSocket.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Largest inbound message (and frame) accepted, in bytes.
    pub max_message_size: usize,
    /// How long a client gets to complete the upgrade handshake.
    pub handshake_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_message_size: 1024 * 1024,
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
    config: TransportConfig,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with_config(addr, TransportConfig::default()).await
    }

    /// Binds with explicit limits.
    pub async fn bind_with_config(
        addr: &str,
        config: TransportConfig,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener, config })
    }
}

impl Transport for WebSocketTransport {
    type Incoming = IncomingWebSocket;
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error> {
        let (stream, peer_addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        Ok(IncomingWebSocket {
            stream,
            peer_addr,
            config: self.config.clone(),
        })
    }

    fn local_addr(&self) -> Result<SocketAddr, Self::Error> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }
}

/// A TCP stream that has been accepted but not yet upgraded.
pub struct IncomingWebSocket {
    stream: TcpStream,
    peer_addr: SocketAddr,
    config: TransportConfig,
}

impl Incoming for IncomingWebSocket {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    async fn upgrade(self) -> Result<Self::Connection, Self::Error> {
        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(self.config.max_message_size);
        ws_config.max_frame_size = Some(self.config.max_message_size);

        let handshake = tokio_tungstenite::accept_async_with_config(
            self.stream,
            Some(ws_config),
        );
        let ws = match tokio::time::timeout(
            self.config.handshake_timeout,
            handshake,
        )
        .await
        {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                return Err(TransportError::HandshakeFailed(
                    std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        e,
                    ),
                ));
            }
            Err(_) => {
                return Err(TransportError::HandshakeFailed(
                    std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "websocket handshake timed out",
                    ),
                ));
            }
        };

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, peer = %self.peer_addr, "accepted WebSocket connection");

        Ok(WebSocketConnection::spawn(id, self.peer_addr, ws))
    }
}

/// A frame waiting for the write pump, with the byte count it was
/// charged against the connection's buffer.
struct Outbound {
    message: Message,
    len: usize,
}

/// A single WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    outbound: mpsc::UnboundedSender<Outbound>,
    reader: Mutex<SplitStream<WsStream>>,
    buffered: Arc<AtomicUsize>,
    confirmed: AtomicBool,
    cancel: CancellationToken,
}

impl WebSocketConnection {
    fn spawn(id: ConnectionId, peer_addr: SocketAddr, ws: WsStream) -> Self {
        let (sink, stream) = ws.split();
        let (tx, rx) = mpsc::unbounded_channel();
        let buffered = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        tokio::spawn(write_pump(
            id,
            sink,
            rx,
            Arc::clone(&buffered),
            cancel.clone(),
        ));

        Self {
            id,
            peer_addr,
            outbound: tx,
            reader: Mutex::new(stream),
            buffered,
            confirmed: AtomicBool::new(true),
            cancel,
        }
    }

    /// Remote address of the peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    fn enqueue(&self, message: Message, len: usize) -> Result<(), TransportError> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::ConnectionClosed(
                "connection terminated".into(),
            ));
        }
        self.buffered.fetch_add(len, Ordering::Relaxed);
        self.outbound
            .send(Outbound { message, len })
            .map_err(|_| {
                self.buffered.fetch_sub(len, Ordering::Relaxed);
                TransportError::ConnectionClosed("write pump stopped".into())
            })
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let message = match std::str::from_utf8(data) {
            Ok(text) => Message::text(text.to_owned()),
            Err(_) => Message::binary(data.to_vec()),
        };
        self.enqueue(message, data.len())
    }

    fn buffered_amount(&self) -> usize {
        self.buffered.load(Ordering::Relaxed)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut reader = self.reader.lock().await;
        loop {
            let msg = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(None),
                msg = reader.next() => msg,
            };
            match msg {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Pong(_))) => {
                    self.confirmed.store(true, Ordering::Release);
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping / raw frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    fn probe(&self) -> Result<bool, Self::Error> {
        if !self.confirmed.swap(false, Ordering::AcqRel) {
            return Ok(false);
        }
        self.enqueue(Message::Ping(Vec::new().into()), 0)?;
        Ok(true)
    }

    fn close(&self) -> Result<(), Self::Error> {
        self.enqueue(Message::Close(None), 0)
    }

    fn terminate(&self) {
        self.cancel.cancel();
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Drains queued frames into the socket until the queue closes, a write
/// fails, or the connection is terminated.
async fn write_pump(
    id: ConnectionId,
    mut sink: SplitSink<WsStream, Message>,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    buffered: Arc<AtomicUsize>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let closing = matches!(frame.message, Message::Close(_));
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = sink.send(frame.message) => result,
        };
        buffered.fetch_sub(frame.len, Ordering::Relaxed);

        if let Err(e) = result {
            tracing::debug!(%id, error = %e, "write failed, stopping write pump");
            cancel.cancel();
            break;
        }
        if closing {
            break;
        }
    }
    tracing::trace!(%id, "write pump stopped");
}
