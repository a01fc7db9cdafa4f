//! Unified error type for Boardlink.

use boardlink_protocol::ProtocolError;
use boardlink_room::RoomError;
use boardlink_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum BoardlinkError {
    /// A transport-level error (bind, accept, handshake, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A registry error (seat occupied, room not found).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
