//! Error types for the room layer.

use boardlink_protocol::{RoomId, Seat};

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// An explicit seat request named a seat someone else holds.
    ///
    /// The message is sent to clients verbatim, so it carries no detail.
    #[error("seat occupied")]
    SeatOccupied(Seat),

    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),
}
