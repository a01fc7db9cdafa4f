//! Wire protocol for Boardlink.
//!
//! Every frame is a UTF-8 JSON object with a `type` discriminator:
//!
//! - [`ClientMessage`]: `create`, `join`, `zones` (client → server)
//! - [`ServerMessage`]: `hello`, `created`, `joined`, `error`, `roster`,
//!   `zones` (server → client)
//!
//! The board state inside `zones` is never interpreted; it travels as an
//! opaque JSON value from one seat to the other seat and the spectators.

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ClientMessage, MAX_ROOM_ID_LEN, OccupantId, Role, RoomId, RosterEntry, Seat,
    SeatRequest, ServerMessage,
};
