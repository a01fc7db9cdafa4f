//! # Boardlink
//!
//! Real-time relay that lets two seated players, plus any number of
//! spectators, share live board state over WebSocket.
//!
//! The server owns rooms and seats; the board state itself is opaque JSON
//! that is relayed, coalesced to the latest value per destination, and
//! dropped for destinations that cannot keep up.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use boardlink::prelude::*;
//!
//! # async fn run() -> Result<(), BoardlinkError> {
//! let server = BoardlinkServer::builder()
//!     .config(ServerConfig::load()?)
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod liveness;
mod reaper;
mod roster;
mod server;

pub use config::{ConfigError, ServerConfig};
pub use error::BoardlinkError;
pub use server::{BoardlinkServer, BoardlinkServerBuilder, ServerHandle};

pub use boardlink_protocol as protocol;
pub use boardlink_relay as relay;
pub use boardlink_room as room;
pub use boardlink_transport as transport;

pub mod prelude {
    //! The types most servers and tests need.

    pub use crate::{
        BoardlinkError, BoardlinkServer, BoardlinkServerBuilder, ConfigError,
        ServerConfig, ServerHandle,
    };
    pub use boardlink_protocol::{
        ClientMessage, OccupantId, Role, RoomId, RosterEntry, Seat, SeatRequest,
        ServerMessage,
    };
    pub use boardlink_relay::RelayStats;
}
