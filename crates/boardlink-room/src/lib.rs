//! Room registry for Boardlink.
//!
//! Rooms hold two seats (A and B) and any number of spectators. The
//! [`Registry`] owns every room and the connection-to-room index; it is a
//! plain data structure with no I/O, so callers decide how to lock it and
//! who to notify about the changes it reports.
//!
//! # Key types
//!
//! - [`Registry`]: create, join, leave, reap, roster and relay lookups
//! - [`assign_seat`]: the pure seat decision behind every join
//! - [`Room`] / [`Occupant`]: per-room membership
//! - [`RegistryConfig`]: name normalization settings

mod config;
mod error;
mod registry;
mod room;
mod seat;

pub use config::{DEFAULT_NAME, RegistryConfig};
pub use error::RoomError;
pub use registry::{Departure, Joined, Registry, RelayTargets, RosterUpdate};
pub use room::{Occupant, Room};
pub use seat::{Occupancy, Placement, assign_seat};
