//! Seat assignment.
//!
//! [`assign_seat`] is a pure function of the request and the room's current
//! occupancy; the registry calls it before touching any state, so a
//! rejected join never leaves a partial change behind.

use boardlink_protocol::{Seat, SeatRequest};

use crate::RoomError;

/// Where a member sits in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    Seat(Seat),
    Spectator,
}

impl Placement {
    /// The seat, if this placement holds one.
    pub fn seat(self) -> Option<Seat> {
        match self {
            Self::Seat(seat) => Some(seat),
            Self::Spectator => None,
        }
    }

    pub fn is_spectator(self) -> bool {
        matches!(self, Self::Spectator)
    }
}

/// Which seats of a room are taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Occupancy {
    pub a: bool,
    pub b: bool,
}

impl Occupancy {
    /// Returns `true` if nobody holds `seat`.
    pub fn is_free(self, seat: Seat) -> bool {
        match seat {
            Seat::A => !self.a,
            Seat::B => !self.b,
        }
    }
}

/// Decides the placement for a join request.
///
/// - `A` / `B`: that seat if free, otherwise [`RoomError::SeatOccupied`].
/// - `Auto`: seat A, then seat B, then spectator.
/// - `Spectator`: always spectator.
pub fn assign_seat(
    request: SeatRequest,
    occupancy: Occupancy,
) -> Result<Placement, RoomError> {
    match request {
        SeatRequest::A => explicit(Seat::A, occupancy),
        SeatRequest::B => explicit(Seat::B, occupancy),
        SeatRequest::Auto => Ok(Seat::ALL
            .into_iter()
            .find(|&seat| occupancy.is_free(seat))
            .map_or(Placement::Spectator, Placement::Seat)),
        SeatRequest::Spectator => Ok(Placement::Spectator),
    }
}

fn explicit(seat: Seat, occupancy: Occupancy) -> Result<Placement, RoomError> {
    if occupancy.is_free(seat) {
        Ok(Placement::Seat(seat))
    } else {
        Err(RoomError::SeatOccupied(seat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY: Occupancy = Occupancy { a: false, b: false };
    const ONLY_A: Occupancy = Occupancy { a: true, b: false };
    const ONLY_B: Occupancy = Occupancy { a: false, b: true };
    const FULL: Occupancy = Occupancy { a: true, b: true };

    #[test]
    fn test_explicit_seat_when_free() {
        assert_eq!(assign_seat(SeatRequest::A, EMPTY), Ok(Placement::Seat(Seat::A)));
        assert_eq!(assign_seat(SeatRequest::B, ONLY_A), Ok(Placement::Seat(Seat::B)));
    }

    #[test]
    fn test_explicit_seat_when_taken() {
        assert_eq!(
            assign_seat(SeatRequest::A, ONLY_A),
            Err(RoomError::SeatOccupied(Seat::A))
        );
        assert_eq!(
            assign_seat(SeatRequest::B, FULL),
            Err(RoomError::SeatOccupied(Seat::B))
        );
    }

    #[test]
    fn test_auto_prefers_a_then_b_then_spectator() {
        assert_eq!(assign_seat(SeatRequest::Auto, EMPTY), Ok(Placement::Seat(Seat::A)));
        assert_eq!(assign_seat(SeatRequest::Auto, ONLY_B), Ok(Placement::Seat(Seat::A)));
        assert_eq!(assign_seat(SeatRequest::Auto, ONLY_A), Ok(Placement::Seat(Seat::B)));
        assert_eq!(assign_seat(SeatRequest::Auto, FULL), Ok(Placement::Spectator));
    }

    #[test]
    fn test_spectator_always_succeeds() {
        for occupancy in [EMPTY, ONLY_A, ONLY_B, FULL] {
            assert_eq!(
                assign_seat(SeatRequest::Spectator, occupancy),
                Ok(Placement::Spectator)
            );
        }
    }

    #[test]
    fn test_seat_occupied_message_is_exact() {
        assert_eq!(RoomError::SeatOccupied(Seat::B).to_string(), "seat occupied");
    }
}
