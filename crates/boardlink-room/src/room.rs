//! A single room: two seats and any number of spectators.

use std::collections::BTreeMap;

use boardlink_protocol::{OccupantId, RoomId, RosterEntry, Seat};
use boardlink_transport::ConnectionId;

use crate::{Occupancy, Placement};

/// A member of a room, seated or spectating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occupant {
    /// The connection this member arrived on.
    pub connection: ConnectionId,
    /// Public identity, stable for the lifetime of the membership.
    pub id: OccupantId,
    /// Display name, already normalized.
    pub name: String,
}

/// Room state owned by the [`Registry`](crate::Registry).
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    seats: [Option<Occupant>; 2],
    spectators: BTreeMap<ConnectionId, Occupant>,
}

fn slot(seat: Seat) -> usize {
    match seat {
        Seat::A => 0,
        Seat::B => 1,
    }
}

impl Room {
    /// Creates an empty room.
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            seats: [None, None],
            spectators: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Returns `true` when no seat is held and no spectator is attached.
    pub fn is_empty(&self) -> bool {
        self.seats.iter().all(Option::is_none) && self.spectators.is_empty()
    }

    /// The occupant holding `seat`, if any.
    pub fn seat_holder(&self, seat: Seat) -> Option<&Occupant> {
        self.seats[slot(seat)].as_ref()
    }

    pub fn spectator_count(&self) -> usize {
        self.spectators.len()
    }

    /// Seat occupancy as seen by `connection`: a seat it holds itself
    /// counts as free.
    pub fn occupancy_for(&self, connection: ConnectionId) -> Occupancy {
        let taken = |seat: Seat| {
            self.seat_holder(seat)
                .is_some_and(|o| o.connection != connection)
        };
        Occupancy {
            a: taken(Seat::A),
            b: taken(Seat::B),
        }
    }

    /// Where `connection` currently sits in this room.
    pub fn placement_of(&self, connection: ConnectionId) -> Option<Placement> {
        for seat in Seat::ALL {
            if self
                .seat_holder(seat)
                .is_some_and(|o| o.connection == connection)
            {
                return Some(Placement::Seat(seat));
            }
        }
        self.spectators
            .contains_key(&connection)
            .then_some(Placement::Spectator)
    }

    /// Places an occupant. The caller has already checked the seat is free.
    pub(crate) fn insert(&mut self, placement: Placement, occupant: Occupant) {
        match placement {
            Placement::Seat(seat) => self.seats[slot(seat)] = Some(occupant),
            Placement::Spectator => {
                self.spectators.insert(occupant.connection, occupant);
            }
        }
    }

    /// Clears whatever slot `connection` holds.
    pub(crate) fn remove(
        &mut self,
        connection: ConnectionId,
    ) -> Option<(Placement, Occupant)> {
        match self.placement_of(connection)? {
            Placement::Seat(seat) => self.seats[slot(seat)]
                .take()
                .map(|o| (Placement::Seat(seat), o)),
            Placement::Spectator => self
                .spectators
                .remove(&connection)
                .map(|o| (Placement::Spectator, o)),
        }
    }

    /// Seated occupants, seat A first. Spectators are never listed.
    pub fn roster(&self) -> Vec<RosterEntry> {
        Seat::ALL
            .into_iter()
            .filter_map(|seat| {
                self.seat_holder(seat).map(|o| RosterEntry {
                    id: o.id.clone(),
                    name: o.name.clone(),
                    seat,
                })
            })
            .collect()
    }

    /// Every connection attached to the room: seats first, then
    /// spectators.
    pub fn members(&self) -> Vec<ConnectionId> {
        self.seats
            .iter()
            .flatten()
            .chain(self.spectators.values())
            .map(|o| o.connection)
            .collect()
    }

    /// Where a state update from `from` goes: the opposite seat, if held,
    /// and every spectator.
    pub fn relay_targets(&self, from: Seat) -> Vec<ConnectionId> {
        self.seat_holder(from.opposite())
            .into_iter()
            .chain(self.spectators.values())
            .map(|o| o.connection)
            .collect()
    }
}
