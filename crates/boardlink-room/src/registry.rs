//! The room registry: every room, and which room each connection is in.

use std::collections::HashMap;

use boardlink_protocol::{OccupantId, RoomId, RosterEntry, Seat, SeatRequest};
use boardlink_transport::ConnectionId;
use rand::Rng;

use crate::{Occupant, Placement, RegistryConfig, Room, RoomError, assign_seat};

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub room: RoomId,
    pub id: OccupantId,
    pub placement: Placement,
    pub name: String,
    /// A different room the connection was moved out of, whose roster has
    /// therefore changed too.
    pub previous: Option<RoomId>,
}

/// Result of a [`Registry::leave`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub room: RoomId,
    pub placement: Placement,
    pub occupant: Occupant,
}

/// A roster and the connections it has to reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterUpdate {
    pub room: RoomId,
    pub entries: Vec<RosterEntry>,
    pub recipients: Vec<ConnectionId>,
}

/// Where a state update from a seated connection is relayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayTargets {
    pub from_seat: Seat,
    pub recipients: Vec<ConnectionId>,
}

/// Owns all rooms and memberships.
///
/// A connection is a member of at most one room. All mutation goes
/// through [`join_room`](Self::join_room), [`leave`](Self::leave) and
/// [`reap_empty_rooms`](Self::reap_empty_rooms); the registry does no I/O
/// and is meant to sit behind a single lock.
#[derive(Debug, Default)]
pub struct Registry {
    rooms: HashMap<RoomId, Room>,
    memberships: HashMap<ConnectionId, RoomId>,
    config: RegistryConfig,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            memberships: HashMap::new(),
            config,
        }
    }

    /// Allocates a fresh, empty room under an unused random id.
    pub fn create_room(&mut self) -> RoomId {
        let room_id = loop {
            let candidate = RoomId::new(random_hex::<16>());
            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        self.rooms
            .insert(room_id.clone(), Room::new(room_id.clone()));
        tracing::info!(%room_id, "room created");
        room_id
    }

    /// Places `connection` in `room_id`, creating the room if it is not
    /// known yet.
    ///
    /// If the connection already belongs to a room, the placement is
    /// decided as if its own slot were free, and the old membership is
    /// released only once the new one is certain.
    ///
    /// # Errors
    /// [`RoomError::SeatOccupied`] when an explicit seat is held by another
    /// connection. Nothing is changed in that case.
    pub fn join_room(
        &mut self,
        room_id: RoomId,
        request: SeatRequest,
        name: Option<&str>,
        connection: ConnectionId,
    ) -> Result<Joined, RoomError> {
        let occupancy = self
            .rooms
            .get(&room_id)
            .map(|room| room.occupancy_for(connection))
            .unwrap_or_default();
        let placement = assign_seat(request, occupancy)?;

        let previous = self
            .leave(connection)
            .map(|d| d.room)
            .filter(|prev| *prev != room_id);

        let name = self.config.normalize_name(name);
        let id = OccupantId::new(random_hex::<8>());
        let room = self.rooms.entry(room_id.clone()).or_insert_with(|| {
            tracing::info!(%room_id, "room created by join");
            Room::new(room_id.clone())
        });
        room.insert(
            placement,
            Occupant {
                connection,
                id: id.clone(),
                name: name.clone(),
            },
        );
        self.memberships.insert(connection, room_id.clone());

        tracing::info!(
            %room_id,
            %connection,
            seat = ?placement.seat(),
            %name,
            "joined room"
        );

        Ok(Joined {
            room: room_id,
            id,
            placement,
            name,
            previous,
        })
    }

    /// Releases whatever membership `connection` holds.
    ///
    /// The room stays in the registry even when this empties it; the
    /// reaper removes it later.
    pub fn leave(&mut self, connection: ConnectionId) -> Option<Departure> {
        let room_id = self.memberships.remove(&connection)?;
        let (placement, occupant) = self.rooms.get_mut(&room_id)?.remove(connection)?;
        tracing::info!(%room_id, %connection, seat = ?placement.seat(), "left room");
        Some(Departure {
            room: room_id,
            placement,
            occupant,
        })
    }

    /// Deletes every room with no seat holder and no spectator. Returns
    /// the removed ids.
    pub fn reap_empty_rooms(&mut self) -> Vec<RoomId> {
        let mut reaped = Vec::new();
        self.rooms.retain(|room_id, room| {
            let empty = room.is_empty();
            if empty {
                reaped.push(room_id.clone());
            }
            !empty
        });
        for room_id in &reaped {
            tracing::info!(%room_id, "room reaped");
        }
        reaped
    }

    /// The current roster of `room_id` and every member to send it to.
    pub fn roster(&self, room_id: &RoomId) -> Result<RosterUpdate, RoomError> {
        let room = self
            .rooms
            .get(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
        Ok(RosterUpdate {
            room: room_id.clone(),
            entries: room.roster(),
            recipients: room.members(),
        })
    }

    /// Relay destinations for an update sent by `connection`.
    ///
    /// `None` when the connection is not in a room or only spectates.
    pub fn relay_targets(&self, connection: ConnectionId) -> Option<RelayTargets> {
        let room = self.rooms.get(self.memberships.get(&connection)?)?;
        let from_seat = room.placement_of(connection)?.seat()?;
        Some(RelayTargets {
            from_seat,
            recipients: room.relay_targets(from_seat),
        })
    }

    /// The room `connection` belongs to, if any.
    pub fn room_of(&self, connection: ConnectionId) -> Option<&RoomId> {
        self.memberships.get(&connection)
    }

    pub fn room(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Returns the number of rooms, empty ones included.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

/// `N` random bytes as `2 * N` lowercase hex characters.
fn random_hex<const N: usize>() -> String {
    let bytes: [u8; N] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    #[test]
    fn test_random_hex_length_and_alphabet() {
        let id = random_hex::<16>();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(random_hex::<8>().len(), 16);
    }

    #[test]
    fn test_leave_unknown_connection_is_none() {
        let mut registry = Registry::default();
        assert!(registry.leave(conn(1)).is_none());
    }

    #[test]
    fn test_membership_tracks_latest_room() {
        let mut registry = Registry::default();
        let r1 = registry.create_room();
        let r2 = registry.create_room();

        registry.join_room(r1.clone(), SeatRequest::Auto, None, conn(1)).unwrap();
        let joined = registry
            .join_room(r2.clone(), SeatRequest::Auto, None, conn(1))
            .unwrap();

        assert_eq!(joined.previous, Some(r1.clone()));
        assert_eq!(registry.room_of(conn(1)), Some(&r2));
        assert!(registry.room(&r1).unwrap().is_empty());
    }

    #[test]
    fn test_relay_targets_none_for_spectator() {
        let mut registry = Registry::default();
        let room = registry.create_room();
        registry
            .join_room(room, SeatRequest::Spectator, None, conn(1))
            .unwrap();
        assert!(registry.relay_targets(conn(1)).is_none());
        assert!(registry.relay_targets(conn(2)).is_none());
    }

    #[test]
    fn test_roster_of_unknown_room_is_not_found() {
        let registry = Registry::default();
        let err = registry.roster(&RoomId::new("nope")).unwrap_err();
        assert!(matches!(err, RoomError::NotFound(_)));
    }
}
