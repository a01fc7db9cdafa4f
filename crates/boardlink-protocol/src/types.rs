//! Message and identity types that travel on the wire.
//!
//! Messages are internally tagged by a lowercase `type` field, e.g.
//! `{"type":"join","room":"…","seat":"AUTO","name":"ann"}`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::ProtocolError;

/// Longest room id accepted in a `join` request, in characters.
pub const MAX_ROOM_ID_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque room token.
///
/// Rooms created by the server get 32 lowercase hex characters; rooms
/// created implicitly by `join` keep whatever token the client sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wraps a raw token.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Public identity of a room member, independent of its connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OccupantId(String);

impl OccupantId {
    /// Wraps a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OccupantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Seats
// ---------------------------------------------------------------------------

/// One of the two player slots in a room.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Seat {
    A,
    B,
}

impl Seat {
    /// Both seats, in roster order.
    pub const ALL: [Seat; 2] = [Seat::A, Seat::B];

    /// The seat across the table.
    pub fn opposite(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::B => f.write_str("B"),
        }
    }
}

/// The placement a client asks for when joining.
///
/// Deserializes from any JSON value: `"A"`, `"B"` and `"AUTO"` are
/// recognized, everything else (including a missing field) is a
/// spectator request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeatRequest {
    A,
    B,
    Auto,
    #[default]
    Spectator,
}

impl SeatRequest {
    /// Wire literal for this request.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::Auto => "AUTO",
            Self::Spectator => "SPECTATOR",
        }
    }
}

impl From<&str> for SeatRequest {
    fn from(raw: &str) -> Self {
        match raw {
            "A" => Self::A,
            "B" => Self::B,
            "AUTO" => Self::Auto,
            _ => Self::Spectator,
        }
    }
}

impl Serialize for SeatRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SeatRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(raw.as_str().map(SeatRequest::from).unwrap_or_default())
    }
}

/// Non-seat role reported to spectators on join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Spectator,
}

/// One seated occupant as listed in a `roster` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: OccupantId,
    pub name: String,
    pub seat: Seat,
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Messages a client may send.
///
/// Anything that fails to deserialize into one of these variants,
/// including an unknown `type`, is malformed and dropped silently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Allocate a fresh room.
    Create,

    /// Join (or implicitly create) a room.
    Join {
        room: RoomId,
        #[serde(default)]
        seat: SeatRequest,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    /// Propose a new board state for relay to the rest of the room.
    Zones {
        zones: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq: Option<Value>,
    },
}

impl ClientMessage {
    /// Checks the rules serde cannot express.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if let Self::Join { room, .. } = self {
            let len = room.as_str().chars().count();
            if len == 0 {
                return Err(ProtocolError::InvalidMessage("empty room id".into()));
            }
            if len > MAX_ROOM_ID_LEN {
                return Err(ProtocolError::InvalidMessage(format!(
                    "room id longer than {MAX_ROOM_ID_LEN} characters"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Messages the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Sent once, right after the socket is accepted.
    Hello,

    /// Reply to `create`.
    Created { room: RoomId },

    /// Reply to a successful `join`. Seated members get `seat`,
    /// spectators get `role`.
    Joined {
        room: RoomId,
        id: OccupantId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seat: Option<Seat>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<Role>,
        name: String,
    },

    /// Reply to a rejected `join`.
    Error { reason: String },

    /// Current seat occupants of a room.
    Roster {
        room: RoomId,
        roster: Vec<RosterEntry>,
    },

    /// Relayed board state.
    Zones {
        #[serde(rename = "fromSeat")]
        from_seat: Seat,
        zones: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq: Option<Value>,
    },
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The JSON shapes here are what browser clients parse, so each test
    //! pins an exact field layout.

    use serde_json::json;

    use super::*;

    fn client(value: Value) -> Result<ClientMessage, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn test_room_id_is_a_plain_string() {
        let json = serde_json::to_string(&RoomId::new("0af3")).unwrap();
        assert_eq!(json, "\"0af3\"");
        assert_eq!(RoomId::new("0af3").to_string(), "0af3");
    }

    #[test]
    fn test_seat_literals() {
        assert_eq!(serde_json::to_value(Seat::A).unwrap(), json!("A"));
        assert_eq!(serde_json::to_value(Seat::B).unwrap(), json!("B"));
        assert_eq!(Seat::A.opposite(), Seat::B);
        assert_eq!(Seat::B.opposite(), Seat::A);
    }

    #[test]
    fn test_seat_request_recognizes_literals() {
        assert_eq!(SeatRequest::from("A"), SeatRequest::A);
        assert_eq!(SeatRequest::from("B"), SeatRequest::B);
        assert_eq!(SeatRequest::from("AUTO"), SeatRequest::Auto);
        assert_eq!(SeatRequest::from("SPECTATOR"), SeatRequest::Spectator);
    }

    #[test]
    fn test_seat_request_unrecognized_values_mean_spectator() {
        for raw in [json!("a"), json!("C"), json!(7), json!(null), json!({"x": 1})] {
            let req: SeatRequest = serde_json::from_value(raw.clone()).unwrap();
            assert_eq!(req, SeatRequest::Spectator, "input {raw}");
        }
    }

    #[test]
    fn test_join_without_seat_is_spectator_request() {
        let msg = client(json!({"type": "join", "room": "r1"})).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Join {
                room: RoomId::new("r1"),
                seat: SeatRequest::Spectator,
                name: None,
            }
        );
    }

    #[test]
    fn test_join_with_numeric_seat_still_parses() {
        let msg = client(json!({"type": "join", "room": "r1", "seat": 1})).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Join { seat: SeatRequest::Spectator, .. }
        ));
    }

    #[test]
    fn test_join_without_room_is_malformed() {
        assert!(client(json!({"type": "join", "seat": "A"})).is_err());
    }

    #[test]
    fn test_create_parses_with_extra_fields() {
        let msg = client(json!({"type": "create", "ignored": true})).unwrap();
        assert_eq!(msg, ClientMessage::Create);
    }

    #[test]
    fn test_zones_keeps_payload_opaque() {
        let payload = json!({"hand": [1, 2, 3], "deck": {"count": 40}});
        let msg = client(json!({"type": "zones", "zones": payload, "seq": 9})).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Zones {
                zones: payload,
                seq: Some(json!(9)),
            }
        );
    }

    #[test]
    fn test_zones_without_payload_is_malformed() {
        assert!(client(json!({"type": "zones", "seq": 1})).is_err());
    }

    #[test]
    fn test_unknown_type_is_malformed() {
        assert!(client(json!({"type": "ping"})).is_err());
        assert!(client(json!({"room": "r1"})).is_err());
    }

    #[test]
    fn test_validate_rejects_overlong_room() {
        let msg = ClientMessage::Join {
            room: RoomId::new("x".repeat(MAX_ROOM_ID_LEN + 1)),
            seat: SeatRequest::Auto,
            name: None,
        };
        assert!(msg.validate().is_err());

        let ok = ClientMessage::Join {
            room: RoomId::new("x".repeat(MAX_ROOM_ID_LEN)),
            seat: SeatRequest::Auto,
            name: None,
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_hello_and_created_shapes() {
        assert_eq!(
            serde_json::to_value(ServerMessage::Hello).unwrap(),
            json!({"type": "hello"})
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::Created { room: RoomId::new("r") }).unwrap(),
            json!({"type": "created", "room": "r"})
        );
    }

    #[test]
    fn test_joined_seated_carries_seat_not_role() {
        let msg = ServerMessage::Joined {
            room: RoomId::new("r"),
            id: OccupantId::new("p1"),
            seat: Some(Seat::B),
            role: None,
            name: "bo".into(),
        };
        assert_eq!(
            serde_json::to_value(msg).unwrap(),
            json!({"type": "joined", "room": "r", "id": "p1", "seat": "B", "name": "bo"})
        );
    }

    #[test]
    fn test_joined_spectator_carries_role_not_seat() {
        let msg = ServerMessage::Joined {
            room: RoomId::new("r"),
            id: OccupantId::new("p2"),
            seat: None,
            role: Some(Role::Spectator),
            name: "cy".into(),
        };
        assert_eq!(
            serde_json::to_value(msg).unwrap(),
            json!({"type": "joined", "room": "r", "id": "p2", "role": "spectator", "name": "cy"})
        );
    }

    #[test]
    fn test_error_shape() {
        let msg = ServerMessage::Error { reason: "seat occupied".into() };
        assert_eq!(
            serde_json::to_value(msg).unwrap(),
            json!({"type": "error", "reason": "seat occupied"})
        );
    }

    #[test]
    fn test_roster_shape() {
        let msg = ServerMessage::Roster {
            room: RoomId::new("r"),
            roster: vec![RosterEntry {
                id: OccupantId::new("p1"),
                name: "ann".into(),
                seat: Seat::A,
            }],
        };
        assert_eq!(
            serde_json::to_value(msg).unwrap(),
            json!({
                "type": "roster",
                "room": "r",
                "roster": [{"id": "p1", "name": "ann", "seat": "A"}]
            })
        );
    }

    #[test]
    fn test_relayed_zones_use_from_seat_and_omit_missing_seq() {
        let msg = ServerMessage::Zones {
            from_seat: Seat::A,
            zones: json!({"hand": []}),
            seq: None,
        };
        assert_eq!(
            serde_json::to_value(msg).unwrap(),
            json!({"type": "zones", "fromSeat": "A", "zones": {"hand": []}})
        );
    }
}
