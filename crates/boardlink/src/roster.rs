//! Roster broadcasts.

use boardlink_protocol::{Codec, RoomId, ServerMessage};
use boardlink_room::Registry;
use boardlink_transport::Connection;

use crate::server::ServerState;

/// Sends the current roster of `room` to every seat holder and spectator.
///
/// Rosters bypass the relay: they go out immediately, in the order the
/// membership changes happen. Callers hold the registry lock, which keeps
/// that order across concurrent joins and leaves.
pub(crate) async fn broadcast_roster(
    state: &ServerState,
    registry: &Registry,
    room: &RoomId,
) {
    let update = match registry.roster(room) {
        Ok(update) => update,
        Err(e) => {
            tracing::debug!(room_id = %room, error = %e, "no roster to send");
            return;
        }
    };
    let recipients = update.recipients;
    let msg = ServerMessage::Roster {
        room: update.room,
        roster: update.entries,
    };
    let bytes = match state.codec.encode(&msg) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(room_id = %room, error = %e, "failed to encode roster");
            return;
        }
    };

    let peers = state.peers.lock().await;
    for conn_id in &recipients {
        let Some(conn) = peers.get(conn_id) else {
            continue;
        };
        if let Err(e) = conn.send(&bytes) {
            tracing::debug!(%conn_id, error = %e, "roster send failed");
        }
    }
    tracing::debug!(room_id = %room, recipients = recipients.len(), "roster sent");
}
