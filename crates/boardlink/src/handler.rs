//! Per-connection handler: greeting, message routing and cleanup.
//!
//! Each upgraded connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register the peer and send `hello`
//!   2. Loop: receive frames → decode → create / join / zones
//!   3. On exit (close, error, termination or panic) the [`PeerGuard`]
//!      releases the membership and tells the room

use std::sync::Arc;

use boardlink_protocol::{
    ClientMessage, Codec, Role, RoomId, SeatRequest, ServerMessage,
};
use boardlink_transport::{Connection, ConnectionId, WebSocketConnection};
use serde_json::Value;

use crate::BoardlinkError;
use crate::roster::broadcast_roster;
use crate::server::ServerState;

/// Drop guard that removes a connection from the server when its handler
/// exits.
///
/// Since `Drop` is synchronous, the async cleanup runs in a spawned task.
struct PeerGuard {
    conn_id: ConnectionId,
    state: Arc<ServerState>,
}

impl Drop for PeerGuard {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            release(&state, conn_id).await;
        });
    }
}

/// Forgets everything the server holds for `conn_id`.
async fn release(state: &ServerState, conn_id: ConnectionId) {
    {
        let mut registry = state.registry.lock().await;
        if let Some(departure) = registry.leave(conn_id) {
            broadcast_roster(state, &registry, &departure.room).await;
        }
    }
    state.peers.lock().await.remove(&conn_id);
    state.relay.forget(conn_id).await;
    tracing::debug!(%conn_id, "connection released");
}

/// Handles a single connection from upgrade to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), BoardlinkError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    state.peers.lock().await.insert(conn_id, Arc::clone(&conn));
    let _guard = PeerGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    send(&conn, &state, &ServerMessage::Hello)?;

    loop {
        let received = tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = conn.close();
                break;
            }
            received = conn.recv() => received,
        };

        let data = match received {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(%conn_id, "connection closed");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        let msg = match state.codec.decode_client(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "ignoring malformed frame");
                continue;
            }
        };

        match msg {
            ClientMessage::Create => {
                let room = state.registry.lock().await.create_room();
                send(&conn, &state, &ServerMessage::Created { room })?;
            }
            ClientMessage::Join { room, seat, name } => {
                handle_join(&conn, &state, room, seat, name.as_deref()).await?;
            }
            ClientMessage::Zones { zones, seq } => {
                handle_zones(conn_id, &state, zones, seq).await?;
            }
        }
    }

    // _guard drops here → release fires.
    Ok(())
}

/// Runs a join and answers with `joined` or `error`. A successful join
/// updates the roster of the room, and of the room left behind if the
/// connection moved.
async fn handle_join(
    conn: &WebSocketConnection,
    state: &ServerState,
    room: RoomId,
    seat: SeatRequest,
    name: Option<&str>,
) -> Result<(), BoardlinkError> {
    let mut registry = state.registry.lock().await;
    let joined = match registry.join_room(room, seat, name, conn.id()) {
        Ok(joined) => joined,
        Err(e) => {
            tracing::debug!(conn_id = %conn.id(), error = %e, "join rejected");
            return send(conn, state, &ServerMessage::Error {
                reason: e.to_string(),
            });
        }
    };

    send(conn, state, &ServerMessage::Joined {
        room: joined.room.clone(),
        id: joined.id,
        seat: joined.placement.seat(),
        role: joined.placement.is_spectator().then_some(Role::Spectator),
        name: joined.name,
    })?;

    if let Some(previous) = &joined.previous {
        broadcast_roster(state, &registry, previous).await;
    }
    broadcast_roster(state, &registry, &joined.room).await;
    Ok(())
}

/// Hands a state update to the relay for the opposite seat and every
/// spectator. Updates from spectators and non-members are dropped.
async fn handle_zones(
    conn_id: ConnectionId,
    state: &ServerState,
    zones: Value,
    seq: Option<Value>,
) -> Result<(), BoardlinkError> {
    let (from_seat, destinations) = {
        let registry = state.registry.lock().await;
        let Some(targets) = registry.relay_targets(conn_id) else {
            tracing::debug!(%conn_id, "ignoring zones from unseated connection");
            return Ok(());
        };
        let peers = state.peers.lock().await;
        let destinations: Vec<Arc<WebSocketConnection>> = targets
            .recipients
            .iter()
            .filter_map(|id| peers.get(id).cloned())
            .collect();
        (targets.from_seat, destinations)
    };

    let encoded: Arc<[u8]> = state
        .codec
        .encode(&ServerMessage::Zones {
            from_seat,
            zones,
            seq,
        })?
        .into();

    for dest in &destinations {
        state.relay.push(dest, Arc::clone(&encoded)).await;
    }
    Ok(())
}

fn send(
    conn: &WebSocketConnection,
    state: &ServerState,
    msg: &ServerMessage,
) -> Result<(), BoardlinkError> {
    let bytes = state.codec.encode(msg)?;
    conn.send(&bytes)?;
    Ok(())
}
