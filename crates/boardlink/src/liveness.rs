//! Liveness sweep.
//!
//! Every heartbeat interval each connection is probed. A connection that
//! has not answered the previous probe is terminated; its handler then
//! exits and runs the normal disconnect cleanup.

use std::sync::Arc;

use boardlink_transport::{Connection, WebSocketConnection};
use tokio::time::{Instant, interval_at};

use crate::server::ServerState;

pub(crate) async fn run(state: Arc<ServerState>) {
    let period = state.config.heartbeat_interval();
    // First sweep one full period after startup, not immediately.
    let mut ticker = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,
            _ = ticker.tick() => sweep(&state).await,
        }
    }
    tracing::debug!("liveness sweep stopped");
}

async fn sweep(state: &ServerState) {
    let peers: Vec<Arc<WebSocketConnection>> =
        state.peers.lock().await.values().cloned().collect();

    let mut terminated = 0usize;
    for conn in &peers {
        match conn.probe() {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(
                    conn_id = %conn.id(),
                    peer = %conn.peer_addr(),
                    "no answer to previous probe, terminating"
                );
                conn.terminate();
                terminated += 1;
            }
            Err(e) => {
                tracing::debug!(conn_id = %conn.id(), error = %e, "probe failed");
                conn.terminate();
                terminated += 1;
            }
        }
    }

    let stats = state.relay.stats();
    if stats.pushed > 0 {
        tracing::debug!(
            pushed = stats.pushed,
            coalesced = stats.coalesced,
            delivered = stats.delivered,
            dropped_congested = stats.dropped_congested,
            failed = stats.failed,
            "relay stats"
        );
    }
    tracing::trace!(probed = peers.len(), terminated, "liveness sweep done");
}
