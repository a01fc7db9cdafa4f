//! Periodic removal of rooms nobody is in.

use std::sync::Arc;

use tokio::time::{Instant, interval_at};

use crate::server::ServerState;

pub(crate) async fn run(state: Arc<ServerState>) {
    let period = state.config.reap_interval();
    let mut ticker = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let reaped = state.registry.lock().await.reap_empty_rooms();
                if !reaped.is_empty() {
                    tracing::info!(count = reaped.len(), "reaped empty rooms");
                }
            }
        }
    }
    tracing::debug!("room reaper stopped");
}
