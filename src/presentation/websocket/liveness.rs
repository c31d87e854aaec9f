//! Liveness Monitor
//!
//! Pings each session on a fixed interval. A ping that cannot be written
//! marks the session closed, and the read loop takes the normal disconnect
//! path from there. The read side enforces the matching pong deadline.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::session::Session;

pub fn spawn_liveness(session: Arc<Session>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = session.closed() => break,
                _ = ticker.tick() => {
                    if let Err(e) = session.heartbeat().await {
                        tracing::debug!(
                            user_id = %session.user_id(),
                            connection_id = %session.connection_id(),
                            idle_ms = session.idle_for().as_millis() as u64,
                            error = %e,
                            "Heartbeat failed"
                        );
                        break;
                    }
                }
            }
        }
    })
}
