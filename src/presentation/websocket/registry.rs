//! Connection Registry
//!
//! Maps each connected user to their single live session. Table mutations
//! happen under one lock; any network I/O they imply runs after it is
//! released.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;

use super::protocol::OutboundFrame;
use super::session::{CloseReason, FrameSink, Session};
use crate::domain::Snowflake;
use crate::infrastructure::metrics;

pub struct ConnectionRegistry {
    sessions: RwLock<HashMap<Snowflake, Arc<Session>>>,
    write_timeout: Duration,
}

impl ConnectionRegistry {
    pub fn new(write_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            write_timeout,
        }
    }

    /// Register a new session for `user_id`, evicting any previous one.
    ///
    /// The evicted session is marked closed while the table is locked, so
    /// its own teardown sees that it was replaced and stays quiet.
    pub fn connect(&self, user_id: Snowflake, sink: Box<dyn FrameSink>) -> Arc<Session> {
        let session = Arc::new(Session::new(user_id, sink, self.write_timeout));

        let (evicted, online) = {
            let mut sessions = self.sessions.write();
            let evicted = sessions.insert(user_id, session.clone());
            if let Some(previous) = &evicted {
                previous.mark_closed(CloseReason::Evicted);
            }
            (evicted, sessions.len())
        };
        metrics::set_active_sessions(online);

        if let Some(previous) = evicted {
            tracing::info!(
                user_id = %user_id,
                connection_id = %previous.connection_id(),
                "Evicting previous connection"
            );
            tokio::spawn(async move { previous.close(CloseReason::Evicted).await });
        }

        tracing::info!(
            user_id = %user_id,
            connection_id = %session.connection_id(),
            "Session registered"
        );
        session
    }

    /// Tear down a session and tell its counterparts it went offline.
    ///
    /// Only removes the table entry if it still points at this session. A
    /// session that was evicted, or already disconnected, announces nothing.
    /// Returns how many counterparts were notified.
    pub async fn disconnect(&self, session: &Arc<Session>, reason: CloseReason) -> usize {
        session.mark_closed(reason);
        let user_id = session.user_id();

        let removed = {
            let mut sessions = self.sessions.write();
            let owned = sessions
                .get(&user_id)
                .is_some_and(|current| Arc::ptr_eq(current, session));
            if owned {
                sessions.remove(&user_id);
            }
            owned.then_some(sessions.len())
        };

        let notified = match removed {
            Some(online) => {
                metrics::set_active_sessions(online);
                let participants = session.participants_snapshot();
                self.notify_status(&participants, user_id, false)
            }
            None => 0,
        };

        session.close(reason).await;

        tracing::info!(
            user_id = %user_id,
            connection_id = %session.connection_id(),
            reason = session.close_reason().unwrap_or(reason).as_str(),
            idle_ms = session.idle_for().as_millis() as u64,
            notified,
            "Session unregistered"
        );
        notified
    }

    pub fn lookup(&self, user_id: Snowflake) -> Option<Arc<Session>> {
        self.sessions.read().get(&user_id).cloned()
    }

    pub fn is_online(&self, user_id: Snowflake) -> bool {
        self.sessions.read().contains_key(&user_id)
    }

    /// The subset of `ids` with a live session, in input order.
    pub fn filter_online(&self, ids: &[Snowflake]) -> Vec<Snowflake> {
        let sessions = self.sessions.read();
        ids.iter()
            .copied()
            .filter(|id| sessions.contains_key(id))
            .collect()
    }

    /// Send a presence change about `subject` to every online recipient.
    ///
    /// Each recipient gets its own task, so one slow socket cannot hold up
    /// the rest. Returns how many were addressed.
    pub fn notify_status(&self, recipients: &[Snowflake], subject: Snowflake, online: bool) -> usize {
        let targets: Vec<Arc<Session>> = {
            let sessions = self.sessions.read();
            recipients
                .iter()
                .filter(|id| **id != subject)
                .filter_map(|id| sessions.get(id).cloned())
                .collect()
        };

        let frame = Arc::new(OutboundFrame::Status {
            user_id: subject,
            online,
        });
        for target in &targets {
            let target = target.clone();
            let frame = frame.clone();
            tokio::spawn(async move {
                if let Err(e) = target.send(&frame).await {
                    tracing::warn!(
                        user_id = %target.user_id(),
                        subject = %subject,
                        error = %e,
                        "Couldn't deliver status"
                    );
                }
            });
        }

        metrics::record_presence_notifications(targets.len());
        targets.len()
    }

    /// Deliver a frame to `recipient` if they are connected. Best effort.
    pub fn dispatch(&self, recipient: Snowflake, frame: OutboundFrame) -> Option<JoinHandle<()>> {
        let target = self.lookup(recipient)?;
        Some(tokio::spawn(async move {
            if let Err(e) = target.send(&frame).await {
                tracing::warn!(
                    user_id = %recipient,
                    frame = frame.kind(),
                    error = %e,
                    "Couldn't deliver frame"
                );
            }
        }))
    }

    /// Make two users part of each other's participant set, for whichever
    /// of them is connected.
    pub fn link(&self, a: Snowflake, b: Snowflake) {
        if let Some(session) = self.lookup(a) {
            session.append_participant(b);
        }
        if let Some(session) = self.lookup(b) {
            session.append_participant(a);
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Close every session without presence traffic.
    pub async fn shutdown(&self) {
        let sessions: Vec<Arc<Session>> = self.sessions.write().drain().map(|(_, s)| s).collect();
        metrics::set_active_sessions(0);
        for session in sessions {
            session.close(CloseReason::Shutdown).await;
        }
    }
}
