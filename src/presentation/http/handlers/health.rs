//! Health Check Handlers
//!
//! `/health` and `/health/live` answer while the process serves HTTP.
//! `/health/ready` reports each dependency of message delivery. Only a lost
//! database takes the instance out of rotation; anything else degrades a
//! side feature (uploads, orphan cleanup) while delivery keeps working.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::startup::AppState;

/// Ordered from best to worst, so the overall state is the maximum.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    Ready,
    Degraded,
    Down,
}

#[derive(Debug, Serialize)]
pub struct Component {
    pub state: Readiness,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Component {
    fn ready() -> Self {
        Self {
            state: Readiness::Ready,
            detail: None,
        }
    }

    fn with(state: Readiness, detail: impl Into<String>) -> Self {
        Self {
            state,
            detail: Some(detail.into()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolReport {
    pub state: Readiness,
    pub in_flight: usize,
    pub capacity: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessReport {
    pub status: Readiness,
    pub database: Component,
    pub claim_store: Component,
    pub expiry_watcher: Component,
    pub background: PoolReport,
    pub sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let (database, claim_store) = tokio::join!(ping_database(&state), ping_claim_store(&state));
    let report = assemble(
        database,
        claim_store,
        state.expiry.is_subscribed(),
        state.background.in_flight(),
        state.background.capacity(),
        state.registry.len(),
    );

    let code = match report.status {
        Readiness::Down => StatusCode::SERVICE_UNAVAILABLE,
        Readiness::Ready | Readiness::Degraded => StatusCode::OK,
    };
    (code, Json(report))
}

async fn ping_database(state: &AppState) -> Component {
    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => Component::ready(),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness: database unreachable");
            Component::with(Readiness::Down, "messages cannot be stored")
        }
    }
}

async fn ping_claim_store(state: &AppState) -> Component {
    let mut conn = state.redis.clone();
    match redis::cmd("PING").query_async::<String>(&mut conn).await {
        Ok(_) => Component::ready(),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness: claim store unreachable");
            Component::with(Readiness::Degraded, "image uploads unavailable")
        }
    }
}

fn assemble(
    database: Component,
    claim_store: Component,
    watcher_subscribed: bool,
    in_flight: usize,
    capacity: usize,
    sessions: usize,
) -> ReadinessReport {
    let expiry_watcher = if watcher_subscribed {
        Component::ready()
    } else {
        Component::with(
            Readiness::Degraded,
            "unsent images are only reclaimed when their data key expires",
        )
    };
    let background = PoolReport {
        state: if in_flight >= capacity {
            Readiness::Degraded
        } else {
            Readiness::Ready
        },
        in_flight,
        capacity,
    };

    let status = [
        database.state,
        claim_store.state,
        expiry_watcher.state,
        background.state,
    ]
    .into_iter()
    .max()
    .unwrap_or(Readiness::Ready);

    ReadinessReport {
        status,
        database,
        claim_store,
        expiry_watcher,
        background,
        sessions,
    }
}
