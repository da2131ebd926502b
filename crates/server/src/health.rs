use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use rolecall_db::DbPool;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    started_at: DateTime<Utc>,
}

impl HealthState {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool, started_at: Utc::now() }
    }
}

/// Readiness snapshot: the process serves traffic, and whether the binding
/// store behind it is reachable. Reaction handling is useless without the
/// store, so store reachability decides the overall status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub binding_store: &'static str,
    pub detail: Option<String>,
    pub uptime_secs: i64,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, db_pool: DbPool) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(bind_address = %address, "health endpoint started");

    let state = HealthState::new(db_pool);
    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(error = %error, "health endpoint server terminated unexpectedly");
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let store_error =
        sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.db_pool).await.err();
    let ready = store_error.is_none();

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        binding_store: if ready { "reachable" } else { "unreachable" },
        detail: store_error.map(|error| format!("binding store query failed: {error}")),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}
