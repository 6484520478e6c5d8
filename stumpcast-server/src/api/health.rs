//! Health check endpoint

use crate::{db, ApiResult, AppState};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub database: String,
    pub counts: HealthCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rss_bytes: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct HealthCounts {
    pub speeches: i64,
    pub workflows: i64,
    pub events: i64,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let uptime = chrono::Utc::now().signed_duration_since(state.startup_time);

    // Connectivity probe doubles as the speech count.
    let (database, speeches) = match db::speeches::count_speeches(&state.db).await {
        Ok(count) => ("connected".to_string(), count),
        Err(e) => {
            tracing::error!(error = %e, "Health check database probe failed");
            ("error".to_string(), 0)
        }
    };
    let workflows = db::workflows::count_workflows(&state.db).await.unwrap_or(0);
    let events = db::events::count_events(&state.db).await.unwrap_or(0);

    Ok(Json(HealthResponse {
        status: if database == "connected" { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        database,
        counts: HealthCounts {
            speeches,
            workflows,
            events,
        },
        rss_bytes: resident_memory_bytes(),
    }))
}

/// Resident set size from procfs; absent off Linux.
fn resident_memory_bytes() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(pages * 4096)
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
