//! Catalog endpoints: status, search, source verification, archive refresh

use crate::db::speeches::SearchFilter;
use crate::models::Speech;
use crate::{db, ApiResult, AppState};
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub keyword: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<Speech>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

/// GET /api/search
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<SearchResponse>> {
    // Explicit date shape check; everything else clamps silently.
    for date in [&params.start_date, &params.end_date].into_iter().flatten() {
        if chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
            return Err(stumpcast_common::Error::InvalidInput(format!(
                "Dates must be YYYY-MM-DD, got: {}",
                date
            ))
            .into());
        }
    }

    let filter = SearchFilter {
        keyword: params.keyword,
        start_date: params.start_date,
        end_date: params.end_date,
        limit: params.limit,
        offset: params.offset,
    };
    let limit = filter.effective_limit();
    let offset = filter.effective_offset();

    let (results, total) = db::speeches::search_speeches(&state.db, &filter).await?;

    Ok(Json(SearchResponse {
        pagination: Pagination {
            total,
            limit,
            offset,
            has_more: offset + (results.len() as i64) < total,
        },
        results,
    }))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Configured adapters by registry name
    pub sources: BTreeMap<String, bool>,
    pub counts: StatusCounts,
    /// True when a server-side LLM key is configured
    pub ai_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusCounts {
    pub speeches: i64,
    pub workflows: i64,
}

/// GET /api/status
pub async fn status(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    let sources = state
        .ingest
        .registry()
        .names()
        .into_iter()
        .map(|name| (name.to_string(), true))
        .collect();

    Ok(Json(StatusResponse {
        sources,
        counts: StatusCounts {
            speeches: db::speeches::count_speeches(&state.db).await?,
            workflows: db::workflows::count_workflows(&state.db).await?,
        },
        ai_configured: state.config.openrouter_api_key.is_some(),
    }))
}

/// GET /api/verify-sources
pub async fn verify_sources(
    State(state): State<AppState>,
) -> Json<BTreeMap<String, crate::sources::SourceVerification>> {
    let verifications = state.ingest.verify_all_sources().await;
    Json(verifications.into_iter().collect())
}

/// POST /api/refresh-archive
pub async fn refresh_archive(
    State(state): State<AppState>,
) -> ApiResult<Json<crate::ingest::IngestReport>> {
    let report = state.ingest.refresh_archive().await?;
    Ok(Json(report))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/search", get(search))
        .route("/api/status", get(status))
        .route("/api/verify-sources", get(verify_sources))
        .route("/api/refresh-archive", post(refresh_archive))
}
