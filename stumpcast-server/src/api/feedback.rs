//! Feedback and analytics endpoints

use crate::models::FeedbackRecord;
use crate::{db, ApiResult, AppState};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use stumpcast_common::Error;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub overall_rating: i64,
    pub script_rating: i64,
    pub audio_rating: i64,
    pub comments: Option<String>,
    #[serde(default)]
    pub recommend: bool,
    pub session_id: Option<String>,
}

/// POST /api/feedback
pub async fn submit_feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let record = FeedbackRecord {
        overall_rating: request.overall_rating,
        script_rating: request.script_rating,
        audio_rating: request.audio_rating,
        comments: request.comments,
        recommend: request.recommend,
        session_id: request.session_id,
        created_at: chrono::Utc::now(),
    };
    if !record.ratings_valid() {
        return Err(Error::InvalidInput("Ratings must be between 1 and 5".to_string()).into());
    }

    db::feedback::insert_feedback(&state.db, &record).await?;
    Ok(Json(serde_json::json!({ "recorded": true })))
}

/// GET /api/feedback/analytics
pub async fn feedback_analytics(
    State(state): State<AppState>,
) -> ApiResult<Json<db::feedback::FeedbackSummary>> {
    Ok(Json(db::feedback::feedback_summary(&state.db).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupRequest {
    pub retention_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub deleted: u64,
    pub retention_days: i64,
}

/// POST /api/analytics/cleanup
pub async fn cleanup_events(
    State(state): State<AppState>,
    body: Option<Json<CleanupRequest>>,
) -> ApiResult<Json<CleanupResponse>> {
    let retention_days = body
        .and_then(|Json(b)| b.retention_days)
        .unwrap_or(state.config.event_retention_days);
    if retention_days < 1 {
        return Err(Error::InvalidInput("retentionDays must be at least 1".to_string()).into());
    }

    let deleted = db::events::cleanup_events(&state.db, retention_days).await?;
    tracing::info!(deleted, retention_days, "Event log cleanup");
    Ok(Json(CleanupResponse {
        deleted,
        retention_days,
    }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/feedback", post(submit_feedback))
        .route("/api/feedback/analytics", get(feedback_analytics))
        .route("/api/analytics/cleanup", post(cleanup_events))
}
