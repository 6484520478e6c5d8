//! Listener feedback persistence

use crate::models::FeedbackRecord;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use stumpcast_common::Result;

/// Aggregate feedback figures for the analytics endpoint
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackSummary {
    pub count: i64,
    pub avg_overall: Option<f64>,
    pub avg_script: Option<f64>,
    pub avg_audio: Option<f64>,
    /// Fraction of submissions that would recommend, 0.0–1.0
    pub recommend_rate: Option<f64>,
}

/// Append one feedback submission.
pub async fn insert_feedback(pool: &SqlitePool, record: &FeedbackRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO feedback (
            overall_rating, script_rating, audio_rating,
            comments, recommend, session_id, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.overall_rating)
    .bind(record.script_rating)
    .bind(record.audio_rating)
    .bind(&record.comments)
    .bind(record.recommend)
    .bind(&record.session_id)
    .bind(record.created_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Aggregate the whole feedback table.
pub async fn feedback_summary(pool: &SqlitePool) -> Result<FeedbackSummary> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS count,
               AVG(overall_rating) AS avg_overall,
               AVG(script_rating) AS avg_script,
               AVG(audio_rating) AS avg_audio,
               AVG(CASE WHEN recommend THEN 1.0 ELSE 0.0 END) AS recommend_rate
        FROM feedback
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(FeedbackSummary {
        count: row.get("count"),
        avg_overall: row.get("avg_overall"),
        avg_script: row.get("avg_script"),
        avg_audio: row.get("avg_audio"),
        recommend_rate: row.get("recommend_rate"),
    })
}
