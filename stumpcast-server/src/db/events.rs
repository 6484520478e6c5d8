//! Append-only event log
//!
//! The in-memory counters elsewhere are derivable from this log; the log is
//! the source of truth for analytics.

use crate::models::EventRecord;
use sqlx::SqlitePool;
use stumpcast_common::Result;

/// Append one event.
pub async fn append_event(pool: &SqlitePool, event: &EventRecord) -> Result<()> {
    sqlx::query(
        "INSERT INTO events (event_type, data, ip, user_agent, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&event.event_type)
    .bind(event.data.to_string())
    .bind(&event.ip)
    .bind(&event.user_agent)
    .bind(event.created_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Delete events older than the retention window; returns the deleted count.
pub async fn cleanup_events(pool: &SqlitePool, retention_days: i64) -> Result<u64> {
    let cutoff = (chrono::Utc::now() - chrono::Duration::days(retention_days)).to_rfc3339();
    let result = sqlx::query("DELETE FROM events WHERE created_at < ?")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Total events in the log.
pub async fn count_events(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM events")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Event counts grouped by type, most frequent first.
pub async fn counts_by_type(pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT event_type, COUNT(*) FROM events GROUP BY event_type ORDER BY COUNT(*) DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn event(event_type: &str, age_days: i64) -> EventRecord {
        EventRecord {
            event_type: event_type.to_string(),
            data: json!({"path": "/api/search"}),
            ip: Some("127.0.0.1".to_string()),
            user_agent: None,
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    #[tokio::test]
    async fn append_and_count() {
        let pool = init_memory_pool().await.unwrap();
        append_event(&pool, &event("request_handled", 0)).await.unwrap();
        append_event(&pool, &event("request_handled", 0)).await.unwrap();
        append_event(&pool, &event("ingest_completed", 0)).await.unwrap();

        assert_eq!(count_events(&pool).await.unwrap(), 3);
        let by_type = counts_by_type(&pool).await.unwrap();
        assert_eq!(by_type[0], ("request_handled".to_string(), 2));
    }

    #[tokio::test]
    async fn cleanup_removes_only_stale_rows() {
        let pool = init_memory_pool().await.unwrap();
        append_event(&pool, &event("request_handled", 45)).await.unwrap();
        append_event(&pool, &event("request_handled", 5)).await.unwrap();

        let deleted = cleanup_events(&pool, 30).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(count_events(&pool).await.unwrap(), 1);
    }
}
