//! Speech catalog queries

use crate::models::{Speech, SpeechStatus};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use stumpcast_common::{Error, Result};

/// Search filter for the speech catalog
///
/// `limit` is clamped to [1, 100], `offset` to [0, ∞).
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Case-insensitive substring over title ∪ transcript ∪ rally_location
    pub keyword: Option<String>,
    /// Inclusive lower bound, `YYYY-MM-DD`
    pub start_date: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`
    pub end_date: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl SearchFilter {
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 100)
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Upsert a batch of speeches, replacing on id collision.
///
/// Returns the number of rows that did not exist before the call, so
/// re-ingesting an unchanged source set reports zero inserts.
pub async fn upsert_speeches(pool: &SqlitePool, records: &[Speech]) -> Result<usize> {
    let before: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM speeches")
        .fetch_one(pool)
        .await?;

    for speech in records {
        sqlx::query(
            r#"
            INSERT INTO speeches (
                id, title, date, source, rally_location,
                video_url, audio_url, transcript_url, transcript,
                duration, thumbnail_url, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                date = excluded.date,
                rally_location = excluded.rally_location,
                video_url = excluded.video_url,
                audio_url = excluded.audio_url,
                transcript_url = excluded.transcript_url,
                transcript = excluded.transcript,
                duration = excluded.duration,
                thumbnail_url = excluded.thumbnail_url,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&speech.id)
        .bind(&speech.title)
        .bind(&speech.date)
        .bind(&speech.source)
        .bind(&speech.rally_location)
        .bind(&speech.video_url)
        .bind(&speech.audio_url)
        .bind(&speech.transcript_url)
        .bind(&speech.transcript)
        .bind(&speech.duration)
        .bind(&speech.thumbnail_url)
        .bind(speech.status.as_str())
        .bind(speech.created_at.to_rfc3339())
        .bind(speech.updated_at.to_rfc3339())
        .execute(pool)
        .await?;
    }

    let after: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM speeches")
        .fetch_one(pool)
        .await?;

    Ok((after - before).max(0) as usize)
}

/// Search active speeches.
///
/// Result order: `date DESC` with missing dates last, ties broken by
/// `id ASC` for determinism. Returns `(rows, total)` where `total` is the
/// unpaginated count under the same filter.
pub async fn search_speeches(
    pool: &SqlitePool,
    filter: &SearchFilter,
) -> Result<(Vec<Speech>, i64)> {
    let mut conditions = vec!["status = 'active'".to_string()];
    let mut binds: Vec<String> = Vec::new();

    if let Some(keyword) = filter.keyword.as_ref().filter(|k| !k.trim().is_empty()) {
        conditions.push(
            "(LOWER(title) LIKE ? OR LOWER(IFNULL(transcript, '')) LIKE ? \
             OR LOWER(IFNULL(rally_location, '')) LIKE ?)"
                .to_string(),
        );
        let pattern = format!("%{}%", keyword.trim().to_lowercase());
        binds.push(pattern.clone());
        binds.push(pattern.clone());
        binds.push(pattern);
    }
    if let Some(start) = filter.start_date.as_ref().filter(|d| !d.is_empty()) {
        conditions.push("date >= ?".to_string());
        binds.push(start.clone());
    }
    if let Some(end) = filter.end_date.as_ref().filter(|d| !d.is_empty()) {
        conditions.push("date <= ?".to_string());
        binds.push(end.clone());
    }

    let where_clause = conditions.join(" AND ");

    let count_sql = format!("SELECT COUNT(*) FROM speeches WHERE {}", where_clause);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for bind in &binds {
        count_query = count_query.bind(bind);
    }
    let total = count_query.fetch_one(pool).await?;

    let rows_sql = format!(
        "SELECT * FROM speeches WHERE {} \
         ORDER BY (date IS NULL) ASC, date DESC, id ASC LIMIT ? OFFSET ?",
        where_clause
    );
    let mut rows_query = sqlx::query(&rows_sql);
    for bind in &binds {
        rows_query = rows_query.bind(bind);
    }
    rows_query = rows_query
        .bind(filter.effective_limit())
        .bind(filter.effective_offset());

    let rows = rows_query.fetch_all(pool).await?;
    let speeches = rows
        .iter()
        .map(speech_from_row)
        .collect::<Result<Vec<_>>>()?;

    Ok((speeches, total))
}

/// Total number of speeches in the store (any status)
pub async fn count_speeches(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM speeches")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Per-source record counts (status endpoint)
pub async fn counts_by_source(pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT source, COUNT(*) FROM speeches GROUP BY source ORDER BY source",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Resolve an ordered list of speech ids, preserving input order.
///
/// Errors with `NotFound` naming the first unresolvable id; workflow
/// transitions require every selected speech to still exist.
pub async fn resolve_speeches(pool: &SqlitePool, ids: &[String]) -> Result<Vec<Speech>> {
    let mut speeches = Vec::with_capacity(ids.len());
    for id in ids {
        let row = sqlx::query("SELECT * FROM speeches WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        match row {
            Some(row) => speeches.push(speech_from_row(&row)?),
            None => return Err(Error::NotFound(format!("Speech not found: {}", id))),
        }
    }
    Ok(speeches)
}

fn speech_from_row(row: &SqliteRow) -> Result<Speech> {
    let status: String = row.get("status");
    let status = SpeechStatus::parse(&status)
        .ok_or_else(|| Error::Internal(format!("Unknown speech status: {}", status)))?;

    Ok(Speech {
        id: row.get("id"),
        title: row.get("title"),
        date: row.get("date"),
        source: row.get("source"),
        rally_location: row.get("rally_location"),
        video_url: row.get("video_url"),
        audio_url: row.get("audio_url"),
        transcript_url: row.get("transcript_url"),
        transcript: row.get("transcript"),
        duration: row.get("duration"),
        thumbnail_url: row.get("thumbnail_url"),
        status,
        created_at: parse_timestamp(row, "created_at")?,
        updated_at: parse_timestamp(row, "updated_at")?,
    })
}

pub(crate) fn parse_timestamp(row: &SqliteRow, column: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    let raw: String = row.get(column);
    chrono::DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| Error::Internal(format!("Bad timestamp in column {}: {}", column, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;
    use crate::models::Speech;

    fn speech(id: &str, title: &str, date: Option<&str>) -> Speech {
        Speech {
            date: date.map(String::from),
            ..Speech::new(id, title, "archive")
        }
    }

    #[tokio::test]
    async fn upsert_reports_only_new_rows() {
        let pool = init_memory_pool().await.unwrap();
        let records = vec![
            speech("archive_a", "Rally in Phoenix, AZ", Some("2020-02-19")),
            speech("archive_b", "Address", None),
        ];

        let inserted = upsert_speeches(&pool, &records).await.unwrap();
        assert_eq!(inserted, 2);

        // Re-ingesting the same items upserts without duplication.
        let inserted = upsert_speeches(&pool, &records).await.unwrap();
        assert_eq!(inserted, 0);
        assert_eq!(count_speeches(&pool).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn search_orders_dated_rows_first() {
        let pool = init_memory_pool().await.unwrap();
        upsert_speeches(
            &pool,
            &[
                speech("archive_b", "Address", None),
                speech("archive_a", "Rally in Phoenix, AZ", Some("2020-02-19")),
                speech("archive_c", "Remarks", Some("2019-07-04")),
            ],
        )
        .await
        .unwrap();

        let (rows, total) = search_speeches(&pool, &SearchFilter::default())
            .await
            .unwrap();
        assert_eq!(total, 3);
        let ids: Vec<_> = rows.iter().map(|s| s.id.as_str()).collect();
        // date DESC, missing date last
        assert_eq!(ids, vec!["archive_a", "archive_c", "archive_b"]);
    }

    #[tokio::test]
    async fn keyword_matches_title_location_and_transcript() {
        let pool = init_memory_pool().await.unwrap();
        let mut with_transcript = speech("archive_t", "Untitled remarks", Some("2021-01-01"));
        with_transcript.transcript = Some("We talked about Phoenix at length".to_string());
        let mut with_location = speech("archive_l", "Evening speech", Some("2021-01-02"));
        with_location.rally_location = Some("Phoenix, AZ".to_string());
        upsert_speeches(
            &pool,
            &[
                speech("archive_a", "Rally in Phoenix, AZ", Some("2020-02-19")),
                speech("archive_b", "Address", None),
                with_transcript,
                with_location,
            ],
        )
        .await
        .unwrap();

        let filter = SearchFilter {
            keyword: Some("PHOENIX".to_string()),
            ..Default::default()
        };
        let (rows, total) = search_speeches(&pool, &filter).await.unwrap();
        assert_eq!(total, 3);
        assert!(rows.iter().all(|s| s.id != "archive_b"));
    }

    #[tokio::test]
    async fn date_bounds_are_inclusive() {
        let pool = init_memory_pool().await.unwrap();
        upsert_speeches(
            &pool,
            &[
                speech("archive_a", "A", Some("2020-01-01")),
                speech("archive_b", "B", Some("2020-06-15")),
                speech("archive_c", "C", Some("2020-12-31")),
            ],
        )
        .await
        .unwrap();

        let filter = SearchFilter {
            start_date: Some("2020-06-15".to_string()),
            end_date: Some("2020-12-31".to_string()),
            ..Default::default()
        };
        let (rows, total) = search_speeches(&pool, &filter).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows[0].id, "archive_c");
        assert_eq!(rows[1].id, "archive_b");
    }

    #[tokio::test]
    async fn pagination_is_stable() {
        let pool = init_memory_pool().await.unwrap();
        let records: Vec<Speech> = (0..12)
            .map(|i| {
                speech(
                    &format!("archive_{:02}", i),
                    &format!("Speech {}", i),
                    Some(&format!("2020-01-{:02}", i + 1)),
                )
            })
            .collect();
        upsert_speeches(&pool, &records).await.unwrap();

        let all = search_speeches(&pool, &SearchFilter::default())
            .await
            .unwrap()
            .0;

        let mut paged = Vec::new();
        for page in 0..3 {
            let filter = SearchFilter {
                limit: Some(5),
                offset: Some(page * 5),
                ..Default::default()
            };
            paged.extend(search_speeches(&pool, &filter).await.unwrap().0);
        }

        let all_ids: Vec<_> = all.iter().map(|s| s.id.clone()).collect();
        let paged_ids: Vec<_> = paged.iter().map(|s| s.id.clone()).collect();
        assert_eq!(all_ids, paged_ids);
    }

    #[tokio::test]
    async fn limit_and_offset_are_clamped() {
        let filter = SearchFilter {
            limit: Some(0),
            offset: Some(-5),
            ..Default::default()
        };
        assert_eq!(filter.effective_limit(), 1);
        assert_eq!(filter.effective_offset(), 0);

        let filter = SearchFilter {
            limit: Some(500),
            ..Default::default()
        };
        assert_eq!(filter.effective_limit(), 100);

        let filter = SearchFilter::default();
        assert_eq!(filter.effective_limit(), 50);
    }

    #[tokio::test]
    async fn resolve_preserves_order_and_flags_missing() {
        let pool = init_memory_pool().await.unwrap();
        upsert_speeches(
            &pool,
            &[
                speech("archive_a", "A", None),
                speech("archive_b", "B", None),
            ],
        )
        .await
        .unwrap();

        let resolved = resolve_speeches(
            &pool,
            &["archive_b".to_string(), "archive_a".to_string()],
        )
        .await
        .unwrap();
        assert_eq!(resolved[0].id, "archive_b");
        assert_eq!(resolved[1].id, "archive_a");

        let err = resolve_speeches(&pool, &["archive_missing".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
