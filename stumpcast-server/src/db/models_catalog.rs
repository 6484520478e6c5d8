//! Curated model catalog persistence

use crate::db::speeches::parse_timestamp;
use crate::models::{CuratedModel, ModelCategory};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use stumpcast_common::{Error, Result};

/// Seed the catalog with the built-in default set.
///
/// Existing rows win; seeding is safe to repeat on every startup.
pub async fn seed_default_models(pool: &SqlitePool) -> Result<usize> {
    let mut seeded = 0;
    for model in CuratedModel::default_set() {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO curated_models (
                id, name, provider, description, category,
                performance_score, usage_count, avg_response_time,
                success_rate, last_used, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&model.id)
        .bind(&model.name)
        .bind(&model.provider)
        .bind(&model.description)
        .bind(model.category.as_str())
        .bind(model.performance_score)
        .bind(model.usage_count)
        .bind(model.avg_response_time)
        .bind(model.success_rate)
        .bind(model.last_used.map(|dt| dt.to_rfc3339()))
        .bind(model.created_at.to_rfc3339())
        .bind(model.updated_at.to_rfc3339())
        .execute(pool)
        .await?;
        seeded += result.rows_affected() as usize;
    }
    Ok(seeded)
}

/// Upsert a model discovered from the live provider catalog.
pub async fn upsert_model(pool: &SqlitePool, model: &CuratedModel) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO curated_models (
            id, name, provider, description, category,
            performance_score, usage_count, avg_response_time,
            success_rate, last_used, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            provider = excluded.provider,
            description = excluded.description,
            category = excluded.category,
            performance_score = excluded.performance_score,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&model.id)
    .bind(&model.name)
    .bind(&model.provider)
    .bind(&model.description)
    .bind(model.category.as_str())
    .bind(model.performance_score)
    .bind(model.usage_count)
    .bind(model.avg_response_time)
    .bind(model.success_rate)
    .bind(model.last_used.map(|dt| dt.to_rfc3339()))
    .bind(model.created_at.to_rfc3339())
    .bind(model.updated_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Models in one category, best first: `(performance_score DESC, usage_count DESC)`.
pub async fn models_by_category(
    pool: &SqlitePool,
    category: ModelCategory,
) -> Result<Vec<CuratedModel>> {
    let rows = sqlx::query(
        "SELECT * FROM curated_models WHERE category = ? \
         ORDER BY performance_score DESC, usage_count DESC",
    )
    .bind(category.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter().map(model_from_row).collect()
}

/// Whole catalog, best first.
pub async fn all_models(pool: &SqlitePool) -> Result<Vec<CuratedModel>> {
    let rows = sqlx::query(
        "SELECT * FROM curated_models ORDER BY performance_score DESC, usage_count DESC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(model_from_row).collect()
}

/// Post-call usage hook: bump counters and fold the observed latency and
/// outcome into the rolling statistics.
pub async fn record_usage(
    pool: &SqlitePool,
    model_id: &str,
    response_time_ms: f64,
    success: bool,
) -> Result<()> {
    // usage_count is the sample count for both rolling means
    sqlx::query(
        r#"
        UPDATE curated_models SET
            avg_response_time =
                (avg_response_time * usage_count + ?) / (usage_count + 1),
            success_rate =
                (success_rate * usage_count + ?) / (usage_count + 1),
            usage_count = usage_count + 1,
            last_used = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(response_time_ms)
    .bind(if success { 1.0 } else { 0.0 })
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(model_id)
    .execute(pool)
    .await?;
    Ok(())
}

fn model_from_row(row: &SqliteRow) -> Result<CuratedModel> {
    let category: String = row.get("category");
    let category = ModelCategory::parse(&category)
        .ok_or_else(|| Error::Internal(format!("Unknown model category: {}", category)))?;

    let last_used: Option<String> = row.get("last_used");
    let last_used = last_used
        .map(|s| {
            chrono::DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .map_err(|e| Error::Internal(format!("Bad last_used timestamp: {}", e)))
        })
        .transpose()?;

    Ok(CuratedModel {
        id: row.get("id"),
        name: row.get("name"),
        provider: row.get("provider"),
        description: row.get("description"),
        category,
        performance_score: row.get("performance_score"),
        usage_count: row.get("usage_count"),
        avg_response_time: row.get("avg_response_time"),
        success_rate: row.get("success_rate"),
        last_used,
        created_at: parse_timestamp(row, "created_at")?,
        updated_at: parse_timestamp(row, "updated_at")?,
    })
}
