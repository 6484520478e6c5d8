//! Database access for stumpcast
//!
//! Single SQLite database (`archive.db` under the root folder) owned by the
//! Catalog Store; components hold transient references only. Migrations are
//! idempotent: a fresh start with no tables and a restart over an existing
//! database both succeed.

pub mod events;
pub mod feedback;
pub mod key_cache;
pub mod models_catalog;
pub mod speeches;
pub mod workflows;

use sqlx::SqlitePool;
use std::path::Path;
use stumpcast_common::Result;

/// Initialize database connection pool and run migrations
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// In-memory pool for tests and ephemeral runs
///
/// Capped at one connection: every pooled connection to `sqlite::memory:`
/// would otherwise get its own empty database.
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create tables and indices if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS speeches (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            date TEXT,
            source TEXT NOT NULL,
            rally_location TEXT,
            video_url TEXT,
            audio_url TEXT,
            transcript_url TEXT,
            transcript TEXT,
            duration TEXT,
            thumbnail_url TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_speeches_status_date ON speeches(status, date DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_speeches_source ON speeches(source)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS workflows (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            speech_ids TEXT NOT NULL,
            script TEXT,
            audio_url TEXT,
            rss_url TEXT,
            status TEXT NOT NULL DEFAULT 'draft',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS curated_models (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            provider TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL,
            performance_score REAL NOT NULL DEFAULT 0,
            usage_count INTEGER NOT NULL DEFAULT 0,
            avg_response_time REAL NOT NULL DEFAULT 0,
            success_rate REAL NOT NULL DEFAULT 1.0,
            last_used TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS key_validations (
            key_hash TEXT PRIMARY KEY,
            is_valid INTEGER NOT NULL,
            model_count INTEGER NOT NULL DEFAULT 0,
            error_code TEXT,
            validated_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_type TEXT NOT NULL,
            data TEXT NOT NULL DEFAULT '{}',
            ip TEXT,
            user_agent TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_events_type_created ON events(event_type, created_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS feedback (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            overall_rating INTEGER NOT NULL,
            script_rating INTEGER NOT NULL,
            audio_rating INTEGER NOT NULL,
            comments TEXT,
            recommend INTEGER NOT NULL DEFAULT 0,
            session_id TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = init_memory_pool().await.unwrap();
        // Second run over an existing schema must also succeed.
        init_tables(&pool).await.unwrap();
    }
}
