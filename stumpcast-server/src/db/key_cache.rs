//! API key validation cache
//!
//! Verdicts are addressed by SHA-256 hash of the key material; the key
//! itself never reaches the store. Expired rows are treated as misses and
//! overwritten on the next probe.

use crate::models::KeyValidation;
use sqlx::{Row, SqlitePool};
use stumpcast_common::{Error, Result};

/// Store a verdict (valid or invalid) under its key hash.
pub async fn cache_validation(pool: &SqlitePool, validation: &KeyValidation) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO key_validations (
            key_hash, is_valid, model_count, error_code, validated_at, expires_at
        ) VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(key_hash) DO UPDATE SET
            is_valid = excluded.is_valid,
            model_count = excluded.model_count,
            error_code = excluded.error_code,
            validated_at = excluded.validated_at,
            expires_at = excluded.expires_at
        "#,
    )
    .bind(&validation.key_hash)
    .bind(validation.is_valid)
    .bind(validation.model_count)
    .bind(&validation.error_code)
    .bind(validation.validated_at.to_rfc3339())
    .bind(validation.expires_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Look up a verdict; a hit requires `expires_at > now`.
pub async fn lookup_validation(pool: &SqlitePool, key_hash: &str) -> Result<Option<KeyValidation>> {
    let row = sqlx::query(
        "SELECT key_hash, is_valid, model_count, error_code, validated_at, expires_at \
         FROM key_validations WHERE key_hash = ? AND expires_at > ?",
    )
    .bind(key_hash)
    .bind(chrono::Utc::now().to_rfc3339())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let parse = |column: &str| -> Result<chrono::DateTime<chrono::Utc>> {
        let raw: String = row.get(column);
        chrono::DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .map_err(|e| Error::Internal(format!("Bad timestamp in key cache: {}", e)))
    };

    Ok(Some(KeyValidation {
        key_hash: row.get("key_hash"),
        is_valid: row.get("is_valid"),
        model_count: row.get("model_count"),
        error_code: row.get("error_code"),
        validated_at: parse("validated_at")?,
        expires_at: parse("expires_at")?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn fresh_verdict_is_a_hit() {
        let pool = init_memory_pool().await.unwrap();
        let verdict = KeyValidation::new("hash1".into(), true, 247, None);
        cache_validation(&pool, &verdict).await.unwrap();

        let hit = lookup_validation(&pool, "hash1").await.unwrap().unwrap();
        assert!(hit.is_valid);
        assert_eq!(hit.model_count, 247);
    }

    #[tokio::test]
    async fn expired_verdict_is_a_miss() {
        let pool = init_memory_pool().await.unwrap();
        let mut verdict = KeyValidation::new("hash2".into(), true, 10, None);
        verdict.expires_at = Utc::now() - Duration::seconds(1);
        cache_validation(&pool, &verdict).await.unwrap();

        assert!(lookup_validation(&pool, "hash2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reprobe_overwrites_previous_verdict() {
        let pool = init_memory_pool().await.unwrap();
        let invalid = KeyValidation::new("hash3".into(), false, 0, Some("INVALID_KEY".into()));
        cache_validation(&pool, &invalid).await.unwrap();

        let valid = KeyValidation::new("hash3".into(), true, 52, None);
        cache_validation(&pool, &valid).await.unwrap();

        let hit = lookup_validation(&pool, "hash3").await.unwrap().unwrap();
        assert!(hit.is_valid);
        assert!(hit.error_code.is_none());
    }
}
