//! API key validation
//!
//! Format gate, then a cached live probe against the provider's model list.
//! Verdicts (invalid ones included) are cached for an hour under a SHA-256
//! hash of the key; the key itself is never persisted or logged.

use crate::db;
use crate::llm::client::{ChatProvider, LlmError};
use crate::models::KeyValidation;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::sync::Arc;
use stumpcast_common::Result;

/// Expected OpenRouter key prefix
pub const KEY_PREFIX: &str = "sk-or-";

/// Validation outcome returned to callers
#[derive(Debug, Clone, Serialize)]
pub struct KeyVerdict {
    pub valid: bool,
    pub model_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// True when served from the validation cache
    pub cached: bool,
}

impl KeyVerdict {
    fn invalid(code: &str) -> Self {
        Self {
            valid: false,
            model_count: 0,
            error_code: Some(code.to_string()),
            cached: false,
        }
    }
}

/// SHA-256 hex digest of the key material.
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Format + live-probe validator with db-backed result caching
pub struct KeyValidator {
    db: SqlitePool,
    provider: Arc<dyn ChatProvider>,
}

impl KeyValidator {
    pub fn new(db: SqlitePool, provider: Arc<dyn ChatProvider>) -> Self {
        Self { db, provider }
    }

    /// Validate a candidate key.
    ///
    /// Keys that fail the format gate are rejected immediately and not
    /// cached; every probe outcome is cached for an hour.
    pub async fn validate(&self, key: &str) -> Result<KeyVerdict> {
        let key = key.trim();
        if !key.starts_with(KEY_PREFIX) {
            return Ok(KeyVerdict::invalid("INVALID_KEY_FORMAT"));
        }

        let key_hash = hash_key(key);
        if let Some(hit) = db::key_cache::lookup_validation(&self.db, &key_hash).await? {
            tracing::debug!(key_hash = %&key_hash[..12], "Validation cache hit");
            return Ok(KeyVerdict {
                valid: hit.is_valid,
                model_count: hit.model_count,
                error_code: hit.error_code,
                cached: true,
            });
        }

        let verdict = match self.provider.list_models(key).await {
            Ok(model_count) => KeyVerdict {
                valid: true,
                model_count: model_count as i64,
                error_code: None,
                cached: false,
            },
            Err(e) => KeyVerdict::invalid(error_code_for(&e)),
        };

        let cache_row = KeyValidation::new(
            key_hash,
            verdict.valid,
            verdict.model_count,
            verdict.error_code.clone(),
        );
        db::key_cache::cache_validation(&self.db, &cache_row).await?;

        Ok(verdict)
    }
}

/// Map a probe failure to its stable error code.
fn error_code_for(error: &LlmError) -> &'static str {
    match error {
        LlmError::InvalidKey => "INVALID_KEY",
        LlmError::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
        LlmError::RateLimited => "RATE_LIMITED",
        LlmError::Network(_) => "NETWORK_ERROR",
        _ => "VALIDATION_FAILED",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::{ChatRequest, LlmError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted probe provider counting calls
    struct StubProvider {
        outcome: fn() -> std::result::Result<usize, LlmError>,
        probes: AtomicUsize,
    }

    impl StubProvider {
        fn new(outcome: fn() -> std::result::Result<usize, LlmError>) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                probes: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ChatProvider for StubProvider {
        async fn chat(
            &self,
            _request: &ChatRequest,
            _api_key: &str,
        ) -> std::result::Result<String, LlmError> {
            unreachable!("validator never chats")
        }

        async fn list_models(&self, _api_key: &str) -> std::result::Result<usize, LlmError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    #[tokio::test]
    async fn bad_format_is_rejected_without_probing() {
        let pool = crate::db::init_memory_pool().await.unwrap();
        let provider = StubProvider::new(|| Ok(100));
        let validator = KeyValidator::new(pool, provider.clone());

        let verdict = validator.validate("sk-proj-wrong-provider").await.unwrap();
        assert!(!verdict.valid);
        assert_eq!(verdict.error_code.as_deref(), Some("INVALID_KEY_FORMAT"));
        assert_eq!(provider.probes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn valid_key_probes_once_then_hits_cache() {
        let pool = crate::db::init_memory_pool().await.unwrap();
        let provider = StubProvider::new(|| Ok(247));
        let validator = KeyValidator::new(pool, provider.clone());

        let first = validator.validate("sk-or-v1-abcd").await.unwrap();
        assert!(first.valid);
        assert_eq!(first.model_count, 247);
        assert!(!first.cached);

        // Same verdict inside the expiry window, no second probe.
        let second = validator.validate("sk-or-v1-abcd").await.unwrap();
        assert!(second.valid);
        assert_eq!(second.model_count, 247);
        assert!(second.cached);
        assert_eq!(provider.probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_verdicts_are_cached_too() {
        let pool = crate::db::init_memory_pool().await.unwrap();
        let provider = StubProvider::new(|| Err(LlmError::InvalidKey));
        let validator = KeyValidator::new(pool, provider.clone());

        let first = validator.validate("sk-or-v1-dead").await.unwrap();
        assert_eq!(first.error_code.as_deref(), Some("INVALID_KEY"));

        let second = validator.validate("sk-or-v1-dead").await.unwrap();
        assert!(second.cached);
        assert_eq!(second.error_code.as_deref(), Some("INVALID_KEY"));
        assert_eq!(provider.probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn probe_failures_map_to_stable_codes() {
        assert_eq!(error_code_for(&LlmError::InvalidKey), "INVALID_KEY");
        assert_eq!(
            error_code_for(&LlmError::InsufficientPermissions),
            "INSUFFICIENT_PERMISSIONS"
        );
        assert_eq!(error_code_for(&LlmError::RateLimited), "RATE_LIMITED");
        assert_eq!(
            error_code_for(&LlmError::Network("dns".into())),
            "NETWORK_ERROR"
        );
        assert_eq!(
            error_code_for(&LlmError::Api(500, String::new())),
            "VALIDATION_FAILED"
        );
    }

    #[test]
    fn hashes_are_hex_and_key_free() {
        let hash = hash_key("sk-or-v1-secret");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!hash.contains("secret"));
    }
}
