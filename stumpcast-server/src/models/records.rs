//! Append-only and cache records: key validation verdicts, analytics
//! events, listener feedback

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Validation cache lifetime: one hour
pub const VALIDATION_TTL_SECONDS: i64 = 3600;

/// Cached verdict for an API key, addressed by secure hash
///
/// The key itself is never persisted; only its SHA-256 hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValidation {
    pub key_hash: String,
    pub is_valid: bool,
    /// Models visible to the key at probe time (0 when invalid)
    pub model_count: i64,
    /// Machine-readable failure code for invalid verdicts
    pub error_code: Option<String>,
    pub validated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl KeyValidation {
    pub fn new(key_hash: String, is_valid: bool, model_count: i64, error_code: Option<String>) -> Self {
        let validated_at = Utc::now();
        Self {
            key_hash,
            is_valid,
            model_count,
            error_code,
            validated_at,
            expires_at: validated_at + Duration::seconds(VALIDATION_TTL_SECONDS),
        }
    }

    /// A verdict is usable only inside its expiry window.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// One analytics / error / performance event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_type: String,
    pub data: serde_json::Value,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Listener feedback submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// 1–5
    pub overall_rating: i64,
    /// 1–5
    pub script_rating: i64,
    /// 1–5
    pub audio_rating: i64,
    pub comments: Option<String>,
    pub recommend: bool,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FeedbackRecord {
    /// Ratings must each sit in 1–5.
    pub fn ratings_valid(&self) -> bool {
        [self.overall_rating, self.script_rating, self.audio_rating]
            .iter()
            .all(|r| (1..=5).contains(r))
    }
}
