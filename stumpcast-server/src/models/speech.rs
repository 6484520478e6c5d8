//! Speech catalog record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Visibility status of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechStatus {
    /// Visible in search results
    Active,
    /// Hidden from search, retained in the store
    Hidden,
}

impl SpeechStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeechStatus::Active => "active",
            SpeechStatus::Hidden => "hidden",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(SpeechStatus::Active),
            "hidden" => Some(SpeechStatus::Hidden),
            _ => None,
        }
    }
}

/// A single archived speech
///
/// Immutable once ingested except for `status`. The id is source-prefixed
/// (`archive_<identifier>`, `youtube_<videoId>`, ...) so that re-ingesting
/// the same external item upserts instead of duplicating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Speech {
    pub id: String,
    pub title: String,
    /// ISO `YYYY-MM-DD`, None when the source carried no usable date
    pub date: Option<String>,
    /// Registry name of the adapter that produced this record
    pub source: String,
    /// Location extracted from the title, None when undetectable
    pub rally_location: Option<String>,
    pub video_url: Option<String>,
    pub audio_url: Option<String>,
    pub transcript_url: Option<String>,
    pub transcript: Option<String>,
    /// Human-readable duration (`H:MM:SS` / `M:SS`)
    pub duration: Option<String>,
    pub thumbnail_url: Option<String>,
    pub status: SpeechStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Speech {
    /// Derive the stable catalog id from `(source, source-local id)`.
    pub fn prefixed_id(source: &str, local_id: &str) -> String {
        format!("{}_{}", source, local_id)
    }

    /// Minimal active record; adapters fill the remaining fields by struct
    /// update before returning.
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            date: None,
            source: source.into(),
            rally_location: None,
            video_url: None,
            audio_url: None,
            transcript_url: None,
            transcript: None,
            duration: None,
            thumbnail_url: None,
            status: SpeechStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}
