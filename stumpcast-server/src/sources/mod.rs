//! Speech source adapters
//!
//! Each provider implements the `SpeechSource` capability set
//! (`verify` / `fetch`) and registers under a stable name. Adapters return
//! normalized records: source-prefixed ids, dates as `YYYY-MM-DD` or None,
//! locations as None rather than empty strings. Failures are error values;
//! nothing panics through the ingestion engine.

pub mod archive;
pub mod cspan;
pub mod whitehouse;
pub mod youtube;

use crate::models::Speech;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Budget for a `verify()` probe
pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);
/// Per-request network timeout during `fetch()`
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36";

/// Source adapter errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream returned status {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Source not configured: {0}")]
    NotConfigured(String),
}

/// Outcome of a `verify()` probe
#[derive(Debug, Clone, Serialize)]
pub struct SourceVerification {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// How the adapter would fetch ("api", "scrape", "api+fallback")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl SourceVerification {
    pub fn available(status: u16, method: &str) -> Self {
        Self {
            available: true,
            status: Some(status),
            error: None,
            method: Some(method.to_string()),
        }
    }

    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            available: false,
            status: None,
            error: Some(error.into()),
            method: None,
        }
    }
}

/// Capability set every provider adapter implements
#[async_trait]
pub trait SpeechSource: Send + Sync {
    /// Registry name; also the prefix of every id this adapter emits.
    fn name(&self) -> &'static str;

    /// Probe availability within the 5-second budget.
    async fn verify(&self) -> SourceVerification;

    /// Fetch up to `limit` normalized records. An empty result is not an
    /// error.
    async fn fetch(&self, limit: usize) -> Result<Vec<Speech>, SourceError>;
}

/// Closed registry of adapters, `name -> adapter`
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<&'static str, Arc<dyn SpeechSource>>,
    order: Vec<&'static str>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All four shipping adapters; YouTube only when a key is configured.
    pub fn default_set(subject: &str, youtube_api_key: Option<String>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(archive::ArchiveSource::new()));
        registry.register(Arc::new(whitehouse::WhiteHouseSource::new()));
        registry.register(Arc::new(cspan::CSpanSource::new(subject)));
        if let Some(key) = youtube_api_key {
            registry.register(Arc::new(youtube::YouTubeSource::new(subject, key)));
        } else {
            tracing::info!("YOUTUBE_API_KEY not set, YouTube source disabled");
        }
        registry
    }

    pub fn register(&mut self, source: Arc<dyn SpeechSource>) {
        let name = source.name();
        if self.sources.insert(name, source).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn SpeechSource>> {
        self.sources.get(name)
    }

    /// Adapters in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SpeechSource>> {
        self.order.iter().filter_map(|name| self.sources.get(name))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Shared HTTP client for adapters: desktop user agent, 10 s timeout.
pub(crate) fn http_client() -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| SourceError::Network(e.to_string()))
}

/// Client with the shorter verify budget.
pub(crate) fn verify_client() -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(VERIFY_TIMEOUT)
        .build()
        .map_err(|e| SourceError::Network(e.to_string()))
}

// ---------------------------------------------------------------------------
// Normalization helpers shared by adapters
// ---------------------------------------------------------------------------

/// Normalize a provider date string to `YYYY-MM-DD`, or None.
///
/// Raw values are never passed through: anything unparseable becomes None
/// and the record sorts last in date-ordered queries.
pub fn normalize_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    // ISO datetime: keep the date part
    let candidate = trimmed.split('T').next().unwrap_or(trimmed);

    const FORMATS: &[&str] = &[
        "%Y-%m-%d",
        "%m/%d/%Y",
        "%B %d, %Y",
        "%b %d, %Y",
        "%B %e, %Y",
    ];
    for format in FORMATS {
        if let Ok(date) = chrono::NaiveDate::parse_from_str(candidate, format) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    None
}

/// Render an ISO-8601 duration (`PT1H2M3S`) as `H:MM:SS` / `M:SS`.
pub fn format_iso8601_duration(raw: &str) -> Option<String> {
    let rest = raw.strip_prefix("PT").or_else(|| raw.strip_prefix("pt"))?;

    let mut hours = 0u64;
    let mut minutes = 0u64;
    let mut seconds = 0u64;
    let mut digits = String::new();

    for ch in rest.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let value: u64 = digits.parse().ok()?;
        digits.clear();
        match ch.to_ascii_uppercase() {
            'H' => hours = value,
            'M' => minutes = value,
            'S' => seconds = value,
            _ => return None,
        }
    }
    if !digits.is_empty() {
        return None;
    }

    if hours > 0 {
        Some(format!("{}:{:02}:{:02}", hours, minutes, seconds))
    } else {
        Some(format!("{}:{:02}", minutes, seconds))
    }
}

/// Heuristic location extraction from a title.
///
/// Picks the text after the last " in " / " at ", trimmed of trailing
/// separators. Returns None (never an empty string) when nothing plausible
/// is found.
pub fn extract_location(title: &str) -> Option<String> {
    let marker = [" in ", " at "]
        .iter()
        .filter_map(|m| title.rfind(m).map(|idx| idx + m.len()))
        .max()?;

    let mut candidate = &title[marker..];
    for separator in [" - ", " | ", " — "] {
        if let Some(idx) = candidate.find(separator) {
            candidate = &candidate[..idx];
        }
    }
    let candidate = candidate
        .trim()
        .trim_end_matches(['.', ',', '!', '?'])
        .trim();

    let plausible = !candidate.is_empty()
        && candidate.len() <= 60
        && candidate.chars().next().is_some_and(|c| c.is_uppercase());
    if plausible {
        Some(candidate.to_string())
    } else {
        None
    }
}

/// First substring of `haystack` between `start` and `end`, with the
/// remainder after the match. Workhorse for the HTML-scraping adapters.
pub(crate) fn extract_between<'a>(
    haystack: &'a str,
    start: &str,
    end: &str,
) -> Option<(&'a str, &'a str)> {
    let from = haystack.find(start)? + start.len();
    let len = haystack[from..].find(end)?;
    Some((&haystack[from..from + len], &haystack[from + len + end.len()..]))
}

/// Strip tags and collapse entities for scraped titles.
pub(crate) fn clean_html_text(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    let mut in_tag = false;
    for ch in raw.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    text.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
