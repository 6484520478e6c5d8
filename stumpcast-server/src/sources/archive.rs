//! Internet Archive source
//!
//! Queries the advanced-search endpoint for speech/rally footage and maps
//! each hit to a catalog record pointing at its details page.

use super::{
    extract_location, http_client, normalize_date, verify_client, SourceError,
    SourceVerification, SpeechSource,
};
use crate::models::Speech;
use async_trait::async_trait;
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://archive.org";
const SEARCH_QUERY: &str = "title:(speech OR rally) AND mediatype:movies";

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    response: SearchResponse,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

#[derive(Debug, Deserialize)]
struct SearchDoc {
    identifier: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

/// archive.org adapter
pub struct ArchiveSource {
    base_url: String,
}

impl ArchiveSource {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the adapter at a test server.
    #[cfg(test)]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn doc_to_speech(&self, doc: SearchDoc) -> Speech {
        let title = doc.title.unwrap_or_else(|| doc.identifier.clone());
        let mut speech = Speech::new(
            Speech::prefixed_id("archive", &doc.identifier),
            title.clone(),
            "archive",
        );
        speech.date = doc.date.as_deref().and_then(normalize_date);
        speech.rally_location = extract_location(&title);
        speech.video_url = Some(format!("{}/details/{}", self.base_url, doc.identifier));
        speech
    }
}

impl Default for ArchiveSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechSource for ArchiveSource {
    fn name(&self) -> &'static str {
        "archive"
    }

    async fn verify(&self) -> SourceVerification {
        let client = match verify_client() {
            Ok(client) => client,
            Err(e) => return SourceVerification::unavailable(e.to_string()),
        };

        let url = format!("{}/advancedsearch.php", self.base_url);
        match client
            .get(&url)
            .query(&[("q", SEARCH_QUERY), ("rows", "0"), ("output", "json")])
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                SourceVerification::available(response.status().as_u16(), "api")
            }
            Ok(response) => SourceVerification {
                available: false,
                status: Some(response.status().as_u16()),
                error: Some(format!("Unexpected status {}", response.status())),
                method: Some("api".to_string()),
            },
            Err(e) => SourceVerification::unavailable(e.to_string()),
        }
    }

    async fn fetch(&self, limit: usize) -> Result<Vec<Speech>, SourceError> {
        let client = http_client()?;
        let url = format!("{}/advancedsearch.php", self.base_url);

        let rows = limit.to_string();
        let response = client
            .get(&url)
            .query(&[
                ("q", SEARCH_QUERY),
                ("fl[]", "identifier"),
                ("fl[]", "title"),
                ("fl[]", "date"),
                ("rows", rows.as_str()),
                ("output", "json"),
            ])
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().as_u16()));
        }

        let envelope: SearchEnvelope = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        let speeches = envelope
            .response
            .docs
            .into_iter()
            .map(|doc| self.doc_to_speech(doc))
            .collect::<Vec<_>>();

        tracing::debug!(count = speeches.len(), "archive.org fetch complete");
        Ok(speeches)
    }
}
