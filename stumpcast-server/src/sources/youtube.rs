//! YouTube Data API source
//!
//! Requires a configured API key. Runs several keyword searches, dedupes by
//! video id, then enriches the surviving set with a details call for
//! durations.

use super::{
    extract_location, format_iso8601_duration, http_client, normalize_date, verify_client,
    SourceError, SourceVerification, SpeechSource,
};
use crate::models::Speech;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: String,
    #[serde(rename = "publishedAt", default)]
    published_at: Option<String>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    #[serde(default)]
    medium: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct DetailsEnvelope {
    #[serde(default)]
    items: Vec<DetailsItem>,
}

#[derive(Debug, Deserialize)]
struct DetailsItem {
    id: String,
    #[serde(rename = "contentDetails")]
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: String,
}

/// YouTube Data API adapter
pub struct YouTubeSource {
    api_base: String,
    subject: String,
    api_key: String,
}

impl YouTubeSource {
    pub fn new(subject: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            subject: subject.into(),
            api_key: api_key.into(),
        }
    }

    #[cfg(test)]
    pub fn with_api_base(
        subject: impl Into<String>,
        api_key: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            subject: subject.into(),
            api_key: api_key.into(),
        }
    }

    fn keyword_queries(&self) -> Vec<String> {
        ["speech", "rally", "address"]
            .iter()
            .map(|kind| format!("{} {}", self.subject, kind))
            .collect()
    }

    fn item_to_speech(item: SearchItem) -> Option<Speech> {
        let video_id = item.id.video_id?;
        let title = item.snippet.title;

        let mut speech = Speech::new(
            Speech::prefixed_id("youtube", &video_id),
            title.clone(),
            "youtube",
        );
        speech.date = item.snippet.published_at.as_deref().and_then(normalize_date);
        speech.rally_location = extract_location(&title);
        speech.video_url = Some(format!("https://www.youtube.com/watch?v={}", video_id));
        speech.thumbnail_url = item.snippet.thumbnails.medium.map(|t| t.url);
        Some(speech)
    }

    async fn search_once(
        &self,
        client: &reqwest::Client,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchItem>, SourceError> {
        let url = format!("{}/search", self.api_base);
        let max_results = max_results.to_string();
        let response = client
            .get(&url)
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("q", query),
                ("maxResults", max_results.as_str()),
                ("key", self.api_key.as_str()),
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
        Ok(envelope.items)
    }

    /// Details call for durations, keyed by video id.
    async fn fetch_durations(
        &self,
        client: &reqwest::Client,
        video_ids: &[String],
    ) -> Result<HashMap<String, String>, SourceError> {
        if video_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!("{}/videos", self.api_base);
        let ids = video_ids.join(",");
        let response = client
            .get(&url)
            .query(&[
                ("part", "contentDetails"),
                ("id", ids.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().as_u16()));
        }

        let envelope: DetailsEnvelope = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        Ok(envelope
            .items
            .into_iter()
            .filter_map(|item| {
                format_iso8601_duration(&item.content_details.duration)
                    .map(|rendered| (item.id, rendered))
            })
            .collect())
    }
}

#[async_trait]
impl SpeechSource for YouTubeSource {
    fn name(&self) -> &'static str {
        "youtube"
    }

    async fn verify(&self) -> SourceVerification {
        if self.api_key.is_empty() {
            return SourceVerification::unavailable("YOUTUBE_API_KEY not configured");
        }
        let client = match verify_client() {
            Ok(client) => client,
            Err(e) => return SourceVerification::unavailable(e.to_string()),
        };

        // Cheapest possible probe: a zero-result search still authenticates.
        let url = format!("{}/search", self.api_base);
        match client
            .get(&url)
            .query(&[
                ("part", "snippet"),
                ("maxResults", "0"),
                ("q", "test"),
                ("key", self.api_key.as_str()),
            ])
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
        if self.api_key.is_empty() {
            return Err(SourceError::NotConfigured("YOUTUBE_API_KEY".to_string()));
        }

        let client = http_client()?;
        let per_query = limit.div_ceil(3).max(1);

        let mut seen = HashSet::new();
        let mut speeches = Vec::new();
        for query in self.keyword_queries() {
            let items = self.search_once(&client, &query, per_query).await?;
            for item in items {
                let Some(speech) = Self::item_to_speech(item) else {
                    continue;
                };
                if seen.insert(speech.id.clone()) {
                    speeches.push(speech);
                }
            }
        }
        speeches.truncate(limit);

        let video_ids: Vec<String> = speeches
            .iter()
            .filter_map(|s| s.id.strip_prefix("youtube_").map(String::from))
            .collect();
        match self.fetch_durations(&client, &video_ids).await {
            Ok(durations) => {
                for speech in &mut speeches {
                    if let Some(video_id) = speech.id.strip_prefix("youtube_") {
                        speech.duration = durations.get(video_id).cloned();
                    }
                }
            }
            // Durations are enrichment; the records stand without them.
            Err(e) => tracing::warn!(error = %e, "YouTube details call failed"),
        }

        tracing::debug!(count = speeches.len(), "YouTube fetch complete");
        Ok(speeches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search_item(video_id: &str, title: &str) -> SearchItem {
        serde_json::from_value(serde_json::json!({
            "id": {"videoId": video_id},
            "snippet": {
                "title": title,
                "publishedAt": "2020-06-20T21:00:00Z",
                "thumbnails": {"medium": {"url": "https://i.ytimg.com/vi/x/mqdefault.jpg"}}
            }
        }))
        .unwrap()
    }

    #[test]
    fn items_become_prefixed_records() {
        let speech = YouTubeSource::item_to_speech(search_item("abc123", "Rally in Tulsa, OK"))
            .unwrap();
        assert_eq!(speech.id, "youtube_abc123");
        assert_eq!(speech.date.as_deref(), Some("2020-06-20"));
        assert_eq!(
            speech.video_url.as_deref(),
            Some("https://www.youtube.com/watch?v=abc123")
        );
        assert!(speech.thumbnail_url.is_some());
    }

    #[test]
    fn items_without_video_id_are_skipped() {
        let item: SearchItem = serde_json::from_value(serde_json::json!({
            "id": {},
            "snippet": {"title": "Channel result"}
        }))
        .unwrap();
        assert!(YouTubeSource::item_to_speech(item).is_none());
    }

    #[test]
    fn queries_are_subject_scoped() {
        let source = YouTubeSource::new("Trump", "key");
        let queries = source.keyword_queries();
        assert_eq!(queries.len(), 3);
        assert!(queries.iter().all(|q| q.starts_with("Trump ")));
    }
}
