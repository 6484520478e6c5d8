//! C-SPAN source
//!
//! Tries the program API first with a desktop user-agent; C-SPAN serves it
//! inconsistently, so any non-2xx falls back to scraping the person page.
//! Titles are filtered to the configured subject either way.

use super::{
    clean_html_text, extract_between, extract_location, http_client, normalize_date,
    verify_client, SourceError, SourceVerification, SpeechSource,
};
use crate::models::Speech;
use async_trait::async_trait;
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://www.c-span.org";

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    videos: Vec<ApiVideo>,
}

#[derive(Debug, Deserialize)]
struct ApiVideo {
    id: serde_json::Value,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "airDate")]
    air_date: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// c-span.org adapter
pub struct CSpanSource {
    base_url: String,
    /// Titles must contain this name (case-insensitive)
    subject: String,
}

impl CSpanSource {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            subject: subject.into(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(subject: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            subject: subject.into(),
        }
    }

    fn title_matches(&self, title: &str) -> bool {
        title.to_lowercase().contains(&self.subject.to_lowercase())
    }

    fn api_video_to_speech(&self, video: ApiVideo) -> Option<Speech> {
        let title = video.title?;
        if !self.title_matches(&title) {
            return None;
        }
        // The API serves numeric and string ids interchangeably.
        let local_id = match &video.id {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => return None,
        };

        let mut speech = Speech::new(
            Speech::prefixed_id("cspan", &local_id),
            title.clone(),
            "cspan",
        );
        speech.date = video.air_date.as_deref().and_then(normalize_date);
        speech.rally_location = extract_location(&title);
        speech.video_url = video
            .url
            .or_else(|| Some(format!("{}/video/?{}", self.base_url, local_id)));
        Some(speech)
    }

    /// Fallback extraction from the person page markup: program links carry
    /// `/video/?<id>` hrefs with the program title as link text.
    fn parse_person_page(&self, html: &str, limit: usize) -> Vec<Speech> {
        let mut speeches = Vec::new();
        let mut rest = html;

        while speeches.len() < limit {
            let Some((anchor, after)) = extract_between(rest, "<a", "</a>") else {
                break;
            };
            rest = after;

            let Some((href, text)) = extract_between(anchor, "href=\"", "\"") else {
                continue;
            };
            if !href.contains("/video/?") {
                continue;
            }
            let title = clean_html_text(text);
            if title.is_empty() || !self.title_matches(&title) {
                continue;
            }

            // `/video/?530512-1/program-slug` → `530512-1`
            let local_id = href
                .split('?')
                .nth(1)
                .unwrap_or("")
                .split(['/', '&'])
                .next()
                .unwrap_or("")
                .to_string();
            if local_id.is_empty() {
                continue;
            }

            let mut speech = Speech::new(
                Speech::prefixed_id("cspan", &local_id),
                title.clone(),
                "cspan",
            );
            speech.rally_location = extract_location(&title);
            speech.video_url = Some(if href.starts_with("http") {
                href.to_string()
            } else {
                format!("{}{}", self.base_url, href)
            });
            speeches.push(speech);
        }

        speeches
    }

    async fn fetch_via_api(
        &self,
        client: &reqwest::Client,
        limit: usize,
    ) -> Result<Vec<Speech>, SourceError> {
        let url = format!("{}/api/video/", self.base_url);
        let response = client
            .get(&url)
            .query(&[("person", self.subject.as_str()), ("format", "json")])
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().as_u16()));
        }

        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;

        Ok(envelope
            .videos
            .into_iter()
            .filter_map(|v| self.api_video_to_speech(v))
            .take(limit)
            .collect())
    }

    async fn fetch_via_scrape(
        &self,
        client: &reqwest::Client,
        limit: usize,
    ) -> Result<Vec<Speech>, SourceError> {
        let slug = self.subject.to_lowercase().replace(' ', "-");
        let url = format!("{}/person/?{}", self.base_url, slug);
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().as_u16()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(self.parse_person_page(&html, limit))
    }
}

#[async_trait]
impl SpeechSource for CSpanSource {
    fn name(&self) -> &'static str {
        "cspan"
    }

    async fn verify(&self) -> SourceVerification {
        let client = match verify_client() {
            Ok(client) => client,
            Err(e) => return SourceVerification::unavailable(e.to_string()),
        };

        match client.get(&self.base_url).send().await {
            Ok(response) if response.status().is_success() => {
                SourceVerification::available(response.status().as_u16(), "api+fallback")
            }
            Ok(response) => SourceVerification {
                available: false,
                status: Some(response.status().as_u16()),
                error: Some(format!("Unexpected status {}", response.status())),
                method: Some("api+fallback".to_string()),
            },
            Err(e) => SourceVerification::unavailable(e.to_string()),
        }
    }

    async fn fetch(&self, limit: usize) -> Result<Vec<Speech>, SourceError> {
        let client = http_client()?;

        match self.fetch_via_api(&client, limit).await {
            Ok(speeches) => {
                tracing::debug!(count = speeches.len(), "C-SPAN API fetch complete");
                Ok(speeches)
            }
            Err(api_error) => {
                tracing::debug!(error = %api_error, "C-SPAN API unavailable, scraping person page");
                self.fetch_via_scrape(&client, limit).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_videos_filter_on_subject() {
        let source = CSpanSource::new("Trump");

        let matching: ApiVideo = serde_json::from_value(serde_json::json!({
            "id": 530512,
            "title": "President Trump Rally in Tulsa, OK",
            "airDate": "2020-06-20"
        }))
        .unwrap();
        let speech = source.api_video_to_speech(matching).unwrap();
        assert_eq!(speech.id, "cspan_530512");
        assert_eq!(speech.date.as_deref(), Some("2020-06-20"));
        assert_eq!(speech.rally_location.as_deref(), Some("Tulsa, OK"));

        let other: ApiVideo = serde_json::from_value(serde_json::json!({
            "id": 1,
            "title": "Senate Session"
        }))
        .unwrap();
        assert!(source.api_video_to_speech(other).is_none());
    }

    #[test]
    fn person_page_fallback_extracts_video_links() {
        let source = CSpanSource::new("Trump");
        let html = r#"
            <div class="video-list">
              <a href="/video/?530512-1/president-trump-rally">President Trump Rally in Tulsa, OK</a>
              <a href="/video/?530600-1/senate-session">Senate Session on Appropriations</a>
              <a href="/about/">About C-SPAN</a>
            </div>
        "#;

        let speeches = source.parse_person_page(html, 10);
        assert_eq!(speeches.len(), 1);
        assert_eq!(speeches[0].id, "cspan_530512-1");
        assert_eq!(
            speeches[0].video_url.as_deref(),
            Some("https://www.c-span.org/video/?530512-1/president-trump-rally")
        );
    }
}
