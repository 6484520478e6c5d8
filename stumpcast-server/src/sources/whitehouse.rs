//! White House briefing-room source
//!
//! Scrapes the public speeches index page; there is no JSON API. Extraction
//! walks the structured list items for a link, a title, and a `<time>`
//! element, and keeps the 10 most recent entries.

use super::{
    clean_html_text, extract_between, extract_location, http_client, normalize_date,
    verify_client, SourceError, SourceVerification, SpeechSource,
};
use crate::models::Speech;
use async_trait::async_trait;

const DEFAULT_BASE_URL: &str = "https://www.whitehouse.gov";
const INDEX_PATH: &str = "/briefing-room/speeches-remarks/";
const MAX_ITEMS: usize = 10;

/// whitehouse.gov adapter
pub struct WhiteHouseSource {
    base_url: String,
}

impl WhiteHouseSource {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Pull `(title, link, date)` triples out of the index markup.
    ///
    /// Items look like `<h2 ...><a href="LINK">TITLE</a></h2> ...
    /// <time datetime="ISO">...</time>`; anything that doesn't yield at
    /// least a title and link is skipped.
    fn parse_index(&self, html: &str, limit: usize) -> Vec<Speech> {
        let mut speeches = Vec::new();
        let mut rest = html;

        while speeches.len() < limit {
            let Some((item, after)) = extract_between(rest, "<h2", "</h2>") else {
                break;
            };
            rest = after;

            let Some((href, _)) = extract_between(item, "href=\"", "\"") else {
                continue;
            };
            let Some((raw_title, _)) = extract_between(item, "\">", "</a>") else {
                continue;
            };
            let title = clean_html_text(raw_title);
            if title.is_empty() {
                continue;
            }

            // The matching <time> follows the heading in the same list item.
            let date = extract_between(rest, "datetime=\"", "\"")
                .map(|(datetime, _)| datetime)
                .and_then(normalize_date);

            let link = if href.starts_with("http") {
                href.to_string()
            } else {
                format!("{}{}", self.base_url, href)
            };
            // Slug of the article URL doubles as the source-local id.
            let local_id = href
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or(href)
                .to_string();

            let mut speech = Speech::new(
                Speech::prefixed_id("whitehouse", &local_id),
                title.clone(),
                "whitehouse",
            );
            speech.date = date;
            speech.rally_location = extract_location(&title);
            speech.transcript_url = Some(link);
            speeches.push(speech);
        }

        speeches
    }
}

impl Default for WhiteHouseSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechSource for WhiteHouseSource {
    fn name(&self) -> &'static str {
        "whitehouse"
    }

    async fn verify(&self) -> SourceVerification {
        let client = match verify_client() {
            Ok(client) => client,
            Err(e) => return SourceVerification::unavailable(e.to_string()),
        };

        let url = format!("{}{}", self.base_url, INDEX_PATH);
        match client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                SourceVerification::available(response.status().as_u16(), "scrape")
            }
            Ok(response) => SourceVerification {
                available: false,
                status: Some(response.status().as_u16()),
                error: Some(format!("Unexpected status {}", response.status())),
                method: Some("scrape".to_string()),
            },
            Err(e) => SourceVerification::unavailable(e.to_string()),
        }
    }

    async fn fetch(&self, limit: usize) -> Result<Vec<Speech>, SourceError> {
        let client = http_client()?;
        let url = format!("{}{}", self.base_url, INDEX_PATH);

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

        let speeches = self.parse_index(&html, limit.min(MAX_ITEMS));
        tracing::debug!(count = speeches.len(), "whitehouse.gov fetch complete");
        Ok(speeches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <ul>
          <li>
            <h2 class="news-item__title"><a href="/briefing-room/speeches-remarks/remarks-at-the-summit/">Remarks at the Summit in Columbus, OH</a></h2>
            <time datetime="2021-03-15T10:00:00-04:00">March 15, 2021</time>
          </li>
          <li>
            <h2 class="news-item__title"><a href="/briefing-room/speeches-remarks/address-to-congress/">Address &amp; Reply</a></h2>
            <time datetime="2021-03-01T19:00:00-05:00">March 1, 2021</time>
          </li>
        </ul>
    "#;

    #[test]
    fn index_items_become_records() {
        let source = WhiteHouseSource::new();
        let speeches = source.parse_index(SAMPLE, 10);

        assert_eq!(speeches.len(), 2);
        assert_eq!(speeches[0].id, "whitehouse_remarks-at-the-summit");
        assert_eq!(speeches[0].title, "Remarks at the Summit in Columbus, OH");
        assert_eq!(speeches[0].date.as_deref(), Some("2021-03-15"));
        assert_eq!(speeches[0].rally_location.as_deref(), Some("Columbus, OH"));
        assert_eq!(
            speeches[0].transcript_url.as_deref(),
            Some("https://www.whitehouse.gov/briefing-room/speeches-remarks/remarks-at-the-summit/")
        );

        // Entity-decoded title, no detectable location
        assert_eq!(speeches[1].title, "Address & Reply");
        assert!(speeches[1].rally_location.is_none());
    }

    #[test]
    fn limit_caps_parsed_items() {
        let source = WhiteHouseSource::new();
        let speeches = source.parse_index(SAMPLE, 1);
        assert_eq!(speeches.len(), 1);
    }

    #[test]
    fn malformed_markup_yields_empty_not_error() {
        let source = WhiteHouseSource::new();
        assert!(source.parse_index("<html><body>nothing here</body></html>", 10).is_empty());
    }
}
