//! RSS feed and bundle writer
//!
//! Pure rendering over `(title, description, script, audio)` with two
//! enclosure variants: absolute URL for standalone feeds, relative path for
//! self-contained bundles. User-provided text is always XML-escaped.

use chrono::Utc;
use serde_json::json;
use std::path::{Path, PathBuf};
use stumpcast_common::{Error, Result};
use uuid::Uuid;

/// Script preview length embedded in the item description
const PREVIEW_CHARS: usize = 500;

/// Enclosure variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnclosureMode {
    /// `audio/mpeg`, URL used as given
    Absolute,
    /// `audio/wav`, path relative to the feed file
    Relative,
}

/// Escape the five XML metacharacters in user-provided text.
pub fn escape_xml(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Render an RSS 2.0 document with the itunes namespace and a single item.
pub fn render_feed(
    title: &str,
    description: &str,
    script: Option<&str>,
    audio: Option<&str>,
    mode: EnclosureMode,
) -> String {
    let title = escape_xml(title);
    let mut item_description = escape_xml(description);
    if let Some(script) = script {
        let preview: String = script.chars().take(PREVIEW_CHARS).collect();
        item_description.push_str("&#10;&#10;");
        item_description.push_str(&escape_xml(&preview));
    }

    let pub_date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT");
    let guid = format!("stumpcast-{}", Utc::now().timestamp_millis());

    let enclosure = match (audio, mode) {
        (Some(url), EnclosureMode::Absolute) => format!(
            "      <enclosure url=\"{}\" length=\"0\" type=\"audio/mpeg\"/>\n",
            escape_xml(url)
        ),
        (Some(path), EnclosureMode::Relative) => format!(
            "      <enclosure url=\"{}\" length=\"0\" type=\"audio/wav\"/>\n",
            escape_xml(path)
        ),
        (None, _) => String::new(),
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>{title}</title>
    <description>{channel_description}</description>
    <language>en-us</language>
    <item>
      <title>{title}</title>
      <description>{item_description}</description>
      <pubDate>{pub_date}</pubDate>
      <guid isPermaLink="false">{guid}</guid>
{enclosure}      <itunes:duration>10:00</itunes:duration>
      <itunes:explicit>false</itunes:explicit>
    </item>
  </channel>
</rss>
"#,
        title = title,
        channel_description = escape_xml(description),
        item_description = item_description,
        pub_date = pub_date,
        guid = guid,
        enclosure = enclosure,
    )
}

/// Paths produced by a bundle write
#[derive(Debug, Clone)]
pub struct BundlePaths {
    pub dir: PathBuf,
    pub feed: PathBuf,
}

/// Write a self-contained bundle directory:
/// `<root>/bundles/<workflowId>/{podcast.xml, audio/<file>, README.json}`.
///
/// The enclosure is relative to `podcast.xml`, so the folder stays valid
/// wherever it is copied. A missing audio file degrades to a feed without
/// an enclosure; the bundle is still produced.
pub fn write_bundle(
    root: &Path,
    workflow_id: Uuid,
    title: &str,
    description: &str,
    script: Option<&str>,
    audio_file: Option<&Path>,
) -> Result<BundlePaths> {
    let dir = root.join("bundles").join(workflow_id.to_string());
    let audio_dir = dir.join("audio");
    std::fs::create_dir_all(&audio_dir)?;

    let mut relative_audio = None;
    if let Some(source) = audio_file {
        if source.exists() {
            let file_name = source
                .file_name()
                .ok_or_else(|| Error::Internal("Audio path has no file name".to_string()))?;
            std::fs::copy(source, audio_dir.join(file_name))?;
            relative_audio = Some(format!("audio/{}", file_name.to_string_lossy()));
        } else {
            tracing::warn!(path = %source.display(), "Audio file missing, bundling feed without enclosure");
        }
    }

    let feed = render_feed(
        title,
        description,
        script,
        relative_audio.as_deref(),
        EnclosureMode::Relative,
    );
    let feed_path = dir.join("podcast.xml");
    std::fs::write(&feed_path, feed)?;

    let readme = json!({
        "workflow_id": workflow_id.to_string(),
        "title": title,
        "description": description,
        "created_at": Utc::now().to_rfc3339(),
        "contents": {
            "feed": "podcast.xml",
            "audio": relative_audio,
        },
    });
    std::fs::write(
        dir.join("README.json"),
        serde_json::to_string_pretty(&readme)
            .map_err(|e| Error::Internal(format!("Failed to render bundle README: {}", e)))?,
    )?;

    Ok(BundlePaths {
        dir,
        feed: feed_path,
    })
}

/// Write a standalone feed: `<root>/rss/<workflowId>.xml` with an absolute
/// enclosure URL.
pub fn write_standalone_feed(
    root: &Path,
    workflow_id: Uuid,
    title: &str,
    description: &str,
    script: Option<&str>,
    audio_url: Option<&str>,
) -> Result<PathBuf> {
    let rss_dir = root.join("rss");
    std::fs::create_dir_all(&rss_dir)?;

    let feed = render_feed(title, description, script, audio_url, EnclosureMode::Absolute);
    let path = rss_dir.join(format!("{}.xml", workflow_id));
    std::fs::write(&path, feed)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metacharacters_are_escaped() {
        assert_eq!(escape_xml("<b>bold</b>"), "&lt;b&gt;bold&lt;/b&gt;");
        assert_eq!(escape_xml(r#"a & "b" & 'c'"#), "a &amp; &quot;b&quot; &amp; &apos;c&apos;");
    }

    #[test]
    fn feed_escapes_user_text() {
        let xml = render_feed(
            "Ep1",
            "<b>bold</b>",
            None,
            Some("/audio/x.wav"),
            EnclosureMode::Absolute,
        );
        assert!(xml.contains("<title>Ep1</title>"));
        assert!(xml.contains("&lt;b&gt;bold&lt;/b&gt;"));
        assert!(!xml.contains("<b>bold</b>"));
    }

    #[test]
    fn escaped_title_round_trips() {
        // Whatever a compliant parser un-escapes must equal the input.
        let raw = r#"Q&A at "HQ" <live>"#;
        let escaped = escape_xml(raw);
        let unescaped = escaped
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&amp;", "&");
        assert_eq!(unescaped, raw);
    }

    #[test]
    fn enclosure_mime_follows_variant() {
        let absolute = render_feed("T", "D", None, Some("https://x/audio.mp3"), EnclosureMode::Absolute);
        assert!(absolute.contains("type=\"audio/mpeg\""));

        let relative = render_feed("T", "D", None, Some("audio/x.wav"), EnclosureMode::Relative);
        assert!(relative.contains("type=\"audio/wav\""));
        assert!(relative.contains("url=\"audio/x.wav\""));
    }

    #[test]
    fn no_audio_means_no_enclosure() {
        let xml = render_feed("T", "D", None, None, EnclosureMode::Absolute);
        assert!(!xml.contains("<enclosure"));
        assert!(xml.contains("<itunes:duration>10:00</itunes:duration>"));
        assert!(xml.contains("<itunes:explicit>false</itunes:explicit>"));
    }

    #[test]
    fn bundle_is_self_contained() {
        let root = tempfile::tempdir().unwrap();
        let workflow_id = Uuid::new_v4();

        // Stage an audio file where generate_audio would have put it.
        let audio_dir = root.path().join("audio");
        std::fs::create_dir_all(&audio_dir).unwrap();
        let audio_path = audio_dir.join(format!("{}.wav", workflow_id));
        std::fs::write(&audio_path, b"RIFFfake").unwrap();

        let paths = write_bundle(
            root.path(),
            workflow_id,
            "Ep1",
            "<b>bold</b>",
            Some("Welcome to the show"),
            Some(&audio_path),
        )
        .unwrap();

        assert!(paths.feed.ends_with("podcast.xml"));
        assert!(paths.dir.join("README.json").exists());
        let copied = paths.dir.join("audio").join(format!("{}.wav", workflow_id));
        assert!(copied.exists());

        let xml = std::fs::read_to_string(&paths.feed).unwrap();
        assert!(xml.contains("<title>Ep1</title>"));
        assert!(xml.contains("&lt;b&gt;bold&lt;/b&gt;"));
        // Enclosure resolves relative to the feed location.
        let (_, tail) = xml.split_once("url=\"").unwrap();
        let (url, _) = tail.split_once('"').unwrap();
        assert!(paths.dir.join(url).exists());
    }

    #[test]
    fn bundle_without_audio_still_writes() {
        let root = tempfile::tempdir().unwrap();
        let paths = write_bundle(root.path(), Uuid::new_v4(), "Ep1", "D", None, None).unwrap();
        let xml = std::fs::read_to_string(&paths.feed).unwrap();
        assert!(!xml.contains("<enclosure"));
    }

    #[test]
    fn standalone_feed_lands_under_rss() {
        let root = tempfile::tempdir().unwrap();
        let workflow_id = Uuid::new_v4();
        let path = write_standalone_feed(
            root.path(),
            workflow_id,
            "Ep1",
            "D",
            None,
            Some("/audio/x.wav"),
        )
        .unwrap();
        assert_eq!(path, root.path().join("rss").join(format!("{}.xml", workflow_id)));
        assert!(path.exists());
    }
}
