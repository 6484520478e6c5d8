//! TTS worker subprocess client
//!
//! The synthesis engine is an external executable speaking a small CLI
//! protocol: generation, voice creation, and voice enumeration. On exit
//! code 0 its stdout carries a JSON result object; stderr is progress log.
//! The child handle is scoped to the call and killed on every exit path,
//! including the 5-minute watchdog.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Wall-clock budget for one worker invocation
pub const TTS_TIMEOUT: Duration = Duration::from_secs(300);
/// Maximum script length handed to the worker
pub const TTS_MAX_CHARS: usize = 5000;

/// Worker invocation errors
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("Failed to spawn TTS worker: {0}")]
    Spawn(String),

    /// Watchdog expired; the subprocess was killed
    #[error("TTS worker exceeded {0:?} and was killed")]
    Timeout(Duration),

    /// Non-zero exit; the message is the worker's stderr
    #[error("TTS worker failed: {0}")]
    Failed(String),

    #[error("Failed to parse TTS worker output: {0}")]
    Parse(String),
}

/// Worker result object
///
/// Only `success`, `output_file`, and `duration` are contractual; any other
/// fields the worker emits are carried along untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsResult {
    pub success: bool,
    #[serde(default)]
    pub output_file: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Generation parameters
#[derive(Debug, Clone)]
pub struct TtsRequest {
    pub text: String,
    pub voice: String,
    pub preset: String,
    pub output_file: String,
    pub custom_voice: Option<PathBuf>,
}

/// Seam between the workflow engine and the synthesis backend; the live
/// implementation shells out, tests script the outcomes.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn generate(&self, request: &TtsRequest) -> Result<TtsResult, TtsError>;
    async fn list_voices(&self) -> Result<Vec<String>, TtsError>;
    async fn create_voice(
        &self,
        name: &str,
        description: &str,
        audio_files: &[String],
    ) -> Result<TtsResult, TtsError>;
}

/// Subprocess-backed worker
pub struct TtsWorker {
    program: PathBuf,
    output_dir: PathBuf,
    timeout: Duration,
}

impl TtsWorker {
    pub fn new(program: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            output_dir: output_dir.into(),
            timeout: TTS_TIMEOUT,
        }
    }

    /// Shorten the watchdog (tests).
    #[cfg(test)]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the worker to completion under the watchdog.
    ///
    /// `kill_on_drop` guarantees the child dies on every exit path: a
    /// timeout drops the in-flight future and with it the handle.
    async fn run(&self, args: &[String]) -> Result<TtsResult, TtsError> {
        tracing::debug!(program = %self.program.display(), ?args, "Spawning TTS worker");

        let child = Command::new(&self.program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TtsError::Spawn(e.to_string()))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                tracing::warn!(timeout = ?self.timeout, "TTS worker timed out, killing subprocess");
                TtsError::Timeout(self.timeout)
            })?
            .map_err(|e| TtsError::Spawn(e.to_string()))?;

        // stderr is the worker's progress log either way
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
            tracing::debug!(worker_log = line, "TTS worker");
        }

        if !output.status.success() {
            return Err(TtsError::Failed(stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        serde_json::from_str(stdout.trim()).map_err(|e| TtsError::Parse(e.to_string()))
    }
}

#[async_trait]
impl SpeechSynthesizer for TtsWorker {
    async fn generate(&self, request: &TtsRequest) -> Result<TtsResult, TtsError> {
        let mut args = vec![
            "--text".to_string(),
            request.text.clone(),
            "--voice".to_string(),
            request.voice.clone(),
            "--preset".to_string(),
            request.preset.clone(),
            "--output".to_string(),
            request.output_file.clone(),
            "--output-dir".to_string(),
            self.output_dir.display().to_string(),
        ];
        if let Some(custom_voice) = &request.custom_voice {
            args.push("--custom-voice".to_string());
            args.push(custom_voice.display().to_string());
        }
        self.run(&args).await
    }

    async fn list_voices(&self) -> Result<Vec<String>, TtsError> {
        let result = self.run(&["--list-voices".to_string()]).await?;
        // Voices arrive as an extra field; shape varies by worker version.
        let voices = result
            .extra
            .get("voices")
            .and_then(|v| v.as_array())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        Ok(voices)
    }

    async fn create_voice(
        &self,
        name: &str,
        description: &str,
        audio_files: &[String],
    ) -> Result<TtsResult, TtsError> {
        let args = vec![
            "--create-voice".to_string(),
            name.to_string(),
            "--description".to_string(),
            description.to_string(),
            "--audio-files".to_string(),
            audio_files.join(","),
        ];
        self.run(&args).await
    }
}

/// Prepare a script for synthesis: drop `[M:SS]` timestamps and `[...]`
/// stage directions, strip leading speaker cues, collapse whitespace,
/// truncate to the worker's input ceiling.
pub fn normalize_for_tts(script: &str) -> String {
    let mut cleaned = String::with_capacity(script.len());

    for line in script.lines() {
        // Brackets first: a leading timestamp would otherwise shield the
        // speaker cue behind it.
        let mut unbracketed = String::with_capacity(line.len());
        let mut depth = 0usize;
        for ch in line.chars() {
            match ch {
                '[' => depth += 1,
                ']' if depth > 0 => depth -= 1,
                _ if depth == 0 => unbracketed.push(ch),
                _ => {}
            }
        }

        let mut line = unbracketed.trim_start();
        for cue in ["HOST:", "NARRATOR:", "SPEAKER:"] {
            if let Some(rest) = line.strip_prefix(cue) {
                line = rest.trim_start();
                break;
            }
        }
        cleaned.push_str(line);
        cleaned.push(' ');
    }

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(TTS_MAX_CHARS).collect()
}
