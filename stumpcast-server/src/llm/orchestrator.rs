//! Script-generation orchestrator
//!
//! Plans provider calls over the selected speeches using one of three
//! strategies:
//!
//! - **single**: one prompt embedding every speech (small selections)
//! - **batched**: per-batch summaries, then one synthesis call; a failed
//!   batch degrades to a marker line instead of failing the pipeline
//! - **swarm**: three specialized agents run concurrently over contiguous
//!   slices, a synthesis call combines their analyses; any agent failure
//!   falls back to the single strategy over the full input
//!
//! Key precedence per call: explicit client key → pool → environment key.

use crate::db;
use crate::llm::client::{ChatMessage, ChatProvider, ChatRequest, LlmError};
use crate::llm::key_pool::{KeyErrorKind, KeyPool};
use crate::models::Speech;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;

/// Speeches per summary batch when the caller doesn't override
pub const DEFAULT_BATCH_SIZE: usize = 10;
/// Swarm needs at least one speech per agent
const SWARM_MIN_SPEECHES: usize = 3;
/// Transcript excerpt embedded per speech in prompts
const EXCERPT_CHARS: usize = 500;

/// Caller-tunable generation parameters
#[derive(Debug, Clone)]
pub struct ScriptOptions {
    pub model: String,
    pub style: String,
    pub duration_minutes: u32,
    pub batch_size: usize,
    pub use_swarm: bool,
    /// Explicit key supplied with the request; highest precedence
    pub client_key: Option<String>,
    pub use_pool: bool,
}

impl ScriptOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            style: "professional".to_string(),
            duration_minutes: 5,
            batch_size: DEFAULT_BATCH_SIZE,
            use_swarm: false,
            client_key: None,
            use_pool: true,
        }
    }
}

/// Result of a generation run
#[derive(Debug, Clone, Serialize)]
pub struct ScriptOutcome {
    /// Stored verbatim; length and formatting are not validated
    pub script: String,
    /// Strategy that produced the script ("single", "batched", "swarm")
    pub strategy: String,
    /// True when the batched pipeline ran
    pub batch_processed: bool,
}

/// Orchestrator over a provider, the key pool, and the model catalog
pub struct ScriptOrchestrator {
    provider: Arc<dyn ChatProvider>,
    pool: KeyPool,
    db: SqlitePool,
    env_key: Option<String>,
}

impl ScriptOrchestrator {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        pool: KeyPool,
        db: SqlitePool,
        env_key: Option<String>,
    ) -> Self {
        Self {
            provider,
            pool,
            db,
            env_key,
        }
    }

    pub fn pool(&self) -> &KeyPool {
        &self.pool
    }

    /// Generate a script for the given speeches.
    pub async fn generate(
        &self,
        speeches: &[Speech],
        options: &ScriptOptions,
    ) -> Result<ScriptOutcome, LlmError> {
        debug_assert!(!speeches.is_empty(), "caller validates speech resolution");
        let batch_size = options.batch_size.max(1);

        if options.use_swarm && speeches.len() >= SWARM_MIN_SPEECHES {
            return self.generate_swarm(speeches, options).await;
        }
        if speeches.len() > batch_size {
            return self.generate_batched(speeches, batch_size, options).await;
        }
        self.generate_single(speeches, options).await
    }

    /// Proxy a raw chat request through the same key selection and
    /// accounting as generation calls (`POST /api/openrouter`).
    pub async fn proxy_chat(
        &self,
        request: ChatRequest,
        client_key: Option<String>,
        use_pool: bool,
    ) -> Result<String, LlmError> {
        let options = ScriptOptions {
            client_key,
            use_pool,
            ..ScriptOptions::new(request.model.clone())
        };
        self.call(request, &options).await
    }

    async fn generate_single(
        &self,
        speeches: &[Speech],
        options: &ScriptOptions,
    ) -> Result<ScriptOutcome, LlmError> {
        let request = ChatRequest::new(
            &options.model,
            vec![
                ChatMessage::system(SCRIPT_WRITER_ROLE),
                ChatMessage::user(single_prompt(speeches, options)),
            ],
        );
        let script = self.call(request, options).await?;
        Ok(ScriptOutcome {
            script,
            strategy: "single".to_string(),
            batch_processed: false,
        })
    }

    async fn generate_batched(
        &self,
        speeches: &[Speech],
        batch_size: usize,
        options: &ScriptOptions,
    ) -> Result<ScriptOutcome, LlmError> {
        let mut summaries = Vec::new();
        let mut failures = Vec::new();

        for batch in speeches.chunks(batch_size) {
            let request = ChatRequest::new(
                &options.model,
                vec![
                    ChatMessage::system(SCRIPT_WRITER_ROLE),
                    ChatMessage::user(batch_summary_prompt(batch)),
                ],
            );
            match self.call(request, options).await {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    // A partial script beats no script: degrade this batch
                    // to a marker and keep going.
                    let titles = batch
                        .iter()
                        .map(|s| s.title.as_str())
                        .collect::<Vec<_>>()
                        .join(", ");
                    let marker = format!("Batch processing failed: {}", titles);
                    tracing::warn!(error = %e, titles = %titles, "Batch summary failed");
                    summaries.push(marker.clone());
                    failures.push(marker);
                }
            }
        }

        let request = ChatRequest::new(
            &options.model,
            vec![
                ChatMessage::system(SCRIPT_WRITER_ROLE),
                ChatMessage::user(synthesis_prompt(&summaries, options)),
            ],
        );
        let mut script = self.call(request, options).await?;

        // Failed batches stay visible in the stored script so the user can
        // see which material is missing.
        if !failures.is_empty() {
            script.push_str("\n\n");
            script.push_str(&failures.join("\n"));
        }

        Ok(ScriptOutcome {
            script,
            strategy: "batched".to_string(),
            batch_processed: true,
        })
    }

    async fn generate_swarm(
        &self,
        speeches: &[Speech],
        options: &ScriptOptions,
    ) -> Result<ScriptOutcome, LlmError> {
        let (first, second, third) = partition_three(speeches);

        let agent_request = |role: &str, brief: &str, slice: &[Speech]| {
            ChatRequest::new(
                &options.model,
                vec![
                    ChatMessage::system(role.to_string()),
                    ChatMessage::user(agent_prompt(brief, slice, options)),
                ],
            )
        };

        // Total join: all three agents complete (success or error) before
        // any decision is made.
        let (analysis, narrative, production) = tokio::join!(
            self.call(
                agent_request(CONTENT_ANALYST_ROLE, "themes and key claims", first),
                options
            ),
            self.call(
                agent_request(NARRATIVE_DESIGNER_ROLE, "narrative arc and transitions", second),
                options
            ),
            self.call(
                agent_request(AUDIO_PRODUCER_ROLE, "pacing, tone, and delivery notes", third),
                options
            ),
        );

        let (analysis, narrative, production) = match (analysis, narrative, production) {
            (Ok(a), Ok(n), Ok(p)) => (a, n, p),
            _ => {
                // No partial swarm result is ever returned.
                tracing::warn!("Swarm agent failed; falling back to single strategy");
                return self.generate_single(speeches, options).await;
            }
        };

        let request = ChatRequest::new(
            &options.model,
            vec![
                ChatMessage::system(SCRIPT_WRITER_ROLE),
                ChatMessage::user(swarm_synthesis_prompt(
                    &analysis,
                    &narrative,
                    &production,
                    options,
                )),
            ],
        );
        let script = self.call(request, options).await?;

        Ok(ScriptOutcome {
            script,
            strategy: "swarm".to_string(),
            batch_processed: false,
        })
    }

    /// One provider call: select a key, account for the outcome, feed the
    /// model catalog's usage statistics.
    async fn call(&self, request: ChatRequest, options: &ScriptOptions) -> Result<String, LlmError> {
        let (key, from_pool) = self.select_key(options)?;
        let started = Instant::now();
        let result = self.provider.chat(&request, &key).await;
        let elapsed_ms = started.elapsed().as_millis() as f64;

        match &result {
            Ok(_) => {
                if from_pool {
                    self.pool.mark_success(&key);
                }
            }
            Err(LlmError::RateLimited) if from_pool => {
                // Cooldown now; the call still fails upward so the caller
                // can retry against another key. No in-request retry.
                self.pool.mark_rate_limited(&key, None);
            }
            Err(LlmError::InvalidKey) if from_pool => {
                self.pool.mark_error(&key, KeyErrorKind::InvalidKey);
            }
            Err(_) if from_pool => {
                self.pool.mark_error(&key, KeyErrorKind::Other);
            }
            Err(_) => {}
        }

        if let Err(e) =
            db::models_catalog::record_usage(&self.db, &request.model, elapsed_ms, result.is_ok())
                .await
        {
            tracing::warn!(error = %e, model = %request.model, "Failed to record model usage");
        }

        result
    }

    /// Key precedence: explicit client key → pool → environment key.
    fn select_key(&self, options: &ScriptOptions) -> Result<(String, bool), LlmError> {
        if let Some(key) = &options.client_key {
            return Ok((key.clone(), false));
        }
        if options.use_pool && !self.pool.is_empty() {
            if let Some(key) = self.pool.next() {
                return Ok((key, true));
            }
            tracing::debug!("Pool keys all cooling down, trying environment key");
        }
        if let Some(key) = &self.env_key {
            return Ok((key.clone(), false));
        }
        Err(LlmError::NoAvailableKey)
    }
}

/// Three roughly equal contiguous slices.
fn partition_three(speeches: &[Speech]) -> (&[Speech], &[Speech], &[Speech]) {
    let n = speeches.len();
    let base = n / 3;
    let rem = n % 3;
    let first_end = base + usize::from(rem > 0);
    let second_end = first_end + base + usize::from(rem > 1);
    (
        &speeches[..first_end],
        &speeches[first_end..second_end],
        &speeches[second_end..],
    )
}

// ---------------------------------------------------------------------------
// Prompt assembly
// ---------------------------------------------------------------------------

const SCRIPT_WRITER_ROLE: &str =
    "You are a podcast script writer turning archived political speeches into \
     engaging narrated episodes. Respond with the script text only.";

const CONTENT_ANALYST_ROLE: &str =
    "You are a content analyst. Extract the central themes, claims, and quotable \
     moments from the provided speeches.";

const NARRATIVE_DESIGNER_ROLE: &str =
    "You are a narrative designer. Propose an episode arc with an opening hook, \
     ordered segments, and transitions for the provided speeches.";

const AUDIO_PRODUCER_ROLE: &str =
    "You are an audio producer. Note pacing, tone shifts, and delivery guidance \
     for a narrator covering the provided speeches.";

/// One digest line per speech: title, date, location, transcript excerpt.
fn speech_digest(speech: &Speech) -> String {
    let mut line = format!("- \"{}\"", speech.title);
    match &speech.date {
        Some(date) => line.push_str(&format!(" ({})", date)),
        None => line.push_str(" (undated)"),
    }
    if let Some(location) = &speech.rally_location {
        line.push_str(&format!(" at {}", location));
    }
    if let Some(transcript) = &speech.transcript {
        let excerpt: String = transcript.chars().take(EXCERPT_CHARS).collect();
        line.push_str(&format!(": {}", excerpt));
    }
    line
}

fn digests(speeches: &[Speech]) -> String {
    speeches
        .iter()
        .map(speech_digest)
        .collect::<Vec<_>>()
        .join("\n")
}

fn single_prompt(speeches: &[Speech], options: &ScriptOptions) -> String {
    format!(
        "Write a {}-minute podcast script in a {} style covering these speeches:\n{}",
        options.duration_minutes,
        options.style,
        digests(speeches)
    )
}

fn batch_summary_prompt(batch: &[Speech]) -> String {
    format!(
        "Summarize the following speeches in at most 200 words, keeping names, \
         places, and dates:\n{}",
        digests(batch)
    )
}

fn synthesis_prompt(summaries: &[String], options: &ScriptOptions) -> String {
    let numbered = summaries
        .iter()
        .enumerate()
        .map(|(i, s)| format!("Segment {}: {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Combine these segment summaries into one {}-minute podcast script in a \
         {} style:\n\n{}",
        options.duration_minutes, options.style, numbered
    )
}

fn agent_prompt(brief: &str, slice: &[Speech], options: &ScriptOptions) -> String {
    format!(
        "For a {}-minute {} podcast episode, provide {} for these speeches:\n{}",
        options.duration_minutes,
        options.style,
        brief,
        digests(slice)
    )
}

fn swarm_synthesis_prompt(
    analysis: &str,
    narrative: &str,
    production: &str,
    options: &ScriptOptions,
) -> String {
    format!(
        "Write the final {}-minute podcast script in a {} style from these three \
         specialist analyses.\n\nContent analysis:\n{}\n\nNarrative design:\n{}\n\n\
         Production notes:\n{}",
        options.duration_minutes, options.style, analysis, narrative, production
    )
}
