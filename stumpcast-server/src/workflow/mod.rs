//! Workflow engine
//!
//! Drives a job through draft → script → audio → finalized, enforcing stage
//! preconditions, persisting every transition, and orchestrating the LLM
//! and TTS collaborators. A failed script generation leaves the workflow
//! untouched; a failed synthesis records a fallback audio path and still
//! advances, so a user can reach `finalized` with a placeholder.

pub mod feed;
pub mod tts;

use crate::db;
use crate::db::workflows::WorkflowUpdate;
use crate::llm::{LlmError, ScriptOptions, ScriptOrchestrator, ScriptOutcome};
use crate::models::{Speech, Workflow, WorkflowStatus};
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use stumpcast_common::events::{EventBus, StumpcastEvent};
use stumpcast_common::{Error, Result};
use tts::{SpeechSynthesizer, TtsRequest, TtsResult};
use uuid::Uuid;

/// Upload ceiling for script text
pub const MAX_SCRIPT_CHARS: usize = 50_000;

/// Outcome of the audio stage
#[derive(Debug, Clone, Serialize)]
pub struct AudioOutcome {
    pub audio_url: String,
    /// True when the worker failed and the path is a placeholder
    pub fallback: bool,
    pub result: TtsResult,
}

/// Outcome of finalization
#[derive(Debug, Clone, Serialize)]
pub struct FinalizeOutcome {
    pub rss_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_path: Option<String>,
}

/// Engine over the store, the orchestrator, and the TTS worker
pub struct WorkflowEngine {
    db: SqlitePool,
    orchestrator: Arc<ScriptOrchestrator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    root: PathBuf,
    event_bus: EventBus,
}

impl WorkflowEngine {
    pub fn new(
        db: SqlitePool,
        orchestrator: Arc<ScriptOrchestrator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        root: PathBuf,
        event_bus: EventBus,
    ) -> Self {
        Self {
            db,
            orchestrator,
            synthesizer,
            root,
            event_bus,
        }
    }

    pub fn synthesizer(&self) -> &Arc<dyn SpeechSynthesizer> {
        &self.synthesizer
    }

    /// Create a workflow in `draft`. Every selected speech must exist.
    pub async fn create(&self, name: &str, speech_ids: Vec<String>) -> Result<Workflow> {
        if speech_ids.is_empty() {
            return Err(Error::InvalidInput(
                "speechIds must be a non-empty list".to_string(),
            ));
        }
        db::speeches::resolve_speeches(&self.db, &speech_ids).await?;

        let workflow = Workflow::new(name, speech_ids);
        db::workflows::create_workflow(&self.db, &workflow).await?;

        self.event_bus.emit_lossy(StumpcastEvent::WorkflowCreated {
            workflow_id: workflow.id,
            speech_count: workflow.speech_ids.len(),
            timestamp: chrono::Utc::now(),
        });
        tracing::info!(workflow_id = %workflow.id, name = %workflow.name, "Workflow created");

        Ok(workflow)
    }

    /// Load a workflow with its speeches resolved for display.
    ///
    /// Resolution here is lenient: a speech deleted after selection is
    /// omitted rather than failing the read. Transitions stay strict.
    pub async fn get_with_speeches(&self, id: Uuid) -> Result<(Workflow, Vec<Speech>)> {
        let workflow = self.require(id).await?;
        let mut speeches = Vec::with_capacity(workflow.speech_ids.len());
        for speech_id in &workflow.speech_ids {
            match db::speeches::resolve_speeches(&self.db, std::slice::from_ref(speech_id)).await {
                Ok(mut resolved) => speeches.append(&mut resolved),
                Err(Error::NotFound(_)) => {
                    tracing::warn!(workflow_id = %id, speech_id, "Selected speech no longer exists");
                }
                Err(e) => return Err(e),
            }
        }
        Ok((workflow, speeches))
    }

    /// Generate a script via the orchestrator and advance to
    /// `script_generated`. On failure the workflow is left unchanged — no
    /// partial script write.
    pub async fn generate_script(
        &self,
        id: Uuid,
        options: ScriptOptions,
    ) -> Result<(Workflow, ScriptOutcome)> {
        let workflow = self.require(id).await?;
        self.check_transition(&workflow, WorkflowStatus::ScriptGenerated)?;

        let speeches = db::speeches::resolve_speeches(&self.db, &workflow.speech_ids).await?;
        if speeches.is_empty() {
            return Err(Error::InvalidInput(
                "Workflow has no resolvable speeches".to_string(),
            ));
        }

        let outcome = self
            .orchestrator
            .generate(&speeches, &options)
            .await
            .map_err(map_llm_error)?;

        let updated = self
            .transition(
                &workflow,
                WorkflowStatus::ScriptGenerated,
                WorkflowUpdate {
                    script: Some(outcome.script.clone()),
                    ..Default::default()
                },
            )
            .await?;

        self.event_bus.emit_lossy(StumpcastEvent::ScriptGenerated {
            workflow_id: id,
            model: options.model.clone(),
            strategy: outcome.strategy.clone(),
            script_chars: outcome.script.chars().count(),
            timestamp: chrono::Utc::now(),
        });

        Ok((updated, outcome))
    }

    /// Overwrite the script with user-provided text and advance to
    /// `script_uploaded`.
    pub async fn upload_script(&self, id: Uuid, text: &str) -> Result<Workflow> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("Script must not be empty".to_string()));
        }
        let length = text.chars().count();
        if length > MAX_SCRIPT_CHARS {
            return Err(Error::InvalidInput(format!(
                "Script exceeds {} characters (got {})",
                MAX_SCRIPT_CHARS, length
            )));
        }

        let workflow = self.require(id).await?;
        self.check_transition(&workflow, WorkflowStatus::ScriptUploaded)?;

        self.transition(
            &workflow,
            WorkflowStatus::ScriptUploaded,
            WorkflowUpdate {
                script: Some(text.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    /// Synthesize audio for the stored script and advance to
    /// `audio_generated`. Worker failure records a fallback path and still
    /// advances, flagged in the outcome.
    pub async fn generate_audio(
        &self,
        id: Uuid,
        voice: &str,
        preset: &str,
        custom_voice: Option<PathBuf>,
    ) -> Result<(Workflow, AudioOutcome)> {
        let workflow = self.require(id).await?;
        let Some(script) = workflow.script.clone() else {
            return Err(Error::InvalidInput(
                "Script required before audio generation".to_string(),
            ));
        };
        self.check_transition(&workflow, WorkflowStatus::AudioGenerated)?;

        std::fs::create_dir_all(self.root.join("audio"))?;
        let output_file = format!("{}.wav", id);
        let request = TtsRequest {
            text: tts::normalize_for_tts(&script),
            voice: voice.to_string(),
            preset: preset.to_string(),
            output_file: output_file.clone(),
            custom_voice,
        };

        let audio_url = format!("/audio/{}", output_file);
        let (result, fallback) = match self.synthesizer.generate(&request).await {
            Ok(result) if result.success => (result, false),
            Ok(result) => {
                tracing::warn!(workflow_id = %id, "TTS worker reported failure, recording fallback audio path");
                (result, true)
            }
            Err(e) => {
                tracing::warn!(workflow_id = %id, error = %e, "TTS worker failed, recording fallback audio path");
                let mut extra = serde_json::Map::new();
                extra.insert("error".to_string(), serde_json::Value::String(e.to_string()));
                (
                    TtsResult {
                        success: false,
                        output_file: None,
                        duration: None,
                        extra,
                    },
                    true,
                )
            }
        };

        let updated = self
            .transition(
                &workflow,
                WorkflowStatus::AudioGenerated,
                WorkflowUpdate {
                    audio_url: Some(audio_url.clone()),
                    ..Default::default()
                },
            )
            .await?;

        self.event_bus.emit_lossy(StumpcastEvent::AudioGenerated {
            workflow_id: id,
            fallback,
            timestamp: chrono::Utc::now(),
        });

        Ok((
            updated,
            AudioOutcome {
                audio_url,
                fallback,
                result,
            },
        ))
    }

    /// Package the workflow into a bundle or standalone feed and advance to
    /// `finalized`. Requires both a script and an audio path.
    pub async fn finalize(
        &self,
        id: Uuid,
        title: Option<String>,
        description: Option<String>,
        local_bundle: bool,
    ) -> Result<(Workflow, FinalizeOutcome)> {
        let workflow = self.require(id).await?;
        let (Some(script), Some(audio_url)) = (workflow.script.clone(), workflow.audio_url.clone())
        else {
            return Err(Error::InvalidInput(
                "Workflow needs both a script and audio before finalizing".to_string(),
            ));
        };
        self.check_transition(&workflow, WorkflowStatus::Finalized)?;

        let title = title.unwrap_or_else(|| workflow.name.clone());
        let description = description.unwrap_or_else(|| {
            format!(
                "Podcast assembled from {} archived speeches",
                workflow.speech_ids.len()
            )
        });

        // `/audio/<file>` recorded at the audio stage maps onto the disk
        // layout under the root folder.
        let audio_file = audio_url
            .rsplit('/')
            .next()
            .map(|name| self.root.join("audio").join(name));

        let outcome = if local_bundle {
            let paths = feed::write_bundle(
                &self.root,
                id,
                &title,
                &description,
                Some(&script),
                audio_file.as_deref(),
            )?;
            FinalizeOutcome {
                rss_url: format!("/bundles/{}/podcast.xml", id),
                bundle_path: Some(paths.dir.display().to_string()),
            }
        } else {
            feed::write_standalone_feed(
                &self.root,
                id,
                &title,
                &description,
                Some(&script),
                Some(&audio_url),
            )?;
            FinalizeOutcome {
                rss_url: format!("/rss/{}.xml", id),
                bundle_path: None,
            }
        };

        let updated = self
            .transition(
                &workflow,
                WorkflowStatus::Finalized,
                WorkflowUpdate {
                    rss_url: Some(outcome.rss_url.clone()),
                    ..Default::default()
                },
            )
            .await?;

        Ok((updated, outcome))
    }

    async fn require(&self, id: Uuid) -> Result<Workflow> {
        db::workflows::get_workflow(&self.db, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Workflow not found: {}", id)))
    }

    fn check_transition(&self, workflow: &Workflow, next: WorkflowStatus) -> Result<()> {
        if !workflow.status.can_advance_to(next) {
            return Err(Error::InvalidInput(format!(
                "Cannot move workflow from {} to {}",
                workflow.status.as_str(),
                next.as_str()
            )));
        }
        Ok(())
    }

    /// Persist a transition and broadcast it.
    async fn transition(
        &self,
        workflow: &Workflow,
        next: WorkflowStatus,
        mut update: WorkflowUpdate,
    ) -> Result<Workflow> {
        update.status = Some(next);
        let updated = db::workflows::update_workflow(&self.db, workflow.id, update).await?;

        self.event_bus
            .emit_lossy(StumpcastEvent::WorkflowTransitioned {
                workflow_id: workflow.id,
                old_status: workflow.status.as_str().to_string(),
                new_status: next.as_str().to_string(),
                timestamp: chrono::Utc::now(),
            });
        tracing::info!(
            workflow_id = %workflow.id,
            from = workflow.status.as_str(),
            to = next.as_str(),
            "Workflow transition"
        );

        Ok(updated)
    }
}

/// Typed LLM failures mapped onto the shared error taxonomy; the HTTP edge
/// turns these into status codes.
fn map_llm_error(error: LlmError) -> Error {
    match error {
        LlmError::RateLimited => Error::RateLimited(
            "Provider rate limited the request; retry shortly or add pool keys".to_string(),
        ),
        LlmError::InvalidKey => Error::Unauthorized("Invalid API key".to_string()),
        LlmError::InsufficientPermissions => {
            Error::Unauthorized("API key lacks required permissions".to_string())
        }
        LlmError::NoAvailableKey => Error::Unauthorized(
            "No API key available: supply one with the request or configure the pool".to_string(),
        ),
        LlmError::Network(message) => Error::Upstream(format!("Provider unreachable: {}", message)),
        LlmError::Api(status, message) => {
            Error::Upstream(format!("Provider returned {}: {}", status, message))
        }
        LlmError::Parse(message) => {
            Error::Upstream(format!("Provider response unusable: {}", message))
        }
    }
}
