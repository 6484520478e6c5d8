//! Workflow endpoints: creation, script stages, audio, finalization

use crate::llm::ScriptOptions;
use crate::models::{Speech, Workflow};
use crate::workflow::tts::TtsResult;
use crate::{ApiResult, AppState};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use stumpcast_common::Error;
use uuid::Uuid;

fn parse_workflow_id(raw: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(raw).map_err(|_| Error::InvalidInput(format!("Invalid workflow id: {}", raw)))
}

fn client_key(headers: &HeaderMap, body_key: Option<String>) -> Option<String> {
    body_key.or_else(|| {
        headers
            .get("x-openrouter-key")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkflowRequest {
    pub name: String,
    #[serde(default)]
    pub speech_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResponse {
    pub workflow_id: Uuid,
    pub name: String,
    pub status: String,
    pub speech_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rss_url: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Workflow> for WorkflowResponse {
    fn from(workflow: Workflow) -> Self {
        Self {
            workflow_id: workflow.id,
            name: workflow.name,
            status: workflow.status.as_str().to_string(),
            speech_ids: workflow.speech_ids,
            script: workflow.script,
            audio_url: workflow.audio_url,
            rss_url: workflow.rss_url,
            created_at: workflow.created_at,
            updated_at: workflow.updated_at,
        }
    }
}

/// POST /api/workflow
pub async fn create_workflow(
    State(state): State<AppState>,
    Json(request): Json<CreateWorkflowRequest>,
) -> ApiResult<Json<WorkflowResponse>> {
    if request.name.trim().is_empty() {
        return Err(Error::InvalidInput("name must not be empty".to_string()).into());
    }
    let workflow = state
        .workflows
        .create(request.name.trim(), request.speech_ids)
        .await?;
    Ok(Json(workflow.into()))
}

#[derive(Debug, Serialize)]
pub struct WorkflowDetailResponse {
    #[serde(flatten)]
    pub workflow: WorkflowResponse,
    pub speeches: Vec<Speech>,
}

/// GET /api/workflow/:id
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<WorkflowDetailResponse>> {
    let id = parse_workflow_id(&id)?;
    let (workflow, speeches) = state.workflows.get_with_speeches(id).await?;
    Ok(Json(WorkflowDetailResponse {
        workflow: workflow.into(),
        speeches,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadScriptRequest {
    pub workflow_id: String,
    pub script: String,
}

/// POST /api/upload-script
pub async fn upload_script(
    State(state): State<AppState>,
    Json(request): Json<UploadScriptRequest>,
) -> ApiResult<Json<WorkflowResponse>> {
    let id = parse_workflow_id(&request.workflow_id)?;
    let workflow = state.workflows.upload_script(id, &request.script).await?;
    Ok(Json(workflow.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateScriptRequest {
    pub workflow_id: String,
    pub model: String,
    pub style: Option<String>,
    pub duration: Option<u32>,
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub use_swarm: bool,
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateScriptResponse {
    pub script: String,
    pub strategy: String,
    pub batch_processed: bool,
    pub status: String,
}

/// POST /api/generate-script
pub async fn generate_script(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<GenerateScriptRequest>,
) -> ApiResult<Json<GenerateScriptResponse>> {
    let id = parse_workflow_id(&request.workflow_id)?;
    if request.model.trim().is_empty() {
        return Err(Error::InvalidInput("model must not be empty".to_string()).into());
    }

    let mut options = ScriptOptions::new(request.model.trim());
    if let Some(style) = request.style {
        options.style = style;
    }
    if let Some(duration) = request.duration {
        options.duration_minutes = duration.clamp(1, 120);
    }
    if let Some(batch_size) = request.batch_size {
        options.batch_size = batch_size.clamp(1, 100);
    }
    options.use_swarm = request.use_swarm;
    options.client_key = client_key(&headers, request.api_key);

    let (workflow, outcome) = state.workflows.generate_script(id, options).await?;
    Ok(Json(GenerateScriptResponse {
        script: outcome.script,
        strategy: outcome.strategy,
        batch_processed: outcome.batch_processed,
        status: workflow.status.as_str().to_string(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateAudioRequest {
    pub workflow_id: String,
    pub voice: Option<String>,
    pub preset: Option<String>,
    /// Accepted for compatibility; synthesis always runs the local worker
    #[serde(default)]
    pub use_local: bool,
    pub custom_voice_path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateAudioResponse {
    pub audio_url: String,
    pub fallback: bool,
    pub tts_result: TtsResult,
    pub status: String,
}

/// POST /api/generate-audio
pub async fn generate_audio(
    State(state): State<AppState>,
    Json(request): Json<GenerateAudioRequest>,
) -> ApiResult<Json<GenerateAudioResponse>> {
    let id = parse_workflow_id(&request.workflow_id)?;
    let voice = request.voice.as_deref().unwrap_or("default");
    let preset = request.preset.as_deref().unwrap_or("fast");
    let custom_voice = request.custom_voice_path.map(PathBuf::from);

    let (workflow, outcome) = state
        .workflows
        .generate_audio(id, voice, preset, custom_voice)
        .await?;
    Ok(Json(GenerateAudioResponse {
        audio_url: outcome.audio_url,
        fallback: outcome.fallback,
        tts_result: outcome.result,
        status: workflow.status.as_str().to_string(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub workflow_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default = "default_local_bundle")]
    pub local_bundle: bool,
}

fn default_local_bundle() -> bool {
    true
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
    pub rss_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_path: Option<String>,
    pub status: String,
}

/// POST /api/finalize
pub async fn finalize(
    State(state): State<AppState>,
    Json(request): Json<FinalizeRequest>,
) -> ApiResult<Json<FinalizeResponse>> {
    let id = parse_workflow_id(&request.workflow_id)?;
    let (workflow, outcome) = state
        .workflows
        .finalize(id, request.title, request.description, request.local_bundle)
        .await?;
    Ok(Json(FinalizeResponse {
        rss_url: outcome.rss_url,
        bundle_path: outcome.bundle_path,
        status: workflow.status.as_str().to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct VoicesResponse {
    pub voices: Vec<String>,
}

/// GET /api/voices
pub async fn list_voices(State(state): State<AppState>) -> ApiResult<Json<VoicesResponse>> {
    let voices = state
        .workflows
        .synthesizer()
        .list_voices()
        .await
        .map_err(|e| Error::Upstream(format!("TTS worker unavailable: {}", e)))?;
    Ok(Json(VoicesResponse { voices }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/workflow", post(create_workflow))
        .route("/api/workflow/:id", get(get_workflow))
        .route("/api/upload-script", post(upload_script))
        .route("/api/generate-script", post(generate_script))
        .route("/api/generate-audio", post(generate_audio))
        .route("/api/finalize", post(finalize))
        .route("/api/voices", get(list_voices))
}
