//! Shared fixtures for integration tests: in-memory state with scripted
//! collaborators and a router ready for `oneshot` exercises.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::Router;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use stumpcast_common::config::ServerConfig;
use stumpcast_server::llm::{ChatProvider, ChatRequest, LlmError};
use stumpcast_server::models::Speech;
use stumpcast_server::sources::{
    SourceError, SourceRegistry, SourceVerification, SpeechSource,
};
use stumpcast_server::workflow::tts::{SpeechSynthesizer, TtsError, TtsRequest, TtsResult};
use stumpcast_server::{build_router, db, AppState};

/// Chat provider that answers every prompt with a fixed script
pub struct ScriptedProvider {
    pub reply: String,
    pub calls: AtomicUsize,
    pub model_count: usize,
}

impl ScriptedProvider {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
            model_count: 50,
        })
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn chat(&self, _request: &ChatRequest, _api_key: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }

    async fn list_models(&self, _api_key: &str) -> Result<usize, LlmError> {
        Ok(self.model_count)
    }
}

/// Synthesizer that writes a placeholder wav instead of running a
/// subprocess
pub struct ScriptedSynthesizer {
    pub audio_dir: std::path::PathBuf,
}

#[async_trait]
impl SpeechSynthesizer for ScriptedSynthesizer {
    async fn generate(&self, request: &TtsRequest) -> Result<TtsResult, TtsError> {
        std::fs::create_dir_all(&self.audio_dir).ok();
        let path = self.audio_dir.join(&request.output_file);
        std::fs::write(&path, b"RIFFfake").ok();
        Ok(TtsResult {
            success: true,
            output_file: Some(path.display().to_string()),
            duration: Some(2.5),
            extra: serde_json::Map::new(),
        })
    }

    async fn list_voices(&self) -> Result<Vec<String>, TtsError> {
        Ok(vec!["default".to_string(), "statesman".to_string()])
    }

    async fn create_voice(
        &self,
        _name: &str,
        _description: &str,
        _audio_files: &[String],
    ) -> Result<TtsResult, TtsError> {
        Ok(TtsResult {
            success: true,
            output_file: None,
            duration: None,
            extra: serde_json::Map::new(),
        })
    }
}

/// Fixed-record source adapter
pub struct FixtureSource {
    pub records: Vec<Speech>,
}

#[async_trait]
impl SpeechSource for FixtureSource {
    fn name(&self) -> &'static str {
        "archive"
    }

    async fn verify(&self) -> SourceVerification {
        SourceVerification::available(200, "fixture")
    }

    async fn fetch(&self, _limit: usize) -> Result<Vec<Speech>, SourceError> {
        Ok(self.records.clone())
    }
}

/// The two S1 records: a dated Phoenix rally and an undated address.
pub fn s1_speeches() -> Vec<Speech> {
    let mut rally = Speech::new("archive_a", "Rally in Phoenix, AZ", "archive");
    rally.date = Some("2020-02-19".to_string());
    rally.rally_location = Some("Phoenix, AZ".to_string());
    let address = Speech::new("archive_b", "Address", "archive");
    vec![rally, address]
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub provider: Arc<ScriptedProvider>,
    pub root: tempfile::TempDir,
}

/// In-memory application over scripted collaborators. The catalog starts
/// empty; seed through the fixture source + refresh, or directly via
/// `db::speeches::upsert_speeches`.
pub async fn test_app(reply: &str) -> TestApp {
    let pool = db::init_memory_pool().await.unwrap();
    db::models_catalog::seed_default_models(&pool).await.unwrap();

    let mut registry = SourceRegistry::new();
    registry.register(Arc::new(FixtureSource {
        records: s1_speeches(),
    }));

    let provider = ScriptedProvider::new(reply);
    let root = tempfile::tempdir().unwrap();

    let config = ServerConfig {
        port: 0,
        openrouter_api_key: Some("sk-or-server".to_string()),
        openrouter_test_key: None,
        youtube_api_key: None,
        production: false,
        event_retention_days: 30,
    };

    let state = AppState::new(
        pool,
        config,
        registry,
        provider.clone(),
        Arc::new(ScriptedSynthesizer {
            audio_dir: root.path().join("audio"),
        }),
        root.path().to_path_buf(),
    );

    TestApp {
        router: build_router(state.clone()),
        state,
        provider,
        root,
    }
}

/// Seed the catalog with the S1 records.
pub async fn seed_catalog(app: &TestApp) {
    db::speeches::upsert_speeches(&app.state.db, &s1_speeches())
        .await
        .unwrap();
}

pub fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

pub fn post_json(path: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
}
