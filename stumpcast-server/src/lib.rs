//! stumpcast-server library interface
//!
//! Exposes application state, the router, and component modules for the
//! binary and the integration tests.

pub mod api;
pub mod db;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod sources;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult};

use crate::ingest::IngestEngine;
use crate::llm::{ChatProvider, KeyPool, KeyValidator, ScriptOrchestrator};
use crate::sources::SourceRegistry;
use crate::workflow::tts::SpeechSynthesizer;
use crate::workflow::WorkflowEngine;
use axum::{extract::DefaultBodyLimit, middleware, Router};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use stumpcast_common::config::ServerConfig;
use stumpcast_common::events::{EventBus, StumpcastEvent};
use tower_http::cors::CorsLayer;

/// JSON body ceiling
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Application state shared across handlers
///
/// All components are constructed once at startup and passed by reference;
/// tests build isolated instances over in-memory stores and stub
/// collaborators.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: ServerConfig,
    pub event_bus: EventBus,
    pub ingest: Arc<IngestEngine>,
    pub workflows: Arc<WorkflowEngine>,
    pub orchestrator: Arc<ScriptOrchestrator>,
    pub key_pool: KeyPool,
    pub validator: Arc<KeyValidator>,
    pub provider: Arc<dyn ChatProvider>,
    pub root: PathBuf,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        config: ServerConfig,
        registry: SourceRegistry,
        provider: Arc<dyn ChatProvider>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        root: PathBuf,
    ) -> Self {
        let event_bus = EventBus::new(256);
        let key_pool = KeyPool::new();

        let orchestrator = Arc::new(ScriptOrchestrator::new(
            provider.clone(),
            key_pool.clone(),
            db.clone(),
            config.openrouter_api_key.clone(),
        ));
        let ingest = Arc::new(IngestEngine::new(
            db.clone(),
            registry,
            event_bus.clone(),
        ));
        let workflows = Arc::new(WorkflowEngine::new(
            db.clone(),
            orchestrator.clone(),
            synthesizer,
            root.clone(),
            event_bus.clone(),
        ));
        let validator = Arc::new(KeyValidator::new(db.clone(), provider.clone()));

        Self {
            db,
            config,
            event_bus,
            ingest,
            workflows,
            orchestrator,
            key_pool,
            validator,
            provider,
            root,
            startup_time: Utc::now(),
        }
    }
}

/// Build the application router with all cross-cutting layers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health::routes())
        .merge(api::catalog::routes())
        .merge(api::workflow::routes())
        .merge(api::keys::routes())
        .merge(api::models::routes())
        .merge(api::feedback::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::middleware::track_requests,
        ))
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Persist bus events into the append-only event log.
///
/// The recorder is an ordinary subscriber; emitters never block on it and
/// a write failure only logs.
pub fn spawn_event_recorder(db: SqlitePool, event_bus: &EventBus) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let (ip, user_agent) = match &event {
                        StumpcastEvent::RequestHandled {
                            ip, user_agent, ..
                        } => (ip.clone(), user_agent.clone()),
                        _ => (None, None),
                    };
                    let record = models::EventRecord {
                        event_type: event.event_type().to_string(),
                        data: serde_json::to_value(&event).unwrap_or_default(),
                        ip,
                        user_agent,
                        created_at: Utc::now(),
                    };
                    if let Err(e) = db::events::append_event(&db, &record).await {
                        tracing::warn!(error = %e, "Failed to persist event");
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Event recorder lagged, events dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
