//! stumpcast-server — podcast assembly service
//!
//! Wires configuration, the catalog store, the source registry, the LLM
//! stack, and the workflow engine into an axum application. Ingestion runs
//! in the background; the server accepts requests immediately.

use anyhow::Result;
use std::sync::Arc;
use stumpcast_common::config::{resolve_root_folder, ServerConfig};
use stumpcast_server::llm::OpenRouterClient;
use stumpcast_server::sources::SourceRegistry;
use stumpcast_server::workflow::tts::TtsWorker;
use stumpcast_server::{build_router, db, error, spawn_event_recorder, AppState};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Subject whose speeches the shipped adapters target
const DEFAULT_SUBJECT: &str = "Trump";
/// TTS worker executable; resolved via PATH unless overridden
const TTS_WORKER_ENV: &str = "STUMPCAST_TTS_WORKER";

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting stumpcast-server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();
    error::set_production_mode(config.production);

    let cli_root = std::env::args().nth(1);
    let root = resolve_root_folder(cli_root.as_deref(), "STUMPCAST_ROOT")?;
    std::fs::create_dir_all(&root)?;
    info!("Root folder: {}", root.display());

    let db_pool = db::init_database_pool(&root.join("archive.db")).await?;
    let seeded = db::models_catalog::seed_default_models(&db_pool).await?;
    if seeded > 0 {
        info!(seeded, "Seeded curated model catalog");
    }

    let registry = SourceRegistry::default_set(DEFAULT_SUBJECT, config.youtube_api_key.clone());
    info!(sources = ?registry.names(), "Source registry initialized");

    let provider = Arc::new(
        OpenRouterClient::new().map_err(|e| anyhow::anyhow!("HTTP client init failed: {}", e))?,
    );
    let tts_program = std::env::var(TTS_WORKER_ENV).unwrap_or_else(|_| "stumpcast-tts".to_string());
    let synthesizer = Arc::new(TtsWorker::new(tts_program, root.join("audio")));

    let state = AppState::new(
        db_pool.clone(),
        config.clone(),
        registry,
        provider,
        synthesizer,
        root,
    );

    // Analytics recorder drains the bus into the event log.
    spawn_event_recorder(db_pool, &state.event_bus);

    // Background ingest; errors are logged, never surfaced to requests.
    let ingest = state.ingest.clone();
    tokio::spawn(async move {
        match ingest.populate_archive().await {
            Ok(report) if report.skipped => {
                info!(existing = report.existing, "Startup ingest skipped")
            }
            Ok(report) => info!(
                inserted = report.inserted,
                total = report.total,
                errors = report.errors.len(),
                "Startup ingest complete"
            ),
            Err(e) => tracing::error!(error = %e, "Startup ingest failed"),
        }
    });

    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
