//! Ingestion engine
//!
//! Fans out to every registered source adapter, aggregates results with
//! per-source error isolation, and upserts into the catalog. Launched in
//! the background at startup and on explicit refresh; failures are logged
//! and reported, never propagated into user requests.

use crate::db;
use crate::models::Speech;
use crate::sources::{SourceRegistry, SourceVerification};
use serde::Serialize;
use sqlx::SqlitePool;
use stumpcast_common::events::{EventBus, StumpcastEvent};
use stumpcast_common::Result;

/// Store size above which `populate_archive` is a no-op
const POPULATE_THRESHOLD: i64 = 10;
/// Per-source fetch cap for a populate pass
const FETCH_LIMIT: usize = 50;

/// One isolated source failure
#[derive(Debug, Clone, Serialize)]
pub struct SourceFailure {
    pub source: String,
    pub error: String,
}

/// Outcome of a populate / refresh pass
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Rows present before the pass
    pub existing: i64,
    /// Rows added by the pass
    pub inserted: usize,
    /// Rows present after the pass
    pub total: i64,
    pub errors: Vec<SourceFailure>,
    /// True when the threshold short-circuited the pass
    pub skipped: bool,
}

/// Multi-source crawler over the adapter registry
pub struct IngestEngine {
    db: SqlitePool,
    registry: SourceRegistry,
    event_bus: EventBus,
}

impl IngestEngine {
    pub fn new(db: SqlitePool, registry: SourceRegistry, event_bus: EventBus) -> Self {
        Self {
            db,
            registry,
            event_bus,
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Populate the catalog unless it already holds more than the
    /// threshold. Returns a report either way.
    pub async fn populate_archive(&self) -> Result<IngestReport> {
        let existing = db::speeches::count_speeches(&self.db).await?;
        if existing > POPULATE_THRESHOLD {
            tracing::info!(existing, "Archive already populated, skipping ingest");
            return Ok(IngestReport {
                existing,
                inserted: 0,
                total: existing,
                errors: Vec::new(),
                skipped: true,
            });
        }
        self.run_pass(existing).await
    }

    /// Explicit refresh: always runs a full pass, threshold ignored.
    pub async fn refresh_archive(&self) -> Result<IngestReport> {
        let existing = db::speeches::count_speeches(&self.db).await?;
        self.run_pass(existing).await
    }

    async fn run_pass(&self, existing: i64) -> Result<IngestReport> {
        self.event_bus.emit_lossy(StumpcastEvent::IngestStarted {
            timestamp: chrono::Utc::now(),
        });

        let verifications = self.verify_all_sources().await;
        for (source, verification) in &verifications {
            tracing::info!(
                source,
                available = verification.available,
                "Source verification"
            );
        }

        let (records, errors) = self.fetch_from_all_sources(FETCH_LIMIT).await;
        let inserted = db::speeches::upsert_speeches(&self.db, &records).await?;
        let total = db::speeches::count_speeches(&self.db).await?;

        self.event_bus.emit_lossy(StumpcastEvent::IngestCompleted {
            existing,
            inserted,
            errors: errors.len(),
            timestamp: chrono::Utc::now(),
        });

        tracing::info!(
            existing,
            inserted,
            total,
            error_count = errors.len(),
            "Ingest pass complete"
        );

        Ok(IngestReport {
            existing,
            inserted,
            total,
            errors,
            skipped: false,
        })
    }

    /// Probe every adapter; never fails, each probe reports independently.
    pub async fn verify_all_sources(&self) -> Vec<(String, SourceVerification)> {
        let mut results = Vec::with_capacity(self.registry.len());
        for source in self.registry.iter() {
            let verification = source.verify().await;
            results.push((source.name().to_string(), verification));
        }
        results
    }

    /// Fetch from every adapter sequentially with per-source isolation:
    /// one adapter's failure never discards another's results.
    pub async fn fetch_from_all_sources(
        &self,
        limit: usize,
    ) -> (Vec<Speech>, Vec<SourceFailure>) {
        let mut records = Vec::new();
        let mut errors = Vec::new();

        for source in self.registry.iter() {
            match source.fetch(limit).await {
                Ok(mut fetched) => {
                    tracing::debug!(
                        source = source.name(),
                        count = fetched.len(),
                        "Source fetch complete"
                    );
                    records.append(&mut fetched);
                }
                Err(e) => {
                    tracing::warn!(source = source.name(), error = %e, "Source fetch failed");
                    self.event_bus.emit_lossy(StumpcastEvent::SourceFetchFailed {
                        source: source.name().to_string(),
                        error: e.to_string(),
                        timestamp: chrono::Utc::now(),
                    });
                    errors.push(SourceFailure {
                        source: source.name().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        (records, errors)
    }
}
