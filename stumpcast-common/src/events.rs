//! Event types for the stumpcast event system
//!
//! Components emit domain events on the `EventBus`; observers (the
//! analytics recorder, tests) subscribe without coupling to the emitter.
//! The persistent event log is derived from this stream — the bus itself
//! is transient and lossy by design.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Domain events broadcast across the service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StumpcastEvent {
    /// Background ingestion pass started
    IngestStarted {
        /// When ingestion started
        timestamp: DateTime<Utc>,
    },

    /// A single source adapter failed during fan-out
    ///
    /// Per-source failures are isolated; this event is the observable trace.
    SourceFetchFailed {
        /// Adapter name (registry key)
        source: String,
        /// Failure message from the adapter
        error: String,
        /// When the failure was recorded
        timestamp: DateTime<Utc>,
    },

    /// Ingestion pass completed (possibly with per-source errors)
    IngestCompleted {
        /// Speeches already present before the pass
        existing: i64,
        /// Newly inserted speeches
        inserted: usize,
        /// Per-source error count
        errors: usize,
        /// When ingestion finished
        timestamp: DateTime<Utc>,
    },

    /// Workflow created in `draft`
    WorkflowCreated {
        /// Workflow identifier
        workflow_id: Uuid,
        /// Number of selected speeches
        speech_count: usize,
        /// Creation time
        timestamp: DateTime<Utc>,
    },

    /// Workflow advanced a stage
    WorkflowTransitioned {
        /// Workflow identifier
        workflow_id: Uuid,
        /// Status before the transition
        old_status: String,
        /// Status after the transition
        new_status: String,
        /// When the transition was persisted
        timestamp: DateTime<Utc>,
    },

    /// Script generation succeeded
    ScriptGenerated {
        /// Workflow identifier
        workflow_id: Uuid,
        /// Model id used for the final synthesis call
        model: String,
        /// Strategy chosen ("single", "batched", "swarm")
        strategy: String,
        /// Script length in characters
        script_chars: usize,
        /// Completion time
        timestamp: DateTime<Utc>,
    },

    /// Audio generation completed (possibly via the fallback path)
    AudioGenerated {
        /// Workflow identifier
        workflow_id: Uuid,
        /// True when the TTS worker failed and a placeholder path was recorded
        fallback: bool,
        /// Completion time
        timestamp: DateTime<Utc>,
    },

    /// HTTP request handled (feeds the analytics event log)
    RequestHandled {
        /// HTTP method
        method: String,
        /// Request path
        path: String,
        /// Response status code
        status: u16,
        /// Client address, if known
        ip: Option<String>,
        /// User-Agent header, if present
        user_agent: Option<String>,
        /// When the response was produced
        timestamp: DateTime<Utc>,
    },
}

impl StumpcastEvent {
    /// Event-type string used as the event log discriminator.
    pub fn event_type(&self) -> &'static str {
        match self {
            StumpcastEvent::IngestStarted { .. } => "ingest_started",
            StumpcastEvent::SourceFetchFailed { .. } => "source_fetch_failed",
            StumpcastEvent::IngestCompleted { .. } => "ingest_completed",
            StumpcastEvent::WorkflowCreated { .. } => "workflow_created",
            StumpcastEvent::WorkflowTransitioned { .. } => "workflow_transitioned",
            StumpcastEvent::ScriptGenerated { .. } => "script_generated",
            StumpcastEvent::AudioGenerated { .. } => "audio_generated",
            StumpcastEvent::RequestHandled { .. } => "request_handled",
        }
    }
}

/// Broadcast event bus
///
/// Wraps `tokio::sync::broadcast`: subscribers receive events emitted after
/// they subscribe; slow subscribers lag and drop, they never block emitters.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StumpcastEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<StumpcastEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring the no-subscriber case.
    ///
    /// Events are observability, not control flow; emitters never fail
    /// because nobody is listening.
    pub fn emit_lossy(&self, event: StumpcastEvent) {
        let _ = self.tx.send(event);
    }

    /// Current subscriber count (used by health reporting).
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
