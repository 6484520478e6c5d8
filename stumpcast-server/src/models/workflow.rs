//! Workflow state machine
//!
//! A workflow carries a user's podcast job through four stages:
//!
//! draft → script_generated ≡ script_uploaded → audio_generated → finalized

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Workflow stage
///
/// `ScriptGenerated` and `ScriptUploaded` are equivalent entry points into
/// the audio stage; they differ only in provenance of the script text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Draft,
    ScriptGenerated,
    ScriptUploaded,
    AudioGenerated,
    Finalized,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Draft => "draft",
            WorkflowStatus::ScriptGenerated => "script_generated",
            WorkflowStatus::ScriptUploaded => "script_uploaded",
            WorkflowStatus::AudioGenerated => "audio_generated",
            WorkflowStatus::Finalized => "finalized",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(WorkflowStatus::Draft),
            "script_generated" => Some(WorkflowStatus::ScriptGenerated),
            "script_uploaded" => Some(WorkflowStatus::ScriptUploaded),
            "audio_generated" => Some(WorkflowStatus::AudioGenerated),
            "finalized" => Some(WorkflowStatus::Finalized),
            _ => None,
        }
    }

    /// Pipeline stage ordinal. The two script states share a stage.
    fn stage(&self) -> u8 {
        match self {
            WorkflowStatus::Draft => 0,
            WorkflowStatus::ScriptGenerated | WorkflowStatus::ScriptUploaded => 1,
            WorkflowStatus::AudioGenerated => 2,
            WorkflowStatus::Finalized => 3,
        }
    }

    /// Whether a transition to `next` preserves monotonic stage advance.
    ///
    /// Re-entering the current stage is allowed (regenerate a script,
    /// re-run audio); moving backwards is not, and `finalized` is terminal.
    pub fn can_advance_to(&self, next: WorkflowStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.stage() >= self.stage()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Finalized)
    }
}

/// A podcast assembly job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    /// Ordered, non-empty list of Speech ids; resolved by lookup at
    /// transition time, never held as references
    pub speech_ids: Vec<String>,
    pub script: Option<String>,
    pub audio_url: Option<String>,
    pub rss_url: Option<String>,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, speech_ids: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            speech_ids,
            script: None,
            audio_url: None,
            rss_url: None,
            status: WorkflowStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }
}
