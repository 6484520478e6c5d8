//! Domain models for stumpcast

mod curated_model;
mod records;
mod speech;
mod workflow;

pub use curated_model::{CuratedModel, ModelCategory};
pub use records::{EventRecord, FeedbackRecord, KeyValidation, VALIDATION_TTL_SECONDS};
pub use speech::{Speech, SpeechStatus};
pub use workflow::{Workflow, WorkflowStatus};
