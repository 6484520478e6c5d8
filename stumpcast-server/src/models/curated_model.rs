//! Curated LLM catalog entry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog grouping for a curated model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelCategory {
    TopOverall,
    TopFree,
    Discovered,
    Fallback,
}

impl ModelCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelCategory::TopOverall => "top_overall",
            ModelCategory::TopFree => "top_free",
            ModelCategory::Discovered => "discovered",
            ModelCategory::Fallback => "fallback",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "top_overall" => Some(ModelCategory::TopOverall),
            "top_free" => Some(ModelCategory::TopFree),
            "discovered" => Some(ModelCategory::Discovered),
            "fallback" => Some(ModelCategory::Fallback),
            _ => None,
        }
    }
}

/// LLM catalog entry with rolling usage statistics
///
/// Seeded from the built-in default set at startup, refreshed from the live
/// provider catalog on demand. `usage_count`, `avg_response_time`,
/// `success_rate`, and `last_used` are updated by the orchestrator's
/// post-call hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuratedModel {
    /// Provider/model form, e.g. `anthropic/claude-3.5-sonnet`
    pub id: String,
    pub name: String,
    pub provider: String,
    pub description: String,
    pub category: ModelCategory,
    /// Derived score, 0–10
    pub performance_score: f64,
    pub usage_count: i64,
    /// Rolling mean call latency in milliseconds
    pub avg_response_time: f64,
    /// Fraction of calls that succeeded, 0.0–1.0
    pub success_rate: f64,
    pub last_used: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CuratedModel {
    fn seed(
        id: &str,
        name: &str,
        description: &str,
        category: ModelCategory,
        performance_score: f64,
    ) -> Self {
        let now = Utc::now();
        let provider = id.split('/').next().unwrap_or("unknown").to_string();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            provider,
            description: description.to_string(),
            category,
            performance_score,
            usage_count: 0,
            avg_response_time: 0.0,
            success_rate: 1.0,
            last_used: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Built-in default set used to seed an empty catalog.
    pub fn default_set() -> Vec<CuratedModel> {
        vec![
            CuratedModel::seed(
                "anthropic/claude-3.5-sonnet",
                "Claude 3.5 Sonnet",
                "Strong long-form narrative writing; first choice for scripts",
                ModelCategory::TopOverall,
                9.2,
            ),
            CuratedModel::seed(
                "openai/gpt-4o",
                "GPT-4o",
                "Fast general-purpose model with reliable formatting",
                ModelCategory::TopOverall,
                8.9,
            ),
            CuratedModel::seed(
                "google/gemini-flash-1.5",
                "Gemini Flash 1.5",
                "Low-latency summarization; good batch-summary worker",
                ModelCategory::TopOverall,
                8.1,
            ),
            CuratedModel::seed(
                "meta-llama/llama-3.1-8b-instruct:free",
                "Llama 3.1 8B Instruct (free)",
                "No-cost tier for drafts and smoke tests",
                ModelCategory::TopFree,
                6.5,
            ),
            CuratedModel::seed(
                "mistralai/mistral-7b-instruct:free",
                "Mistral 7B Instruct (free)",
                "No-cost fallback when quota is exhausted",
                ModelCategory::TopFree,
                6.0,
            ),
            CuratedModel::seed(
                "openai/gpt-4o-mini",
                "GPT-4o mini",
                "Last-resort synthesis when preferred models are unavailable",
                ModelCategory::Fallback,
                7.4,
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_is_nonempty_and_unique() {
        let set = CuratedModel::default_set();
        assert!(!set.is_empty());
        let mut ids: Vec<_> = set.iter().map(|m| m.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), set.len());
    }

    #[test]
    fn provider_derived_from_id() {
        let set = CuratedModel::default_set();
        let claude = set.iter().find(|m| m.id.starts_with("anthropic/")).unwrap();
        assert_eq!(claude.provider, "anthropic");
    }

    #[test]
    fn category_round_trips() {
        for cat in [
            ModelCategory::TopOverall,
            ModelCategory::TopFree,
            ModelCategory::Discovered,
            ModelCategory::Fallback,
        ] {
            assert_eq!(ModelCategory::parse(cat.as_str()), Some(cat));
        }
    }
}
