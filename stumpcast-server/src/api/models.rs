//! Curated model endpoints

use crate::models::{CuratedModel, ModelCategory};
use crate::{db, ApiResult, AppState};
use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

/// Models pulled from the live catalog per refresh
const DISCOVERY_LIMIT: usize = 20;

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    /// Category name → models, best first
    pub categories: BTreeMap<String, Vec<CuratedModel>>,
    pub validation: serde_json::Value,
}

/// GET /api/models
///
/// Curated catalog grouped by category, plus a validation sub-object for
/// the key supplied via header (or the server key when present).
pub async fn list_models(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<ModelsResponse>> {
    let mut categories: BTreeMap<String, Vec<CuratedModel>> = BTreeMap::new();
    for category in [
        ModelCategory::TopOverall,
        ModelCategory::TopFree,
        ModelCategory::Discovered,
        ModelCategory::Fallback,
    ] {
        let models = db::models_catalog::models_by_category(&state.db, category).await?;
        if !models.is_empty() {
            categories.insert(category.as_str().to_string(), models);
        }
    }

    let key = headers
        .get("x-openrouter-key")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .or_else(|| state.config.openrouter_api_key.clone());

    let validation = match key {
        Some(key) => serde_json::to_value(state.validator.validate(&key).await?)
            .unwrap_or_else(|_| json!({ "valid": false })),
        None => json!({ "valid": false, "error_code": "NO_KEY" }),
    };

    Ok(Json(ModelsResponse {
        categories,
        validation,
    }))
}

#[derive(Debug, Serialize)]
pub struct RefreshModelsResponse {
    pub seeded: usize,
    pub discovered: usize,
}

/// POST /api/refresh-models
///
/// Re-seeds the default set and, when a server key is available, folds the
/// top of the live provider catalog into the `discovered` category.
pub async fn refresh_models(
    State(state): State<AppState>,
) -> ApiResult<Json<RefreshModelsResponse>> {
    let seeded = db::models_catalog::seed_default_models(&state.db).await?;

    let mut discovered = 0;
    if let Some(key) = &state.config.openrouter_api_key {
        match state.provider.model_catalog(key).await {
            Ok(catalog) => {
                for info in catalog.into_iter().take(DISCOVERY_LIMIT) {
                    let mut model = CuratedModel::default_set()
                        .into_iter()
                        .find(|m| m.id == info.id)
                        .unwrap_or_else(|| CuratedModel {
                            id: info.id.clone(),
                            name: info.name.clone(),
                            provider: info
                                .id
                                .split('/')
                                .next()
                                .unwrap_or("unknown")
                                .to_string(),
                            description: info.description.clone(),
                            category: ModelCategory::Discovered,
                            performance_score: 5.0,
                            usage_count: 0,
                            avg_response_time: 0.0,
                            success_rate: 1.0,
                            last_used: None,
                            created_at: chrono::Utc::now(),
                            updated_at: chrono::Utc::now(),
                        });
                    model.updated_at = chrono::Utc::now();
                    db::models_catalog::upsert_model(&state.db, &model).await?;
                    discovered += 1;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Live catalog refresh failed, kept existing tables");
            }
        }
    }

    Ok(Json(RefreshModelsResponse { seeded, discovered }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/models", get(list_models))
        .route("/api/refresh-models", post(refresh_models))
}
