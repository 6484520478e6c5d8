//! Key management endpoints: validation, pool status, provider proxy

use crate::llm::{ChatMessage, ChatRequest, KeyVerdict, LlmError};
use crate::{ApiResult, AppState};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use stumpcast_common::Error;

/// Bulk validation cap
const MAX_BULK_KEYS: usize = 10;

fn header_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-openrouter-key")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

fn verdict_status(verdict: &KeyVerdict) -> StatusCode {
    if verdict.valid {
        return StatusCode::OK;
    }
    match verdict.error_code.as_deref() {
        Some("INVALID_KEY_FORMAT") => StatusCode::BAD_REQUEST,
        Some("INVALID_KEY") => StatusCode::UNAUTHORIZED,
        Some("INSUFFICIENT_PERMISSIONS") => StatusCode::FORBIDDEN,
        Some("RATE_LIMITED") => StatusCode::TOO_MANY_REQUESTS,
        Some("NETWORK_ERROR") => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateKeyRequest {
    pub api_key: Option<String>,
}

/// POST /api/validate-openrouter-key
pub async fn validate_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<ValidateKeyRequest>>,
) -> ApiResult<Response> {
    let body_key = body.and_then(|Json(b)| b.api_key);
    let Some(key) = body_key.or_else(|| header_key(&headers)) else {
        return Err(Error::InvalidInput(
            "Provide apiKey in the body or the X-OpenRouter-Key header".to_string(),
        )
        .into());
    };

    let verdict = state.validator.validate(&key).await?;
    Ok((verdict_status(&verdict), Json(verdict)).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateKeysRequest {
    #[serde(default)]
    pub api_keys: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkVerdict {
    pub key_prefix: String,
    #[serde(flatten)]
    pub verdict: KeyVerdict,
    /// Priority assigned when the key was pooled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pooled_priority: Option<u32>,
}

/// POST /api/validate-keys
///
/// Valid keys join the pool at priority `clamp(model_count / 10, 1, 10)`.
pub async fn validate_keys(
    State(state): State<AppState>,
    Json(request): Json<ValidateKeysRequest>,
) -> ApiResult<Json<Vec<BulkVerdict>>> {
    if request.api_keys.is_empty() {
        return Err(Error::InvalidInput("apiKeys must not be empty".to_string()).into());
    }
    if request.api_keys.len() > MAX_BULK_KEYS {
        return Err(Error::InvalidInput(format!(
            "At most {} keys per request",
            MAX_BULK_KEYS
        ))
        .into());
    }

    let mut results = Vec::with_capacity(request.api_keys.len());
    for key in &request.api_keys {
        let verdict = state.validator.validate(key).await?;
        let pooled_priority = if verdict.valid {
            let priority = ((verdict.model_count / 10).clamp(1, 10)) as u32;
            state.key_pool.add_key(key.clone(), priority);
            Some(priority)
        } else {
            None
        };
        let prefix: String = key.chars().take(12).collect();
        results.push(BulkVerdict {
            key_prefix: format!("{}...", prefix),
            verdict,
            pooled_priority,
        });
    }

    Ok(Json(results))
}

#[derive(Debug, Serialize)]
pub struct PoolStatusResponse {
    pub size: usize,
    pub keys: Vec<crate::llm::KeyStats>,
}

/// GET /api/key-pool-status
pub async fn pool_status(State(state): State<AppState>) -> Json<PoolStatusResponse> {
    Json(PoolStatusResponse {
        size: state.key_pool.len(),
        keys: state.key_pool.stats(),
    })
}

#[derive(Debug, Deserialize)]
pub struct ProxyRequest {
    pub model: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    #[serde(default = "default_use_pool", rename = "usePool")]
    pub use_pool: bool,
    #[serde(rename = "apiKey")]
    pub api_key: Option<String>,
}

fn default_use_pool() -> bool {
    true
}

/// POST /api/openrouter — raw provider proxy with pool key selection
pub async fn proxy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ProxyRequest>,
) -> ApiResult<Response> {
    if request.model.trim().is_empty() {
        return Err(Error::InvalidInput("model must not be empty".to_string()).into());
    }
    if request.messages.is_empty() {
        return Err(Error::InvalidInput("messages must not be empty".to_string()).into());
    }

    let client_key = request.api_key.clone().or_else(|| header_key(&headers));
    let used_pool = client_key.is_none() && request.use_pool && !state.key_pool.is_empty();

    let chat = ChatRequest {
        model: request.model.clone(),
        messages: request.messages,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
    };

    match state
        .orchestrator
        .proxy_chat(chat, client_key, request.use_pool)
        .await
    {
        Ok(content) => Ok(Json(json!({ "content": content, "model": request.model })).into_response()),
        Err(LlmError::RateLimited) if used_pool => {
            // Pool stats ride along so the client can see remaining capacity.
            Ok((
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "RATE_LIMITED",
                    "message": "Provider rate limited the request; retry shortly",
                    "pool": {
                        "size": state.key_pool.len(),
                        "keys": state.key_pool.stats(),
                    },
                })),
            )
                .into_response())
        }
        Err(e) => Err(map_proxy_error(e).into()),
    }
}

fn map_proxy_error(error: LlmError) -> Error {
    match error {
        LlmError::RateLimited => {
            Error::RateLimited("Provider rate limited the request; retry shortly".to_string())
        }
        LlmError::InvalidKey => Error::Unauthorized("Invalid API key".to_string()),
        LlmError::InsufficientPermissions => {
            Error::Unauthorized("API key lacks required permissions".to_string())
        }
        LlmError::NoAvailableKey => Error::Unauthorized(
            "No API key available: supply one with the request or configure the pool".to_string(),
        ),
        LlmError::Network(message) => Error::Upstream(format!("Provider unreachable: {}", message)),
        LlmError::Api(status, message) => {
            Error::Upstream(format!("Provider returned {}: {}", status, message))
        }
        LlmError::Parse(message) => {
            Error::Upstream(format!("Provider response unusable: {}", message))
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/validate-openrouter-key", post(validate_key))
        .route("/api/validate-keys", post(validate_keys))
        .route("/api/key-pool-status", get(pool_status))
        .route("/api/openrouter", post(proxy))
}
