//! OpenRouter API client
//!
//! The only contract on the provider response is that the top choice's
//! message content is the script text; everything else is passed through
//! untouched.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
/// Chat completion timeout
const CHAT_TIMEOUT: Duration = Duration::from_secs(60);
/// "List models" probe timeout (key validation)
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Provider call errors
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP 401: key rejected. In pool mode the key is evicted.
    #[error("Invalid API key")]
    InvalidKey,

    /// HTTP 403
    #[error("API key lacks required permissions")]
    InsufficientPermissions,

    /// HTTP 429. In pool mode the key enters cooldown; retry after it.
    #[error("Rate limited by provider; retry shortly")]
    RateLimited,

    /// Connection refused, DNS failure, timeout
    #[error("Network error: {0}")]
    Network(String),

    /// Any other non-2xx
    #[error("Provider returned status {0}: {1}")]
    Api(u16, String),

    #[error("Failed to parse provider response: {0}")]
    Parse(String),

    /// No client key, empty pool, no environment key
    #[error("No API key available")]
    NoAvailableKey,
}

/// One chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// One model from the live provider catalog
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// Provider seam: the orchestrator and validator talk to this trait so
/// tests can substitute a scripted implementation.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Issue a chat completion; returns the top choice's message content.
    async fn chat(&self, request: &ChatRequest, api_key: &str) -> Result<String, LlmError>;

    /// Minimal "list models" probe; returns the visible model count.
    async fn list_models(&self, api_key: &str) -> Result<usize, LlmError>;

    /// Full model catalog for curated-table refreshes. Providers that
    /// cannot enumerate return an empty list.
    async fn model_catalog(&self, _api_key: &str) -> Result<Vec<ModelInfo>, LlmError> {
        Ok(Vec::new())
    }
}

/// Live OpenRouter client
pub struct OpenRouterClient {
    http: reqwest::Client,
    base_url: String,
}

impl OpenRouterClient {
    pub fn new() -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(CHAT_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    #[cfg(test)]
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, LlmError> {
        let mut client = Self::new()?;
        client.base_url = base_url.into();
        Ok(client)
    }

    fn classify_status(status: u16, body: String) -> LlmError {
        match status {
            401 => LlmError::InvalidKey,
            403 => LlmError::InsufficientPermissions,
            429 => LlmError::RateLimited,
            _ => LlmError::Api(status, body),
        }
    }

    fn classify_transport(error: reqwest::Error) -> LlmError {
        LlmError::Network(error.to_string())
    }
}

#[async_trait]
impl ChatProvider for OpenRouterClient {
    async fn chat(&self, request: &ChatRequest, api_key: &str) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(Self::classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status.as_u16(), body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LlmError::Parse("Response carried no choices".to_string()))
    }

    async fn list_models(&self, api_key: &str) -> Result<usize, LlmError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(api_key)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(Self::classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status.as_u16(), body));
        }

        let parsed: ModelsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        Ok(parsed.data.len())
    }

    async fn model_catalog(&self, api_key: &str) -> Result<Vec<ModelInfo>, LlmError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(Self::classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status.as_u16(), body));
        }

        let parsed: ModelsResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;
        Ok(parsed
            .data
            .into_iter()
            .map(|entry| ModelInfo {
                name: entry.name.unwrap_or_else(|| entry.id.clone()),
                description: entry.description.unwrap_or_default(),
                id: entry.id,
            })
            .collect())
    }
}
