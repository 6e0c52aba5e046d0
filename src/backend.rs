//! Generation backend abstraction.
//!
//! Defines the [`GenerationBackend`] trait and [`OllamaBackend`], which
//! calls an Ollama-compatible `POST /api/generate` endpoint. The backend is
//! a single-capacity resource (one model loaded on modest hardware), so
//! callers never use it directly: every request goes through the
//! [`GenerationGateway`](crate::gateway::GenerationGateway).
//!
//! # Request
//!
//! ```json
//! { "model": "qwen3:8b", "prompt": "...", "stream": false,
//!   "options": { "temperature": 0.0, "num_ctx": 2048, "num_predict": 400,
//!                "top_k": 20, "top_p": 0.9, "repeat_penalty": 1.1 } }
//! ```
//!
//! # Errors
//!
//! Non-2xx responses, transport failures (including connect/read timeouts)
//! and bodies without a string `response` field all map to
//! [`RagError::Backend`]. Nothing is retried here.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::GenerationConfig;
use crate::error::RagError;

/// Timeout for the health probe; it must stay cheap.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Returns the model identifier sent with each request.
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, RagError>;

    /// Check that the backend is reachable without generating anything.
    async fn health(&self) -> Result<(), RagError>;
}

/// Sampling options forwarded verbatim to the backend.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub num_ctx: u32,
    pub num_predict: u32,
    pub top_k: u32,
    pub top_p: f32,
    pub repeat_penalty: f32,
}

impl From<&GenerationConfig> for GenerationOptions {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            temperature: config.temperature,
            num_ctx: config.num_ctx,
            num_predict: config.num_predict,
            top_k: config.top_k,
            top_p: config.top_p,
            repeat_penalty: config.repeat_penalty,
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a GenerationOptions,
}

/// Backend for an Ollama server.
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    options: GenerationOptions,
}

impl OllamaBackend {
    pub fn new(config: &GenerationConfig) -> Result<Self, RagError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.read_timeout())
            .build()
            .map_err(|e| RagError::Internal(e.into()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            options: GenerationOptions::from(config),
        })
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: &self.options,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::Backend(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RagError::Backend(format!(
                "backend returned {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RagError::Backend(format!("invalid response body: {}", e)))?;
        parse_generate_response(&json)
    }

    async fn health(&self) -> Result<(), RagError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| RagError::Backend(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(RagError::Backend(format!(
                "health check returned {}",
                response.status()
            )))
        }
    }
}

/// Extract the `response` string from a generate reply.
fn parse_generate_response(json: &serde_json::Value) -> Result<String, RagError> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(|r| r.trim().to_string())
        .ok_or_else(|| RagError::Backend("invalid response body: missing `response`".into()))
}
