//! Gemini `generateContent` gateway.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{classify_status, GenerationError, ModelGateway};

/// Connection settings for the Gemini endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Base URL up to and including the API version.
    pub base_url: String,
    /// Model name, e.g. `gemini-1.5-flash`.
    pub model: String,
    pub api_key: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Hard limit for a single HTTP exchange.
    pub request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            temperature: 0.7,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Gateway backed by the Gemini REST API
pub struct GeminiGateway {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiGateway {
    pub fn new(config: GeminiConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GenerationError::Unknown(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model,
            self.config.api_key
        )
    }

    fn request_body(&self, system_prompt: &str, user_context: &str) -> serde_json::Value {
        serde_json::json!({
            "systemInstruction": {
                "parts": [{ "text": system_prompt }]
            },
            "contents": [{
                "role": "user",
                "parts": [{ "text": user_context }]
            }],
            "generationConfig": {
                "temperature": self.config.temperature,
                "responseMimeType": "application/json"
            }
        })
    }
}

#[async_trait]
impl ModelGateway for GeminiGateway {
    async fn generate(
        &self,
        system_prompt: &str,
        user_context: &str,
    ) -> Result<String, GenerationError> {
        let start = Instant::now();

        let response = self
            .client
            .post(self.endpoint())
            .json(&self.request_body(system_prompt, user_context))
            .send()
            .await
            .map_err(|e| GenerationError::NetworkError(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            let err = classify_status(status.as_u16(), &body, retry_after);
            tracing::warn!(status = status.as_u16(), kind = err.kind(), "Gemini call failed");
            return Err(err);
        }

        let resp_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::NetworkError(e.without_url().to_string()))?;

        let text = extract_candidate_text(&resp_json).ok_or_else(|| {
            let reason = resp_json["promptFeedback"]["blockReason"]
                .as_str()
                .unwrap_or("no candidate text");
            GenerationError::Unknown(format!("empty completion: {}", reason))
        })?;

        tracing::debug!(
            model = %self.config.model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            chars = text.len(),
            "Gemini call complete"
        );
        Ok(text)
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_candidate_text(resp: &serde_json::Value) -> Option<String> {
    let parts = resp["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join("");
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
