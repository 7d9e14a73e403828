/// Ollama-backed completion oracle (`POST /api/generate`).
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Completer, LlmError};

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaCompleter {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    timeout: Duration,
}

impl OllamaCompleter {
    /// Build a client for `base_url`. Every request is bounded by `timeout`.
    ///
    /// Must be called outside an async runtime.
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, LlmError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("contract-rag")
            .build()
            .map_err(|e| LlmError::RequestFailed(format!("HTTP client build failed: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/generate", base_url.trim_end_matches('/')),
            model: model.to_string(),
            timeout,
        })
    }
}

impl Completer for OllamaCompleter {
    fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        debug!(model = %self.model, prompt_chars = prompt.len(), "calling completion oracle");

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
                options: GenerateOptions { temperature: 0.0 },
            })
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout.as_secs())
                } else {
                    LlmError::RequestFailed(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            return Err(LlmError::RequestFailed(format!(
                "completion endpoint returned status {}",
                resp.status()
            )));
        }

        let body: GenerateResponse = resp
            .json()
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(body.response)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
