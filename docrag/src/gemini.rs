//! Gemini generative model over the `generateContent` REST endpoint.
//!
//! This module is only available when the `gemini` feature is enabled.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use crate::error::{RagError, Result};
use crate::generation::{Generation, GenerationOptions, GenerativeModel};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// A [`GenerativeModel`] backed by the Gemini API.
///
/// Issues `models/{model}:generateContent` requests with the prompt as a
/// single user turn. Sampling uses the caller's temperature and output-token
/// limit with fixed `topK: 40` and `topP: 0.95`.
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiGenerator {
    /// Create a new generator with the given API key and the default
    /// `gemini-2.5-flash` model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::GenerationError {
                model: DEFAULT_MODEL.into(),
                message: "API key must not be empty".into(),
            });
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: DEFAULT_MODEL.into(),
            base_url: BASE_URL.into(),
        })
    }

    /// Create a new generator from the `GEMINI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| RagError::GenerationError {
            model: DEFAULT_MODEL.into(),
            message: "GEMINI_API_KEY environment variable not set".into(),
        })?;
        Self::new(api_key)
    }

    /// Set the model name (e.g. `gemini-2.5-pro`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL (testing, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn generation_error(&self, message: impl Into<String>) -> RagError {
        RagError::GenerationError { model: self.model.clone(), message: message.into() }
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct UsageMetadata {
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<u32>,
}

#[async_trait]
impl GenerativeModel for GeminiGenerator {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Generation> {
        debug!(model = %self.model, prompt_len = prompt.len(), "generating answer");

        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": options.temperature,
                "maxOutputTokens": options.max_output_tokens,
                "topK": 40,
                "topP": 0.95,
            },
        });
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let response = self.client.post(url).json(&body).send().await.map_err(|e| {
            error!(model = %self.model, error = %e, "request failed");
            self.generation_error(format!("request failed: {e}"))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(model = %self.model, %status, "API error");
            return Err(self.generation_error(format!("API returned {status}: {body}")));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            error!(model = %self.model, error = %e, "failed to parse response");
            self.generation_error(format!("failed to parse response: {e}"))
        })?;

        let text: String = parsed
            .candidates
            .first()
            .map(|c| c.content.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(self.generation_error("API returned no candidates"));
        }

        Ok(Generation {
            text,
            tokens_used: parsed.usage_metadata.and_then(|u| u.total_token_count),
            model_name: self.model.clone(),
        })
    }
}
