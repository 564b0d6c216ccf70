//! Generative model trait for producing answers from assembled prompts.

use async_trait::async_trait;

use crate::error::Result;

/// Sampling parameters for one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum number of output tokens.
    pub max_output_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self { temperature: 0.7, max_output_tokens: 8192 }
    }
}

/// The result of one generation call.
#[derive(Debug, Clone)]
pub struct Generation {
    /// The generated answer text.
    pub text: String,
    /// Total tokens consumed, when the backend reports it.
    pub tokens_used: Option<u32>,
    /// Name of the model that produced the answer.
    pub model_name: String,
}

/// A generative language model consuming a fully assembled prompt.
///
/// The core never retries a failed generation and never sends a prompt when
/// zero context chunks were retrieved; both policies live in the pipeline.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Generate an answer for the given prompt.
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Generation>;
}
