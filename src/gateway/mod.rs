//! LLM Gateway. A single seam between the orchestrator and whatever
//! inference server backs it: one typed trait with per-model concurrency
//! and a concrete Ollama wire implementation.

pub mod ollama;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::domain::embedding::Embedding;
use crate::error::CoreError;

pub use ollama::OllamaGateway;

/// Which timeout/concurrency bucket a model belongs to. `Other` gets a
/// 60s default timeout and the shared capacity-3 semaphore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelClass {
    Fast,
    Accurate,
    Other,
}

#[derive(Debug, Clone)]
pub struct GenerateTextParams {
    pub prompt: String,
    pub model: String,
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub num_ctx: Option<u32>,
    pub seed: Option<u64>,
    pub timeout: Option<std::time::Duration>,
}

impl GenerateTextParams {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            system_prompt: None,
            temperature: 0.3,
            top_p: 0.9,
            top_k: 40,
            num_ctx: None,
            seed: None,
            timeout: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone)]
pub struct GenerateStructuredParams {
    pub prompt: String,
    pub model: String,
    pub json_schema: JsonValue,
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub timeout: Option<std::time::Duration>,
}

/// Text plus the wall-clock time the call actually took, needed by the
/// orchestrator to populate `ResponseSlot::generation_ms`.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub text: String,
    pub generation_ms: u64,
}

#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn health_check(&self, force: bool) -> bool;

    async fn list_models(&self, refresh: bool) -> Result<Vec<String>, CoreError>;

    async fn validate_model(&self, model_name: &str) -> Result<bool, CoreError>;

    async fn generate_text(
        &self,
        params: GenerateTextParams,
    ) -> Result<GenerationOutcome, CoreError>;

    async fn generate_structured(
        &self,
        params: GenerateStructuredParams,
    ) -> Result<JsonValue, CoreError>;

    async fn generate_embedding(
        &self,
        text: &str,
        model: Option<&str>,
    ) -> Result<Embedding, CoreError>;

    /// Best-effort: failure is logged, never propagated.
    async fn warmup(&self, model: &str, timeout: std::time::Duration) -> bool;

    async fn warmup_all(&self, models: &[String]);
}
