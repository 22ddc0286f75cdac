//! Concrete `LlmGateway` wired to an Ollama-compatible inference server:
//! health/model-list caching, per-model semaphores, and the retry rules
//! described on `LlmGateway`'s methods.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, warn};

use super::{GenerateStructuredParams, GenerateTextParams, GenerationOutcome, LlmGateway, ModelClass};
use crate::config::Config;
use crate::domain::embedding::Embedding;
use crate::error::CoreError;

const HEALTH_CACHE_TTL: Duration = Duration::from_secs(30);
const MODELS_CACHE_TTL: Duration = Duration::from_secs(300);
const OTHER_MODEL_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_SEMAPHORE_CAPACITY: usize = 3;
const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

pub struct OllamaGateway {
    client: Client,
    base_url: String,
    fast_model: String,
    accurate_model: String,
    embedding_model: String,
    fast_timeout: Duration,
    accurate_timeout: Duration,
    embedding_timeout: Duration,
    /// One semaphore per configured model, built eagerly here — never
    /// lazily on first call.
    semaphores: HashMap<String, Arc<Semaphore>>,
    default_semaphore: Arc<Semaphore>,
    health_cache: Mutex<Option<(Instant, bool)>>,
    models_cache: Mutex<Option<(Instant, Vec<String>)>>,
    model_known: Mutex<HashMap<String, bool>>,
}

impl OllamaGateway {
    pub fn new(base_url: impl Into<String>, config: &Config) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client builds with static config");

        let mut semaphores = HashMap::new();
        semaphores.insert(
            config.fast_model.clone(),
            Arc::new(Semaphore::new(config.fast_concurrency.max(1))),
        );
        semaphores.insert(
            config.accurate_model.clone(),
            Arc::new(Semaphore::new(config.accurate_concurrency.max(1))),
        );
        semaphores.insert(
            config.embedding_model.clone(),
            Arc::new(Semaphore::new(config.embedding_concurrency.max(1))),
        );

        Self {
            client,
            base_url: base_url.into(),
            fast_model: config.fast_model.clone(),
            accurate_model: config.accurate_model.clone(),
            embedding_model: config.embedding_model.clone(),
            fast_timeout: config.fast_timeout(),
            accurate_timeout: config.accurate_timeout(),
            embedding_timeout: config.embedding_timeout(),
            semaphores,
            default_semaphore: Arc::new(Semaphore::new(DEFAULT_SEMAPHORE_CAPACITY)),
            health_cache: Mutex::new(None),
            models_cache: Mutex::new(None),
            model_known: Mutex::new(HashMap::new()),
        }
    }

    fn model_class(&self, model: &str) -> ModelClass {
        if model == self.fast_model {
            ModelClass::Fast
        } else if model == self.accurate_model {
            ModelClass::Accurate
        } else {
            ModelClass::Other
        }
    }

    fn default_timeout_for(&self, model: &str) -> Duration {
        match self.model_class(model) {
            ModelClass::Fast => self.fast_timeout,
            ModelClass::Accurate => self.accurate_timeout,
            ModelClass::Other => OTHER_MODEL_TIMEOUT,
        }
    }

    fn semaphore_for(&self, model: &str) -> Arc<Semaphore> {
        self.semaphores
            .get(model)
            .cloned()
            .unwrap_or_else(|| self.default_semaphore.clone())
    }

    /// Exponential backoff retry for connection-oriented calls
    /// (`HealthCheck`, `ListModels`, `GenerateEmbedding`). Non-transport
    /// errors return immediately without retrying.
    async fn with_retry<T, F, Fut>(&self, mut op: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < MAX_RETRIES && is_transport(&e) => {
                    let delay = RETRY_DELAY * 2u32.pow(attempt);
                    warn!(attempt, ?delay, error = %e, "retrying transport error");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_json(
        &self,
        path: &str,
        body: &JsonValue,
        timeout: Duration,
    ) -> Result<JsonValue, CoreError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .timeout(timeout)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return resp.json::<JsonValue>().await.map_err(CoreError::from);
        }

        let text = resp.text().await.unwrap_or_default();
        Err(classify_error_body(status, &text))
    }
}

fn is_transport(e: &CoreError) -> bool {
    matches!(e, CoreError::Timeout(_) | CoreError::Unavailable(_))
}

fn classify_error_body(status: StatusCode, body: &str) -> CoreError {
    let lower = body.to_lowercase();
    if status == StatusCode::NOT_FOUND && lower.contains("model") && lower.contains("not found") {
        return CoreError::ModelNotFound(body.to_string());
    }
    if status.is_server_error() && (lower.contains("memory") || lower.contains("oom")) {
        return CoreError::OutOfMemory(body.to_string());
    }
    CoreError::Unavailable(format!("http {status}: {body}"))
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Parses `text` as JSON, falling back to extracting the outermost
/// `{...}` substring and reparsing, since models sometimes wrap a JSON
/// object in prose despite being asked not to.
fn parse_structured_response(text: &str) -> Result<JsonValue, CoreError> {
    if let Ok(v) = serde_json::from_str::<JsonValue>(text) {
        return Ok(v);
    }

    let start = text.find('{');
    let end = text.rfind('}');
    if let (Some(start), Some(end)) = (start, end) {
        if start < end {
            debug!("structured output required substring fallback");
            if let Ok(v) = serde_json::from_str::<JsonValue>(&text[start..=end]) {
                return Ok(v);
            }
        }
    }

    Err(CoreError::StructuredOutput(format!(
        "could not parse model output as JSON: {text}"
    )))
}

/// Builds the JSON-schema instruction block appended to the system prompt
/// for `GenerateStructured`, in Polish.
fn build_structured_system_prompt(base: Option<&str>, schema: &JsonValue) -> String {
    let base = base.unwrap_or_default();
    let pretty = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    format!(
        "{base}\n\nOdpowiedz WYŁĄCZNIE poprawnym obiektem JSON zgodnym z poniższym schematem. \
         Nie dodawaj żadnego tekstu poza obiektem JSON.\n\nSchemat:\n{pretty}"
    )
}

#[async_trait]
impl LlmGateway for OllamaGateway {
    async fn health_check(&self, force: bool) -> bool {
        if !force {
            let cache = self.health_cache.lock().await;
            if let Some((at, ok)) = *cache {
                if at.elapsed() < HEALTH_CACHE_TTL {
                    return ok;
                }
            }
        }

        let url = format!("{}/api/version", self.base_url);
        let ok = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false);

        *self.health_cache.lock().await = Some((Instant::now(), ok));
        ok
    }

    async fn list_models(&self, refresh: bool) -> Result<Vec<String>, CoreError> {
        if !refresh {
            let cache = self.models_cache.lock().await;
            if let Some((at, ref models)) = *cache {
                if at.elapsed() < MODELS_CACHE_TTL {
                    return Ok(models.clone());
                }
            }
        }

        let url = format!("{}/api/tags", self.base_url);
        let models = self
            .with_retry(|| async {
                let resp = self
                    .client
                    .get(&url)
                    .timeout(Duration::from_secs(5))
                    .send()
                    .await?;
                if !resp.status().is_success() {
                    return Err(CoreError::Unavailable(format!(
                        "list_models: http {}",
                        resp.status()
                    )));
                }
                let parsed: TagsResponse = resp.json().await?;
                Ok(parsed.models.into_iter().map(|m| m.name).collect::<Vec<_>>())
            })
            .await?;

        *self.models_cache.lock().await = Some((Instant::now(), models.clone()));
        let mut known = self.model_known.lock().await;
        for m in &models {
            known.insert(m.clone(), true);
        }
        Ok(models)
    }

    async fn validate_model(&self, model_name: &str) -> Result<bool, CoreError> {
        if let Some(known) = self.model_known.lock().await.get(model_name) {
            return Ok(*known);
        }
        let models = self.list_models(false).await?;
        Ok(models.iter().any(|m| m == model_name))
    }

    async fn generate_text(
        &self,
        params: GenerateTextParams,
    ) -> Result<GenerationOutcome, CoreError> {
        let timeout = params.timeout.unwrap_or_else(|| self.default_timeout_for(&params.model));
        let permit = self
            .semaphore_for(&params.model)
            .acquire_owned()
            .await
            .map_err(|_| CoreError::Internal("semaphore closed".into()))?;

        let body = json!({
            "model": params.model,
            "prompt": params.prompt,
            "system": params.system_prompt,
            "stream": false,
            "options": {
                "temperature": params.temperature,
                "top_p": params.top_p,
                "top_k": params.top_k,
                "num_ctx": params.num_ctx,
                "seed": params.seed,
            },
        });

        let started = Instant::now();
        // Generation ops retry at most once — they're expensive and
        // timeouts should surface quickly.
        let mut attempt = 0;
        let result = loop {
            match self.post_json("/api/generate", &body, timeout).await {
                Ok(v) => break Ok(v),
                Err(e) if attempt < 1 && is_transport(&e) => {
                    attempt += 1;
                }
                Err(e) => break Err(e),
            }
        };
        drop(permit);

        let value = result?;
        let parsed: GenerateResponse =
            serde_json::from_value(value).map_err(|e| CoreError::Unavailable(e.to_string()))?;
        Ok(GenerationOutcome {
            text: parsed.response,
            generation_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn generate_structured(
        &self,
        params: GenerateStructuredParams,
    ) -> Result<JsonValue, CoreError> {
        let timeout = params
            .timeout
            .unwrap_or_else(|| self.default_timeout_for(&params.model));
        let system = build_structured_system_prompt(params.system_prompt.as_deref(), &params.json_schema);

        let permit = self
            .semaphore_for(&params.model)
            .acquire_owned()
            .await
            .map_err(|_| CoreError::Internal("semaphore closed".into()))?;

        let body = json!({
            "model": params.model,
            "prompt": params.prompt,
            "system": system,
            "format": "json",
            "stream": false,
            "options": { "temperature": params.temperature },
        });

        let mut attempt = 0;
        let result = loop {
            match self.post_json("/api/generate", &body, timeout).await {
                Ok(v) => break Ok(v),
                Err(e) if attempt < 1 && is_transport(&e) => attempt += 1,
                Err(e) => break Err(e),
            }
        };
        drop(permit);

        let value = result?;
        let parsed: GenerateResponse =
            serde_json::from_value(value).map_err(|e| CoreError::Unavailable(e.to_string()))?;
        parse_structured_response(&parsed.response)
    }

    async fn generate_embedding(
        &self,
        text: &str,
        model: Option<&str>,
    ) -> Result<Embedding, CoreError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(CoreError::Embedding("input text is empty".into()));
        }
        let model = model.unwrap_or(&self.embedding_model).to_string();
        let timeout = self.embedding_timeout;
        let permit = self
            .semaphore_for(&model)
            .acquire_owned()
            .await
            .map_err(|_| CoreError::Internal("semaphore closed".into()))?;

        let body = json!({ "model": model, "prompt": trimmed });
        let value = self
            .with_retry(|| self.post_json("/api/embeddings", &body, timeout))
            .await;
        drop(permit);

        let parsed: EmbeddingResponse =
            serde_json::from_value(value?).map_err(|e| CoreError::Embedding(e.to_string()))?;
        Ok(Embedding::new(parsed.embedding))
    }

    async fn warmup(&self, model: &str, timeout: Duration) -> bool {
        let mut params = GenerateTextParams::new("ping", model).with_timeout(timeout);
        params.temperature = 0.0;

        match self.generate_text(params).await {
            Ok(_) => true,
            Err(e) => {
                warn!(model, error = %e, "warmup failed, continuing without it");
                false
            }
        }
    }

    async fn warmup_all(&self, models: &[String]) {
        let futures = models
            .iter()
            .map(|m| self.warmup(m, Duration::from_secs(30)));
        futures_util::future::join_all(futures).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_json() {
        let v = parse_structured_response(r#"{"a": 1}"#).unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn parses_json_wrapped_in_prose() {
        let v = parse_structured_response("Oto odpowiedź: {\"a\": 1} dziękuję").unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn rejects_unparseable_text() {
        assert!(parse_structured_response("no json here").is_err());
    }

    #[test]
    fn model_class_matches_config() {
        let config = Config::default();
        let gw = OllamaGateway::new("http://localhost:11434", &config);
        assert_eq!(gw.model_class(&config.fast_model), ModelClass::Fast);
        assert_eq!(gw.model_class(&config.accurate_model), ModelClass::Accurate);
        assert_eq!(gw.model_class("some-other-model"), ModelClass::Other);
    }
}
