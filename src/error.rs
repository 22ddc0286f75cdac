//! Error taxonomy and its mapping to caller-facing outcomes. Domain
//! conditions (`NoRelevantActs`) and transport failures (`Timeout`,
//! `Unavailable`) are distinguished at the type level rather than both
//! being raised as exceptions of the same shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Internal error taxonomy shared by every component.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Client-input error: empty or out-of-range input.
    #[error("validation error: {0}")]
    Validation(String),

    /// The corpus has nothing for this question: the retrieval index's
    /// refusal boundary. A semantic signal, not a transport failure.
    #[error("no relevant acts found for this question")]
    NoRelevantActs,

    /// A named model is not present on the inference server.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// Inference server reported (or implied) exhausted memory.
    #[error("model out of memory: {0}")]
    OutOfMemory(String),

    /// Any outbound call exceeded its deadline.
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// A `Timeout` specialized to the fast or accurate generation step.
    #[error("generation timed out after {0}ms")]
    GenerationTimeout(u64),

    /// Transport failure after retries, or a non-2xx without a more
    /// specific classification.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// Embedding generation failed (empty input, transport failure, etc).
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Structured-generation output could not be parsed as JSON even after
    /// the `{...}` substring fallback.
    #[error("could not parse structured output: {0}")]
    StructuredOutput(String),

    /// Retrieval-index or storage transport failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Caught at the outermost boundary; never expected in normal operation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CoreError::Timeout(0)
        } else {
            CoreError::Unavailable(e.to_string())
        }
    }
}

/// Caller-facing error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorCode {
    BadRequest,
    NotFound,
    GatewayTimeout,
    ServiceUnavailable,
    InternalError,
}

/// The error shape returned to a caller: stable code, human message,
/// optional detail, timestamp, and a correlation id for support requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    pub detail: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    pub request_id: uuid::Uuid,
    pub retry_after_secs: Option<u64>,
}

impl CoreError {
    /// Maps this internal error to a caller-facing error class.
    ///
    /// `request_id` should be the correlation id already associated with
    /// the in-flight request (e.g. the `queryId`, or a fresh id for
    /// requests that fail before one exists).
    pub fn into_api_error(self, request_id: uuid::Uuid) -> ApiError {
        let (code, retry_after_secs) = match &self {
            CoreError::NoRelevantActs => (ApiErrorCode::NotFound, None),
            CoreError::GenerationTimeout(_) | CoreError::Timeout(_) => {
                (ApiErrorCode::GatewayTimeout, None)
            }
            CoreError::Unavailable(_) => (ApiErrorCode::ServiceUnavailable, None),
            CoreError::ModelNotFound(_) => (ApiErrorCode::ServiceUnavailable, Some(30)),
            CoreError::OutOfMemory(_) => (ApiErrorCode::InternalError, None),
            CoreError::Embedding(_) => (ApiErrorCode::InternalError, None),
            CoreError::StructuredOutput(_) => (ApiErrorCode::InternalError, None),
            CoreError::Storage(_) => (ApiErrorCode::ServiceUnavailable, None),
            CoreError::Validation(_) => (ApiErrorCode::BadRequest, None),
            CoreError::Internal(_) => (ApiErrorCode::InternalError, None),
        };

        // Internal detail never leaks to the message in release builds; it's
        // only attached as `detail` when built with debug assertions, so
        // non-production builds can still aid debugging.
        let message = public_message(&self);
        let detail = if cfg!(debug_assertions) {
            Some(serde_json::json!({ "debug": self.to_string() }))
        } else {
            None
        };

        ApiError {
            code,
            message,
            detail,
            timestamp: Utc::now(),
            request_id,
            retry_after_secs,
        }
    }
}

/// Sanitized message safe to return to a caller in production — no internal
/// URLs, upstream bodies, or stack traces.
fn public_message(e: &CoreError) -> String {
    match e {
        CoreError::Validation(_) => "the request was invalid".to_string(),
        CoreError::NoRelevantActs => {
            "no relevant legal acts were found for this question".to_string()
        }
        CoreError::ModelNotFound(model) => format!("model '{model}' is not available"),
        CoreError::OutOfMemory(_) => "the model ran out of memory processing this request".to_string(),
        CoreError::Timeout(_) | CoreError::GenerationTimeout(_) => {
            "the request timed out".to_string()
        }
        CoreError::Unavailable(_) => "the service is temporarily unavailable".to_string(),
        CoreError::Embedding(_) => "failed to process the question".to_string(),
        CoreError::StructuredOutput(_) => "failed to generate a structured response".to_string(),
        CoreError::Storage(_) => "a storage backend is temporarily unavailable".to_string(),
        CoreError::Internal(_) => "an internal error occurred".to_string(),
    }
}
