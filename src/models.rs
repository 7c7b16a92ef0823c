// Wire types for the Ollama HTTP API (/api/generate, /api/embeddings,
// /api/pull, /api/tags).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn is_false(value: &bool) -> bool {
    !*value
}

/// Request body for `/api/generate`.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
}

/// One response record from `/api/generate`.
///
/// With `stream: false` the server sends a single record carrying the full
/// text; with `stream: true` it sends many, each carrying a fragment in
/// `response`, with timing counters attached to the final record where
/// `done` is `true`. Counters are in nanoseconds.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct GenerateResponse {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_eval_duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval_duration: Option<u64>,
}

/// Request body for `/api/embeddings`.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct EmbeddingsRequest {
    pub model: String,
    pub prompt: String,
}

/// Response body for `/api/embeddings`.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct EmbeddingsResponse {
    #[serde(default)]
    pub embedding: Vec<f64>,
}

/// Request body for `/api/pull`.
///
/// The client always pulls with `stream: true`; `insecure` permits pulling
/// from a registry without TLS verification and is omitted from the wire
/// when false.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct PullRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub insecure: bool,
    pub stream: bool,
}

impl PullRequest {
    /// A streaming pull request for the named model.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            insecure: false,
            stream: true,
        }
    }
}

/// One progress record from a streaming `/api/pull`.
///
/// Every field is optional on the wire; absent keys deserialize to their
/// zero values so that records like `{"status":"pulling manifest"}` and
/// `{"status":"downloading","digest":"sha256:...","total":123,"completed":45}`
/// both parse into the same shape.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct PullRecord {
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub total: u64,
}

impl PullRecord {
    /// `true` for the terminal record of a successful pull.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// Completion percentage, or `None` for records that carry no size
    /// information (manifest and verification steps report `total` 0).
    #[must_use]
    pub fn progress_percent(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(self.completed as f64 / self.total as f64 * 100.0)
    }
}

/// Response body for `/api/tags`.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

/// One locally available model, as listed by `/api/tags`.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct ModelInfo {
    pub name: String,
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub digest: String,
}
