use std::time::Duration;
use thiserror::Error;

/// Defines errors that can occur when interacting with the Ollama API.
///
/// # Example: Handling API Errors
///
/// ```ignore
/// match client.generate("why is the sky blue?").await {
///     Err(OllamaError::Api { status_code: 404, .. }) => {
///         // Model not loaded on the server
///     }
///     Err(OllamaError::Api { status_code, message }) => {
///         tracing::error!("API error {}: {}", status_code, message);
///     }
///     // ...
/// }
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OllamaError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    /// API error with structured context for debugging and automated handling.
    ///
    /// Contains the HTTP status code (for retry logic) and the error message,
    /// including a truncated preview of the response body when available.
    #[error("API error (HTTP {status_code}): {message}")]
    Api {
        /// HTTP status code (e.g., 400, 404, 500)
        status_code: u16,
        /// Error message from the API response body
        message: String,
    },
    /// The named model is not present on the server.
    ///
    /// Returned by lookups such as [`Client::size_of`](crate::Client::size_of)
    /// when `/api/tags` does not list the model.
    #[error("Model not found: {0}")]
    ModelNotFound(String),
    /// API returned a successful response but with unexpected or invalid content.
    ///
    /// This includes a pull stream that ends before a `success` record:
    /// the server closed the connection without completing the download.
    #[error("Malformed API response: {0}")]
    MalformedResponse(String),
    /// A model pull exceeded its time budget.
    ///
    /// The budget is configured via
    /// [`ClientBuilder::pull_timeout`](crate::ClientBuilder::pull_timeout)
    /// and defaults to 48 hours. The check is cooperative: it runs between
    /// progress records, so a stalled connection is surfaced as an HTTP
    /// error rather than this variant.
    #[error("Downloading {model} timed out after {budget:?}")]
    PullTimedOut {
        /// Model being pulled when the budget ran out
        model: String,
        /// Configured time budget for the pull
        budget: Duration,
    },
    /// A pull record carried a status the client does not recognize.
    ///
    /// Only produced when strict status checking is enabled via
    /// [`ClientBuilder::strict_pull_statuses`](crate::ClientBuilder::strict_pull_statuses).
    /// By default unrecognized statuses are displayed and recorded but never fatal.
    #[error("Unexpected status while pulling {model}: {status:?}")]
    UnexpectedStatus {
        /// Model being pulled
        model: String,
        /// The unrecognized status string from the server
        status: String,
    },
}

impl OllamaError {
    /// Returns `true` if this error is likely transient and the request may succeed on retry.
    ///
    /// Retryable:
    /// - **HTTP errors**: network issues, connection resets, TLS errors
    /// - **Rate limits (429)** and **server errors (5xx)**
    /// - **Pull timeouts**: the download may complete within budget next time
    ///
    /// Not retryable:
    /// - **Client errors (4xx except 429)**: bad request, model not found
    /// - **JSON/UTF-8 errors**: response format issues
    /// - **Malformed responses** and **unexpected statuses**: contract violations
    ///
    /// # Example
    ///
    /// ```rust
    /// use ollamaclient::OllamaError;
    ///
    /// let not_found = OllamaError::Api {
    ///     status_code: 404,
    ///     message: "model 'nope' not found".to_string(),
    /// };
    /// assert!(!not_found.is_retryable());
    ///
    /// let overloaded = OllamaError::Api {
    ///     status_code: 503,
    ///     message: "server busy".to_string(),
    /// };
    /// assert!(overloaded.is_retryable());
    /// ```
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            // Network-level errors are typically transient
            OllamaError::Http(_) => true,

            // API errors: 429 (rate limit) and 5xx (server errors) are retryable
            OllamaError::Api { status_code, .. } => *status_code == 429 || *status_code >= 500,

            // The next attempt starts a fresh budget and benefits from
            // already-downloaded layers the server kept
            OllamaError::PullTimedOut { .. } => true,

            // These are permanent errors - retrying won't help
            OllamaError::Json(_)
            | OllamaError::Utf8(_)
            | OllamaError::ModelNotFound(_)
            | OllamaError::MalformedResponse(_)
            | OllamaError::UnexpectedStatus { .. } => false,
        }
    }
}

/// A failed model pull, together with the status transcript accumulated
/// before the failure.
///
/// Every error path out of [`Client::pull`](crate::Client::pull) carries the
/// text collected so far, so callers can see how far the download got:
///
/// ```ignore
/// match client.pull().await {
///     Ok(transcript) => println!("{transcript}"),
///     Err(e) => {
///         eprintln!("pull failed: {e}");
///         eprintln!("progress before failure:\n{}", e.transcript());
///     }
/// }
/// ```
#[derive(Debug, Error)]
#[error("{source}")]
pub struct PullError {
    transcript: String,
    source: OllamaError,
}

impl PullError {
    pub(crate) fn new(transcript: String, source: OllamaError) -> Self {
        Self { transcript, source }
    }

    /// Newline-joined status strings observed before the failure.
    ///
    /// Empty when the request failed before any record arrived (e.g. an
    /// HTTP-level error).
    #[must_use]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// The underlying error.
    #[must_use]
    pub fn inner(&self) -> &OllamaError {
        &self.source
    }

    /// Splits into the transcript and the underlying error.
    #[must_use]
    pub fn into_parts(self) -> (String, OllamaError) {
        (self.transcript, self.source)
    }

    /// See [`OllamaError::is_retryable`].
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}
