use std::time::Duration;

use async_stream::try_stream;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, pin_mut};
use reqwest::Client as ReqwestClient;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::{OllamaError, PullError};
use crate::http::common::{DEFAULT_HOST, Endpoint, construct_endpoint_url};
use crate::http::error_helpers::{check_response, deserialize_with_context};
use crate::http::json_stream::decode_json_stream;
use crate::http::wire_trace;
use crate::models::{
    EmbeddingsRequest, EmbeddingsResponse, GenerateRequest, GenerateResponse, ModelInfo,
    PullRecord, PullRequest, TagsResponse,
};
use crate::pull::{DEFAULT_PULL_TIMEOUT, PullSession, run_pull};

/// Model used when neither the builder nor `OLLAMA_MODEL` names one.
pub const DEFAULT_MODEL: &str = "nous-hermes:7b-llama2-q2_K";

/// Default timeout for the single round-trip operations (generate,
/// embeddings, tags). Streaming operations are never subject to it.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `1`, `true`, `yes`, `y`, and `on` (any case) enable a flag.
fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).as_deref().map(is_truthy).unwrap_or(false)
}

/// Reads an environment variable, treating unset and empty the same.
fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Completes a bare model name with the `:latest` tag, matching how the
/// server names models in `/api/tags`.
fn normalize_model_name(model: &str) -> String {
    let model = model.trim();
    if model.contains(':') {
        model.to_string()
    } else {
        format!("{model}:latest")
    }
}

/// The main client for talking to an Ollama server.
#[derive(Debug, Clone)]
pub struct Client {
    pub(crate) host: String,
    pub(crate) model: String,
    pub(crate) verbose: bool,
    pub(crate) pull_timeout: Duration,
    pub(crate) strict_pull_statuses: bool,
    pub(crate) request_timeout: Option<Duration>,
    #[allow(clippy::struct_field_names)]
    pub(crate) http_client: ReqwestClient,
}

/// Builder for `Client` instances.
///
/// # Example
///
/// ```
/// use ollamaclient::Client;
/// use std::time::Duration;
///
/// let client = Client::builder()
///     .host("http://localhost:11434")
///     .model("tinyllama:latest")
///     .verbose(true)
///     .request_timeout(Duration::from_secs(120))
///     .connect_timeout(Duration::from_secs(10))
///     .build();
/// ```
#[derive(Debug)]
pub struct ClientBuilder {
    host: Option<String>,
    model: Option<String>,
    verbose: bool,
    pull_timeout: Duration,
    strict_pull_statuses: bool,
    request_timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Sets the server address, e.g. `http://localhost:11434`.
    ///
    /// A trailing slash is tolerated. Defaults to [`DEFAULT_HOST`].
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the model operations act on. Defaults to [`DEFAULT_MODEL`].
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Enables progress rendering on standard output during pulls.
    ///
    /// Off by default; [`Client::pull_verbose`] overrides it per call.
    #[must_use]
    pub const fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Sets the overall time budget for a pull.
    ///
    /// The default is 48 hours: large models over slow connections can
    /// legitimately take a long time. The budget is checked between progress
    /// records, so it bounds the whole download rather than any single read.
    #[must_use]
    pub const fn pull_timeout(mut self, timeout: Duration) -> Self {
        self.pull_timeout = timeout;
        self
    }

    /// Fails a pull on the first status string the client does not recognize.
    ///
    /// By default unrecognized statuses are recorded and displayed but never
    /// fatal, matching the server's open-ended status vocabulary.
    #[must_use]
    pub const fn strict_pull_statuses(mut self, strict: bool) -> Self {
        self.strict_pull_statuses = strict;
        self
    }

    /// Sets the timeout for the single round-trip operations (generate,
    /// embeddings, tags).
    ///
    /// Defaults to 30 seconds. Streaming operations (pulls and streamed
    /// generation) are never subject to this timeout.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the connection timeout.
    ///
    /// This is the maximum time to wait for establishing a connection to the
    /// server. A shorter timeout here can help fail fast if the server is down.
    ///
    /// If not set, uses reqwest's default.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Builds the `Client`.
    #[must_use]
    pub fn build(self) -> Client {
        let mut builder = ReqwestClient::builder();

        if let Some(connect_timeout) = self.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }

        // This should never fail with our configuration
        let http_client = builder.build().expect("Failed to build HTTP client");

        Client {
            host: self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            verbose: self.verbose,
            pull_timeout: self.pull_timeout,
            strict_pull_statuses: self.strict_pull_statuses,
            request_timeout: self.request_timeout,
            http_client,
        }
    }
}

impl Client {
    /// Creates a new builder for `Client` instances.
    #[must_use]
    pub const fn builder() -> ClientBuilder {
        ClientBuilder {
            host: None,
            model: None,
            verbose: false,
            pull_timeout: DEFAULT_PULL_TIMEOUT,
            strict_pull_statuses: false,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            connect_timeout: None,
        }
    }

    /// Creates a client for the given server address and model, with default
    /// timeouts and verbosity off.
    #[must_use]
    pub fn new(host: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            model: model.into(),
            verbose: false,
            pull_timeout: DEFAULT_PULL_TIMEOUT,
            strict_pull_statuses: false,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            http_client: ReqwestClient::new(),
        }
    }

    /// Creates a client configured from the environment.
    ///
    /// Reads `OLLAMA_HOST` (default [`DEFAULT_HOST`]), `OLLAMA_MODEL`
    /// (default [`DEFAULT_MODEL`]), and `OLLAMA_VERBOSE` (truthy values:
    /// `1`, `true`, `yes`, `y`, `on`). Unset and empty variables fall back
    /// to the defaults.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use ollamaclient::Client;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = Client::from_env();
    /// let output = client.generate("Write a haiku about the color of cows.").await?;
    /// println!("{}", output.trim());
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(env_or("OLLAMA_HOST", DEFAULT_HOST), env_or("OLLAMA_MODEL", DEFAULT_MODEL))
            .with_verbose(env_flag("OLLAMA_VERBOSE"))
    }

    fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    // --- Round-trip operations ---

    /// Generates a completion for `prompt` with the configured model and
    /// returns the full response text.
    ///
    /// This is a single request/response round trip (`stream: false`); use
    /// [`Client::generate_stream`] to receive the text incrementally.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails, the server answers with a
    /// non-2xx status, or the response body does not parse.
    pub async fn generate(&self, prompt: impl Into<String>) -> Result<String, OllamaError> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.into(),
            stream: false,
        };
        debug!("Generating completion with {}", self.model);
        let response: GenerateResponse =
            self.post_json(Endpoint::Generate, &request, "generate response").await?;
        Ok(response.response)
    }

    /// Fetches the embedding vector for `prompt` using the configured model.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails, the server answers with a
    /// non-2xx status, or the response body does not parse.
    pub async fn embeddings(&self, prompt: impl Into<String>) -> Result<Vec<f64>, OllamaError> {
        let request = EmbeddingsRequest {
            model: self.model.clone(),
            prompt: prompt.into(),
        };
        debug!("Fetching embeddings with {}", self.model);
        let response: EmbeddingsResponse =
            self.post_json(Endpoint::Embeddings, &request, "embeddings response").await?;
        Ok(response.embedding)
    }

    /// Lists the models available locally on the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails, the server answers with a
    /// non-2xx status, or the response body does not parse.
    pub async fn list(&self) -> Result<Vec<ModelInfo>, OllamaError> {
        debug!("Listing local models");
        let response: TagsResponse = self.get_json(Endpoint::Tags, "tags response").await?;
        Ok(response.models)
    }

    /// Returns the size in bytes of a locally available model.
    ///
    /// Bare names are completed with `:latest`, so `size_of("tinyllama")`
    /// and `size_of("tinyllama:latest")` ask about the same model.
    ///
    /// # Errors
    ///
    /// Returns [`OllamaError::ModelNotFound`] when `/api/tags` does not list
    /// the model, or any error from [`Client::list`].
    pub async fn size_of(&self, model: &str) -> Result<u64, OllamaError> {
        let model = normalize_model_name(model);
        let models = self.list().await?;
        models
            .iter()
            .find(|m| m.name == model)
            .map(|m| m.size)
            .ok_or(OllamaError::ModelNotFound(model))
    }

    /// Returns whether the named model is available locally.
    ///
    /// Bare names are completed with `:latest`.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Client::list`]; a reachable server that does
    /// not have the model yields `Ok(false)`, not an error.
    pub async fn has(&self, model: &str) -> Result<bool, OllamaError> {
        let model = normalize_model_name(model);
        let models = self.list().await?;
        Ok(models.iter().any(|m| m.name == model))
    }

    /// Returns whether the configured model is available locally.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Client::list`].
    pub async fn has_model(&self) -> Result<bool, OllamaError> {
        self.has(&self.model).await
    }

    // --- Streaming operations ---

    /// Streams a completion for `prompt`, yielding each response record as it
    /// arrives. The final record has `done: true` and carries the timing
    /// counters; the stream ends after it.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use ollamaclient::Client;
    /// use futures_util::StreamExt;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = Client::from_env();
    /// let mut stream = client.generate_stream("Count to five.");
    /// while let Some(record) = stream.next().await {
    ///     print!("{}", record?.response);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn generate_stream(
        &self,
        prompt: impl Into<String>,
    ) -> BoxStream<'_, Result<GenerateResponse, OllamaError>> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.into(),
            stream: true,
        };
        let url = construct_endpoint_url(&self.host, Endpoint::Generate);
        debug!("Streaming completion with {}", self.model);

        Box::pin(try_stream! {
            let request_id = wire_trace::next_request_id();
            if wire_trace::is_enabled() {
                let body = serde_json::to_string(&request).ok();
                wire_trace::log_request(request_id, "POST", &url, body.as_deref());
            }

            let response = self.http_client.post(&url).json(&request).send().await?;
            wire_trace::log_response_status(request_id, response.status().as_u16());
            let response = check_response(response).await?;

            let records = decode_json_stream::<GenerateResponse>(response.bytes_stream());
            pin_mut!(records);
            while let Some(record) = records.next().await {
                let record = record?;
                wire_trace::log_stream_record(request_id, &record);
                let done = record.done;
                yield record;
                if done {
                    break;
                }
            }
        })
    }

    /// Issues a streaming pull request and yields the raw progress records.
    ///
    /// HTTP-level failures arrive as the first stream item. Most callers want
    /// [`Client::pull`], which drives this stream, renders progress, and
    /// returns the status transcript; this method is the building block for
    /// custom progress handling.
    pub fn pull_stream(
        &self,
        request: PullRequest,
    ) -> BoxStream<'_, Result<PullRecord, OllamaError>> {
        let url = construct_endpoint_url(&self.host, Endpoint::Pull);
        debug!("Pulling {} from {url}", request.name);

        Box::pin(try_stream! {
            let request_id = wire_trace::next_request_id();
            if wire_trace::is_enabled() {
                let body = serde_json::to_string(&request).ok();
                wire_trace::log_request(request_id, "POST", &url, body.as_deref());
            }

            let response = self.http_client.post(&url).json(&request).send().await?;
            wire_trace::log_response_status(request_id, response.status().as_u16());
            let response = check_response(response).await?;

            let records = decode_json_stream::<PullRecord>(response.bytes_stream());
            pin_mut!(records);
            while let Some(record) = records.next().await {
                let record = record?;
                wire_trace::log_stream_record(request_id, &record);
                yield record;
            }
        })
    }

    // --- Pull operations ---

    /// Downloads (or updates) the configured model, rendering progress to
    /// standard output when the client is verbose.
    ///
    /// Returns the accumulated status transcript, one line per progress
    /// record. Every failure carries the transcript gathered before it, so
    /// callers can see how far the download got:
    ///
    /// ```no_run
    /// # use ollamaclient::Client;
    /// # #[tokio::main]
    /// # async fn main() {
    /// let client = Client::from_env();
    /// match client.pull().await {
    ///     Ok(transcript) => print!("{transcript}"),
    ///     Err(e) => {
    ///         eprintln!("pull failed: {e}");
    ///         eprint!("{}", e.transcript());
    ///     }
    /// }
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Fails on HTTP-level errors, a record that does not decode, an
    /// exhausted pull timeout, a stream that ends without a `success` record,
    /// and, in strict mode, an unrecognized status.
    pub async fn pull(&self) -> Result<String, PullError> {
        self.pull_with_verbosity(self.verbose).await
    }

    /// Like [`Client::pull`], with progress rendering forced on.
    ///
    /// # Errors
    ///
    /// See [`Client::pull`].
    pub async fn pull_verbose(&self) -> Result<String, PullError> {
        self.pull_with_verbosity(true).await
    }

    /// Pulls the configured model only when it is not already available
    /// locally.
    ///
    /// # Errors
    ///
    /// Fails when the local model listing cannot be fetched (with an empty
    /// transcript, since no pull started) or when the pull itself fails.
    pub async fn pull_if_needed(&self) -> Result<(), PullError> {
        self.pull_if_needed_with_verbosity(self.verbose).await
    }

    /// Like [`Client::pull_if_needed`], with progress rendering forced on.
    ///
    /// # Errors
    ///
    /// See [`Client::pull_if_needed`].
    pub async fn pull_if_needed_verbose(&self) -> Result<(), PullError> {
        self.pull_if_needed_with_verbosity(true).await
    }

    async fn pull_with_verbosity(&self, verbose: bool) -> Result<String, PullError> {
        let session = PullSession::new(
            &self.model,
            verbose,
            self.strict_pull_statuses,
            self.pull_timeout,
        );
        let records = self.pull_stream(PullRequest::new(&self.model));
        run_pull(session, records).await
    }

    async fn pull_if_needed_with_verbosity(&self, verbose: bool) -> Result<(), PullError> {
        let present = self
            .has_model()
            .await
            .map_err(|e| PullError::new(String::new(), e))?;
        if present {
            debug!("{} is already available locally, skipping pull", self.model);
            return Ok(());
        }
        self.pull_with_verbosity(verbose).await?;
        Ok(())
    }

    // --- Request plumbing ---

    async fn post_json<Req, Resp>(
        &self,
        endpoint: Endpoint,
        request: &Req,
        what: &str,
    ) -> Result<Resp, OllamaError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let url = construct_endpoint_url(&self.host, endpoint);
        let request_id = wire_trace::next_request_id();
        if wire_trace::is_enabled() {
            let body = serde_json::to_string(request).ok();
            wire_trace::log_request(request_id, "POST", &url, body.as_deref());
        }
        debug!("Sending request to {url}");

        let mut builder = self.http_client.post(&url).json(request);
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        wire_trace::log_response_status(request_id, response.status().as_u16());
        let response = check_response(response).await?;
        let body = response.text().await?;
        wire_trace::log_response_body(request_id, &body);

        deserialize_with_context(&body, what)
    }

    async fn get_json<Resp: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        what: &str,
    ) -> Result<Resp, OllamaError> {
        let url = construct_endpoint_url(&self.host, endpoint);
        let request_id = wire_trace::next_request_id();
        wire_trace::log_request(request_id, "GET", &url, None);
        debug!("Sending request to {url}");

        let mut builder = self.http_client.get(&url);
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        wire_trace::log_response_status(request_id, response.status().as_u16());
        let response = check_response(response).await?;
        let body = response.text().await?;
        wire_trace::log_response_body(request_id, &body);

        deserialize_with_context(&body, what)
    }
}
