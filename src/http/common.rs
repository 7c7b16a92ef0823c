// --- URL Construction ---

/// Default Ollama server address, used when `OLLAMA_HOST` is not set.
pub const DEFAULT_HOST: &str = "http://localhost:11434";

/// Represents the Ollama API endpoints used by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Generate a completion for a prompt
    Generate,
    /// Generate an embedding vector for a prompt
    Embeddings,
    /// Pull a model from the registry (streaming)
    Pull,
    /// List locally available models
    Tags,
}

impl Endpoint {
    const fn as_path(self) -> &'static str {
        match self {
            Self::Generate => "/api/generate",
            Self::Embeddings => "/api/embeddings",
            Self::Pull => "/api/pull",
            Self::Tags => "/api/tags",
        }
    }
}

/// Constructs the URL for an endpoint against the configured host.
///
/// Trailing slashes on the host are tolerated, so `http://localhost:11434/`
/// and `http://localhost:11434` produce the same URL.
#[must_use]
pub fn construct_endpoint_url(host: &str, endpoint: Endpoint) -> String {
    format!("{}{}", host.trim_end_matches('/'), endpoint.as_path())
}
