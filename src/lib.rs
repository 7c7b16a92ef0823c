// Declare the client, errors, http, models, and pull modules
mod client;
pub mod errors;
mod http;
pub mod models;
mod pull;

// Import and selectively re-export the public API surface

// Client construction and defaults
pub use client::Client;
pub use client::ClientBuilder;
pub use client::DEFAULT_MODEL;
pub use http::common::DEFAULT_HOST;

// Request/response types for each endpoint
pub use models::EmbeddingsRequest;
pub use models::EmbeddingsResponse;
pub use models::GenerateRequest;
pub use models::GenerateResponse;
pub use models::ModelInfo;
pub use models::PullRecord;
pub use models::PullRequest;
pub use models::TagsResponse;

// Error types
pub use errors::OllamaError;
pub use errors::PullError;
