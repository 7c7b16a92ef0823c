//! Internal HTTP layer for Ollama API communication.
//!
//! This module is `pub(crate)` - it contains implementation details
//! not exposed to library users.

pub(crate) mod common;
pub(crate) mod error_helpers;
pub(crate) mod json_stream;
pub(crate) mod wire_trace;
