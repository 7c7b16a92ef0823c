//! Error handling utilities for HTTP responses and error context formatting.

use crate::errors::OllamaError;
use reqwest::Response;
use serde::de::DeserializeOwned;

/// Maximum characters to include from error body in context messages
const ERROR_BODY_PREVIEW_LENGTH: usize = 200;

/// Checks if an HTTP response is successful, returning it if so or an error otherwise.
///
/// This helper consolidates the common pattern of checking response status and
/// extracting error details on failure.
///
/// # Errors
///
/// Returns an error with status code and body preview on non-success status.
pub async fn check_response(response: Response) -> Result<Response, OllamaError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(read_error_with_context(response).await)
    }
}

/// Reads the error response body and creates a detailed `OllamaError::Api` with context.
///
/// Extracts:
/// - HTTP status code for programmatic error handling
/// - Truncated response body (first 200 chars); Ollama reports failures as
///   `{"error": "..."}` bodies, which fit comfortably in the preview
///
/// If the body cannot be read, the message describes the read failure.
pub async fn read_error_with_context(response: Response) -> OllamaError {
    let status_code = response.status().as_u16();

    let error_body = response
        .text()
        .await
        .unwrap_or_else(|e| format!("Failed to read error body: {}", e));

    let message = truncate_for_context(&error_body, ERROR_BODY_PREVIEW_LENGTH);

    OllamaError::Api {
        status_code,
        message,
    }
}

/// Deserializes a JSON response body, attaching the endpoint name and a body
/// preview to any failure.
///
/// # Errors
///
/// Returns `OllamaError::MalformedResponse` naming what was being parsed and
/// previewing the offending JSON.
pub fn deserialize_with_context<T: DeserializeOwned>(
    json_str: &str,
    what: &str,
) -> Result<T, OllamaError> {
    serde_json::from_str(json_str).map_err(|e| {
        OllamaError::MalformedResponse(format!("{}: {}", what, format_json_parse_error(json_str, e)))
    })
}

/// Formats JSON parsing context by including a preview of the raw JSON.
///
/// # Returns
///
/// A formatted error message with JSON preview (first 200 chars)
pub fn format_json_parse_error(json_str: &str, error: serde_json::Error) -> String {
    let preview = truncate_for_context(json_str, ERROR_BODY_PREVIEW_LENGTH);
    format!("JSON parse error: {} | Context: {}", error, preview)
}

/// Truncates a string to specified length, adding "..." if truncated.
///
/// Uses character-boundary-aware slicing to prevent panics on multi-byte UTF-8 characters.
fn truncate_for_context(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        // Find a valid UTF-8 character boundary at or before max_len
        // We need to ensure the character END position is <= max_len
        let truncate_at = s
            .char_indices()
            .take_while(|(i, c)| i + c.len_utf8() <= max_len)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}...", &s[..truncate_at])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_context_short_string() {
        let result = truncate_for_context("Short", 100);
        assert_eq!(result, "Short");
    }

    #[test]
    fn test_truncate_for_context_long_string() {
        let long_str = "a".repeat(300);
        let result = truncate_for_context(&long_str, 200);
        assert_eq!(result.len(), 203); // 200 + "..."
        assert!(result.ends_with("..."));
    }

    #[test]
    fn test_truncate_for_context_exactly_at_boundary() {
        // String is exactly max_len bytes
        let exact = "a".repeat(200);
        let result = truncate_for_context(&exact, 200);
        assert_eq!(result, exact); // No truncation needed
    }

    #[test]
    fn test_truncate_for_context_utf8_boundary() {
        // Test with multi-byte UTF-8 characters (emojis are 4 bytes each)
        let emoji_str = "x".repeat(198) + "🎉"; // 198 + 4 = 202 bytes total
        let result = truncate_for_context(&emoji_str, 200);

        // Should truncate before the emoji to avoid splitting it
        assert_eq!(result.len(), 201); // 198 + 3 for "..."
        assert!(result.ends_with("..."));
        assert!(!result.contains("🎉"));
        assert!(result.is_char_boundary(result.len() - 3)); // before "..."
    }

    #[test]
    fn test_format_json_parse_error() {
        let json = r#"{"invalid": }"#;
        let err = serde_json::from_str::<serde_json::Value>(json).unwrap_err();
        let result = format_json_parse_error(json, err);

        assert!(result.contains("JSON parse error"));
        assert!(result.contains("Context:"));
        assert!(result.contains(r#"{"invalid": }"#));
    }

    #[test]
    fn test_deserialize_with_context_success() {
        let parsed: serde_json::Value =
            deserialize_with_context(r#"{"ok": true}"#, "test response").expect("should parse");
        assert_eq!(parsed["ok"], true);
    }

    #[test]
    fn test_deserialize_with_context_names_the_endpoint() {
        let result: Result<crate::models::TagsResponse, _> =
            deserialize_with_context(r#"{"models": "oops"}"#, "tags response");
        let err = result.unwrap_err();
        let display = format!("{}", err);
        assert!(display.contains("tags response"));
        assert!(display.contains("oops"));
    }
}
