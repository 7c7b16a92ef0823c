//! Wire-level debugging via the `OLLAMA_WIRE` environment variable.
//!
//! When `OLLAMA_WIRE` is set to any value, prints raw JSON of API requests
//! and responses to stderr with pretty formatting and colors.
//!
//! # Usage
//!
//! ```bash
//! OLLAMA_WIRE=1 cargo test
//! ```
//!
//! # Output Format
//!
//! - Green `>>>` for outgoing requests
//! - Red `<<<` for incoming responses
//! - Blue for streamed records (pull progress, generate fragments)
//! - Timestamps and request IDs for correlation
//!
//! Token-context and embedding arrays are summarized to keep output readable.

use colored::Colorize;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Request ID counter for correlating requests with responses
static REQUEST_COUNTER: AtomicUsize = AtomicUsize::new(1);

/// Cached check for whether OLLAMA_WIRE is enabled
static ENABLED: OnceLock<bool> = OnceLock::new();

/// Check if wire debugging is enabled.
///
/// The result is cached after first check for performance. This means
/// `OLLAMA_WIRE` must be set before the first API call is made - setting
/// it after the first call will have no effect.
#[must_use]
pub fn is_enabled() -> bool {
    *ENABLED.get_or_init(|| std::env::var("OLLAMA_WIRE").is_ok())
}

/// Get the next request ID for correlation.
#[must_use]
pub fn next_request_id() -> usize {
    REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Fields whose array values should be summarized rather than dumped.
/// Embedding vectors run to thousands of floats and context windows to
/// thousands of tokens.
const SUMMARIZE_FIELDS: &[&str] = &["context", "embedding"];

/// Maximum array length before summarization.
const SUMMARIZE_THRESHOLD: usize = 16;

/// Summarize long numeric arrays in a JSON value.
///
/// Walks the JSON tree and replaces `"context"` and `"embedding"` arrays
/// longer than the threshold with a placeholder naming the element count.
/// All other fields are preserved in full.
fn summarize_long_fields(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if SUMMARIZE_FIELDS.contains(&key.as_str()) {
                    if let serde_json::Value::Array(arr) = val
                        && arr.len() > SUMMARIZE_THRESHOLD
                    {
                        *val = serde_json::Value::String(format!("[{} values]", arr.len()));
                    }
                } else {
                    summarize_long_fields(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                summarize_long_fields(item);
            }
        }
        _ => {}
    }
}

/// Colorize and format JSON for terminal output.
/// Returns lines ready to print, or None if colorization fails.
fn colorize_json(value: &serde_json::Value) -> Option<String> {
    colored_json::to_colored_json_auto(value).ok()
}

/// Format the current timestamp for log output.
fn timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Log prefix with timestamp and request ID.
fn prefix(request_id: usize) -> String {
    let ts = timestamp().dimmed();
    format!(
        "{} {} {}",
        "[OLLAMA_WIRE]".bold(),
        ts,
        format!("[REQ#{}]", request_id).cyan()
    )
}

/// Log an outgoing HTTP request.
pub fn log_request(request_id: usize, method: &str, url: &str, body: Option<&str>) {
    if !is_enabled() {
        return;
    }

    let prefix = prefix(request_id);
    let direction = ">>>".green().bold();

    eprintln!("{prefix} {direction} {method} {url}");

    if let Some(body) = body {
        if let Ok(mut parsed) = serde_json::from_str::<serde_json::Value>(body) {
            summarize_long_fields(&mut parsed);
            eprintln!("{prefix} {}:", "Body".green());
            if let Some(colored) = colorize_json(&parsed) {
                for line in colored.lines() {
                    eprintln!("{prefix} {line}");
                }
            } else if let Ok(pretty) = serde_json::to_string_pretty(&parsed) {
                for line in pretty.lines() {
                    eprintln!("{prefix} {line}");
                }
            }
        } else {
            // Not valid JSON, print as-is (truncated for safety)
            let truncated = if body.len() > 500 {
                format!("{}...", &body[..500])
            } else {
                body.to_string()
            };
            eprintln!("{prefix} {}: {truncated}", "Body".green());
        }
    }
}

/// Log an incoming HTTP response status.
pub fn log_response_status(request_id: usize, status: u16) {
    if !is_enabled() {
        return;
    }

    let prefix = prefix(request_id);
    let direction = "<<<".red().bold();
    let status_text = if status < 300 {
        format!("{status} OK").green()
    } else {
        format!("{status} ERROR").red()
    };

    eprintln!("{prefix} {direction} {status_text}");
}

/// Log an incoming HTTP response body.
pub fn log_response_body(request_id: usize, body: &str) {
    if !is_enabled() {
        return;
    }

    let prefix = prefix(request_id);

    if let Ok(mut parsed) = serde_json::from_str::<serde_json::Value>(body) {
        summarize_long_fields(&mut parsed);
        eprintln!("{prefix} {}:", "Response".red());
        if let Some(colored) = colorize_json(&parsed) {
            for line in colored.lines() {
                eprintln!("{prefix} {line}");
            }
        } else if let Ok(pretty) = serde_json::to_string_pretty(&parsed) {
            for line in pretty.lines() {
                eprintln!("{prefix} {line}");
            }
        }
    } else {
        // Not valid JSON, print as-is (truncated for safety)
        let truncated = if body.len() > 1000 {
            format!("{}...", &body[..1000])
        } else {
            body.to_string()
        };
        eprintln!("{prefix} {}: {truncated}", "Response".red());
    }
}

/// Log one record from a streamed response body.
pub fn log_stream_record(request_id: usize, record: &impl serde::Serialize) {
    if !is_enabled() {
        return;
    }

    let prefix = prefix(request_id);
    let label = "STREAM".blue().bold();

    match serde_json::to_value(record) {
        Ok(mut parsed) => {
            summarize_long_fields(&mut parsed);
            let rendered = colorize_json(&parsed)
                .or_else(|| serde_json::to_string(&parsed).ok())
                .unwrap_or_default();
            eprintln!("{prefix} {label}: {rendered}");
        }
        Err(e) => eprintln!("{prefix} {label}: <unserializable record: {e}>"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_short_array_untouched() {
        let mut value = serde_json::json!({"context": [1, 2, 3]});
        summarize_long_fields(&mut value);
        assert_eq!(value["context"], serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn test_summarize_long_context() {
        let tokens: Vec<i64> = (0..200).collect();
        let mut value = serde_json::json!({"context": tokens});
        summarize_long_fields(&mut value);

        assert_eq!(value["context"], "[200 values]");
    }

    #[test]
    fn test_summarize_long_embedding() {
        let floats: Vec<f64> = (0..1536).map(|i| i as f64 * 0.5).collect();
        let mut value = serde_json::json!({"embedding": floats});
        summarize_long_fields(&mut value);

        assert_eq!(value["embedding"], "[1536 values]");
    }

    #[test]
    fn test_summarize_preserves_other_fields() {
        let mut value = serde_json::json!({
            "status": "downloading",
            "digest": "sha256:6a0746a1ec1aef3e7ec53868f220ff6e389f6f8ef87a01d77c96807de94ca2aa",
            "embedding": (0..100).collect::<Vec<i64>>()
        });
        summarize_long_fields(&mut value);

        assert_eq!(value["status"], "downloading");
        assert!(
            value["digest"]
                .as_str()
                .unwrap()
                .starts_with("sha256:6a0746a1")
        );
        assert_eq!(value["embedding"], "[100 values]");
    }

    #[test]
    fn test_summarize_nested_structure() {
        let mut value = serde_json::json!({
            "outer": {"embedding": (0..50).collect::<Vec<i64>>()},
            "other": "value"
        });
        summarize_long_fields(&mut value);

        assert_eq!(value["other"], "value");
        assert_eq!(value["outer"]["embedding"], "[50 values]");
    }

    #[test]
    fn test_timestamp_format() {
        let ts = timestamp();
        // Should match ISO 8601 format: YYYY-MM-DDTHH:MM:SSZ
        assert!(ts.len() == 20, "Timestamp should be 20 chars: {ts}");
        assert!(ts.ends_with('Z'), "Should end with Z");
        assert!(ts.contains('T'), "Should contain T separator");
    }

    #[test]
    fn test_request_id_increments() {
        let id1 = next_request_id();
        let id2 = next_request_id();
        assert!(id2 > id1, "Request IDs should increment");
    }
}
