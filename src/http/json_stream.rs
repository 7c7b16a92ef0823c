/// Streaming JSON decoding utilities
///
/// Streaming Ollama endpoints (`/api/pull`, `/api/generate` with `stream: true`)
/// write a sequence of JSON objects onto one HTTP body. The server usually
/// emits one object per line, but the protocol does not promise newlines:
/// objects may arrive back-to-back, with arbitrary whitespace between them,
/// or split mid-value across chunk boundaries. The decoder therefore never
/// searches for delimiters; it carves complete values off the front of a
/// byte buffer and leaves incomplete tails for the next chunk.
use crate::errors::OllamaError;
use async_stream::try_stream;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::de::DeserializeOwned;

/// Decodes a byte stream of concatenated JSON values into a stream of
/// deserialized objects.
///
/// # Type Parameters
///
/// * `T` - The type to deserialize each JSON value into
///
/// # Arguments
///
/// * `byte_stream` - An async stream of byte chunks from the HTTP response
///
/// # Returns
///
/// A stream that yields deserialized objects of type `T` or errors. A
/// definite syntax or type error is yielded once and ends the stream; an
/// incomplete value at end of stream simply ends it (the caller decides
/// whether an early end is an error).
///
/// # Example
///
/// ```ignore
/// let byte_stream = response.bytes_stream();
/// let records = decode_json_stream::<PullRecord>(byte_stream);
///
/// while let Some(result) = records.next().await {
///     let record = result?;
///     // Process record...
/// }
/// ```
pub fn decode_json_stream<T>(
    byte_stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send,
) -> impl Stream<Item = Result<T, OllamaError>> + Send
where
    T: DeserializeOwned + Send,
{
    try_stream! {
        futures_util::pin_mut!(byte_stream);
        let mut buffer = Vec::new();

        while let Some(chunk_result) = byte_stream.next().await {
            let chunk: Bytes = chunk_result?;
            buffer.extend_from_slice(&chunk);

            loop {
                match next_value::<T>(&buffer) {
                    Ok(Some((value, consumed))) => {
                        buffer.drain(..consumed);
                        yield value;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        Err(e)?;
                    }
                }
            }
        }
    }
}

/// Tries to carve one complete JSON value off the front of `buffer`.
///
/// Returns the value and the number of bytes consumed (leading whitespace
/// included), `None` when the buffer holds only whitespace or an incomplete
/// value, and an error for definite syntax or type failures.
fn next_value<T: DeserializeOwned>(buffer: &[u8]) -> Result<Option<(T, usize)>, OllamaError> {
    let mut values = serde_json::Deserializer::from_slice(buffer).into_iter::<T>();
    match values.next() {
        Some(Ok(value)) => Ok(Some((value, values.byte_offset()))),
        // An EOF-category error means the value may still complete
        Some(Err(e)) if e.is_eof() => Ok(None),
        Some(Err(e)) => Err(OllamaError::Json(e)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PullRecord;
    use futures_util::{pin_mut, stream};

    fn byte_stream(chunks: Vec<&[u8]>) -> impl Stream<Item = Result<Bytes, reqwest::Error>> {
        stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_next_value_complete() {
        let buffer = br#"{"status":"pulling manifest"}"#;
        let (record, consumed) =
            next_value::<PullRecord>(buffer).expect("no error").expect("complete value");
        assert_eq!(record.status, "pulling manifest");
        assert_eq!(consumed, buffer.len());
    }

    #[test]
    fn test_next_value_incomplete_waits() {
        let buffer = br#"{"status":"pulling man"#;
        let result = next_value::<PullRecord>(buffer).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn test_next_value_skips_leading_whitespace() {
        let buffer = b"\n\n  {\"status\":\"success\"}";
        let (record, consumed) =
            next_value::<PullRecord>(buffer).expect("no error").expect("complete value");
        assert!(record.is_success());
        assert_eq!(consumed, buffer.len());
    }

    #[test]
    fn test_next_value_whitespace_only() {
        let result = next_value::<PullRecord>(b"  \n\t").expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn test_next_value_definite_garbage() {
        let result = next_value::<PullRecord>(b"GARBAGE");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_decode_single_record() {
        let records = decode_json_stream::<PullRecord>(byte_stream(vec![
            b"{\"status\":\"pulling manifest\"}\n",
        ]));
        pin_mut!(records);

        let record = records.next().await.unwrap().unwrap();
        assert_eq!(record.status, "pulling manifest");
        assert!(records.next().await.is_none());
    }

    #[tokio::test]
    async fn test_decode_newline_delimited_records() {
        let records = decode_json_stream::<PullRecord>(byte_stream(vec![
            b"{\"status\":\"a\"}\n{\"status\":\"b\"}\n{\"status\":\"success\"}\n",
        ]));
        pin_mut!(records);

        assert_eq!(records.next().await.unwrap().unwrap().status, "a");
        assert_eq!(records.next().await.unwrap().unwrap().status, "b");
        assert!(records.next().await.unwrap().unwrap().is_success());
        assert!(records.next().await.is_none());
    }

    #[tokio::test]
    async fn test_decode_back_to_back_records_without_newlines() {
        // Nothing in the protocol guarantees newline delimiters
        let records = decode_json_stream::<PullRecord>(byte_stream(vec![
            br#"{"status":"a"}{"status":"b"}"#,
        ]));
        pin_mut!(records);

        assert_eq!(records.next().await.unwrap().unwrap().status, "a");
        assert_eq!(records.next().await.unwrap().unwrap().status, "b");
        assert!(records.next().await.is_none());
    }

    #[tokio::test]
    async fn test_decode_record_split_across_chunks() {
        let records = decode_json_stream::<PullRecord>(byte_stream(vec![
            br#"{"status":"downloading","digest":"sha256:abc","tot"#,
            br#"al":100,"completed":50}"#,
        ]));
        pin_mut!(records);

        let record = records.next().await.unwrap().unwrap();
        assert_eq!(record.status, "downloading");
        assert_eq!(record.total, 100);
        assert_eq!(record.completed, 50);
        assert!(records.next().await.is_none());
    }

    #[tokio::test]
    async fn test_decode_chunk_boundary_between_records() {
        let records = decode_json_stream::<PullRecord>(byte_stream(vec![
            b"{\"status\":\"a\"}\n",
            b"{\"status\":\"b\"}\n",
        ]));
        pin_mut!(records);

        assert_eq!(records.next().await.unwrap().unwrap().status, "a");
        assert_eq!(records.next().await.unwrap().unwrap().status, "b");
        assert!(records.next().await.is_none());
    }

    #[tokio::test]
    async fn test_decode_invalid_json_yields_error_and_ends() {
        let records = decode_json_stream::<PullRecord>(byte_stream(vec![
            b"{\"status\":\"a\"}\n{not json}\n",
        ]));
        pin_mut!(records);

        assert_eq!(records.next().await.unwrap().unwrap().status, "a");
        let err = records.next().await.unwrap().unwrap_err();
        assert!(matches!(err, OllamaError::Json(_)));
        assert!(records.next().await.is_none());
    }

    #[tokio::test]
    async fn test_decode_type_mismatch_yields_error() {
        // completed must be a number
        let records = decode_json_stream::<PullRecord>(byte_stream(vec![
            br#"{"status":"downloading","completed":"half"}"#,
        ]));
        pin_mut!(records);

        let err = records.next().await.unwrap().unwrap_err();
        assert!(matches!(err, OllamaError::Json(_)));
    }

    #[tokio::test]
    async fn test_decode_incomplete_tail_ends_stream_silently() {
        // The caller decides whether an early end without success is an error
        let records = decode_json_stream::<PullRecord>(byte_stream(vec![
            b"{\"status\":\"a\"}\n{\"status\":\"trunc",
        ]));
        pin_mut!(records);

        assert_eq!(records.next().await.unwrap().unwrap().status, "a");
        assert!(records.next().await.is_none());
    }

    #[tokio::test]
    async fn test_decode_empty_stream() {
        let records = decode_json_stream::<PullRecord>(byte_stream(vec![]));
        pin_mut!(records);
        assert!(records.next().await.is_none());
    }

    #[tokio::test]
    async fn test_decode_generate_records() {
        use crate::models::GenerateResponse;

        let records = decode_json_stream::<GenerateResponse>(byte_stream(vec![
            b"{\"model\":\"m\",\"response\":\"Hel\",\"done\":false}\n",
            b"{\"model\":\"m\",\"response\":\"lo\",\"done\":true}\n",
        ]));
        pin_mut!(records);

        let first = records.next().await.unwrap().unwrap();
        assert_eq!(first.response, "Hel");
        assert!(!first.done);
        let last = records.next().await.unwrap().unwrap();
        assert_eq!(last.response, "lo");
        assert!(last.done);
    }
}
