//! # SSE Parser
//!
//! Server-Sent Events line parser for the provider's streaming endpoint.
//!
//! The Gemini stream delivers one JSON chunk per `data: ` line. Chunked
//! HTTP responses can split lines arbitrarily, so bytes are buffered and
//! split on newlines; any unterminated buffer content left when the stream
//! ends is processed as a final line (Gemini does not send an explicit
//! end-of-stream marker).

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tracing::warn;

/// Parse SSE lines from a byte stream, yielding raw JSON data strings.
pub fn parse_sse_lines<S>(byte_stream: S) -> impl Stream<Item = String> + Send
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + Unpin + 'static,
{
    futures::stream::unfold(
        (byte_stream, BytesMut::with_capacity(8192), false),
        |(mut stream, mut buffer, done)| async move {
            if done {
                return None;
            }

            loop {
                if let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                    let mut line_bytes = buffer.split_to(newline_pos + 1);
                    line_bytes.truncate(line_bytes.len() - 1);
                    if line_bytes.last() == Some(&b'\r') {
                        line_bytes.truncate(line_bytes.len() - 1);
                    }

                    let Ok(line) = std::str::from_utf8(&line_bytes) else {
                        continue;
                    };

                    if let Some(data) = extract_sse_data(line) {
                        return Some((data, (stream, buffer, false)));
                    }
                    continue;
                }

                match stream.next().await {
                    Some(Ok(chunk)) => {
                        buffer.extend_from_slice(&chunk);
                    }
                    Some(Err(e)) => {
                        warn!("SSE stream read error: {e}");
                        return None;
                    }
                    None => {
                        // Stream ended — the final chunk may lack a newline.
                        if !buffer.is_empty() {
                            let data = std::str::from_utf8(&buffer)
                                .ok()
                                .map(str::trim)
                                .and_then(extract_sse_data);
                            if let Some(data) = data {
                                buffer.clear();
                                return Some((data, (stream, buffer, true)));
                            }
                        }
                        return None;
                    }
                }
            }
        },
    )
}

/// Extract the data payload from an SSE line.
///
/// Returns `None` for empty lines, comments, and empty payloads.
fn extract_sse_data(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }
    let data = trimmed
        .strip_prefix("data: ")
        .or_else(|| trimmed.strip_prefix("data:"))?
        .trim();
    if data.is_empty() {
        return None;
    }
    Some(data.to_owned())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
