//! Server-Sent Events (SSE) processing for streaming responses.
//!
//! This module converts raw byte streams from the ChatWait streaming endpoint
//! into structured [`StreamEvent`] records. The service frames each record as
//! an SSE `data:` line terminated by a blank line, but bare newline-delimited
//! JSON is accepted too.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::error::{Error, Result};
use crate::types::StreamEvent;

/// Process a stream of bytes into a stream of decoded records.
///
/// This function takes a byte stream from an HTTP response and converts it
/// into a stream of parsed [`StreamEvent`] values, handling framing, chunk
/// reassembly, and error conditions. Records that parse but match no known
/// shape come through as [`StreamEvent::Ignored`]; records that do not parse
/// are errors the caller must treat as fatal for the turn.
pub fn process_sse<S>(byte_stream: S) -> impl Stream<Item = Result<StreamEvent>>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin + 'static,
{
    // Convert reqwest errors to our error type
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::transport(format!("error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    let buffer = String::new();

    stream::unfold(
        (stream, buffer),
        move |(mut stream, mut buffer)| async move {
            loop {
                // First check if we have a complete record in the buffer
                if let Some((event, remaining)) = extract_record(&buffer) {
                    buffer = remaining;
                    return Some((event, (stream, buffer)));
                }

                // Read more data
                match stream.next().await {
                    Some(Ok(bytes)) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => buffer.push_str(&text),
                        Err(e) => {
                            return Some((
                                Err(Error::encoding(
                                    format!("invalid UTF-8 in stream: {e}"),
                                    Some(Box::new(e)),
                                )),
                                (stream, buffer),
                            ));
                        }
                    },
                    Some(Err(e)) => {
                        return Some((Err(e), (stream, buffer)));
                    }
                    None => {
                        // End of stream; flush any unterminated trailing record
                        let trailing = std::mem::take(&mut buffer);
                        let trailing = trailing.trim();
                        if !trailing.is_empty() {
                            return Some((parse_record(trailing), (stream, buffer)));
                        }
                        return None;
                    }
                }
            }
        },
    )
}

/// Extract the next complete record from the buffer.
///
/// Records are newline-delimited; blank lines between SSE events are
/// consumed silently. Returns `None` until a full line is buffered.
fn extract_record(buffer: &str) -> Option<(Result<StreamEvent>, String)> {
    let mut rest = buffer;
    loop {
        let (line, remaining) = rest.split_once('\n')?;
        let line = line.trim();
        if line.is_empty() {
            rest = remaining;
            continue;
        }
        return Some((parse_record(line), remaining.to_string()));
    }
}

/// Parse a single record line into a stream event.
fn parse_record(line: &str) -> Result<StreamEvent> {
    let payload = line.strip_prefix("data:").map(str::trim).unwrap_or(line);
    let value: serde_json::Value = serde_json::from_str(payload).map_err(|e| {
        Error::parse(
            "malformed record on stream".to_string(),
            Some(Box::new(e)),
        )
    })?;
    StreamEvent::from_value(value)
}
