//! Incremental NDJSON decoding of `/api/chat` streaming responses.

use std::pin::Pin;

use futures::stream::{self, Stream};
use tracing::debug;

use super::client::OllamaError;
use super::types::ChatResponse;

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, OllamaError>> + Send>>;

struct StreamState {
    response: reqwest::Response,
    buffer: Vec<u8>,
    finished: bool,
}

/// Yields the message content of each chunk until `done` or end of body.
pub(super) fn token_stream(response: reqwest::Response) -> TokenStream {
    let state = StreamState {
        response,
        buffer: Vec::new(),
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            if let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = state.buffer.drain(..=pos).collect();
                match decode_line(&line) {
                    Ok(Some(chunk)) => {
                        if chunk.done {
                            state.finished = true;
                        }
                        if !chunk.text.is_empty() {
                            return Some((Ok(chunk.text), state));
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        state.finished = true;
                        return Some((Err(e), state));
                    }
                }
                continue;
            }

            match state.response.chunk().await {
                Ok(Some(bytes)) => state.buffer.extend_from_slice(&bytes),
                Ok(None) => {
                    state.finished = true;
                    let rest = std::mem::take(&mut state.buffer);
                    debug!(trailing = rest.len(), "chat stream ended");
                    return match decode_line(&rest) {
                        Ok(Some(chunk)) if !chunk.text.is_empty() => Some((Ok(chunk.text), state)),
                        Ok(_) => None,
                        Err(e) => Some((Err(e), state)),
                    };
                }
                Err(e) => {
                    state.finished = true;
                    return Some((Err(e.into()), state));
                }
            }
        }
    }))
}

#[derive(Debug, PartialEq)]
pub(super) struct DecodedChunk {
    pub text: String,
    pub done: bool,
}

/// `Ok(None)` for blank lines.
pub(super) fn decode_line(line: &[u8]) -> Result<Option<DecodedChunk>, OllamaError> {
    let text = String::from_utf8_lossy(line);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let chunk: ChatResponse = serde_json::from_str(trimmed)
        .map_err(|e| OllamaError::Decode(format!("invalid stream chunk: {e}")))?;

    if let Some(err) = chunk.error {
        return Err(OllamaError::Stream(err));
    }

    Ok(Some(DecodedChunk {
        text: chunk.message.map(|m| m.content).unwrap_or_default(),
        done: chunk.done,
    }))
}
