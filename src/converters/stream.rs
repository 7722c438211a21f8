use super::openai::OpenAIStreamChunk;
use crate::data_stream::StreamChunk;
use crate::error::StreamError;
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use tracing::{debug, warn};

/// A meaningful line of an OpenAI-style server-sent event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    Data(String),
    Done,
}

/// Splits an SSE byte stream into lines, buffering partial lines across reads.
///
/// Only complete lines are decoded as UTF-8, so a multibyte character split
/// between two reads is reassembled before decoding.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseLine> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(parsed) = parse_line(&line[..pos]) {
                lines.push(parsed);
            }
        }
        lines
    }

    /// Flushes a trailing line that was not terminated by a newline.
    pub fn finish(&mut self) -> Option<SseLine> {
        let rest = std::mem::take(&mut self.pending);
        parse_line(&rest)
    }
}

fn parse_line(raw: &[u8]) -> Option<SseLine> {
    let line = String::from_utf8_lossy(raw);
    let line = line.strip_suffix('\r').unwrap_or(&line);
    debug!("raw streaming response: {:?}", line);

    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    match data {
        "" => None,
        "[DONE]" => Some(SseLine::Done),
        _ => Some(SseLine::Data(data.to_string())),
    }
}

struct ChunkStreamState<S> {
    bytes: Pin<Box<S>>,
    decoder: SseDecoder,
    queue: VecDeque<SseLine>,
    exhausted: bool,
}

/// Decodes an OpenAI chat completion SSE body into model output chunks.
///
/// Ends at `[DONE]`, at the end of the body, or after the first transport error.
/// Data lines that are not chat completion chunks are logged and skipped.
pub fn openai_chunk_stream<S, E>(bytes: S) -> impl Stream<Item = Result<StreamChunk, StreamError>>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<StreamError>,
{
    let initial = ChunkStreamState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        queue: VecDeque::new(),
        exhausted: false,
    };

    stream::unfold(initial, |mut state| async move {
        loop {
            match state.queue.pop_front() {
                Some(SseLine::Data(data)) => match serde_json::from_str::<OpenAIStreamChunk>(&data) {
                    Ok(chunk) => return Some((Ok(chunk.into()), state)),
                    Err(e) => {
                        warn!("Skipping unparseable stream data: {} ({})", e, data);
                        continue;
                    }
                },
                Some(SseLine::Done) => return None,
                None if state.exhausted => return None,
                None => {}
            }

            match state.bytes.next().await {
                Some(Ok(bytes)) => state.queue.extend(state.decoder.push(&bytes)),
                Some(Err(e)) => {
                    state.exhausted = true;
                    state.queue.clear();
                    return Some((Err(e.into()), state));
                }
                None => {
                    state.exhausted = true;
                    state.queue.extend(state.decoder.finish());
                }
            }
        }
    })
}
