use super::chunk::StreamChunk;
use super::part::DataStreamPart;
use super::transcoder::Transcoder;
use crate::error::TranscodeError;
use futures::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use tracing::warn;

struct EncoderState<S> {
    chunks: Pin<Box<S>>,
    transcoder: Transcoder,
    failed: bool,
}

/// Transcodes a stream of chunks into data stream parts.
///
/// The output ends after the first error, whether it came from the chunk source
/// or from the transcoder. Parts of the failing chunk are never yielded.
pub fn encode_stream<S, E>(chunks: S) -> impl Stream<Item = Result<DataStreamPart, E>>
where
    S: Stream<Item = Result<StreamChunk, E>>,
    E: From<TranscodeError> + std::fmt::Display,
{
    let initial = EncoderState {
        chunks: Box::pin(chunks),
        transcoder: Transcoder::new(),
        failed: false,
    };

    stream::unfold(initial, |mut state| async move {
        if state.failed {
            return None;
        }
        let next = state.chunks.next().await?;
        let batch = match next.and_then(|chunk| state.transcoder.push(&chunk).map_err(E::from)) {
            Ok(parts) => parts.into_iter().map(Ok).collect(),
            Err(e) => {
                warn!("Data stream aborted: {}", e);
                state.failed = true;
                vec![Err(e)]
            }
        };
        Some((stream::iter(batch), state))
    })
    .flatten()
}

/// Like [`encode_stream`], but yields encoded protocol lines.
pub fn encode_lines<S, E>(chunks: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<StreamChunk, E>>,
    E: From<TranscodeError> + std::fmt::Display,
{
    encode_stream(chunks).map(|part| part.map(|p| p.encode()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_stream::chunk::ToolCallDelta;

    #[tokio::test]
    async fn test_encode_lines_in_order() {
        let chunks = vec![
            Ok(StreamChunk::new("r1", "Hi")),
            Ok(StreamChunk::new("r1", "").with_finish_reason("stop")),
        ];
        let lines: Vec<Result<String, TranscodeError>> =
            encode_lines(stream::iter(chunks)).collect().await;
        let lines: Vec<String> = lines.into_iter().map(|l| l.unwrap()).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "f:{\"messageId\":\"r1\"}\n");
        assert_eq!(lines[1], "0:\"Hi\"\n");
        assert!(lines[2].starts_with("e:"));
    }

    #[tokio::test]
    async fn test_stream_ends_after_transcode_error() {
        let chunks = vec![
            Ok(StreamChunk::new("r1", "before")),
            Ok(StreamChunk::new("r1", "dropped").with_tool_call(ToolCallDelta::fragment(0, "{"))),
            Ok(StreamChunk::new("r1", "never")),
        ];
        let items: Vec<Result<DataStreamPart, TranscodeError>> =
            encode_stream(stream::iter(chunks)).collect().await;

        assert_eq!(items.len(), 3);
        assert!(matches!(items[0], Ok(DataStreamPart::StartStep { .. })));
        assert!(matches!(&items[1], Ok(DataStreamPart::Text(t)) if t == "before"));
        assert!(matches!(items[2], Err(TranscodeError::OrphanArgumentDelta)));
    }

    #[tokio::test]
    async fn test_stream_ends_after_source_error() {
        let chunks = vec![
            StreamChunk::from_json(r#"{"id": "r1", "content": "ok"}"#),
            StreamChunk::from_json(r#"{"id": "r1", "content": 3}"#),
            StreamChunk::from_json(r#"{"id": "r1", "content": "never"}"#),
        ];
        let items: Vec<Result<String, TranscodeError>> =
            encode_lines(stream::iter(chunks)).collect().await;

        assert_eq!(items.len(), 3);
        assert!(matches!(
            items[2],
            Err(TranscodeError::UnsupportedContentShape { shape: "number" })
        ));
    }
}
