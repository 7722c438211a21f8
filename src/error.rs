use thiserror::Error;

/// Fatal conditions raised while transcoding a chunk stream.
///
/// Every variant aborts the stream: the chunk that triggered it produces no
/// output lines and the transcoder state is dropped.
#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Attempting to add a tool call end part without a tool call start part")]
    OrphanToolCallEnd,

    #[error("Attempting to add a tool call delta part without a tool call start part")]
    OrphanArgumentDelta,

    #[error("Invalid content type: {shape}")]
    UnsupportedContentShape { shape: &'static str },

    #[error("Malformed chunk: {0}")]
    MalformedChunk(#[from] serde_json::Error),

    #[error("Transcoder was aborted by an earlier error")]
    Aborted,
}

impl TranscodeError {
    /// Protocol violations are the errors caused by an inconsistent tool-call sequence.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::OrphanToolCallEnd | Self::OrphanArgumentDelta)
    }
}

/// Failure of a proxied chat stream after the response has started.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("upstream streaming error: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error(transparent)]
    Transcode(#[from] TranscodeError),
}
