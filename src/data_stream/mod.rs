//! Transcoding of model output chunks into the UI data stream protocol.

pub mod chunk;
pub mod finish;
pub mod part;
pub mod state;
pub mod stream;
pub mod transcoder;


pub use chunk::{ChunkContent, ContentPart, StreamChunk, ToolCallDelta};
pub use finish::{FinishReason, Usage};
pub use part::DataStreamPart;
pub use state::{ContentKind, StepState, ToolCallAccumulator};
pub use stream::{encode_lines, encode_stream};
pub use transcoder::{Transcoder, transcode_chunk};

/// Response header announcing the data stream protocol version.
pub const DATA_STREAM_HEADER: &str = "x-vercel-ai-data-stream";
pub const DATA_STREAM_VERSION: &str = "v1";
