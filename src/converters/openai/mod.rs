pub mod openai_message;
pub mod openai_request;
pub mod openai_stream_choice;
pub mod openai_stream_chunk;
pub mod openai_stream_delta;
pub mod openai_stream_tool_call;
pub mod openai_tool_call;
pub mod openai_usage;

pub use openai_message::OpenAIMessage;
pub use openai_request::{OpenAIRequest, OpenAIStreamOptions};
pub use openai_stream_choice::OpenAIStreamChoice;
pub use openai_stream_chunk::OpenAIStreamChunk;
pub use openai_stream_delta::OpenAIStreamDelta;
pub use openai_stream_tool_call::{OpenAIStreamToolCall, OpenAIStreamToolCallFunction};
pub use openai_tool_call::{OpenAIToolCall, OpenAIToolCallFunction};
pub use openai_usage::OpenAIUsage;
