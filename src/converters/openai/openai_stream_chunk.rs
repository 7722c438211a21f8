use crate::converters::openai::{OpenAIStreamChoice, OpenAIUsage};
use crate::data_stream::{StreamChunk, ToolCallDelta};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIStreamChunk {
    pub id: String,
    pub object: Option<String>,
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub model: String,
    pub choices: Option<Vec<OpenAIStreamChoice>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<OpenAIUsage>,
}

/// Only the first choice is transcoded; the data stream carries a single message.
impl From<OpenAIStreamChunk> for StreamChunk {
    fn from(openai_chunk: OpenAIStreamChunk) -> Self {
        let choice = openai_chunk
            .choices
            .and_then(|choices| choices.into_iter().next());

        let (delta, finish_reason) = match choice {
            Some(choice) => (choice.delta.unwrap_or_default(), choice.finish_reason),
            None => (Default::default(), None),
        };

        let mut chunk = StreamChunk::new(openai_chunk.id, delta.content.unwrap_or_default());

        for tool_call in delta.tool_calls.unwrap_or_default() {
            let function = tool_call.function.unwrap_or_default();
            chunk = chunk.with_tool_call(ToolCallDelta {
                index: Some(tool_call.index),
                id: tool_call.id,
                name: function.name,
                args_fragment: function.arguments,
            });
        }

        if let Some(reason) = finish_reason {
            chunk = chunk.with_finish_reason(reason);
        }

        if let Some(usage) = openai_chunk.usage {
            chunk = chunk.with_usage(json!({
                "input_tokens": usage.prompt_tokens,
                "output_tokens": usage.completion_tokens,
                "total_tokens": usage.total_tokens,
            }));
        }

        chunk
    }
}
