//! Data stream protocol parts and their line encoding.
//!
//! Every part is written as `<code>:<json>\n`.

use super::finish::{FinishReason, Usage};
use serde_json::Value;
use std::fmt;

/// Written in place of the args of a tool call that streamed no argument text.
const EMPTY_ARGS: &str = "{}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataStreamPart {
    /// `f`: a new step (one provider round-trip) begins.
    StartStep { message_id: String },
    /// `0`: text fragment.
    Text(String),
    /// `b`: a streamed tool call begins.
    ToolCallStart { tool_call_id: String, tool_name: String },
    /// `c`: one argument fragment of the open tool call.
    ToolCallDelta { tool_call_id: String, args_text_delta: String },
    /// `9`: a completed tool call. `args` is embedded as-is, never re-escaped;
    /// empty args are written as `{}`.
    ToolCall { tool_call_id: String, tool_name: String, args: String },
    /// `e`: the step finished.
    FinishStep { finish_reason: FinishReason, usage: Usage, is_continued: bool },
    /// `3`: the stream failed.
    Error(String),
}

impl DataStreamPart {
    pub fn code(&self) -> &'static str {
        match self {
            Self::StartStep { .. } => "f",
            Self::Text(_) => "0",
            Self::ToolCallStart { .. } => "b",
            Self::ToolCallDelta { .. } => "c",
            Self::ToolCall { .. } => "9",
            Self::FinishStep { .. } => "e",
            Self::Error(_) => "3",
        }
    }

    /// The full protocol line, including the trailing newline.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    fn payload(&self) -> String {
        match self {
            Self::StartStep { message_id } => {
                format!(r#"{{"messageId":{}}}"#, json_string(message_id))
            }
            Self::Text(text) | Self::Error(text) => json_string(text),
            Self::ToolCallStart { tool_call_id, tool_name } => format!(
                r#"{{"toolCallId":{},"toolName":{}}}"#,
                json_string(tool_call_id),
                json_string(tool_name)
            ),
            Self::ToolCallDelta { tool_call_id, args_text_delta } => format!(
                r#"{{"toolCallId":{},"argsTextDelta":{}}}"#,
                json_string(tool_call_id),
                json_string(args_text_delta)
            ),
            Self::ToolCall { tool_call_id, tool_name, args } => format!(
                r#"{{"toolCallId":{},"toolName":{},"args":{}}}"#,
                json_string(tool_call_id),
                json_string(tool_name),
                if args.is_empty() { EMPTY_ARGS } else { args.as_str() }
            ),
            Self::FinishStep { finish_reason, usage, is_continued } => format!(
                r#"{{"finishReason":{},"usage":{{"promptTokens":{},"completionTokens":{}}},"isContinued":{}}}"#,
                json_string(finish_reason.as_str()),
                usage.prompt_tokens,
                usage.completion_tokens,
                is_continued
            ),
        }
    }
}

impl fmt::Display for DataStreamPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:{}", self.code(), self.payload())
    }
}

fn json_string(s: &str) -> String {
    Value::from(s).to_string()
}
