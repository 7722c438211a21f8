//! Incoming model output chunks.
//!
//! A chunk is resolved into typed form once, when it is ingested. The JSON
//! shape accepted here is the one LangChain uses for `AIMessageChunk`:
//! `{id, content, tool_call_chunks, response_metadata, usage_metadata}`.

use crate::error::TranscodeError;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Provider metadata keys that may carry the finish reason, in lookup order.
pub const FINISH_REASON_FIELDS: [&str; 2] = ["stop_reason", "finish_reason"];

/// One incremental fragment of model output.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "RawChunk")]
pub struct StreamChunk {
    /// Run identifier shared by every chunk of one step.
    pub id: Option<String>,
    pub content: ChunkContent,
    pub tool_call_chunks: Vec<ToolCallDelta>,
    pub response_metadata: Map<String, Value>,
    /// Opaque provider usage metadata. Forwarded nowhere yet.
    pub usage_metadata: Option<Value>,
}

/// The content payload of a chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One entry of a content part list.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    /// A plain string entry, treated as text.
    Bare(String),
    /// A structured entry whose `type` is `"text"`.
    Text { text: String, index: Option<usize> },
    /// Any other structured kind (`tool_use`, `thinking`, ...). Ignored by the encoder.
    Other(Value),
}

/// Incremental update to one tool call, keyed by `index` within the step.
///
/// LangChain leaves `index` unset (or `null`) for providers that do not number
/// their tool calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "args", alias = "args_fragment")]
    pub args_fragment: Option<String>,
}

#[derive(Deserialize)]
struct RawChunk {
    #[serde(default)]
    id: Option<String>,
    #[serde(default = "empty_text")]
    content: Value,
    #[serde(default)]
    tool_call_chunks: Option<Vec<ToolCallDelta>>,
    #[serde(default)]
    response_metadata: Option<Map<String, Value>>,
    #[serde(default)]
    usage_metadata: Option<Value>,
}

fn empty_text() -> Value {
    Value::String(String::new())
}

impl TryFrom<RawChunk> for StreamChunk {
    type Error = TranscodeError;

    fn try_from(raw: RawChunk) -> Result<Self, Self::Error> {
        Ok(Self {
            id: raw.id,
            content: ChunkContent::try_from(raw.content)?,
            tool_call_chunks: raw.tool_call_chunks.unwrap_or_default(),
            response_metadata: raw.response_metadata.unwrap_or_default(),
            usage_metadata: raw.usage_metadata,
        })
    }
}

impl StreamChunk {
    pub fn new(id: impl Into<String>, content: impl Into<ChunkContent>) -> Self {
        Self {
            id: Some(id.into()),
            content: content.into(),
            ..Self::default()
        }
    }

    /// Parses a chunk from JSON, keeping an unsupported content shape distinguishable
    /// from a structurally malformed chunk.
    pub fn from_value(value: Value) -> Result<Self, TranscodeError> {
        let raw: RawChunk = serde_json::from_value(value)?;
        raw.try_into()
    }

    pub fn from_json(data: &str) -> Result<Self, TranscodeError> {
        let raw: RawChunk = serde_json::from_str(data)?;
        raw.try_into()
    }

    pub fn with_tool_call(mut self, delta: ToolCallDelta) -> Self {
        self.tool_call_chunks.push(delta);
        self
    }

    pub fn with_finish_reason(mut self, reason: impl Into<String>) -> Self {
        self.response_metadata
            .insert("finish_reason".to_string(), Value::String(reason.into()));
        self
    }

    pub fn with_usage(mut self, usage: Value) -> Self {
        self.usage_metadata = Some(usage);
        self
    }

    /// First string-valued finish field found in the provider metadata.
    pub fn finish_reason(&self) -> Option<&str> {
        FINISH_REASON_FIELDS
            .iter()
            .find_map(|field| self.response_metadata.get(*field).and_then(Value::as_str))
    }
}

impl Default for ChunkContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<&str> for ChunkContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for ChunkContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<ContentPart>> for ChunkContent {
    fn from(parts: Vec<ContentPart>) -> Self {
        Self::Parts(parts)
    }
}

impl TryFrom<Value> for ChunkContent {
    type Error = TranscodeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(text) => Ok(Self::Text(text)),
            Value::Array(items) => items
                .into_iter()
                .map(ContentPart::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Parts),
            other => Err(TranscodeError::UnsupportedContentShape {
                shape: shape_name(&other),
            }),
        }
    }
}

impl ContentPart {
    pub fn text(text: impl Into<String>, index: usize) -> Self {
        Self::Text {
            text: text.into(),
            index: Some(index),
        }
    }
}

impl TryFrom<Value> for ContentPart {
    type Error = TranscodeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(text) => Ok(Self::Bare(text)),
            Value::Object(ref obj) if obj.get("type").and_then(Value::as_str) == Some("text") => {
                Ok(Self::Text {
                    text: obj
                        .get("text")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    index: obj
                        .get("index")
                        .and_then(Value::as_u64)
                        .map(|i| i as usize),
                })
            }
            Value::Object(_) => Ok(Self::Other(value)),
            other => Err(TranscodeError::UnsupportedContentShape {
                shape: shape_name(&other),
            }),
        }
    }
}

impl ToolCallDelta {
    /// First delta of a tool call: carries its id and name.
    pub fn start(
        index: usize,
        id: impl Into<String>,
        name: impl Into<String>,
        args: impl Into<String>,
    ) -> Self {
        Self {
            index: Some(index),
            id: Some(id.into()),
            name: Some(name.into()),
            args_fragment: Some(args.into()),
        }
    }

    /// Follow-up delta carrying only an argument fragment.
    pub fn fragment(index: usize, args: impl Into<String>) -> Self {
        Self {
            index: Some(index),
            args_fragment: Some(args.into()),
            ..Self::default()
        }
    }
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
