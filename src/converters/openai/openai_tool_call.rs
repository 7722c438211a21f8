use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIToolCall {
    pub id: String,
    pub r#type: String,
    pub function: OpenAIToolCallFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIToolCallFunction {
    pub name: String,
    /// JSON-encoded arguments, as the backend expects them.
    pub arguments: String,
}

impl OpenAIToolCall {
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            r#type: "function".to_string(),
            function: OpenAIToolCallFunction {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}
