use super::part::DataStreamPart;

/// Kind of the most recently encoded content within a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    ToolCall,
}

/// A tool call whose arguments are still streaming.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallAccumulator {
    pub id: String,
    pub name: String,
    pub args_text: String,
}

impl ToolCallAccumulator {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args_text: String::new(),
        }
    }

    pub fn push_fragment(&mut self, fragment: &str) {
        self.args_text.push_str(fragment);
    }

    /// Consumes the accumulator into its completed tool-call part.
    pub fn into_part(self) -> DataStreamPart {
        DataStreamPart::ToolCall {
            tool_call_id: self.id,
            tool_name: self.name,
            args: self.args_text,
        }
    }
}

/// Per-stream transcoder state. Everything except `step_id` is reset when a new step begins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepState {
    pub step_id: Option<String>,
    pub last_content_kind: Option<ContentKind>,
    pub last_content_index: Option<usize>,
    pub open_tool_call: Option<ToolCallAccumulator>,
}

impl StepState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when `run_id` starts a step other than the tracked one.
    pub fn is_new_step(&self, run_id: &str) -> bool {
        !run_id.is_empty() && self.step_id.as_deref() != Some(run_id)
    }

    pub(crate) fn begin_step(&mut self, run_id: &str) {
        *self = Self {
            step_id: Some(run_id.to_string()),
            ..Self::default()
        };
    }
}
