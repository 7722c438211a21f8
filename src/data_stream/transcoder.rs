//! Chunk-to-part state machine.
//!
//! Each chunk is processed in three passes, always in this order: the step
//! tracker, the content encoder (which also emits the finish part), and the
//! tool call tracker.

use super::chunk::{ChunkContent, ContentPart, StreamChunk, ToolCallDelta};
use super::finish::{FinishReason, Usage};
use super::part::DataStreamPart;
use super::state::{ContentKind, StepState, ToolCallAccumulator};
use crate::error::TranscodeError;
use tracing::{debug, trace};

/// Processes one chunk against `state`, returning the next state and the parts to emit.
///
/// On error the state is consumed: the stream cannot be resumed and none of the
/// chunk's parts are returned.
pub fn transcode_chunk(
    mut state: StepState,
    chunk: &StreamChunk,
) -> Result<(StepState, Vec<DataStreamPart>), TranscodeError> {
    let mut parts = Vec::new();
    track_step(&mut state, chunk.id.as_deref(), &mut parts);
    encode_content(&mut state, chunk, &mut parts)?;
    track_tool_calls(&mut state, &chunk.tool_call_chunks, &mut parts)?;
    Ok((state, parts))
}

fn track_step(state: &mut StepState, run_id: Option<&str>, parts: &mut Vec<DataStreamPart>) {
    let Some(run_id) = run_id.filter(|id| state.is_new_step(id)) else {
        return;
    };
    // A superseded step is abandoned as-is: no finish part, no tool call end.
    if state.open_tool_call.is_some() {
        debug!(run_id, previous = ?state.step_id, "dropping open tool call of superseded step");
    }
    debug!(run_id, "starting step");
    state.begin_step(run_id);
    parts.push(DataStreamPart::StartStep {
        message_id: run_id.to_string(),
    });
}

fn encode_content(
    state: &mut StepState,
    chunk: &StreamChunk,
    parts: &mut Vec<DataStreamPart>,
) -> Result<(), TranscodeError> {
    match &chunk.content {
        ChunkContent::Text(text) => {
            if !text.is_empty() {
                parts.push(DataStreamPart::Text(text.clone()));
                state.last_content_kind = Some(ContentKind::Text);
            }
            if let Some(reason) = chunk.finish_reason() {
                finish_step(state, reason, parts)?;
            }
        }
        ChunkContent::Parts(items) => {
            for item in items {
                match item {
                    ContentPart::Bare(text) => {
                        state.last_content_kind = Some(ContentKind::Text);
                        parts.push(DataStreamPart::Text(text.clone()));
                    }
                    ContentPart::Text { text, index } => {
                        state.last_content_kind = Some(ContentKind::Text);
                        if let Some(index) = index {
                            state.last_content_index = Some(*index);
                        }
                        parts.push(DataStreamPart::Text(text.clone()));
                    }
                    ContentPart::Other(_) => {}
                }
            }
        }
    }
    Ok(())
}

fn finish_step(
    state: &mut StepState,
    reason: &str,
    parts: &mut Vec<DataStreamPart>,
) -> Result<(), TranscodeError> {
    if state.last_content_kind == Some(ContentKind::ToolCall) || state.open_tool_call.is_some() {
        parts.push(close_tool_call(state)?);
    }
    let finish_reason = FinishReason::from_provider(reason);
    debug!(provider_reason = reason, %finish_reason, "finishing step");
    parts.push(DataStreamPart::FinishStep {
        finish_reason,
        usage: Usage::default(),
        is_continued: false,
    });
    state.last_content_kind = None;
    Ok(())
}

fn close_tool_call(state: &mut StepState) -> Result<DataStreamPart, TranscodeError> {
    let call = state
        .open_tool_call
        .take()
        .ok_or(TranscodeError::OrphanToolCallEnd)?;
    trace!(tool_call_id = %call.id, args_len = call.args_text.len(), "closing tool call");
    Ok(call.into_part())
}

fn track_tool_calls(
    state: &mut StepState,
    deltas: &[ToolCallDelta],
    parts: &mut Vec<DataStreamPart>,
) -> Result<(), TranscodeError> {
    for delta in deltas {
        if state.last_content_kind == Some(ContentKind::ToolCall)
            && state.last_content_index.is_some()
            && state.last_content_index != delta.index
        {
            parts.push(close_tool_call(state)?);
        }

        if let Some(name) = &delta.name {
            // Only one call may be open; text between two calls does not close the first.
            if state.open_tool_call.is_some() {
                parts.push(close_tool_call(state)?);
            }
            let id = delta.id.clone().unwrap_or_default();
            trace!(tool_call_id = %id, tool_name = %name, index = ?delta.index, "opening tool call");
            parts.push(DataStreamPart::ToolCallStart {
                tool_call_id: id.clone(),
                tool_name: name.clone(),
            });
            state.open_tool_call = Some(ToolCallAccumulator::new(id, name.clone()));
        }

        let call = state
            .open_tool_call
            .as_mut()
            .ok_or(TranscodeError::OrphanArgumentDelta)?;
        let fragment = delta.args_fragment.as_deref().unwrap_or_default();
        call.push_fragment(fragment);
        parts.push(DataStreamPart::ToolCallDelta {
            tool_call_id: call.id.clone(),
            args_text_delta: fragment.to_string(),
        });

        state.last_content_index = delta.index;
        state.last_content_kind = Some(ContentKind::ToolCall);
    }
    Ok(())
}

/// Owns the state of one chunk stream.
///
/// A transcoder must not be shared between streams. After the first error it
/// refuses further chunks with [`TranscodeError::Aborted`].
#[derive(Debug)]
pub struct Transcoder {
    state: Option<StepState>,
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcoder {
    pub fn new() -> Self {
        Self {
            state: Some(StepState::new()),
        }
    }

    pub fn push(&mut self, chunk: &StreamChunk) -> Result<Vec<DataStreamPart>, TranscodeError> {
        let state = self.state.take().ok_or(TranscodeError::Aborted)?;
        let (state, parts) = transcode_chunk(state, chunk)?;
        self.state = Some(state);
        Ok(parts)
    }

    /// Like [`Transcoder::push`], but returns encoded protocol lines.
    pub fn push_lines(&mut self, chunk: &StreamChunk) -> Result<Vec<String>, TranscodeError> {
        Ok(self.push(chunk)?.iter().map(DataStreamPart::encode).collect())
    }

    pub fn state(&self) -> Option<&StepState> {
        self.state.as_ref()
    }

    pub fn is_aborted(&self) -> bool {
        self.state.is_none()
    }
}
