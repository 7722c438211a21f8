use crate::config::ModelConfig;
use crate::converters::openai::{OpenAIMessage, OpenAIRequest, OpenAIStreamOptions, OpenAIToolCall};
use crate::models::{ChatMessage, ToolInvocation, ToolInvocationState};
use crate::request_id::RequestId;
use reqwest::header::HeaderValue;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

const FORWARDED_ROLES: [&str; 3] = ["system", "user", "assistant"];

#[derive(Debug)]
pub struct LlmClient {
    http_client: Arc<reqwest::Client>,
}

impl LlmClient {
    pub fn new(http_client: Arc<reqwest::Client>) -> Self {
        Self { http_client }
    }

    fn build_target_url(model_config: &ModelConfig) -> String {
        let api_base = &model_config.llm_params.api_base;
        let path = "chat/completions";
        if api_base.ends_with('/') {
            format!("{}{}", api_base, path)
        } else {
            format!("{}/{}", api_base, path)
        }
    }

    /// The configured system prompt goes first. Messages in roles the backend
    /// cannot take as plain text (`tool`, `data`, ...) are dropped.
    fn build_request_body(model_config: &ModelConfig, messages: &[ChatMessage]) -> OpenAIRequest {
        let system_prompt = model_config
            .llm_params
            .system_prompt
            .as_ref()
            .map(|prompt| OpenAIMessage::new("system", prompt.as_str()));

        let history = messages.iter().flat_map(|message| {
            if FORWARDED_ROLES.contains(&message.role.as_str()) {
                Self::convert_message(message)
            } else {
                warn!("Dropping message with unsupported role: {}", message.role);
                Vec::new()
            }
        });

        OpenAIRequest {
            model: model_config.llm_params.model.clone(),
            messages: system_prompt.into_iter().chain(history).collect(),
            stream: true,
            stream_options: Some(OpenAIStreamOptions { include_usage: true }),
        }
    }

    /// An assistant message whose tool invocations have results becomes an
    /// assistant `tool_calls` message followed by one `tool` message per call.
    /// Invocations still waiting for a result are left out, since the backend
    /// rejects a tool call with no answer.
    fn convert_message(message: &ChatMessage) -> Vec<OpenAIMessage> {
        let invocations = message.tool_invocations();
        if message.role != "assistant" || invocations.is_empty() {
            return vec![OpenAIMessage::new(message.role.as_str(), message.content.as_str())];
        }

        let answered: Vec<(&ToolInvocation, &Value)> = invocations
            .into_iter()
            .filter_map(|invocation| match (&invocation.state, &invocation.result) {
                (ToolInvocationState::Result, Some(result)) => Some((invocation, result)),
                _ => {
                    debug!(
                        "Skipping tool invocation {} without result",
                        invocation.tool_call_id
                    );
                    None
                }
            })
            .collect();

        if answered.is_empty() {
            return vec![OpenAIMessage::new("assistant", message.content.as_str())];
        }

        let tool_calls = answered
            .iter()
            .map(|(invocation, _)| {
                let arguments = invocation
                    .args
                    .as_ref()
                    .map_or_else(|| "{}".to_string(), Value::to_string);
                OpenAIToolCall::function(
                    invocation.tool_call_id.as_str(),
                    invocation.tool_name.as_str(),
                    arguments,
                )
            })
            .collect();

        let results = answered.iter().map(|(invocation, result)| {
            let content = match result {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            OpenAIMessage::tool_result(invocation.tool_call_id.as_str(), content)
        });

        std::iter::once(OpenAIMessage::assistant_tool_calls(&message.content, tool_calls))
            .chain(results)
            .collect()
    }

    /// Opens a streaming chat completion against the model's backend.
    pub async fn stream_chat(
        &self,
        model_config: &ModelConfig,
        messages: &[ChatMessage],
        request_id: &RequestId,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let target_url = Self::build_target_url(model_config);
        let body = Self::build_request_body(model_config, messages);

        let mut target_request = self
            .http_client
            .post(&target_url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream");

        // Propagate request id upstream
        if let Ok(val) = HeaderValue::from_str(&request_id.0) {
            target_request = target_request.header("x-request-id", val);
        }

        if !model_config.llm_params.api_key.is_empty() {
            target_request = target_request.header(
                "Authorization",
                format!("Bearer {}", model_config.llm_params.api_key),
            );
        }

        info!("Forwarding chat to: {}", target_url);
        debug!("request body: {:?}", serde_json::to_string(&body));
        target_request.json(&body).send().await
    }
}
