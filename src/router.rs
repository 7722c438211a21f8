use crate::auth::{self, AppState};
use crate::converters::response_handler::{data_stream_response, error_response};
use crate::converters::stream::openai_chunk_stream;
use crate::data_stream::StreamChunk;
use crate::models::{ChatRequest, ModelInfo, ModelsResponse};
use crate::request_id::{self, RequestId};
use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::stream;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/v1/data-stream", post(data_stream))
        .route("/v1/models", get(list_models))
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::require_authorization,
        ))
        .layer(middleware::from_fn(request_id::inject_request_id))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

/// Proxies a chat to the configured backend and streams the reply as a data stream.
#[axum_macros::debug_handler]
pub async fn chat(
    State(app_state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(chat_request): Json<ChatRequest>,
) -> Response {
    let model_config = {
        let config = app_state.config.read().await;
        match config.get_model_config(chat_request.model.as_deref()) {
            Some(model_config) => model_config.clone(),
            None => {
                let model = chat_request.model.as_deref().unwrap_or_default();
                info!("Model '{}' not found in configuration", model);
                return error_response(
                    StatusCode::NOT_FOUND,
                    format!("Model '{}' not found", model),
                    "invalid_request_error",
                    "model_not_found",
                );
            }
        }
    };
    debug!(
        model = %model_config.model_name,
        messages = chat_request.messages.len(),
        "Received chat request"
    );

    let response = match app_state
        .llm_client
        .stream_chat(&model_config, &chat_request.messages, &request_id)
        .await
    {
        Ok(response) => response,
        Err(e) => {
            warn!("Failed to reach upstream: {}", e);
            return error_response(
                StatusCode::BAD_GATEWAY,
                format!("Failed to reach upstream: {}", e),
                "upstream_error",
                "upstream_unreachable",
            );
        }
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!("Upstream returned {}: {}", status, body);
        return error_response(
            StatusCode::BAD_GATEWAY,
            format!("Upstream returned {}: {}", status, body),
            "upstream_error",
            "upstream_status",
        );
    }

    data_stream_response(openai_chunk_stream(response.bytes_stream()))
}

/// Transcodes a posted list of LangChain-style chunks.
#[axum_macros::debug_handler]
pub async fn data_stream(Json(chunks): Json<Vec<Value>>) -> Response {
    debug!("Transcoding {} posted chunks", chunks.len());
    data_stream_response(stream::iter(chunks.into_iter().map(StreamChunk::from_value)))
}

#[axum_macros::debug_handler]
pub async fn list_models(State(app_state): State<AppState>) -> Response {
    let config = app_state.config.read().await;
    let response = ModelsResponse {
        object: "list".to_string(),
        data: config
            .model_names()
            .map(|name| ModelInfo {
                id: name.to_string(),
                object: "model".to_string(),
            })
            .collect(),
    };
    debug!("Returning {} models", response.data.len());
    Json(response).into_response()
}

pub async fn health() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::llm_client::LlmClient;
    use axum::http::header::CONTENT_TYPE;
    use http_body_util::BodyExt;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    fn app_state(api_base: &str, token: Option<&str>) -> AppState {
        let yaml = format!(
            r#"
model_list:
  - model_name: default
    llm_params:
      model: gpt-4o-mini
      api_base: {}
      api_key: sk-test
      system_prompt: You help people drive.
"#,
            api_base
        );
        AppState {
            config: Arc::new(RwLock::new(Config::from_yaml(&yaml).unwrap())),
            token: token.map(str::to_string),
            llm_client: Arc::new(LlmClient::new(Arc::new(reqwest::Client::new()))),
        }
    }

    fn chat_request(model: Option<&str>) -> ChatRequest {
        serde_json::from_value(json!({
            "id": "chat-1",
            "model": model,
            "messages": [{"role": "user", "content": "Tell me a joke, then start driving the BMW."}]
        }))
        .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_data_stream_endpoint() {
        let chunks = vec![
            json!({"id": "run-1", "content": "Hi", "response_metadata": {}}),
            json!({"id": "run-1", "content": "", "tool_call_chunks": [
                {"name": "StartDriving", "args": "{}", "id": "call_1", "index": 0}
            ]}),
            json!({"id": "run-1", "content": "", "response_metadata": {"finish_reason": "tool_calls"}}),
        ];
        let response = data_stream(Json(chunks)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(response.headers()["x-vercel-ai-data-stream"], "v1");
        assert_eq!(
            body_text(response).await,
            concat!(
                "f:{\"messageId\":\"run-1\"}\n",
                "0:\"Hi\"\n",
                "b:{\"toolCallId\":\"call_1\",\"toolName\":\"StartDriving\"}\n",
                "c:{\"toolCallId\":\"call_1\",\"argsTextDelta\":\"{}\"}\n",
                "9:{\"toolCallId\":\"call_1\",\"toolName\":\"StartDriving\",\"args\":{}}\n",
                "e:{\"finishReason\":\"tool-calls\",\"usage\":{\"promptTokens\":0,\"completionTokens\":0},\"isContinued\":false}\n",
            )
        );
    }

    #[tokio::test]
    async fn test_data_stream_reports_bad_chunk_in_band() {
        let chunks = vec![
            json!({"id": "run-1", "content": "ok"}),
            json!({"id": "run-1", "content": 42}),
            json!({"id": "run-1", "content": "never sent"}),
        ];
        let body = body_text(data_stream(Json(chunks)).await).await;
        assert_eq!(
            body,
            "f:{\"messageId\":\"run-1\"}\n0:\"ok\"\n3:\"Invalid content type: number\"\n"
        );
    }

    #[tokio::test]
    async fn test_chat_streams_upstream_reply() {
        let mut server = mockito::Server::new_async().await;
        let sse = [
            json!({"id": "chatcmpl-9", "object": "chat.completion.chunk", "created": 1, "model": "gpt-4o-mini",
                   "choices": [{"index": 0, "delta": {"role": "assistant", "content": ""}, "finish_reason": null}]}),
            json!({"id": "chatcmpl-9", "object": "chat.completion.chunk", "created": 1, "model": "gpt-4o-mini",
                   "choices": [{"index": 0, "delta": {"content": "Buckle up!"}, "finish_reason": null}]}),
            json!({"id": "chatcmpl-9", "object": "chat.completion.chunk", "created": 1, "model": "gpt-4o-mini",
                   "choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]}),
        ]
        .iter()
        .map(|chunk| format!("data: {}\n\n", chunk))
        .collect::<String>()
            + "data: [DONE]\n\n";

        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::PartialJson(json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "You help people drive."},
                    {"role": "user", "content": "Tell me a joke, then start driving the BMW."}
                ],
                "stream": true
            })))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(sse)
            .create_async()
            .await;

        let state = app_state(&format!("{}/v1", server.url()), None);
        let response = chat(
            State(state),
            Extension(RequestId("req-1".to_string())),
            Json(chat_request(None)),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-vercel-ai-data-stream"], "v1");
        assert_eq!(
            body_text(response).await,
            "f:{\"messageId\":\"chatcmpl-9\"}\n0:\"Buckle up!\"\ne:{\"finishReason\":\"stop\",\"usage\":{\"promptTokens\":0,\"completionTokens\":0},\"isContinued\":false}\n"
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_unknown_model() {
        let state = app_state("http://127.0.0.1:1/v1", None);
        let response = chat(
            State(state),
            Extension(RequestId("req-2".to_string())),
            Json(chat_request(Some("gpt-5"))),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["error"]["code"], "model_not_found");
        assert_eq!(body["error"]["message"], "Model 'gpt-5' not found");
    }

    #[tokio::test]
    async fn test_chat_upstream_error_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body("{\"error\":{\"message\":\"overloaded\"}}")
            .create_async()
            .await;

        let state = app_state(&format!("{}/v1", server.url()), None);
        let response = chat(
            State(state),
            Extension(RequestId("req-3".to_string())),
            Json(chat_request(Some("default"))),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["error"]["code"], "upstream_status");
        assert!(body["error"]["message"].as_str().unwrap().contains("overloaded"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_router_authorization_and_request_id() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = build_router(app_state("http://127.0.0.1:1/v1", Some("secret")));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::new();
        let base = format!("http://{}", addr);

        let health = client.get(format!("{}/health", base)).send().await.unwrap();
        assert_eq!(health.status(), 200);
        assert_eq!(health.text().await.unwrap(), "OK");

        let denied = client.get(format!("{}/v1/models", base)).send().await.unwrap();
        assert_eq!(denied.status(), 401);

        let wrong = client
            .get(format!("{}/v1/models", base))
            .bearer_auth("nope")
            .send()
            .await
            .unwrap();
        assert_eq!(wrong.status(), 401);

        let allowed = client
            .get(format!("{}/v1/models", base))
            .bearer_auth("secret")
            .header("x-request-id", "trace-7")
            .send()
            .await
            .unwrap();
        assert_eq!(allowed.status(), 200);
        assert_eq!(allowed.headers()["x-request-id"], "trace-7");
        let models: Value = allowed.json().await.unwrap();
        assert_eq!(models, json!({"object": "list", "data": [{"id": "default", "object": "model"}]}));

        let via_api_key = client
            .post(format!("{}/v1/data-stream", base))
            .header("x-api-key", "secret")
            .json(&json!([{"id": "run-1", "content": "x"}]))
            .send()
            .await
            .unwrap();
        assert_eq!(via_api_key.status(), 200);
        assert_eq!(
            via_api_key.text().await.unwrap(),
            "f:{\"messageId\":\"run-1\"}\n0:\"x\"\n"
        );
    }
}
