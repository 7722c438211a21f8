use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::models::ErrorResponse;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<RwLock<Config>>,
    pub token: Option<String>,
    pub llm_client: Arc<LlmClient>,
}

fn unauthorized(message: &str, code: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new(message, "invalid_request_error", code)),
    )
        .into_response()
}

pub async fn require_authorization(
    State(app_state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    // Skip authorization for health check endpoint
    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let Some(expected) = app_state.token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get("Authorization")
        .and_then(|hv| hv.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").map(|t| t.trim()))
        .or_else(|| request.headers().get("x-api-key").and_then(|hv| hv.to_str().ok()));

    match provided {
        None => {
            info!("Missing Authorization header");
            return Err(unauthorized("Authorization header is required", "missing_auth_header"));
        }
        Some(token) if token != expected => {
            info!("Invalid token provided");
            return Err(unauthorized("Invalid authentication token", "invalid_token"));
        }
        Some(_) => debug!("Token validation successful"),
    }

    Ok(next.run(request).await)
}
