use axum::body::Body;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::Stream;
use http::{header, HeaderMap, StatusCode};
use std::sync::Arc;

use crate::error::Chat2PoeError;
use crate::models::client::ClientRequest;
use crate::models::poe::QueryOptions;
use crate::service::{chat, responses};
use crate::translate::to_protocol_messages;
use crate::util::{cors_layer_from_env, error_response, AppState};

impl IntoResponse for Chat2PoeError {
    fn into_response(self) -> Response {
        error_response(self.status_code(), &self.to_string())
    }
}

/// Build the Axum router with both API surfaces.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/v1/responses", post(create_response))
        .route("/v1/chat/completions", post(create_chat_completion))
        .with_state(state)
        .layer(cors_layer_from_env())
}

/// Service status endpoint to expose available routes.
async fn status() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "chat2poe",
        "version": env!("CARGO_PKG_VERSION"),
        "routes": ["/", "/v1/responses", "/v1/chat/completions"]
    }))
}

/// Pull the Poe API key out of the request headers.
///
/// Precedence mirrors what clients send in practice: `x-api-key`, then
/// `api-key`, then `Authorization: Bearer <key>`.
fn extract_api_key(headers: &HeaderMap) -> Result<String, Chat2PoeError> {
    for name in ["x-api-key", "api-key"] {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            if !value.is_empty() {
                return Ok(value.to_string());
            }
        }
    }
    if let Some(auth) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(token) = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
        {
            if !token.is_empty() {
                return Ok(token.to_string());
            }
        }
    }
    Err(Chat2PoeError::MissingCredentials)
}

/// Wrap a pipeline stream as a `text/event-stream` response. An `Err` item
/// aborts the transport mid-stream, after the pipeline has already emitted
/// its error-shaped frame.
fn sse_response(
    stream: impl Stream<Item = Result<String, Chat2PoeError>> + Send + 'static,
) -> Response {
    http::Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header("Cache-Control", "no-cache")
        .header("Connection", "keep-alive")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "stream setup failed")
        })
}

/// Handle `POST /v1/responses` in streaming or aggregate mode.
async fn create_response(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let api_key = match extract_api_key(&headers) {
        Ok(key) => key,
        Err(e) => return e.into_response(),
    };
    let req = match ClientRequest::from_json(&body) {
        Ok(req) => req,
        Err(e) => return e.into_response(),
    };
    let (messages, instructions) = match to_protocol_messages(
        &req.input,
        &api_key,
        state.provider.as_ref(),
        state.cache.as_ref(),
        state.cache_ttl,
    )
    .await
    {
        Ok(translated) => translated,
        Err(e) => return e.into_response(),
    };

    let options = QueryOptions::default();
    if req.stream {
        sse_response(responses::stream_response(
            state.provider.clone(),
            req.model,
            api_key,
            messages,
            instructions,
            options,
        ))
    } else {
        let payload = responses::respond(
            state.provider.as_ref(),
            req.model,
            &api_key,
            messages,
            instructions,
            options,
        )
        .await;
        Json(payload).into_response()
    }
}

/// Handle `POST /v1/chat/completions` in streaming or aggregate mode.
/// Instructions are extracted (and discarded) here too, so system text never
/// leaks into the wire messages on either surface.
async fn create_chat_completion(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let api_key = match extract_api_key(&headers) {
        Ok(key) => key,
        Err(e) => return e.into_response(),
    };
    let req = match ClientRequest::from_json(&body) {
        Ok(req) => req,
        Err(e) => return e.into_response(),
    };
    let (messages, _instructions) = match to_protocol_messages(
        &req.input,
        &api_key,
        state.provider.as_ref(),
        state.cache.as_ref(),
        state.cache_ttl,
    )
    .await
    {
        Ok(translated) => translated,
        Err(e) => return e.into_response(),
    };

    let options = QueryOptions::default();
    if req.stream {
        sse_response(chat::stream_chat_completion(
            state.provider.clone(),
            req.model,
            api_key,
            messages,
            options,
        ))
    } else {
        let payload = chat::complete(
            state.provider.as_ref(),
            req.model,
            &api_key,
            messages,
            options,
        )
        .await;
        Json(payload).into_response()
    }
}
