use crate::cache::{cache_from_env, cache_ttl_from_env, AttachmentCache};
use crate::poe::{PoeApiClient, PoeProvider};
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize dotenv and structured tracing based on RUST_LOG.
///
/// An explicit env file path can be supplied via ENV_FILE; otherwise the
/// conventional `.env` in the working directory is used when present.
pub fn init_tracing() {
    let mut env_source: String = "none".into();
    if let Ok(p) = std::env::var("ENV_FILE") {
        let p = p.trim();
        if !p.is_empty() && std::path::Path::new(p).is_file() && dotenvy::from_filename(p).is_ok() {
            env_source = p.to_string();
        }
    }
    if env_source == "none" && dotenvy::dotenv().is_ok() {
        env_source = ".env".into();
    }

    // Respects RUST_LOG potentially provided by the env file.
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=info".into());
    let subscriber = fmt().with_env_filter(EnvFilter::new(filter)).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    tracing::info!("Environment loaded from: {}", env_source);
}

/// Get the bind address for the HTTP server from env or default to 0.0.0.0:2026.
pub fn env_bind_addr() -> String {
    std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:2026".into())
}

/// Shared application state used by the HTTP server and handlers.
pub struct AppState {
    pub http: reqwest::Client,
    pub provider: Arc<dyn PoeProvider>,
    pub cache: Arc<dyn AttachmentCache>,
    pub cache_ttl: Duration,
}

impl AppState {
    /// Wire the default collaborators: reqwest-backed Poe client and the
    /// env-selected attachment cache.
    pub fn from_env() -> Self {
        let http = build_http_client_from_env();
        Self {
            http: http.clone(),
            provider: Arc::new(PoeApiClient::new(http)),
            cache: cache_from_env(),
            cache_ttl: cache_ttl_from_env(),
        }
    }

    /// State with injected collaborators, used by tests and embedders.
    pub fn with_collaborators(
        provider: Arc<dyn PoeProvider>,
        cache: Arc<dyn AttachmentCache>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            http: build_http_client_from_env(),
            provider,
            cache,
            cache_ttl,
        }
    }
}

/// Build an HTTP client honoring proxy and timeout environment variables.
///
/// Environment:
/// - CHAT2POE_NO_PROXY = 1|true|yes|on  -> disable all proxies
/// - CHAT2POE_PROXY_URL = <url>         -> proxy for all schemes
/// - HTTP_PROXY / HTTPS_PROXY           -> scheme-specific proxies
/// - CHAT2POE_HTTP_TIMEOUT_SECONDS     -> overall request timeout (u64)
pub fn build_http_client_from_env() -> reqwest::Client {
    let mut builder = reqwest::Client::builder();

    if let Ok(secs) = std::env::var("CHAT2POE_HTTP_TIMEOUT_SECONDS") {
        if let Ok(n) = secs.trim().parse::<u64>() {
            builder = builder.timeout(Duration::from_secs(n));
        }
    }

    let no_proxy = std::env::var("CHAT2POE_NO_PROXY")
        .map(|v| v.trim().to_ascii_lowercase())
        .map(|v| v == "1" || v == "true" || v == "yes" || v == "on")
        .unwrap_or(false);

    if no_proxy {
        builder = builder.no_proxy();
    } else {
        if let Ok(url) = std::env::var("CHAT2POE_PROXY_URL") {
            let u = url.trim();
            if !u.is_empty() {
                if let Ok(p) = reqwest::Proxy::all(u) {
                    builder = builder.proxy(p);
                }
            }
        }
        if let Ok(http_p) = std::env::var("HTTP_PROXY").or_else(|_| std::env::var("http_proxy")) {
            let u = http_p.trim();
            if !u.is_empty() {
                if let Ok(p) = reqwest::Proxy::http(u) {
                    builder = builder.proxy(p);
                }
            }
        }
        if let Ok(https_p) = std::env::var("HTTPS_PROXY").or_else(|_| std::env::var("https_proxy"))
        {
            let u = https_p.trim();
            if !u.is_empty() {
                if let Ok(p) = reqwest::Proxy::https(u) {
                    builder = builder.proxy(p);
                }
            }
        }
    }

    // User-Agent for observability
    builder = builder.user_agent(format!("chat2poe/{}", env!("CARGO_PKG_VERSION")));

    builder.build().unwrap_or_else(|_| reqwest::Client::new())
}

/// Build a JSON error response with the given HTTP status and message.
pub fn error_response(status: StatusCode, msg: &str) -> Response {
    let body = serde_json::json!({ "error": { "message": msg } });
    (status, axum::Json(body)).into_response()
}

/// Build a permissive CORS layer, optionally narrowed by env.
///
/// Environment variables:
/// - CORS_ALLOWED_ORIGINS: "*" or comma-separated origins
/// - CORS_ALLOWED_METHODS: "*" or comma-separated methods
pub fn cors_layer_from_env() -> tower_http::cors::CorsLayer {
    let mut layer = tower_http::cors::CorsLayer::new()
        .allow_headers(tower_http::cors::Any);

    match std::env::var("CORS_ALLOWED_ORIGINS") {
        Ok(origins) if origins.trim() != "*" => {
            let vals: Vec<http::HeaderValue> = origins
                .split(',')
                .filter_map(|p| http::HeaderValue::from_str(p.trim()).ok())
                .collect();
            if vals.is_empty() {
                layer = layer.allow_origin(tower_http::cors::Any);
            } else {
                layer = layer.allow_origin(tower_http::cors::AllowOrigin::list(vals));
            }
        }
        _ => layer = layer.allow_origin(tower_http::cors::Any),
    }

    match std::env::var("CORS_ALLOWED_METHODS") {
        Ok(methods) if methods.trim() != "*" => {
            let vals: Vec<http::Method> = methods
                .split(',')
                .filter_map(|p| http::Method::from_bytes(p.trim().to_ascii_uppercase().as_bytes()).ok())
                .collect();
            if vals.is_empty() {
                layer = layer.allow_methods(tower_http::cors::Any);
            } else {
                layer = layer.allow_methods(tower_http::cors::AllowMethods::list(vals));
            }
        }
        _ => layer = layer.allow_methods(tower_http::cors::Any),
    }

    layer
}
