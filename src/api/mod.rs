#![forbid(unsafe_code)]

//! HTTP surface consumed by the workflow orchestrator.
//!
//! Every route except `/` and `/health` lives under the configured prefix
//! (`/v1` by default). Handlers hold no state of their own: everything they
//! need comes from [`AppState`], which is built once at startup.

mod content;
mod registry;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;

use crate::{
    config::Settings,
    dispatch::DownloadDispatcher,
    downloader::Downloader,
    extractor::MediaExtractor,
    lister::Lister,
};

pub use content::{ConfirmPublishRequest, ProcessSourcesRequest, SelectRequest};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub lister: Lister,
    pub dispatcher: DownloadDispatcher,
}

impl AppState {
    /// Wires the lister and the download chain around one extractor.
    pub fn new(settings: Settings, extractor: Arc<dyn MediaExtractor>) -> Self {
        let downloader = Downloader::from_settings(&settings, extractor.clone());
        Self::from_parts(settings, Lister::new(extractor), downloader)
    }

    pub fn from_parts(settings: Settings, lister: Lister, downloader: Downloader) -> Self {
        Self {
            settings: Arc::new(settings),
            lister,
            dispatcher: DownloadDispatcher::new(downloader),
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/fetch/run", post(content::run_fetch))
        .route("/download", post(content::queue_download))
        .route("/select", post(content::select_content))
        .route("/confirm_publish", post(content::confirm_publish))
        .route("/n8n/process-sources", post(content::process_sources))
        .route("/n8n/health", get(content::n8n_health))
        .route(
            "/groups",
            get(registry::list_groups).post(registry::create_group),
        )
        .route(
            "/sources",
            get(registry::list_sources).post(registry::create_source),
        )
        .route(
            "/destinations",
            get(registry::list_destinations).post(registry::create_destination),
        );

    let root = Router::new()
        .route("/", get(index))
        .route("/health", get(health));

    // `nest` rejects an empty prefix, so an unprefixed API is merged instead.
    let prefix = state.settings.api_prefix.clone();
    let app = if prefix.is_empty() {
        root.merge(api)
    } else {
        root.nest(&prefix, api)
    };

    app.fallback(fallback).with_state(state)
}

async fn fallback() -> ApiError {
    ApiError::not_found("endpoint not found")
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: String,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: state.settings.project_name.clone(),
    })
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let name = html_escape(&state.settings.project_name);
    let prefix = &state.settings.api_prefix;
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{name}</title>
<style>
body {{ font-family: system-ui, sans-serif; max-width: 760px; margin: 0 auto; padding: 2rem; color: #333; }}
code {{ background: #f3f4f6; padding: 0.2rem 0.4rem; border-radius: 4px; }}
</style>
</head>
<body>
<h1>{name}</h1>
<p>Service is running. It is driven by the workflow orchestrator; the main endpoints are:</p>
<ul>
<li><code>POST {prefix}/fetch/run</code></li>
<li><code>POST {prefix}/n8n/process-sources</code></li>
<li><code>POST {prefix}/select</code></li>
<li><code>POST {prefix}/download</code></li>
<li><code>POST {prefix}/confirm_publish</code></li>
<li><code>GET /health</code></li>
</ul>
</body>
</html>
"#
    ))
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
