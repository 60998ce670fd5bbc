#![forbid(unsafe_code)]

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use super::{ApiError, ApiResult, AppState};
use crate::models::{BatchItem, DownloadRequest, ListRequest, SourceSpec, VideoRecord};

#[derive(Debug, Serialize)]
pub struct ListingResponse<T> {
    status: &'static str,
    videos_found: usize,
    videos: Vec<T>,
}

impl<T> ListingResponse<T> {
    fn completed(videos: Vec<T>) -> Self {
        Self {
            status: "completed",
            videos_found: videos.len(),
            videos,
        }
    }
}

pub async fn run_fetch(
    State(state): State<AppState>,
    Json(request): Json<ListRequest>,
) -> Json<ListingResponse<VideoRecord>> {
    let videos = state.lister.list_videos(&request).await;
    Json(ListingResponse::completed(videos))
}

#[derive(Debug, Deserialize)]
pub struct ProcessSourcesRequest {
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub limit: Option<i64>,
}

pub async fn process_sources(
    State(state): State<AppState>,
    Json(request): Json<ProcessSourcesRequest>,
) -> Json<ListingResponse<BatchItem>> {
    info!(sources = request.sources.len(), limit = ?request.limit, "processing sources");
    let results = state
        .lister
        .process_sources(&request.sources, request.limit)
        .await;
    Json(ListingResponse::completed(results))
}

#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    status: &'static str,
    message: String,
}

/// Accepts the request and returns before any download work starts.
pub async fn queue_download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> ApiResult<Json<QueuedResponse>> {
    if request.video_url.trim().is_empty() {
        return Err(ApiError::bad_request("video_url is required"));
    }
    if request.external_video_id.trim().is_empty() {
        return Err(ApiError::bad_request("external_video_id is required"));
    }

    let message = format!("Download queued for {}", request.external_video_id);
    drop(state.dispatcher.enqueue(request));
    Ok(Json(QueuedResponse {
        status: "queued",
        message,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub destination_platform: String,
    pub destination_account_id: String,
    #[serde(default)]
    pub group_name: Option<String>,
    pub available_videos: Vec<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct SelectResponse {
    message: &'static str,
    selected: Option<Map<String, Value>>,
}

/// Picks the first candidate, restricted to `group_name` when one is given.
/// Candidates are opaque records and are echoed back untouched.
pub async fn select_content(Json(request): Json<SelectRequest>) -> Json<SelectResponse> {
    Json(select_first(request))
}

fn select_first(request: SelectRequest) -> SelectResponse {
    if request.available_videos.is_empty() {
        return SelectResponse {
            message: "No content available",
            selected: None,
        };
    }

    let group = request
        .group_name
        .as_deref()
        .filter(|group| !group.is_empty());
    let selected = request.available_videos.into_iter().find(|video| match group {
        Some(group) => video.get("group_name").and_then(Value::as_str) == Some(group),
        None => true,
    });

    match selected {
        Some(video) => {
            info!(
                destination = %format!("{}/{}", request.destination_platform, request.destination_account_id),
                "content selected"
            );
            SelectResponse {
                message: "Content selected",
                selected: Some(video),
            }
        }
        None => SelectResponse {
            message: "No content available for this group",
            selected: None,
        },
    }
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPublishRequest {
    pub video_id: String,
    pub destination_platform: String,
    pub destination_account_id: String,
    pub result: String,
    #[serde(default)]
    pub platform_post_id: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmPublishResponse {
    status: &'static str,
    message: String,
    data: ConfirmedPublish,
}

#[derive(Debug, Serialize)]
struct ConfirmedPublish {
    video_id: String,
    destination: String,
    result: String,
    platform_post_id: Option<String>,
    error_message: Option<String>,
}

/// Acknowledges a publish result. Nothing is recorded here; publish history
/// is kept by the orchestrator.
pub async fn confirm_publish(
    Json(request): Json<ConfirmPublishRequest>,
) -> Json<ConfirmPublishResponse> {
    let destination = format!(
        "{}/{}",
        request.destination_platform, request.destination_account_id
    );
    info!(video = %request.video_id, %destination, result = %request.result, "publish confirmed");
    Json(ConfirmPublishResponse {
        status: "confirmed",
        message: format!(
            "Publish {} confirmed for video {}",
            request.result, request.video_id
        ),
        data: ConfirmedPublish {
            video_id: request.video_id,
            destination,
            result: request.result,
            platform_post_id: request.platform_post_id,
            error_message: request.error_message,
        },
    })
}

#[derive(Debug, Serialize)]
pub struct StatusMessage {
    status: &'static str,
    message: &'static str,
}

pub async fn n8n_health() -> Json<StatusMessage> {
    Json(StatusMessage {
        status: "ok",
        message: "n8n integration ready",
    })
}
