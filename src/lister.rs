#![forbid(unsafe_code)]

//! Channel/profile listing.
//!
//! Listing favors the batch over the individual source: an unmapped platform
//! or a failing extractor yields an empty list instead of an error, so one
//! bad row never aborts an orchestrator run over many sources.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    extractor::{FlatEntry, MediaExtractor},
    models::{
        BatchItem, ListRequest, Platform, PublishedAt, SourceError, SourceSpec, VideoRecord,
        VideoType,
    },
};

#[derive(Debug, Error)]
pub enum ListError {
    #[error("external_id is required")]
    MissingExternalId,
    #[error("listing task failed: {0}")]
    Task(String),
}

/// Builds the page URL the extractor enumerates for a source. Pure: the same
/// inputs always give the same URL, and unknown platforms give `None`.
pub fn listing_url(platform: &str, external_id: &str, video_type: VideoType) -> Option<String> {
    let external_id = external_id.trim();
    let url = match Platform::parse(platform)? {
        Platform::Youtube if external_id.starts_with('@') => {
            format!("https://www.youtube.com/{external_id}/{}", video_type.as_str())
        }
        Platform::Youtube => match video_type {
            VideoType::Shorts => format!("https://www.youtube.com/channel/{external_id}/shorts"),
            VideoType::Videos | VideoType::Streams => {
                format!("https://www.youtube.com/channel/{external_id}/videos")
            }
        },
        Platform::Instagram => format!("https://www.instagram.com/{external_id}/"),
        Platform::Tiktok => {
            let handle = external_id.trim_start_matches('@');
            format!("https://www.tiktok.com/@{handle}")
        }
    };
    Some(url)
}

/// Stateless listing service; cheap to clone and share between handlers.
#[derive(Clone)]
pub struct Lister {
    extractor: Arc<dyn MediaExtractor>,
}

impl Lister {
    pub fn new(extractor: Arc<dyn MediaExtractor>) -> Self {
        Self { extractor }
    }

    /// Lists the videos of one source. Never fails; see [`Self::try_list_videos`]
    /// for the variant that reports invalid input.
    pub async fn list_videos(&self, request: &ListRequest) -> Vec<VideoRecord> {
        match self.try_list_videos(request).await {
            Ok(videos) => videos,
            Err(err) => {
                warn!(
                    platform = %request.platform,
                    external_id = %request.external_id,
                    "listing rejected: {err}"
                );
                Vec::new()
            }
        }
    }

    /// Lists the videos of one source, reporting a blank external id or a
    /// crashed listing task as an error. Extractor failures and unmapped
    /// platforms still produce an empty list.
    pub async fn try_list_videos(
        &self,
        request: &ListRequest,
    ) -> Result<Vec<VideoRecord>, ListError> {
        let external_id = request.external_id.trim();
        if external_id.is_empty() {
            return Err(ListError::MissingExternalId);
        }

        let video_type = VideoType::parse(request.video_type.as_deref());
        let limit = request
            .limit
            .filter(|limit| *limit > 0)
            .map(|limit| limit as usize);
        info!(
            platform = %request.platform,
            external_id,
            ?limit,
            video_type = video_type.as_str(),
            "fetching source"
        );

        let Some(platform) = Platform::parse(&request.platform) else {
            warn!(platform = %request.platform, external_id, "no listing url for platform");
            return Ok(Vec::new());
        };
        let Some(url) = listing_url(&request.platform, external_id, video_type) else {
            return Ok(Vec::new());
        };

        let extractor = self.extractor.clone();
        let task_url = url.clone();
        let listed = tokio::task::spawn_blocking(move || extractor.list_flat(&task_url, limit))
            .await
            .map_err(|err| ListError::Task(err.to_string()))?;

        let payload = match listed {
            Ok(payload) => payload,
            Err(err) => {
                error!(%platform, external_id, %url, "error fetching source: {err}");
                return Ok(Vec::new());
            }
        };

        let mut videos: Vec<VideoRecord> = payload
            .into_entries()
            .into_iter()
            .flatten()
            .filter(|entry| !entry.is_placeholder())
            .map(|entry| {
                normalize_entry(
                    entry,
                    platform,
                    external_id,
                    request.group_name.as_deref(),
                )
            })
            .collect();
        if let Some(limit) = limit {
            videos.truncate(limit);
        }

        info!(%platform, external_id, found = videos.len(), "source listed");
        Ok(videos)
    }

    /// Lists every source in order, flattening their videos into one list.
    /// A source that cannot be listed contributes one inline error item.
    pub async fn process_sources(&self, sources: &[SourceSpec], limit: Option<i64>) -> Vec<BatchItem> {
        let mut results = Vec::new();
        for source in sources {
            let request = ListRequest {
                platform: source.platform.clone(),
                external_id: source.external_id.clone(),
                group_name: source.group_name.clone(),
                limit,
                video_type: source.video_type.clone(),
            };
            match self.try_list_videos(&request).await {
                Ok(videos) => results.extend(videos.into_iter().map(BatchItem::Video)),
                Err(err) => {
                    warn!(
                        platform = %source.platform,
                        source = %source.external_id,
                        "source failed: {err}"
                    );
                    results.push(BatchItem::Error(SourceError {
                        error: err.to_string(),
                        source: source.external_id.clone(),
                        platform: source.platform.clone(),
                    }));
                }
            }
        }
        results
    }
}

fn normalize_entry(
    entry: FlatEntry,
    platform: Platform,
    external_id: &str,
    group_name: Option<&str>,
) -> VideoRecord {
    let fetched_at = entry
        .upload_date
        .filter(|date| !date.trim().is_empty())
        .map(PublishedAt::Date)
        .or(entry.timestamp.map(PublishedAt::Timestamp));
    VideoRecord {
        platform: platform.as_str().to_string(),
        external_id: external_id.to_string(),
        external_video_id: entry.id,
        title: entry.title,
        url: entry.url.or(entry.webpage_url),
        duration: entry.duration,
        view_count: entry.view_count,
        group_name: group_name.map(str::to_owned),
        fetched_at,
    }
}
