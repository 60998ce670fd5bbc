#![forbid(unsafe_code)]

//! Request/response records shared by the lister, the downloader and the API.
//!
//! Nothing here is persisted; every value is built per request and dropped
//! once the response is written.

use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Platforms the lister knows how to build listing URLs for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Instagram,
    Tiktok,
}

impl Platform {
    /// Case-insensitive lookup; unknown names are not an error, the caller
    /// simply gets `None` and treats the source as unmapped.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "youtube" => Some(Self::Youtube),
            "instagram" => Some(Self::Instagram),
            "tiktok" => Some(Self::Tiktok),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Youtube => "youtube",
            Self::Instagram => "instagram",
            Self::Tiktok => "tiktok",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which tab of a YouTube channel to enumerate. Other platforms ignore it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VideoType {
    #[default]
    Videos,
    Shorts,
    Streams,
}

impl VideoType {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|value| value.trim().to_ascii_lowercase()) {
            Some(ref value) if value == "shorts" || value == "short" => Self::Shorts,
            Some(ref value) if value == "streams" || value == "live" => Self::Streams,
            _ => Self::Videos,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Videos => "videos",
            Self::Shorts => "shorts",
            Self::Streams => "streams",
        }
    }
}

/// Upstream publish marker. Extractors report either a `YYYYMMDD` date string
/// or an epoch timestamp; the value is echoed back in whichever shape it
/// arrived.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PublishedAt {
    Date(String),
    Timestamp(i64),
}

/// One video discovered on a channel or profile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub platform: String,
    pub external_id: String,
    pub external_video_id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub duration: Option<f64>,
    pub view_count: Option<u64>,
    pub group_name: Option<String>,
    pub fetched_at: Option<PublishedAt>,
}

/// Result of a single download request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadOutcome {
    Completed { path: PathBuf },
    Failed { error: String },
}

impl DownloadOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Everything the downloader needs to place and fetch one video.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub video_url: String,
    pub platform: String,
    pub external_video_id: String,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub source_name: Option<String>,
}

/// Parameters of a single channel/profile listing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRequest {
    pub platform: String,
    pub external_id: String,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub video_type: Option<String>,
}

/// A source row handed over by the orchestrator for batch listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub platform: String,
    pub external_id: String,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub video_type: Option<String>,
}

/// Inline error reported for a source that could not be listed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceError {
    pub error: String,
    pub source: String,
    pub platform: String,
}

/// Element of a batch listing response: either a video or the error of the
/// source that failed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchItem {
    Error(SourceError),
    Video(VideoRecord),
}
