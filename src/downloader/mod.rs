#![forbid(unsafe_code)]

//! Placing a video on disk: destination resolution, the idempotent
//! pre-flight check and the ordered strategy chain.
//!
//! The filesystem is the source of truth. A file at the target path larger
//! than [`MIN_QUALIFYING_BYTES`] counts as a finished download no matter
//! which strategy wrote it or what that strategy reported.

pub mod strategies;

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{Span, debug, info, warn};

use crate::{
    config::Settings,
    extractor::MediaExtractor,
    fetch::HttpFetcher,
    models::{DownloadOutcome, DownloadRequest},
    slug::{safe_segment, slugify},
};

pub use strategies::{DownloadJob, DownloadStrategy};

/// Files at or below this size are treated as placeholders or truncated
/// leftovers and never satisfy the pre-flight check.
pub const MIN_QUALIFYING_BYTES: u64 = 1000;

pub fn is_qualifying(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > MIN_QUALIFYING_BYTES)
        .unwrap_or(false)
}

/// `<root>/<group>/<source>` when both names are given, else
/// `<root>/<platform>`.
pub fn target_dir(root: &Path, request: &DownloadRequest) -> PathBuf {
    let group = non_blank(request.group_name.as_deref());
    let source = non_blank(request.source_name.as_deref());
    match (group, source) {
        (Some(group), Some(source)) => root.join(slugify(group)).join(slugify(source)),
        _ => root.join(safe_segment(&request.platform)),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

#[derive(Clone)]
pub struct Downloader {
    storage_root: PathBuf,
    extractor: Arc<dyn MediaExtractor>,
    strategies: Arc<Vec<Box<dyn DownloadStrategy>>>,
}

impl Downloader {
    pub fn new(
        storage_root: impl Into<PathBuf>,
        extractor: Arc<dyn MediaExtractor>,
        strategies: Vec<Box<dyn DownloadStrategy>>,
    ) -> Self {
        Self {
            storage_root: storage_root.into(),
            extractor,
            strategies: Arc::new(strategies),
        }
    }

    /// Downloader with the standard strategy chain.
    pub fn from_settings(settings: &Settings, extractor: Arc<dyn MediaExtractor>) -> Self {
        let fetcher = HttpFetcher::new(settings.http_timeout);
        let chain = strategies::default_chain(extractor.clone(), fetcher);
        Self::new(&settings.storage_root, extractor, chain)
    }

    /// Runs one pass of the download on the blocking pool. Never fails: every
    /// problem ends up in the `failed` outcome.
    pub async fn download(&self, request: DownloadRequest) -> DownloadOutcome {
        let this = self.clone();
        let span = Span::current();
        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            this.download_blocking(&request)
        })
        .await
        .unwrap_or_else(|err| DownloadOutcome::failed(format!("download task failed: {err}")))
    }

    pub fn download_blocking(&self, request: &DownloadRequest) -> DownloadOutcome {
        let dir = target_dir(&self.storage_root, request);
        if let Err(err) = fs::create_dir_all(&dir) {
            warn!(dir = %dir.display(), "cannot create download directory: {err}");
            return DownloadOutcome::failed(format!(
                "could not create download directory {}: {err}",
                dir.display()
            ));
        }

        let legacy_path = dir.join(format!("{}.mp4", safe_segment(&request.external_video_id)));
        let target = match self.probe_title(&request.video_url) {
            Some(title) => dir.join(format!("{}.mp4", slugify(&title))),
            None => legacy_path.clone(),
        };

        for existing in [&target, &legacy_path] {
            if is_qualifying(existing) {
                info!(path = %existing.display(), "video already downloaded");
                return DownloadOutcome::Completed {
                    path: existing.clone(),
                };
            }
        }

        self.run_chain(&request.video_url, &target)
    }

    fn probe_title(&self, url: &str) -> Option<String> {
        match self.extractor.probe_title(url) {
            Ok(title) => title,
            Err(err) => {
                warn!(%url, "title probe failed, falling back to video id: {err}");
                None
            }
        }
    }

    fn run_chain(&self, url: &str, target: &Path) -> DownloadOutcome {
        let job = DownloadJob { url, target };
        let mut reasons = Vec::with_capacity(self.strategies.len());

        for strategy in self.strategies.iter() {
            let name = strategy.name();
            info!(strategy = name, %url, target = %target.display(), "attempting download");

            let reason = match strategy.attempt(&job) {
                Ok(DownloadOutcome::Completed { path }) if is_qualifying(&path) => {
                    info!(strategy = name, path = %path.display(), "download completed");
                    return DownloadOutcome::Completed { path };
                }
                Ok(DownloadOutcome::Completed { path }) => {
                    format!("reported {} but no usable file was written", path.display())
                }
                Ok(DownloadOutcome::Failed { error }) => error,
                Err(err) => format!("{err:#}"),
            };

            if is_qualifying(target) {
                info!(
                    strategy = name,
                    path = %target.display(),
                    "download completed despite reported failure"
                );
                return DownloadOutcome::Completed {
                    path: target.to_path_buf(),
                };
            }

            warn!(strategy = name, "download attempt failed: {reason}");
            reasons.push(format!("{name}: {reason}"));
        }

        if reasons.is_empty() {
            return DownloadOutcome::failed("no download strategies configured");
        }
        debug!(attempts = reasons.len(), "all download strategies failed");
        DownloadOutcome::failed(reasons.join("; "))
    }
}
