#![forbid(unsafe_code)]

//! Fire-and-forget execution of download requests.
//!
//! There is no job registry: once a request is handed over, its outcome is
//! only visible in the logs and on disk.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span};

use crate::{
    downloader::Downloader,
    models::{DownloadOutcome, DownloadRequest},
};

#[derive(Clone)]
pub struct DownloadDispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    downloader: Downloader,
    counter: AtomicUsize,
}

impl DownloadDispatcher {
    pub fn new(downloader: Downloader) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                downloader,
                counter: AtomicUsize::new(1),
            }),
        }
    }

    fn next_job_label(&self) -> String {
        let id = self.inner.counter.fetch_add(1, Ordering::SeqCst);
        format!("download-{id}")
    }

    /// Starts the download in the background and returns immediately. Callers
    /// are free to drop the handle; the task keeps running.
    pub fn enqueue(&self, request: DownloadRequest) -> JoinHandle<DownloadOutcome> {
        let job = self.next_job_label();
        let span = info_span!("download", job = %job, video = %request.external_video_id);
        info!(
            job = %job,
            video = %request.external_video_id,
            platform = %request.platform,
            "download queued"
        );

        let inner = self.inner.clone();
        tokio::spawn(
            async move {
                let outcome = inner.downloader.download(request).await;
                match &outcome {
                    DownloadOutcome::Completed { path } => {
                        info!(path = %path.display(), "download finished");
                    }
                    DownloadOutcome::Failed { error } => {
                        error!("download failed: {error}");
                    }
                }
                outcome
            }
            .instrument(span),
        )
    }
}
