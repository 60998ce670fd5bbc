#![forbid(unsafe_code)]

//! The individual download methods tried by [`super::Downloader`].

use std::{fs, path::Path, sync::Arc};

use anyhow::{Context, Result};
use tracing::debug;

use crate::{
    extractor::MediaExtractor,
    fetch::{HttpFetcher, extract_media_url},
    models::DownloadOutcome,
};

/// Container formats the extractor may pick when no mp4 is offered.
const FALLBACK_EXTENSIONS: &[&str] = &["webm", "mkv", "m4a"];

/// What one strategy attempt works on.
#[derive(Debug, Clone, Copy)]
pub struct DownloadJob<'a> {
    pub url: &'a str,
    /// Final `.mp4` path the chain checks after every attempt.
    pub target: &'a Path,
}

/// One independent way of getting a video onto disk. Attempts block and may
/// leave a file behind even when they report failure.
pub trait DownloadStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn attempt(&self, job: &DownloadJob<'_>) -> Result<DownloadOutcome>;
}

/// The chain used by the service: extractor download, then extractor-resolved
/// stream URL, then scraping the page ourselves.
pub fn default_chain(
    extractor: Arc<dyn MediaExtractor>,
    fetcher: HttpFetcher,
) -> Vec<Box<dyn DownloadStrategy>> {
    vec![
        Box::new(YtDlpStrategy::new(extractor.clone())),
        Box::new(StreamUrlStrategy::new(extractor, fetcher.clone())),
        Box::new(PageScrapeStrategy::new(fetcher)),
    ]
}

pub struct YtDlpStrategy {
    extractor: Arc<dyn MediaExtractor>,
}

impl YtDlpStrategy {
    pub fn new(extractor: Arc<dyn MediaExtractor>) -> Self {
        Self { extractor }
    }
}

impl DownloadStrategy for YtDlpStrategy {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn attempt(&self, job: &DownloadJob<'_>) -> Result<DownloadOutcome> {
        let template = job.target.with_extension("%(ext)s");
        self.extractor
            .download(job.url, &template.to_string_lossy())
            .context("extractor download failed")?;

        // A leftover undersized target must not shadow a fresh container.
        if super::is_qualifying(job.target) {
            return Ok(DownloadOutcome::Completed {
                path: job.target.to_path_buf(),
            });
        }
        for ext in FALLBACK_EXTENSIONS {
            let produced = job.target.with_extension(ext);
            if produced.exists() {
                debug!(from = %produced.display(), to = %job.target.display(), "renaming download");
                fs::rename(&produced, job.target).with_context(|| {
                    format!("failed to rename {} to {}", produced.display(), job.target.display())
                })?;
                return Ok(DownloadOutcome::Completed {
                    path: job.target.to_path_buf(),
                });
            }
        }
        Ok(DownloadOutcome::failed(
            "extractor finished without producing a media file",
        ))
    }
}

pub struct StreamUrlStrategy {
    extractor: Arc<dyn MediaExtractor>,
    fetcher: HttpFetcher,
}

impl StreamUrlStrategy {
    pub fn new(extractor: Arc<dyn MediaExtractor>, fetcher: HttpFetcher) -> Self {
        Self { extractor, fetcher }
    }
}

impl DownloadStrategy for StreamUrlStrategy {
    fn name(&self) -> &'static str {
        "stream-url"
    }

    fn attempt(&self, job: &DownloadJob<'_>) -> Result<DownloadOutcome> {
        let media_url = self
            .extractor
            .resolve_media_url(job.url)
            .context("could not resolve a stream url")?;
        self.fetcher.fetch_to_file(&media_url, job.target)?;
        Ok(DownloadOutcome::Completed {
            path: job.target.to_path_buf(),
        })
    }
}

pub struct PageScrapeStrategy {
    fetcher: HttpFetcher,
}

impl PageScrapeStrategy {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }
}

impl DownloadStrategy for PageScrapeStrategy {
    fn name(&self) -> &'static str {
        "page-scrape"
    }

    fn attempt(&self, job: &DownloadJob<'_>) -> Result<DownloadOutcome> {
        let html = self.fetcher.fetch_page(job.url)?;
        let Some(media_url) = extract_media_url(&html) else {
            return Ok(DownloadOutcome::failed("no media url found in page"));
        };
        debug!(%media_url, "found media url in page");
        self.fetcher.fetch_to_file(&media_url, job.target)?;
        Ok(DownloadOutcome::Completed {
            path: job.target.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        extractor::YtDlp,
        test_support::{FakeExtractor, install_stub, serve_once},
    };
    use std::time::Duration;
    use tempfile::tempdir;

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(Duration::from_secs(5))
    }

    #[cfg(unix)]
    fn ytdlp_stub(dir: &Path, ext: &str) -> YtDlp {
        let script = format!(
            r#"#!/usr/bin/env bash
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "--output" ]; then out="$2"; fi
  shift
done
base="${{out%.*}}"
head -c 2000 /dev/zero > "$base.{ext}"
"#
        );
        let stub = install_stub(dir, "yt-dlp", &script);
        YtDlp::new(stub, dir.join("no-cookies.txt"))
    }

    #[cfg(unix)]
    #[test]
    fn ytdlp_strategy_accepts_mp4() {
        let dir = tempdir().unwrap();
        let strategy = YtDlpStrategy::new(Arc::new(ytdlp_stub(dir.path(), "mp4")));
        let target = dir.path().join("great_title.mp4");

        let outcome = strategy
            .attempt(&DownloadJob {
                url: "https://youtu.be/a",
                target: &target,
            })
            .unwrap();
        assert_eq!(outcome, DownloadOutcome::Completed { path: target.clone() });
        assert_eq!(fs::metadata(&target).unwrap().len(), 2000);
    }

    #[cfg(unix)]
    #[test]
    fn ytdlp_strategy_renames_other_containers() {
        let dir = tempdir().unwrap();
        let strategy = YtDlpStrategy::new(Arc::new(ytdlp_stub(dir.path(), "webm")));
        let target = dir.path().join("great_title.mp4");

        let outcome = strategy
            .attempt(&DownloadJob {
                url: "https://youtu.be/a",
                target: &target,
            })
            .unwrap();
        assert!(outcome.is_completed());
        assert!(target.exists());
        assert!(!dir.path().join("great_title.webm").exists());
    }

    #[cfg(unix)]
    #[test]
    fn ytdlp_strategy_replaces_stale_undersized_target() {
        let dir = tempdir().unwrap();
        let strategy = YtDlpStrategy::new(Arc::new(ytdlp_stub(dir.path(), "webm")));
        let target = dir.path().join("clip.mp4");
        fs::write(&target, b"junk").unwrap();

        let outcome = strategy
            .attempt(&DownloadJob {
                url: "https://youtu.be/a",
                target: &target,
            })
            .unwrap();
        assert!(outcome.is_completed());
        assert_eq!(fs::metadata(&target).unwrap().len(), 2000);
        assert!(!dir.path().join("clip.webm").exists());
    }

    #[cfg(unix)]
    #[test]
    fn ytdlp_strategy_fails_when_nothing_is_written() {
        let dir = tempdir().unwrap();
        let stub = install_stub(dir.path(), "yt-dlp", "#!/usr/bin/env bash\nexit 0\n");
        let strategy = YtDlpStrategy::new(Arc::new(YtDlp::new(stub, dir.path().join("none"))));
        let target = dir.path().join("clip.mp4");

        let outcome = strategy
            .attempt(&DownloadJob {
                url: "https://youtu.be/a",
                target: &target,
            })
            .unwrap();
        assert!(!outcome.is_completed());
    }

    #[test]
    fn ytdlp_strategy_propagates_extractor_errors() {
        let dir = tempdir().unwrap();
        let strategy = YtDlpStrategy::new(Arc::new(FakeExtractor::default()));
        let target = dir.path().join("clip.mp4");
        assert!(
            strategy
                .attempt(&DownloadJob {
                    url: "https://youtu.be/a",
                    target: &target,
                })
                .is_err()
        );
    }

    #[test]
    fn stream_url_strategy_fetches_resolved_url() {
        let media = serve_once("200 OK", vec![1u8; 3000]);
        let extractor = FakeExtractor {
            media_url: Some(media),
            ..FakeExtractor::default()
        };
        let strategy = StreamUrlStrategy::new(Arc::new(extractor), fetcher());
        let dir = tempdir().unwrap();
        let target = dir.path().join("clip.mp4");

        let outcome = strategy
            .attempt(&DownloadJob {
                url: "https://www.tiktok.com/@someone/video/1",
                target: &target,
            })
            .unwrap();
        assert!(outcome.is_completed());
        assert_eq!(fs::metadata(&target).unwrap().len(), 3000);
    }

    #[test]
    fn stream_url_strategy_errors_without_resolution() {
        let strategy = StreamUrlStrategy::new(Arc::new(FakeExtractor::default()), fetcher());
        let dir = tempdir().unwrap();
        let target = dir.path().join("clip.mp4");
        let err = strategy
            .attempt(&DownloadJob {
                url: "https://example.com/v",
                target: &target,
            })
            .unwrap_err();
        assert!(format!("{err:#}").contains("could not resolve a stream url"));
    }

    #[test]
    fn page_scrape_strategy_follows_og_video() {
        let media = serve_once("200 OK", vec![2u8; 2500]);
        let html = format!(r#"<html><head><meta property="og:video" content="{media}"></head></html>"#);
        let page = serve_once("200 OK", html.into_bytes());
        let strategy = PageScrapeStrategy::new(fetcher());
        let dir = tempdir().unwrap();
        let target = dir.path().join("clip.mp4");

        let outcome = strategy
            .attempt(&DownloadJob {
                url: &page,
                target: &target,
            })
            .unwrap();
        assert!(outcome.is_completed());
        assert_eq!(fs::metadata(&target).unwrap().len(), 2500);
    }

    #[test]
    fn page_scrape_strategy_reports_pages_without_media() {
        let page = serve_once("200 OK", b"<html><body>login required</body></html>".to_vec());
        let strategy = PageScrapeStrategy::new(fetcher());
        let dir = tempdir().unwrap();
        let target = dir.path().join("clip.mp4");

        let outcome = strategy
            .attempt(&DownloadJob {
                url: &page,
                target: &target,
            })
            .unwrap();
        assert_eq!(outcome, DownloadOutcome::failed("no media url found in page"));
        assert!(!target.exists());
    }

    #[test]
    fn default_chain_order() {
        let chain = default_chain(Arc::new(FakeExtractor::default()), fetcher());
        let names: Vec<&str> = chain.iter().map(|strategy| strategy.name()).collect();
        assert_eq!(names, ["yt-dlp", "stream-url", "page-scrape"]);
    }
}
