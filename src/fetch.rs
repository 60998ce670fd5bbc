#![forbid(unsafe_code)]

//! Raw HTTP access for the download strategies that bypass the extractor.

use std::{
    ffi::OsString,
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::debug;

/// Some hosts serve an empty or bot-check page to unknown clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Tried in order; the first capture that looks like an http(s) URL wins.
const MEDIA_PATTERNS: &[&str] = &[
    r#"(?i)<meta[^>]+property=["']og:video(?::secure_url|:url)?["'][^>]*content=["']([^"']+)["']"#,
    r#"(?i)<meta[^>]+content=["']([^"']+)["'][^>]*property=["']og:video(?::secure_url|:url)?["']"#,
    r#"(?i)<video[^>]+src=["']([^"']+)["']"#,
    r#"(?i)<source[^>]+src=["']([^"']+)["']"#,
    r#""contentUrl"\s*:\s*"([^"]+)""#,
];

#[derive(Clone)]
pub struct HttpFetcher {
    /// Pages are small, so the whole request shares one deadline.
    page_agent: ureq::Agent,
    /// Media bodies can take far longer than `timeout` to arrive; only the
    /// connect and each individual read are bounded.
    media_agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let page_agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build();
        let media_agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build();
        Self {
            page_agent,
            media_agent,
        }
    }

    pub fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self
            .page_agent
            .get(url)
            .call()
            .with_context(|| format!("failed to fetch page {url}"))?;
        response
            .into_string()
            .with_context(|| format!("failed to read page body from {url}"))
    }

    /// Streams `url` into `<dest>.part` and renames it onto `dest` once the
    /// body is complete, so `dest` never holds a truncated file. HTML
    /// responses (login walls, interstitials) are refused. Returns the number
    /// of bytes written.
    pub fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64> {
        let response = self
            .media_agent
            .get(url)
            .call()
            .with_context(|| format!("failed to request {url}"))?;

        if let Some(content_type) = response.header("content-type") {
            if is_html(content_type) {
                bail!("{url} returned an HTML page ({content_type}) instead of media");
            }
        }

        let part = part_path(dest);
        let mut file =
            File::create(&part).with_context(|| format!("failed to create {}", part.display()))?;
        let copied = io::copy(&mut response.into_reader(), &mut file);
        drop(file);
        let written = match copied {
            Ok(written) => written,
            Err(err) => {
                let _ = fs::remove_file(&part);
                return Err(err).with_context(|| format!("failed to stream {url}"));
            }
        };

        fs::rename(&part, dest).with_context(|| {
            format!("failed to move {} to {}", part.display(), dest.display())
        })?;
        debug!(%url, dest = %dest.display(), written, "fetched file");
        Ok(written)
    }
}

fn is_html(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    mime.eq_ignore_ascii_case("text/html") || mime.eq_ignore_ascii_case("application/xhtml+xml")
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

/// Finds a direct media URL in a video page: Open Graph video tags first,
/// then `<video>`/`<source>` elements, then JSON-LD `contentUrl`.
pub fn extract_media_url(html: &str) -> Option<String> {
    MEDIA_PATTERNS.iter().find_map(|pattern| {
        let regex = Regex::new(pattern).ok()?;
        regex
            .captures_iter(html)
            .filter_map(|captures| captures.get(1))
            .map(|found| unescape_url(found.as_str()))
            .find(|url| url.starts_with("http://") || url.starts_with("https://"))
    })
}

fn unescape_url(raw: &str) -> String {
    raw.trim()
        .replace("&amp;", "&")
        .replace("\\u0026", "&")
        .replace("\\/", "/")
}
