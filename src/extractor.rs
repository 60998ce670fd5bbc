#![forbid(unsafe_code)]

//! The video extraction capability, treated as an opaque external tool.
//!
//! [`MediaExtractor`] is the seam the lister and the download strategies talk
//! to; [`YtDlp`] implements it by shelling out to the `yt-dlp` program. All
//! calls block, so async callers run them through `spawn_blocking`.

use std::{
    io,
    path::PathBuf,
    process::{Command, Output},
};

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::Settings;

/// Format selector shared by the download and URL-resolution calls.
pub const PREFERRED_FORMAT: &str = "best[ext=mp4]/best";

const STDERR_TAIL: usize = 300;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("could not launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("could not parse extractor output: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("extractor returned no {0}")]
    Empty(&'static str),
}

/// One entry of a flat listing. Every field is optional because extractors
/// disagree about what a "flat" entry carries.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct FlatEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub timestamp: Option<i64>,
}

impl FlatEntry {
    /// Placeholder entries carry neither an id nor any URL.
    pub fn is_placeholder(&self) -> bool {
        is_blank(self.id.as_deref())
            && is_blank(self.url.as_deref())
            && is_blank(self.webpage_url.as_deref())
    }
}

/// Top-level `--dump-single-json` payload of a flat listing. A playlist or
/// channel carries `entries`; a single video is its own entry.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ListingPayload {
    #[serde(default)]
    pub entries: Option<Vec<Option<FlatEntry>>>,
    #[serde(flatten)]
    pub own: FlatEntry,
}

impl ListingPayload {
    pub fn into_entries(self) -> Vec<Option<FlatEntry>> {
        match self.entries {
            Some(entries) => entries,
            None => vec![Some(self.own)],
        }
    }
}

/// Capabilities the rest of the crate needs from an extraction tool.
pub trait MediaExtractor: Send + Sync {
    /// Enumerates the page at `url` without fetching per-video details.
    /// `playlist_end` asks the tool to stop paging early; it is a hint only.
    fn list_flat(
        &self,
        url: &str,
        playlist_end: Option<usize>,
    ) -> Result<ListingPayload, ExtractError>;

    /// Fetches the title of a single video without downloading it.
    fn probe_title(&self, url: &str) -> Result<Option<String>, ExtractError>;

    /// Downloads `url` to `output_template`, a path whose extension is the
    /// literal `%(ext)s` placeholder.
    fn download(&self, url: &str, output_template: &str) -> Result<(), ExtractError>;

    /// Resolves a directly playable media URL for the page at `url`.
    fn resolve_media_url(&self, url: &str) -> Result<String, ExtractError>;
}

/// [`MediaExtractor`] backed by the `yt-dlp` command-line tool.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    cookies_file: PathBuf,
}

#[derive(Deserialize)]
struct TitleProbe {
    title: Option<String>,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>, cookies_file: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            cookies_file: cookies_file.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.ytdlp_program, &settings.cookies_file)
    }

    fn command(&self) -> Command {
        Command::new(&self.program)
    }

    fn add_cookies(&self, command: &mut Command) {
        if self.cookies_file.exists() {
            debug!(cookies = %self.cookies_file.display(), "using cookies file");
            command.arg("--cookies").arg(&self.cookies_file);
        }
    }

    fn run(&self, mut command: Command) -> Result<Output, ExtractError> {
        let program = self.program.display().to_string();
        let output = command.output().map_err(|source| ExtractError::Spawn {
            program: program.clone(),
            source,
        })?;
        if !output.status.success() {
            return Err(ExtractError::Exit {
                program,
                status: output.status.to_string(),
                stderr: tail(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL),
            });
        }
        Ok(output)
    }
}

impl MediaExtractor for YtDlp {
    fn list_flat(
        &self,
        url: &str,
        playlist_end: Option<usize>,
    ) -> Result<ListingPayload, ExtractError> {
        let mut command = self.command();
        command
            .arg("--flat-playlist")
            .arg("--dump-single-json")
            .arg("--no-warnings")
            .arg("--ignore-errors");
        if let Some(end) = playlist_end {
            command.arg("--playlist-end").arg(end.to_string());
        }
        command.arg(url);

        let output = self.run(command)?;
        Ok(serde_json::from_slice(&output.stdout)?)
    }

    fn probe_title(&self, url: &str) -> Result<Option<String>, ExtractError> {
        let mut command = self.command();
        command
            .arg("--dump-single-json")
            .arg("--skip-download")
            .arg("--no-playlist")
            .arg("--no-warnings");
        self.add_cookies(&mut command);
        command.arg(url);

        let output = self.run(command)?;
        let probe: TitleProbe = serde_json::from_slice(&output.stdout)?;
        Ok(probe.title.filter(|title| !title.trim().is_empty()))
    }

    fn download(&self, url: &str, output_template: &str) -> Result<(), ExtractError> {
        let mut command = self.command();
        command
            .arg("--format")
            .arg(PREFERRED_FORMAT)
            .arg("--output")
            .arg(output_template)
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg("--no-progress")
            .arg("--quiet");
        self.add_cookies(&mut command);
        command.arg(url);

        self.run(command).map(|_| ())
    }

    fn resolve_media_url(&self, url: &str) -> Result<String, ExtractError> {
        let mut command = self.command();
        command
            .arg("--get-url")
            .arg("--format")
            .arg(PREFERRED_FORMAT)
            .arg("--no-playlist")
            .arg("--no-warnings");
        self.add_cookies(&mut command);
        command.arg(url);

        let output = self.run(command)?;
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_owned)
            .ok_or(ExtractError::Empty("media url"))
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|value| value.trim().is_empty())
}

/// Keeps the last `max` characters of a tool's stderr, which is where the
/// actual error line lives.
fn tail(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    let count = trimmed.chars().count();
    if count <= max {
        return trimmed.to_string();
    }
    trimmed.chars().skip(count - max).collect()
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_f64))
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(|value| {
        value
            .as_u64()
            .or_else(|| value.as_f64().filter(|n| *n >= 0.0).map(|n| n as u64))
    }))
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(|value| value.as_i64().or_else(|| value.as_f64().map(|n| n as i64))))
}
