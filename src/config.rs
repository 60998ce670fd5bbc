#![forbid(unsafe_code)]

//! Layered runtime configuration: explicit overrides, then the process
//! environment, then a `.env` file, then built-in defaults.
//!
//! The resolved [`Settings`] value is built once at startup and handed to
//! every component by value (or behind an `Arc`); nothing reads the
//! environment after that point.

use anyhow::{Context, Result, anyhow};
use std::{
    collections::HashMap,
    env, fs,
    net::IpAddr,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_STORAGE_PATH: &str = "downloads";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_API_PREFIX: &str = "/v1";
pub const DEFAULT_PROJECT_NAME: &str = "Content Orchestrator";
pub const DEFAULT_YTDLP_PROGRAM: &str = "yt-dlp";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Immutable process configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub project_name: String,
    pub api_prefix: String,
    pub storage_root: PathBuf,
    pub host: IpAddr,
    pub port: u16,
    pub ytdlp_program: PathBuf,
    pub cookies_file: PathBuf,
    /// Deadline for page fetches; connect and idle-read limit for media.
    pub http_timeout: Duration,
}

impl Settings {
    /// Settings rooted at `storage_root` with every other knob at its default.
    /// Mostly useful for tests and one-off CLI runs.
    pub fn with_storage_root(storage_root: impl Into<PathBuf>) -> Self {
        let storage_root = storage_root.into();
        Self {
            project_name: DEFAULT_PROJECT_NAME.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            cookies_file: default_cookies_file(&storage_root),
            storage_root,
            host: IpAddr::from([127, 0, 0, 1]),
            port: DEFAULT_PORT,
            ytdlp_program: PathBuf::from(DEFAULT_YTDLP_PROGRAM),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub storage_root: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_settings(overrides: SettingsOverrides) -> Result<Settings> {
    let file_vars = match overrides.env_path.as_deref() {
        Some(path) => read_required_env_file(path)?,
        None => read_env_file(Path::new(DEFAULT_ENV_PATH))?,
    };
    build_settings_with_overrides(&file_vars, env_var_string, overrides)
}

#[cfg(test)]
fn build_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<Settings> {
    build_settings_with_overrides(file_vars, env_lookup, SettingsOverrides::default())
}

fn build_settings_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: SettingsOverrides,
) -> Result<Settings> {
    let storage_root = overrides
        .storage_root
        .or_else(|| lookup_value("LOCAL_STORAGE_PATH", file_vars, &env_lookup).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH));
    let host_raw = overrides
        .host
        .and_then(non_blank)
        .or_else(|| lookup_value("ORCHESTRATOR_HOST", file_vars, &env_lookup))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let host = parse_host(&host_raw)?;
    let port = overrides
        .port
        .or_else(|| {
            lookup_value("ORCHESTRATOR_PORT", file_vars, &env_lookup)
                .and_then(|value| value.parse::<u16>().ok())
        })
        .unwrap_or(DEFAULT_PORT);
    let api_prefix = lookup_value("API_V1_STR", file_vars, &env_lookup)
        .map(|value| normalize_prefix(&value))
        .unwrap_or_else(|| DEFAULT_API_PREFIX.to_string());
    let project_name = lookup_value("PROJECT_NAME", file_vars, &env_lookup)
        .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string());
    let ytdlp_program = lookup_value("YTDLP_PATH", file_vars, &env_lookup)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_YTDLP_PROGRAM));
    let cookies_file = lookup_value("COOKIES_FILE", file_vars, &env_lookup)
        .map(PathBuf::from)
        .unwrap_or_else(|| default_cookies_file(&storage_root));
    let http_timeout_secs = lookup_value("HTTP_TIMEOUT_SECS", file_vars, &env_lookup)
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);

    Ok(Settings {
        project_name,
        api_prefix,
        storage_root,
        host,
        port,
        ytdlp_program,
        cookies_file,
        http_timeout: Duration::from_secs(http_timeout_secs),
    })
}

/// Cookies live next to the storage root in a sibling `data` directory.
fn default_cookies_file(storage_root: &Path) -> PathBuf {
    storage_root.join("..").join("data").join("cookies.txt")
}

pub fn parse_host(value: &str) -> Result<IpAddr> {
    value
        .trim()
        .parse::<IpAddr>()
        .with_context(|| format!("expected a valid IPv4 or IPv6 address, got {value:?}"))
}

/// Route prefixes always start with `/` and never end with one; an empty
/// prefix mounts the routes at the root.
fn normalize_prefix(value: &str) -> String {
    let trimmed = value.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(non_blank)
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| {
        file_vars
            .get(key)
            .cloned()
            .and_then(non_blank)
    })
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

/// Same as [`read_env_file`] but reports a missing explicit path, which is
/// almost always a typo on the command line.
pub fn read_required_env_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Err(anyhow!("env file {} does not exist", path.display()));
    }
    read_env_file(path)
}
