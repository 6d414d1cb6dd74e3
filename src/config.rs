//! Configuration types for the download client.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable overriding [`ClientConfig::api_url`].
pub const API_URL_ENV: &str = "PROTUBE_API_URL";

/// How download progress is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMode {
    /// Client-side timer estimates; no live channel needed.
    #[default]
    Simulated,
    /// Live events from the service, correlated by filename.
    Push,
}

/// Configuration for talking to the download service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the service deployment.
    pub api_url: String,
    /// Timeout for a whole remote call, in seconds.
    pub request_timeout_secs: u64,
    /// Timeout for establishing a connection, in seconds.
    pub connect_timeout_secs: u64,
    /// Progress reporting strategy for single downloads.
    pub progress_mode: ProgressMode,
    /// Interval of the simulated playlist timer, in milliseconds.
    pub playlist_tick_ms: u64,
    /// Delay before the simulated single-download bump, in milliseconds.
    pub download_bump_ms: u64,
    /// How long notices stay visible, in seconds.
    pub notice_secs: u64,
    /// Number of links processed at once. 1 means strictly sequential.
    pub concurrent_links: usize,
    /// Directory where payloads are saved.
    pub output_dir: PathBuf,
    /// Resolution used when none is given.
    pub default_resolution: String,
    /// Format used when none is given.
    pub default_format: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:5000".to_string(),
            request_timeout_secs: 600,
            connect_timeout_secs: 10,
            progress_mode: ProgressMode::Simulated,
            playlist_tick_ms: 1500,
            download_bump_ms: 1000,
            notice_secs: 8,
            concurrent_links: 1,
            output_dir: PathBuf::from("."),
            default_resolution: "720p".to_string(),
            default_format: "mp4".to_string(),
        }
    }
}

impl ClientConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the service base URL.
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Sets the per-call timeout in seconds.
    #[must_use]
    pub const fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Sets the progress reporting strategy.
    #[must_use]
    pub const fn with_progress_mode(mut self, mode: ProgressMode) -> Self {
        self.progress_mode = mode;
        self
    }

    /// Sets the simulated playlist tick interval in milliseconds.
    #[must_use]
    pub const fn with_playlist_tick_ms(mut self, ms: u64) -> Self {
        self.playlist_tick_ms = ms;
        self
    }

    /// Sets how many links are processed at once.
    #[must_use]
    pub const fn with_concurrent_links(mut self, n: usize) -> Self {
        self.concurrent_links = n;
        self
    }

    /// Sets the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Playlist simulation tick, never shorter than one millisecond.
    #[must_use]
    pub const fn playlist_tick(&self) -> Duration {
        if self.playlist_tick_ms == 0 {
            Duration::from_millis(1)
        } else {
            Duration::from_millis(self.playlist_tick_ms)
        }
    }

    #[must_use]
    pub const fn download_bump(&self) -> Duration {
        Duration::from_millis(self.download_bump_ms)
    }

    #[must_use]
    pub const fn notice_ttl(&self) -> Duration {
        Duration::from_secs(self.notice_secs)
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}

/// Complete application configuration as stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Client configuration.
    pub client: ClientConfig,
}

impl AppConfig {
    /// Default location of the config file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("protube-dl")
            .join("config.toml")
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text is not valid configuration.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Loads configuration from `path` (or the default location), falling
    /// back to defaults when the file does not exist. `PROTUBE_API_URL`
    /// overrides the base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map_or_else(Self::default_path, Path::to_path_buf);
        let mut config = match std::fs::read_to_string(&path) {
            Ok(text) => {
                log::info!("Loaded config from {}", path.display());
                Self::from_toml(&text)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                return Err(Error::Config(format!("{}: {e}", path.display())));
            }
        };
        if let Some(url) = std::env::var(API_URL_ENV)
            .ok()
            .filter(|u| !u.trim().is_empty())
        {
            config.client.api_url = url;
        }
        Ok(config)
    }
}
