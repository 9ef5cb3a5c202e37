//! Configuration for the feed server.
//!
//! Server settings come from an optional TOML file (`podserve.toml` by
//! default). A missing file yields `Settings::default()`. Unknown keys are
//! accepted but logged as a warning, since they are usually typos.
//!
//! Podcast metadata comes from environment variables, with the file's
//! `[podcast]` table as a fallback. Environment takes precedence.
//! Everything is resolved once at startup into an immutable [`Config`].
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::util::{validate_base_url, UrlError};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A required podcast value is set neither in the environment nor the file.
    #[error("Missing required configuration: set the {0} environment variable")]
    Missing(&'static str),

    #[error("Invalid {var}: {source}")]
    InvalidBaseUrl {
        var: &'static str,
        #[source]
        source: UrlError,
    },

    #[error("Audio directory '{path}' is not usable: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Refresh interval must be at least one second")]
    ZeroInterval,
}

// ============================================================================
// Environment variable names
// ============================================================================

pub const ENV_BASE_URL: &str = "BASEURL";
pub const ENV_TITLE: &str = "POD_TITLE";
pub const ENV_DESCRIPTION: &str = "POD_DESCRIPTION";
pub const ENV_IMAGE: &str = "POD_IMAGE";
pub const ENV_AUTHOR: &str = "POD_AUTHOR";
pub const ENV_EMAIL: &str = "POD_EMAIL";
pub const ENV_SUMMARY: &str = "POD_SUMMARY";
pub const ENV_LANGUAGE: &str = "POD_LANGUAGE";
pub const ENV_EPISODE_AUTHOR: &str = "POD_EPISODE_AUTHOR";

// ============================================================================
// File settings
// ============================================================================

/// Settings read from the TOML file.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// TCP port the HTTP listener binds.
    pub port: u16,

    /// Address the HTTP listener binds.
    pub bind: IpAddr,

    /// Directory scanned for episodes and served for downloads.
    pub directory: PathBuf,

    /// Audio file extension, without the dot. Matched case-sensitively.
    pub extension: String,

    /// Seconds between feed regenerations.
    pub refresh_interval_secs: u64,

    /// Program invoked to probe episode durations.
    pub ffmpeg: String,

    /// Number of probed durations remembered between regenerations (0 = off).
    pub duration_cache_size: usize,

    /// Seconds open connections get to finish after a shutdown signal.
    pub shutdown_grace_secs: u64,

    /// Fallback podcast metadata, overridden by the environment.
    pub podcast: PodcastSection,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 8000,
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            directory: PathBuf::from("completed"),
            extension: "mp3".to_string(),
            refresh_interval_secs: 60,
            ffmpeg: "ffmpeg".to_string(),
            duration_cache_size: 1024,
            shutdown_grace_secs: 10,
            podcast: PodcastSection::default(),
        }
    }
}

/// The `[podcast]` table of the settings file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PodcastSection {
    pub base_url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub author: Option<String>,
    pub email: Option<String>,
    pub summary: Option<String>,
    pub language: Option<String>,
    pub episode_author: Option<String>,
}

impl Settings {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 9] = [
        "port",
        "bind",
        "directory",
        "extension",
        "refresh_interval_secs",
        "ffmpeg",
        "duration_cache_size",
        "shutdown_grace_secs",
        "podcast",
    ];

    /// Load settings from a TOML file.
    ///
    /// - Missing file → `Ok(Settings::default())`
    /// - Empty file → `Ok(Settings::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check the size before reading so a corrupted file cannot exhaust memory
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let settings: Settings = toml::from_str(content)?;
        tracing::info!(
            path = %path.display(),
            port = settings.port,
            directory = %settings.directory.display(),
            "Loaded configuration"
        );
        Ok(settings)
    }
}

// ============================================================================
// Resolved configuration
// ============================================================================

/// Channel-level podcast metadata rendered into every feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Podcast {
    /// Public URL prefix of the audio files, always ending in `/`.
    pub base_url: String,
    pub title: String,
    pub description: String,
    pub image: String,
    pub author: String,
    pub email: String,
    pub summary: String,
    pub language: String,
    /// Fixed author label attached to every episode.
    pub episode_author: String,
}

impl Podcast {
    /// Resolve podcast metadata from an environment lookup and the file fallback.
    ///
    /// `env` is injected so callers decide where variables come from;
    /// the binary passes `std::env::var(..).ok()`. Blank values count as unset.
    pub fn resolve<F>(section: &PodcastSection, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |var: &str, fallback: &Option<String>| -> Option<String> {
            env(var)
                .or_else(|| fallback.clone())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |var: &'static str, fallback: &Option<String>| {
            lookup(var, fallback).ok_or(ConfigError::Missing(var))
        };

        let raw_base = required(ENV_BASE_URL, &section.base_url)?;
        let base_url = validate_base_url(&raw_base).map_err(|source| ConfigError::InvalidBaseUrl {
            var: ENV_BASE_URL,
            source,
        })?;
        let title = required(ENV_TITLE, &section.title)?;
        let description = required(ENV_DESCRIPTION, &section.description)?;
        let image = required(ENV_IMAGE, &section.image)?;
        let author = required(ENV_AUTHOR, &section.author)?;

        let email = lookup(ENV_EMAIL, &section.email).unwrap_or_default();
        let summary = lookup(ENV_SUMMARY, &section.summary).unwrap_or_else(|| description.clone());
        let language = lookup(ENV_LANGUAGE, &section.language).unwrap_or_else(|| "en".to_string());
        let episode_author =
            lookup(ENV_EPISODE_AUTHOR, &section.episode_author).unwrap_or_else(|| author.clone());

        Ok(Self {
            base_url,
            title,
            description,
            image,
            author,
            email,
            summary,
            language,
            episode_author,
        })
    }
}

/// Fully resolved, read-only process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    pub podcast: Podcast,
    /// Canonical absolute path of the audio directory.
    pub directory: PathBuf,
}

impl Config {
    pub fn resolve<F>(settings: Settings, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if settings.refresh_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        let podcast = Podcast::resolve(&settings.podcast, env)?;
        let directory = std::fs::canonicalize(&settings.directory).map_err(|source| {
            ConfigError::Directory {
                path: settings.directory.clone(),
                source,
            }
        })?;
        if !directory.is_dir() {
            return Err(ConfigError::Directory {
                path: settings.directory.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
            });
        }
        Ok(Self {
            settings,
            podcast,
            directory,
        })
    }

    pub fn refresh_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.settings.refresh_interval_secs)
    }

    pub fn shutdown_grace(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.settings.shutdown_grace_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================
