use chrono::{DateTime, Utc};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

use super::episode::{scan_directory, AudioFile, AudioMatcher, Episode};
use super::probe::{DurationCache, DurationProbe, FfmpegProbe, DEFAULT_DURATION};
use super::render::render_feed;
use super::tags::{LoftyTagReader, TagReader};
use crate::config::{Podcast, Settings};
use crate::util::episode_url;

#[derive(Debug, Error)]
pub enum BuildError {
    /// The audio directory could not be enumerated.
    #[error("Audio directory '{path}' is unavailable: {source}")]
    DirectoryUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Output of one regeneration cycle.
#[derive(Debug, Clone)]
pub struct RenderedFeed {
    pub xml: String,
    pub episode_count: usize,
    pub built_at: DateTime<Utc>,
}

/// Scans a directory and renders it as a feed document.
///
/// Every build starts from scratch: the directory is re-read and every
/// episode re-derived. Only probed durations are remembered between builds,
/// and only while a file's size and mtime stay the same.
///
/// Failures for a single file never fail the build. A missing duration
/// renders as `00:00:00` and a missing or unreadable artist tag as an
/// empty description.
pub struct FeedBuilder {
    matcher: AudioMatcher,
    probe: Box<dyn DurationProbe>,
    tags: Box<dyn TagReader>,
    durations: Option<DurationCache>,
}

impl FeedBuilder {
    pub fn new(
        matcher: AudioMatcher,
        probe: Box<dyn DurationProbe>,
        tags: Box<dyn TagReader>,
    ) -> Self {
        Self {
            matcher,
            probe,
            tags,
            durations: None,
        }
    }

    /// Builder wired to ffmpeg and lofty as configured in `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            AudioMatcher::new(settings.extension.as_str()),
            Box::new(FfmpegProbe::new(settings.ffmpeg.as_str())),
            Box::new(LoftyTagReader),
        )
        .with_duration_cache(settings.duration_cache_size)
    }

    /// Remember up to `capacity` probed durations. Zero disables the cache.
    pub fn with_duration_cache(mut self, capacity: usize) -> Self {
        self.durations = NonZeroUsize::new(capacity).map(DurationCache::new);
        self
    }

    /// Renders the feed for `dir`, stamped with the current time.
    pub fn build(&self, dir: &Path, podcast: &Podcast) -> Result<String, BuildError> {
        self.build_at(dir, podcast, Utc::now()).map(|feed| feed.xml)
    }

    /// Renders the feed for `dir` with `built_at` as the last build date.
    pub fn build_at(
        &self,
        dir: &Path,
        podcast: &Podcast,
        built_at: DateTime<Utc>,
    ) -> Result<RenderedFeed, BuildError> {
        let started = Instant::now();
        let episodes = self.episodes(dir, podcast)?;
        let xml = render_feed(podcast, &episodes, built_at);

        tracing::debug!(
            dir = %dir.display(),
            episodes = episodes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Feed rendered"
        );

        Ok(RenderedFeed {
            xml,
            episode_count: episodes.len(),
            built_at,
        })
    }

    /// Derives the episode list for `dir`, newest first.
    pub fn episodes(&self, dir: &Path, podcast: &Podcast) -> Result<Vec<Episode>, BuildError> {
        let files =
            scan_directory(dir, &self.matcher).map_err(|source| BuildError::DirectoryUnavailable {
                path: dir.to_path_buf(),
                source,
            })?;

        Ok(files
            .iter()
            .map(|file| self.episode(file, podcast))
            .collect())
    }

    fn episode(&self, file: &AudioFile, podcast: &Podcast) -> Episode {
        Episode {
            title: file.stem.clone(),
            artist: self.artist(file),
            url: episode_url(&podcast.base_url, &file.file_name),
            size: file.size,
            duration: self.duration(file),
            published: DateTime::<Utc>::from(file.modified),
        }
    }

    fn duration(&self, file: &AudioFile) -> String {
        if let Some(hit) = self.durations.as_ref().and_then(|c| c.get(file)) {
            tracing::trace!(path = %file.path.display(), "Duration cache hit");
            return hit;
        }

        match self.probe.probe(&file.path) {
            Ok(duration) => {
                if let Some(cache) = &self.durations {
                    cache.insert(file, &duration);
                }
                duration
            }
            Err(e) => {
                tracing::warn!(
                    path = %file.path.display(),
                    error = %e,
                    "Duration probe failed, using default"
                );
                DEFAULT_DURATION.to_string()
            }
        }
    }

    fn artist(&self, file: &AudioFile) -> String {
        match self.tags.artist(&file.path) {
            Ok(artist) => artist.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(
                    path = %file.path.display(),
                    error = %e,
                    "Failed to read tags, leaving artist empty"
                );
                String::new()
            }
        }
    }
}
